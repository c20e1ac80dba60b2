//! Dice expressions and dice sources.
//!
//! Characteristics such as Attacks and Damage are either a literal ("2") or
//! a dice expression ("D6", "2D3", "d6+3"). Rolls come from a [`DiceSource`]
//! supplied by the caller, so resolution stays deterministic: hosts pass a
//! [`SeededDice`] for live play and a [`ScriptedDice`] to replay raw dice.

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// A parsed dice expression: `count` dice of `sides` faces plus `modifier`.
///
/// A literal value is represented with `count == 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DiceExpr {
    /// Number of dice to roll.
    pub count: u32,
    /// Faces per die.
    pub sides: u32,
    /// Flat amount added after rolling.
    pub modifier: i32,
}

impl DiceExpr {
    /// A fixed value with no dice.
    #[must_use]
    pub const fn fixed(value: i32) -> Self {
        Self {
            count: 0,
            sides: 0,
            modifier: value,
        }
    }

    /// Create a dice expression.
    #[must_use]
    pub const fn new(count: u32, sides: u32, modifier: i32) -> Self {
        Self {
            count,
            sides,
            modifier,
        }
    }

    /// Whether resolving this expression needs any dice.
    #[must_use]
    pub const fn is_fixed(&self) -> bool {
        self.count == 0
    }

    /// Smallest possible result.
    #[must_use]
    pub fn min(&self) -> i32 {
        self.count as i32 + self.modifier
    }

    /// Largest possible result.
    #[must_use]
    pub fn max(&self) -> i32 {
        (self.count * self.sides) as i32 + self.modifier
    }

    /// Resolve the expression, drawing dice from `dice`. Never returns less than zero.
    pub fn resolve(&self, dice: &mut impl DiceSource) -> Result<u32> {
        let mut total = self.modifier;
        for _ in 0..self.count {
            total += dice.roll(self.sides)? as i32;
        }
        Ok(total.max(0) as u32)
    }
}

impl FromStr for DiceExpr {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        parse_dice(s)
    }
}

impl fmt::Display for DiceExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_fixed() {
            return write!(f, "{}", self.modifier);
        }
        if self.count == 1 {
            write!(f, "D{}", self.sides)?;
        } else {
            write!(f, "{}D{}", self.count, self.sides)?;
        }
        match self.modifier {
            0 => Ok(()),
            m if m > 0 => write!(f, "+{m}"),
            m => write!(f, "{m}"),
        }
    }
}

/// Parse a characteristic string like "3", "D6", "2D3" or "d6+3".
pub fn parse_dice(notation: &str) -> Result<DiceExpr> {
    let notation = notation.trim().to_lowercase();
    if notation.is_empty() {
        return Err(EngineError::dice(notation, "empty expression"));
    }

    let Some(d_pos) = notation.find('d') else {
        let value: i32 = notation
            .parse()
            .map_err(|_| EngineError::dice(&notation, "not a number or dice expression"))?;
        if value < 0 {
            return Err(EngineError::dice(&notation, "value must not be negative"));
        }
        return Ok(DiceExpr::fixed(value));
    };

    let count_str = &notation[..d_pos];
    let count: u32 = if count_str.is_empty() {
        1
    } else {
        count_str
            .parse()
            .map_err(|_| EngineError::dice(&notation, format!("invalid dice count '{count_str}'")))?
    };
    if count == 0 {
        return Err(EngineError::dice(&notation, "dice count must be at least 1"));
    }

    let rest = &notation[d_pos + 1..];
    let (sides_str, modifier) = match rest.find(['+', '-']) {
        Some(pos) => {
            let modifier: i32 = rest[pos..]
                .parse()
                .map_err(|_| EngineError::dice(&notation, format!("invalid modifier '{}'", &rest[pos..])))?;
            (&rest[..pos], modifier)
        }
        None => (rest, 0),
    };

    let sides: u32 = sides_str
        .parse()
        .map_err(|_| EngineError::dice(&notation, format!("invalid die size '{sides_str}'")))?;
    if sides < 2 {
        return Err(EngineError::dice(&notation, "dice need at least two faces"));
    }

    Ok(DiceExpr::new(count, sides, modifier))
}

/// Source of die results.
pub trait DiceSource {
    /// Roll one die with `sides` faces, returning a value in `1..=sides`.
    fn roll(&mut self, sides: u32) -> Result<u32>;

    /// Roll one six-sided die.
    fn d6(&mut self) -> Result<u8> {
        Ok(self.roll(6)? as u8)
    }
}

impl<T: DiceSource + ?Sized> DiceSource for &mut T {
    fn roll(&mut self, sides: u32) -> Result<u32> {
        (**self).roll(sides)
    }
}

/// Deterministic dice seeded by the host.
///
/// Two sources built from the same seed always produce the same sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeededDice {
    state: u64,
    rolled: u64,
}

impl SeededDice {
    /// Create a dice source from a seed.
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        Self {
            state: seed.wrapping_add(0x9E37_79B9_7F4A_7C15),
            rolled: 0,
        }
    }

    /// Number of dice rolled so far.
    #[must_use]
    pub const fn rolled(&self) -> u64 {
        self.rolled
    }

    fn next(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        // Low bits of an LCG cycle quickly; use the high half.
        self.state >> 33
    }
}

impl DiceSource for SeededDice {
    fn roll(&mut self, sides: u32) -> Result<u32> {
        if sides == 0 {
            return Err(EngineError::DiceSource("cannot roll a zero-sided die".into()));
        }
        self.rolled += 1;
        Ok((self.next() % u64::from(sides)) as u32 + 1)
    }
}

/// A fixed sequence of raw die results, consumed in order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptedDice {
    values: VecDeque<u32>,
}

impl ScriptedDice {
    /// Create a scripted source from raw results.
    pub fn new(values: impl IntoIterator<Item = u32>) -> Self {
        Self {
            values: values.into_iter().collect(),
        }
    }

    /// Dice not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.values.len()
    }
}

impl DiceSource for ScriptedDice {
    fn roll(&mut self, sides: u32) -> Result<u32> {
        let value = self
            .values
            .pop_front()
            .ok_or_else(|| EngineError::DiceSource("scripted dice exhausted".into()))?;
        if value == 0 || value > sides {
            return Err(EngineError::DiceSource(format!(
                "scripted value {value} is not a valid D{sides} result"
            )));
        }
        Ok(value)
    }
}
