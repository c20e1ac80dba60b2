//! Typed weapon abilities parsed from keyword strings.

use serde::{Deserialize, Serialize};

use crate::dice::DiceExpr;
use crate::rules::registry;

/// A weapon keyword with dice mechanics.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeaponAbility {
    /// Each critical hit scores extra hits.
    SustainedHits(DiceExpr),
    /// Critical hits wound automatically.
    LethalHits,
    /// Critical wounds skip every save.
    DevastatingWounds,
    /// Wound rolls of `threshold`+ against `keyword` targets are critical.
    Anti {
        /// Target keyword.
        keyword: String,
        /// Critical wound threshold.
        threshold: u8,
    },
    /// Bonus damage within half range.
    Melta(u32),
    /// Bonus attacks within half range.
    RapidFire(u32),
    /// Bonus attacks per five target models.
    Blast,
    /// Re-roll failed wound rolls.
    TwinLinked,
    /// Target gets no benefit of cover.
    IgnoresCover,
    /// Attacks hit automatically.
    Torrent,
    /// +1 to hit after remaining stationary.
    Heavy,
    /// +1 to wound after charging.
    Lance,
    /// Can shoot unseen targets at -1 to hit, granting cover.
    IndirectFire,
    /// Keyword without dice mechanics.
    Other(String),
}

impl WeaponAbility {
    /// Parse a keyword string. Unrecognised keywords become [`WeaponAbility::Other`].
    #[must_use]
    pub fn parse(keyword: &str) -> Self {
        let other = || WeaponAbility::Other(keyword.trim().to_string());
        let Some(found) = registry::lookup(keyword) else {
            return other();
        };
        let number = || found.value.as_deref().and_then(|v| v.parse::<u32>().ok());

        match found.key {
            "sustained_hits" => found
                .value
                .as_deref()
                .and_then(|v| v.parse::<DiceExpr>().ok())
                .map_or_else(other, WeaponAbility::SustainedHits),
            "lethal_hits" => WeaponAbility::LethalHits,
            "devastating_wounds" => WeaponAbility::DevastatingWounds,
            "anti" => match (found.keyword, number()) {
                (Some(keyword), Some(n)) => WeaponAbility::Anti {
                    keyword,
                    threshold: n as u8,
                },
                _ => other(),
            },
            "melta" => number().map_or_else(other, WeaponAbility::Melta),
            "rapid_fire" => number().map_or_else(other, WeaponAbility::RapidFire),
            "blast" => WeaponAbility::Blast,
            "twin_linked" => WeaponAbility::TwinLinked,
            "ignores_cover" => WeaponAbility::IgnoresCover,
            "torrent" => WeaponAbility::Torrent,
            "heavy" => WeaponAbility::Heavy,
            "lance" => WeaponAbility::Lance,
            "indirect_fire" => WeaponAbility::IndirectFire,
            _ => other(),
        }
    }
}

/// Abilities of one weapon, folded for the calculator.
///
/// Parameterised abilities that appear more than once keep the strongest
/// value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilitySet {
    /// Sustained Hits bonus, if any.
    pub sustained_hits: Option<DiceExpr>,
    /// Lethal Hits.
    pub lethal_hits: bool,
    /// Devastating Wounds.
    pub devastating_wounds: bool,
    /// Anti-X thresholds by keyword.
    pub anti: Vec<(String, u8)>,
    /// Melta bonus damage.
    pub melta: u32,
    /// Rapid Fire bonus attacks.
    pub rapid_fire: u32,
    /// Blast.
    pub blast: bool,
    /// Twin-linked.
    pub twin_linked: bool,
    /// Ignores Cover.
    pub ignores_cover: bool,
    /// Torrent.
    pub torrent: bool,
    /// Heavy.
    pub heavy: bool,
    /// Lance.
    pub lance: bool,
    /// Indirect Fire.
    pub indirect_fire: bool,
}

impl AbilitySet {
    /// Parse and fold a list of keywords.
    pub fn from_keywords<'k>(keywords: impl IntoIterator<Item = &'k str>) -> Self {
        let mut set = Self::default();
        for keyword in keywords {
            set.add(WeaponAbility::parse(keyword));
        }
        set
    }

    fn add(&mut self, ability: WeaponAbility) {
        match ability {
            WeaponAbility::SustainedHits(expr) => {
                let stronger = self.sustained_hits.map_or(true, |cur| expr.max() > cur.max());
                if stronger {
                    self.sustained_hits = Some(expr);
                }
            }
            WeaponAbility::LethalHits => self.lethal_hits = true,
            WeaponAbility::DevastatingWounds => self.devastating_wounds = true,
            WeaponAbility::Anti { keyword, threshold } => {
                match self.anti.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(&keyword)) {
                    Some((_, t)) => *t = (*t).min(threshold),
                    None => self.anti.push((keyword, threshold)),
                }
            }
            WeaponAbility::Melta(n) => self.melta = self.melta.max(n),
            WeaponAbility::RapidFire(n) => self.rapid_fire = self.rapid_fire.max(n),
            WeaponAbility::Blast => self.blast = true,
            WeaponAbility::TwinLinked => self.twin_linked = true,
            WeaponAbility::IgnoresCover => self.ignores_cover = true,
            WeaponAbility::Torrent => self.torrent = true,
            WeaponAbility::Heavy => self.heavy = true,
            WeaponAbility::Lance => self.lance = true,
            WeaponAbility::IndirectFire => self.indirect_fire = true,
            WeaponAbility::Other(_) => {}
        }
    }

    /// Lowest Anti-X threshold that applies to a target with `keywords`.
    pub fn anti_threshold<'k>(&self, keywords: impl IntoIterator<Item = &'k String> + Clone) -> Option<u8> {
        self.anti
            .iter()
            .filter(|(kw, _)| keywords.clone().into_iter().any(|k| k.eq_ignore_ascii_case(kw)))
            .map(|(_, t)| *t)
            .min()
    }
}
