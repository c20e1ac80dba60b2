//! Turn and phase state.
//!
//! The phase controller itself lives with the host; the engine only reads
//! `(phase, turn context, army states)` as evaluation inputs.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A battle-round phase, in turn order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Command phase.
    Command,
    /// Movement phase.
    Move,
    /// Shooting phase.
    Shoot,
    /// Charge phase.
    Charge,
    /// Fight phase.
    Fight,
}

impl Phase {
    /// All phases in cycle order.
    pub const ALL: [Phase; 5] = [
        Phase::Command,
        Phase::Move,
        Phase::Shoot,
        Phase::Charge,
        Phase::Fight,
    ];

    /// The following phase, wrapping from Fight back to Command.
    #[must_use]
    pub const fn next(self) -> Self {
        match self {
            Phase::Command => Phase::Move,
            Phase::Move => Phase::Shoot,
            Phase::Shoot => Phase::Charge,
            Phase::Charge => Phase::Fight,
            Phase::Fight => Phase::Command,
        }
    }

    /// The preceding phase, wrapping from Command back to Fight.
    #[must_use]
    pub const fn previous(self) -> Self {
        match self {
            Phase::Command => Phase::Fight,
            Phase::Move => Phase::Command,
            Phase::Shoot => Phase::Move,
            Phase::Charge => Phase::Shoot,
            Phase::Fight => Phase::Charge,
        }
    }

    /// Short lowercase name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Phase::Command => "command",
            Phase::Move => "move",
            Phase::Shoot => "shoot",
            Phase::Charge => "charge",
            Phase::Fight => "fight",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Phase filter on a rule trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseFilter {
    /// Relevant in every phase.
    Any,
    /// Command phase only.
    Command,
    /// Movement phase only.
    Move,
    /// Shooting phase only.
    Shoot,
    /// Charge phase only.
    Charge,
    /// Fight phase only.
    Fight,
}

impl PhaseFilter {
    /// Whether the filter admits `phase`.
    #[must_use]
    pub const fn matches(self, phase: Phase) -> bool {
        matches!(
            (self, phase),
            (PhaseFilter::Any, _)
                | (PhaseFilter::Command, Phase::Command)
                | (PhaseFilter::Move, Phase::Move)
                | (PhaseFilter::Shoot, Phase::Shoot)
                | (PhaseFilter::Charge, Phase::Charge)
                | (PhaseFilter::Fight, Phase::Fight)
        )
    }
}

impl From<Phase> for PhaseFilter {
    fn from(phase: Phase) -> Self {
        match phase {
            Phase::Command => PhaseFilter::Command,
            Phase::Move => PhaseFilter::Move,
            Phase::Shoot => PhaseFilter::Shoot,
            Phase::Charge => PhaseFilter::Charge,
            Phase::Fight => PhaseFilter::Fight,
        }
    }
}

/// Whose turn it is, from the point of view of the evaluated unit's owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnContext {
    /// The owning player's turn.
    #[default]
    Own,
    /// The opponent's turn.
    Opponent,
}

impl TurnContext {
    /// The same turn seen from the other player.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            TurnContext::Own => TurnContext::Opponent,
            TurnContext::Opponent => TurnContext::Own,
        }
    }
}

/// Turn filter on a rule trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnFilter {
    /// Own turn only.
    Own,
    /// Opponent's turn only.
    Opponent,
    /// Either turn.
    #[default]
    Both,
}

impl TurnFilter {
    /// Whether the filter admits `turn`.
    #[must_use]
    pub const fn matches(self, turn: TurnContext) -> bool {
        matches!(
            (self, turn),
            (TurnFilter::Both, _)
                | (TurnFilter::Own, TurnContext::Own)
                | (TurnFilter::Opponent, TurnContext::Opponent)
        )
    }
}

/// Identifies one of the two players.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(pub String);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Snapshot of the turn/phase state owned by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameState {
    /// Game identifier (also keys the broadcast channel).
    pub game_id: String,
    /// Battle round counter, starting at 1.
    pub turn: u32,
    /// Player whose turn it is.
    pub active_player: PlayerId,
    /// Current phase.
    pub phase: Phase,
}

impl GameState {
    /// Create a game state at the start of the first command phase.
    pub fn new(game_id: impl Into<String>, active_player: PlayerId) -> Self {
        Self {
            game_id: game_id.into(),
            turn: 1,
            active_player,
            phase: Phase::Command,
        }
    }

    /// Turn context for the army owned by `player`.
    #[must_use]
    pub fn turn_context_for(&self, player: &PlayerId) -> TurnContext {
        if &self.active_player == player {
            TurnContext::Own
        } else {
            TurnContext::Opponent
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_cycle() {
        let mut phase = Phase::Command;
        for expected in [Phase::Move, Phase::Shoot, Phase::Charge, Phase::Fight, Phase::Command] {
            phase = phase.next();
            assert_eq!(phase, expected);
        }
        for p in Phase::ALL {
            assert_eq!(p.next().previous(), p);
        }
    }

    #[test]
    fn test_phase_filter() {
        assert!(PhaseFilter::Any.matches(Phase::Fight));
        assert!(PhaseFilter::Shoot.matches(Phase::Shoot));
        assert!(!PhaseFilter::Shoot.matches(Phase::Fight));
        assert!(PhaseFilter::from(Phase::Charge).matches(Phase::Charge));
    }

    #[test]
    fn test_turn_filter() {
        assert!(TurnFilter::Both.matches(TurnContext::Own));
        assert!(TurnFilter::Both.matches(TurnContext::Opponent));
        assert!(TurnFilter::Own.matches(TurnContext::Own));
        assert!(!TurnFilter::Own.matches(TurnContext::Opponent));
        assert!(!TurnFilter::Opponent.matches(TurnContext::Own));
    }

    #[test]
    fn test_turn_context_for() {
        let state = GameState::new("g1", PlayerId("alice".into()));
        assert_eq!(state.turn_context_for(&PlayerId("alice".into())), TurnContext::Own);
        assert_eq!(
            state.turn_context_for(&PlayerId("bob".into())),
            TurnContext::Opponent
        );
    }
}
