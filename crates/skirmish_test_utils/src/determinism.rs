//! Determinism testing utilities.
//!
//! Provides a harness for verifying that combat resolution produces
//! identical results given identical inputs.
//!
//! # Testing Strategy
//!
//! Both players see the same combat result, and the second player may
//! resume a resolution the first one started. Sources of divergence include:
//!
//! - **Dice**: every roll comes from a [`DiceSource`]; a seeded source must
//!   replay the same sequence on every machine.
//!
//! - **HashMap iteration order**: rule modifiers live in ordered maps and
//!   sets so baked snapshots serialize identically.
//!
//! - **Serialization**: a result resumed from JSON or bincode must continue
//!   exactly where a single-pass resolution would.
//!
//! # Test Levels
//!
//! 1. **Unit tests**: Individual step determinism (hits, wounds, saves)
//! 2. **Property tests**: Random rules and profiles still resolve deterministically
//! 3. **Integration tests**: Full scenarios are reproducible from a seed
//! 4. **Parallel tests**: Resolving on N threads all match

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::thread;

use skirmish_core::combat::{CombatResult, CombatSession, CombatSnapshot, CombatStage};
use skirmish_core::dice::{DiceSource, SeededDice};

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Seed of the dice source.
    pub seed: u64,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for deterministic resolution).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that the resolution was deterministic, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the runs produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Combat resolution is non-deterministic!\n\
                 Runs: {}\n\
                 Seed: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.seed,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Result of parallel resolution runs.
#[derive(Debug, Clone)]
pub struct ParallelResolutionResult {
    /// Result hash from each thread.
    pub hashes: Vec<u64>,
    /// Seed of the dice source.
    pub seed: u64,
    /// Number of resolutions run.
    pub num_runs: usize,
}

impl ParallelResolutionResult {
    /// Check if all resolutions produced identical results.
    #[must_use]
    pub fn is_deterministic(&self) -> bool {
        self.hashes.windows(2).all(|w| w[0] == w[1])
    }

    /// Assert all resolutions matched.
    ///
    /// # Panics
    ///
    /// Panics if resolutions produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic() {
            let mut unique: Vec<u64> = self.hashes.clone();
            unique.sort_unstable();
            unique.dedup();
            panic!(
                "Parallel resolutions diverged!\n\
                 Resolutions: {}\n\
                 Seed: {}\n\
                 Unique hashes: {}\n\
                 All hashes: {:?}",
                self.num_runs,
                self.seed,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run a computation multiple times and verify every run hashes the same.
///
/// # Arguments
///
/// * `runs` - Number of times to run
/// * `seed` - Seed handed to `run` on every attempt
/// * `run` - Function producing a state from a seed
/// * `hash` - Function to compute state hash
///
/// # Example
///
/// ```ignore
/// use skirmish_test_utils::determinism::{result_hash, resolve_with_seed, verify_determinism};
///
/// let result = verify_determinism(
///     5,  // Run 5 times
///     42, // Dice seed
///     |seed| resolve_with_seed(&snapshot, seed),
///     result_hash,
/// );
/// result.assert_deterministic();
/// ```
pub fn verify_determinism<S, Run, HashFn>(runs: usize, seed: u64, run: Run, hash: HashFn) -> DeterminismResult
where
    Run: Fn(u64) -> S,
    HashFn: Fn(&S) -> u64,
{
    let hashes: Vec<u64> = (0..runs).map(|_| hash(&run(seed))).collect();
    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
        seed,
    }
}

/// Resolve a snapshot in one pass with seeded dice.
///
/// # Panics
///
/// Panics if resolution fails (a malformed dice expression in the snapshot).
#[must_use]
pub fn resolve_with_seed(snapshot: &CombatSnapshot, seed: u64) -> CombatResult {
    let mut dice = SeededDice::new(seed);
    resolve_with(snapshot, &mut dice)
}

/// Resolve a snapshot in one pass with the given dice.
///
/// # Panics
///
/// Panics if resolution fails.
pub fn resolve_with(snapshot: &CombatSnapshot, dice: &mut impl DiceSource) -> CombatResult {
    let mut session = CombatSession::new(snapshot.clone());
    session.resolve_all(dice).expect("snapshot resolves");
    session.into_result()
}

/// Hash the binary encoding of a combat result.
///
/// # Panics
///
/// Panics if the result cannot be encoded.
#[must_use]
pub fn result_hash(result: &CombatResult) -> u64 {
    let bytes = result.to_bytes().expect("combat result encodes");
    compute_hash(&bytes)
}

/// Resolve a snapshot `runs` times with the same seed and compare results.
#[must_use]
pub fn verify_resolution_determinism(snapshot: &CombatSnapshot, seed: u64, runs: usize) -> DeterminismResult {
    verify_determinism(runs, seed, |s| resolve_with_seed(snapshot, s), result_hash)
}

/// Resolve the same snapshot on `num_runs` scoped threads.
///
/// Catches hidden shared state that only shows up under thread scheduling.
///
/// # Panics
///
/// Panics if a worker thread panics.
#[must_use]
pub fn run_parallel_resolutions_scoped(
    snapshot: &CombatSnapshot,
    seed: u64,
    num_runs: usize,
) -> ParallelResolutionResult {
    let hashes = thread::scope(|s| {
        let handles: Vec<_> = (0..num_runs)
            .map(|_| s.spawn(|| result_hash(&resolve_with_seed(snapshot, seed))))
            .collect();

        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    ParallelResolutionResult {
        hashes,
        seed,
        num_runs,
    }
}

/// Compare two results step by step, finding the first step that differs.
///
/// # Returns
///
/// `None` if the results match, `Some(stage)` naming the first differing
/// step ([`CombatStage::Declared`] when the snapshots themselves differ).
#[must_use]
pub fn find_first_divergence(a: &CombatResult, b: &CombatResult) -> Option<CombatStage> {
    if a.snapshot != b.snapshot {
        return Some(CombatStage::Declared);
    }
    let steps = [
        (CombatStage::AttacksRolled, a.attacks == b.attacks),
        (CombatStage::HitsRolled, a.hits == b.hits),
        (CombatStage::WoundsRolled, a.wounds == b.wounds),
        (CombatStage::SavesRolled, a.saves == b.saves),
        (CombatStage::FeelNoPainRolled, a.feel_no_pain == b.feel_no_pain),
        (CombatStage::Summarized, a.summary == b.summary),
    ];
    steps.into_iter().find(|(_, same)| !same).map(|(stage, _)| stage)
}

/// Verify that handing the result across a JSON and a bincode boundary
/// between every step ends where a single pass does.
///
/// This is what happens when the attacker rolls hits and wounds and the
/// defender resumes the shared result to roll saves.
#[must_use]
pub fn verify_serialization_determinism(snapshot: &CombatSnapshot, seed: u64) -> bool {
    let single_pass = resolve_with_seed(snapshot, seed);

    let mut dice = SeededDice::new(seed);
    let mut session = CombatSession::new(snapshot.clone());
    for step in 0..6 {
        let rolled = match step {
            0 => session.roll_attacks(&mut dice).map(|_| ()),
            1 => session.roll_hits(&mut dice).map(|_| ()),
            2 => session.roll_wounds(&mut dice).map(|_| ()),
            3 => session.roll_saves(&mut dice).map(|_| ()),
            4 => session.roll_feel_no_pain(&mut dice).map(|_| ()),
            _ => session.summarize(&mut dice).map(|_| ()),
        };
        if rolled.is_err() {
            return false;
        }

        let resumed = session
            .result()
            .to_json()
            .and_then(|json| CombatResult::from_json(&json))
            .and_then(|result| result.to_bytes())
            .and_then(|bytes| CombatResult::from_bytes(&bytes))
            .and_then(CombatSession::resume);
        session = match resumed {
            Ok(s) => s,
            Err(_) => return false,
        };
    }

    session.into_result() == single_pass
}

/// Compute a simple hash for any hashable value.
pub fn compute_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Proptest strategies for rule and combat testing.
///
/// These strategies generate random but reproducible inputs for
/// property-based testing of condition evaluation and resolution.
pub mod strategies {
    use proptest::prelude::*;
    use skirmish_core::combat::CombatRole;
    use skirmish_core::data::{Weapon, WeaponKind};
    use skirmish_core::game::{Phase, TurnContext};
    use skirmish_core::rules::{Characteristic, Effect, Rule, Scope, WhenExpr};

    /// Army state names the strategies draw from.
    pub const ARMY_STATES: [&str; 3] = ["waaagh", "oath-of-moment", "doctrine"];

    /// Generate any phase.
    pub fn arb_phase() -> impl Strategy<Value = Phase> {
        proptest::sample::select(Phase::ALL.to_vec())
    }

    /// Generate a turn context.
    pub fn arb_turn() -> impl Strategy<Value = TurnContext> {
        prop_oneof![Just(TurnContext::Own), Just(TurnContext::Opponent)]
    }

    /// Generate a combat role.
    pub fn arb_role() -> impl Strategy<Value = CombatRole> {
        prop_oneof![Just(CombatRole::Attacker), Just(CombatRole::Defender)]
    }

    /// Generate a weapon kind.
    pub fn arb_weapon_kind() -> impl Strategy<Value = WeaponKind> {
        prop_oneof![Just(WeaponKind::Ranged), Just(WeaponKind::Melee)]
    }

    /// Generate a scope.
    pub fn arb_scope() -> impl Strategy<Value = Scope> {
        prop_oneof![Just(Scope::Unit), Just(Scope::Model)]
    }

    /// Generate a set of active army states.
    pub fn arb_army_states() -> impl Strategy<Value = Vec<String>> {
        proptest::sample::subsequence(ARMY_STATES.to_vec(), 0..=ARMY_STATES.len())
            .prop_map(|states| states.into_iter().map(String::from).collect())
    }

    /// Generate a condition leaf.
    pub fn arb_when_leaf() -> impl Strategy<Value = WhenExpr> {
        prop_oneof![
            proptest::sample::subsequence(ARMY_STATES.to_vec(), 1..=ARMY_STATES.len()).prop_map(|is| {
                WhenExpr::ArmyState {
                    is: is.into_iter().map(String::from).collect(),
                }
            }),
            proptest::collection::vec(arb_phase(), 1..3).prop_map(|is| WhenExpr::Phase { is }),
            arb_turn().prop_map(|is| WhenExpr::Turn { is }),
            arb_role().prop_map(|is| WhenExpr::Role { is }),
            arb_weapon_kind().prop_map(|is| WhenExpr::WeaponKind { is }),
            Just(WhenExpr::UnitKeyword {
                any: vec!["Infantry".into()]
            }),
            Just(WhenExpr::EnemyKeyword {
                any: vec!["Vehicle".into()]
            }),
            Just(WhenExpr::Charged),
            Just(WhenExpr::WithinHalfRange),
            Just(WhenExpr::LeaderAttached),
        ]
    }

    /// Generate a condition tree up to four levels deep.
    pub fn arb_when_expr() -> impl Strategy<Value = WhenExpr> {
        arb_when_leaf().prop_recursive(4, 32, 4, |inner| {
            prop_oneof![
                proptest::collection::vec(inner.clone(), 0..4).prop_map(WhenExpr::All),
                proptest::collection::vec(inner.clone(), 0..4).prop_map(WhenExpr::Any),
                inner.prop_map(|e| WhenExpr::Not(Box::new(e))),
            ]
        })
    }

    /// Generate an additive numeric effect.
    pub fn arb_numeric_effect() -> impl Strategy<Value = Effect> {
        prop_oneof![
            (-2i32..=2).prop_map(Effect::ModifyHit),
            (-2i32..=2).prop_map(Effect::ModifyWound),
            (-2i32..=2).prop_map(Effect::ModifySave),
            (-1i32..=3).prop_map(|delta| Effect::ModifyCharacteristic {
                stat: Characteristic::Attacks,
                delta,
            }),
            (-1i32..=2).prop_map(|delta| Effect::ModifyCharacteristic {
                stat: Characteristic::Strength,
                delta,
            }),
        ]
    }

    /// Generate an unconditional rule with additive effects.
    pub fn arb_numeric_rule(id: usize) -> impl Strategy<Value = Rule> {
        (arb_scope(), proptest::collection::vec(arb_numeric_effect(), 1..3)).prop_map(move |(scope, effects)| {
            let mut rule = Rule::new(format!("rule-{id}"), format!("Rule {id}"), scope);
            rule.effects = effects;
            rule
        })
    }

    /// Generate a list of unconditional rules with distinct ids.
    pub fn arb_numeric_rules(max_rules: usize) -> impl Strategy<Value = Vec<Rule>> {
        (1..=max_rules.max(1)).prop_flat_map(|n| (0..n).map(arb_numeric_rule).collect::<Vec<_>>())
    }

    /// Generate a plain weapon profile without abilities.
    pub fn arb_weapon() -> impl Strategy<Value = Weapon> {
        (arb_weapon_kind(), 1u32..=6, 2u8..=6, 1i32..=12, -4i32..=0, 1u32..=3).prop_map(
            |(kind, attacks, skill, strength, ap, damage)| {
                Weapon::new("arb-weapon", "Arbitrary weapon", kind).with_profile(
                    &attacks.to_string(),
                    skill,
                    strength,
                    ap,
                    &damage.to_string(),
                )
            },
        )
    }

    /// Generate a dice seed.
    pub fn arb_seed() -> impl Strategy<Value = u64> {
        any::<u64>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{bolt_rifle, intercessors, meltagun, ork_boyz, solo_snapshot};
    use proptest::prelude::*;
    use skirmish_core::combat::{AttackSetup, CombatOptions};
    use skirmish_core::dice::ScriptedDice;

    // =========================================================================
    // Basic determinism tests
    // =========================================================================

    #[test]
    fn test_verify_determinism_simple() {
        let result = verify_determinism(3, 7, |seed| seed * 2, |n| *n);

        assert!(result.is_deterministic);
        assert_eq!(result.hashes, vec![14, 14, 14]);
    }

    #[test]
    fn test_bolt_rifle_resolution_is_deterministic() {
        let snapshot = solo_snapshot(&intercessors(), &ork_boyz(), &bolt_rifle(), &AttackSetup::default());
        verify_resolution_determinism(&snapshot, 42, 5).assert_deterministic();
    }

    #[test]
    fn test_variable_damage_is_deterministic() {
        let setup = AttackSetup::default().with_options(CombatOptions {
            within_half_range: true,
            ..CombatOptions::default()
        });
        let snapshot = solo_snapshot(&intercessors(), &ork_boyz(), &meltagun(), &setup);
        verify_resolution_determinism(&snapshot, 9001, 5).assert_deterministic();
    }

    #[test]
    fn test_different_seeds_diverge_somewhere() {
        let snapshot = solo_snapshot(&ork_boyz(), &intercessors(), &crate::fixtures::choppa(), &AttackSetup::default());
        let a = resolve_with_seed(&snapshot, 1);
        let same = resolve_with_seed(&snapshot, 1);
        assert_eq!(find_first_divergence(&a, &same), None);

        // 30 hit rolls from two seeds will not all match.
        let b = resolve_with_seed(&snapshot, 2);
        assert_eq!(find_first_divergence(&a, &b), Some(CombatStage::HitsRolled));
    }

    #[test]
    fn test_scripted_dice_replay_matches() {
        let snapshot = solo_snapshot(&intercessors(), &ork_boyz(), &bolt_rifle(), &AttackSetup::default());
        let script: Vec<u32> = (0..64).map(|i| i % 6 + 1).collect();
        let a = resolve_with(&snapshot, &mut ScriptedDice::new(script.clone()));
        let b = resolve_with(&snapshot, &mut ScriptedDice::new(script));
        assert_eq!(result_hash(&a), result_hash(&b));
    }

    #[test]
    fn test_serialization_handoff() {
        let snapshot = solo_snapshot(&intercessors(), &ork_boyz(), &meltagun(), &AttackSetup::default());
        assert!(verify_serialization_determinism(&snapshot, 77));
    }

    // =========================================================================
    // Parallel resolution tests
    // =========================================================================

    #[test]
    fn test_parallel_resolutions() {
        let snapshot = solo_snapshot(&ork_boyz(), &intercessors(), &crate::fixtures::choppa(), &AttackSetup::default());
        let result = run_parallel_resolutions_scoped(&snapshot, 1234, 4);
        result.assert_deterministic();
    }

    // =========================================================================
    // Property-based tests using proptest
    // =========================================================================

    proptest! {
        /// Any weapon profile and seed resolves the same way twice.
        #[test]
        fn prop_random_profiles_are_deterministic(
            weapon in strategies::arb_weapon(),
            seed in strategies::arb_seed(),
        ) {
            let snapshot = solo_snapshot(&intercessors(), &ork_boyz(), &weapon, &AttackSetup::default());
            let result = verify_resolution_determinism(&snapshot, seed, 2);
            prop_assert!(result.is_deterministic);
        }

        /// Resuming from the wire never changes the outcome.
        #[test]
        fn prop_handoff_matches_single_pass(
            weapon in strategies::arb_weapon(),
            seed in strategies::arb_seed(),
        ) {
            let snapshot = solo_snapshot(&intercessors(), &ork_boyz(), &weapon, &AttackSetup::default());
            prop_assert!(verify_serialization_determinism(&snapshot, seed));
        }

        /// Generated condition trees always validate.
        #[test]
        fn prop_generated_conditions_validate(when in strategies::arb_when_expr()) {
            let rule = skirmish_core::rules::Rule::new("generated", "Generated", skirmish_core::rules::Scope::Unit)
                .with_when(when);
            prop_assert!(rule.validate().is_ok());
        }
    }
}
