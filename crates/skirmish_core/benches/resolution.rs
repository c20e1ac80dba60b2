//! Resolution benchmarks for skirmish_core.
//!
//! Run with: `cargo bench -p skirmish_core`

// Benchmark binaries don't need docs on macro-generated functions
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use skirmish_core::combat::{prepare_attack, AttackSetup, CombatSession};
use skirmish_core::dice::SeededDice;
use skirmish_core::game::Phase;
use skirmish_core::rules::get_all_unit_rules;
use skirmish_test_utils::fixtures::{choppa, game_state, marine_army, ork_army, ORK_PLAYER};

/// Aggregation, rule application and a full seeded resolution for a mob of Boyz.
pub fn resolution_benchmark(c: &mut Criterion) {
    let orks = ork_army();
    let marines = marine_army();
    let game = game_state(Phase::Fight, ORK_PLAYER);
    let setup = AttackSetup::for_armies(&orks, &marines, &game);
    let weapon = choppa();
    let attacker = orks.view("boyz").expect("boyz in roster");
    let defender = marines.view("intercessors").expect("intercessors in roster");

    c.bench_function("aggregate_rules", |b| {
        b.iter(|| get_all_unit_rules(black_box(&attacker)).expect("rules decode"));
    });

    c.bench_function("prepare_attack", |b| {
        b.iter(|| {
            prepare_attack(black_box(&attacker), &defender, &weapon, &game, &setup).expect("attack prepares")
        });
    });

    let snapshot = prepare_attack(&attacker, &defender, &weapon, &game, &setup).expect("attack prepares");
    c.bench_function("resolve_all", |b| {
        b.iter(|| {
            let mut session = CombatSession::new(snapshot.clone());
            let mut dice = SeededDice::new(black_box(7));
            session.resolve_all(&mut dice).expect("snapshot resolves");
            session.into_result()
        });
    });
}

criterion_group!(benches, resolution_benchmark);
criterion_main!(benches);
