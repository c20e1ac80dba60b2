//! Skirmish Ledger - Development Tools

use std::path::Path;

use clap::{Parser, Subcommand};
use skirmish_tools::scenario::Scenario;
use skirmish_tools::validate::{load_rule_libraries, validate_data_directory};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "skirmish-tools")]
#[command(about = "Development tools for Skirmish Ledger")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate rule libraries and scenarios
    Validate {
        /// Path to data directory
        #[arg(default_value = "assets/data")]
        path: String,
    },
    /// Describe a weapon keyword (e.g. "Sustained Hits 2")
    Explain {
        /// Keyword text
        keyword: String,
    },
    /// Resolve a scenario with seeded dice
    Resolve {
        /// Path to the scenario file
        scenario: String,
        /// Directory of rule libraries
        #[arg(long, default_value = "assets/data/rules")]
        rules: String,
        /// Dice seed
        #[arg(long, default_value_t = 0)]
        seed: u64,
        /// Print the full combat result as JSON
        #[arg(long)]
        json: bool,
    },
}

fn resolve(scenario: &str, rules: &str, seed: u64, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let libraries = load_rule_libraries(Path::new(rules))?;
    let scenario = Scenario::load(scenario)?;
    let result = scenario.resolve(&libraries, seed)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    let snap = &result.snapshot;
    println!("{} ({} -> {})", scenario.name, snap.weapon.name, snap.target.name);
    for rule in &snap.active_rules {
        println!("  rule: {} [{:?}]", rule.name, rule.side);
    }
    for note in &snap.diagnostics {
        println!("  note: {note}");
    }
    if let Some(attacks) = &result.attacks {
        println!("  attacks: {}", attacks.total);
    }
    if let Some(hits) = &result.hits {
        println!("  hits: {} (+{} lethal, +{} sustained)", hits.hits, hits.lethal, hits.sustained);
    }
    if let Some(wounds) = &result.wounds {
        println!("  wounds: {} (+{} devastating)", wounds.wounds, wounds.devastating);
    }
    if let Some(saves) = &result.saves {
        println!("  unsaved: {}", saves.unsaved);
    }
    if let Some(fnp) = &result.feel_no_pain {
        println!("  feel no pain: {} negated", fnp.negated);
    }
    if let Some(summary) = &result.summary {
        println!("  damage: {}", summary.total_damage);
    }
    Ok(())
}

fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { path } => {
            tracing::info!("Validating data files in: {path}");
            match validate_data_directory(Path::new(&path)) {
                Ok(report) if report.is_ok() => tracing::info!(
                    "Validation passed: {} libraries, {} rules, {} scenarios",
                    report.libraries,
                    report.rules,
                    report.scenarios
                ),
                Ok(report) => {
                    for error in &report.errors {
                        tracing::error!("{error}");
                    }
                    tracing::error!("Validation failed with {} problems", report.errors.len());
                    std::process::exit(1);
                }
                Err(e) => {
                    tracing::error!("Validation failed: {e}");
                    std::process::exit(1);
                }
            }
        }
        Commands::Explain { keyword } => match skirmish_core::rules::describe(&keyword) {
            Some(text) => println!("{text}"),
            None => {
                tracing::warn!("No rule matches keyword: {keyword}");
                std::process::exit(1);
            }
        },
        Commands::Resolve {
            scenario,
            rules,
            seed,
            json,
        } => {
            if let Err(e) = resolve(&scenario, &rules, seed, json) {
                tracing::error!("Resolution failed: {e}");
                std::process::exit(1);
            }
        }
    }
}
