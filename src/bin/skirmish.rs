//! Headless Skirmish Runner
//!
//! Runs the tactical AI for both sides of the sandbox border skirmish and
//! prints a summary of what each faction decided.

use clap::Parser;
use field_marshal::battle::ai::TacticalBrain;
use field_marshal::battle::{border_skirmish, BattleHost};
use field_marshal::core::{FactionId, TacticsConfig};
use serde::Serialize;
use std::collections::BTreeMap;

/// Headless Skirmish Runner - AI vs AI on the sandbox host
#[derive(Parser, Debug)]
#[command(name = "skirmish")]
#[command(about = "Run the tactical AI on a sandbox skirmish and print a summary")]
struct Args {
    /// Random seed for deterministic runs
    #[arg(long)]
    seed: Option<u64>,

    /// Simulated seconds to run
    #[arg(long, default_value_t = 120.0)]
    duration: f32,

    /// Simulation step in seconds
    #[arg(long, default_value_t = 0.5)]
    step: f32,

    /// Tactics config (TOML)
    #[arg(long, default_value = "data/tactics/default.toml")]
    config: String,

    /// Output format: json or text
    #[arg(long, default_value = "json")]
    format: String,

    /// Log every tactical cycle
    #[arg(long, short = 'v')]
    verbose: bool,
}

/// Per-faction part of the summary
#[derive(Serialize, Default)]
struct FactionSummary {
    key: String,
    skill: f32,
    evaluations: usize,
    applied: usize,
    orders: usize,
    failures: usize,
    final_posture: Option<String>,
    final_maneuvers: Vec<String>,
    units_left: u32,
}

/// JSON output structure
#[derive(Serialize)]
struct SkirmishResult {
    seed: u64,
    duration: f32,
    factions: BTreeMap<String, FactionSummary>,
}

fn main() {
    let args = Args::parse();

    let level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = TacticsConfig::load(&args.config).unwrap_or_else(|e| {
        eprintln!("Warning: Failed to load config '{}': {}", args.config, e);
        eprintln!("Using default config");
        TacticsConfig::default()
    });
    let seed = args.seed.unwrap_or_else(rand::random);
    config.seed = seed;
    if args.verbose {
        config.debug_mode = true;
    }

    let mut battle = border_skirmish();
    let terrain = battle.terrain().clone();
    let mut brain = TacticalBrain::new(config);
    brain.begin_engagement(&battle);

    let mut factions: BTreeMap<FactionId, FactionSummary> = brain
        .factions()
        .iter()
        .map(|f| {
            let summary = FactionSummary {
                key: f.key.clone(),
                skill: f.skill,
                ..FactionSummary::default()
            };
            (f.id, summary)
        })
        .collect();

    let step = args.step.max(0.01);
    while battle.mission_time() < args.duration {
        // Decisions read the field as it stood at the start of the step
        let view = battle.clone();
        let report = brain.tick(&view, &terrain, &mut battle);

        for cycle in &report.cycles {
            if let Some(summary) = factions.get_mut(&cycle.faction) {
                summary.evaluations += 1;
                summary.orders += cycle.orders;
                if cycle.applied() {
                    summary.applied += 1;
                    summary.final_posture = Some(format!("{:?}", cycle.posture));
                    summary.final_maneuvers = cycle.maneuvers.iter().map(|m| format!("{m:?}")).collect();
                }
            }
        }
        for failure in &report.failures {
            if let Some(summary) = factions.get_mut(&failure.faction) {
                summary.failures += 1;
            }
        }

        battle.advance(step);
    }
    brain.end_engagement();

    for (id, summary) in factions.iter_mut() {
        summary.units_left = battle.groups(*id).iter().map(|g| g.count).sum();
    }

    let result = SkirmishResult {
        seed,
        duration: battle.mission_time(),
        factions: factions
            .into_iter()
            .map(|(id, summary)| (id.to_string(), summary))
            .collect(),
    };

    match args.format.as_str() {
        "json" => print_json(&result),
        "text" => {
            println!("Skirmish Result");
            println!("===============");
            println!("Seed: {}", result.seed);
            println!("Duration: {:.1}s", result.duration);
            for (id, f) in &result.factions {
                println!();
                println!("{} ({}), skill {:.2}", id, f.key, f.skill);
                println!("  Evaluations: {}, applied: {}, failures: {}", f.evaluations, f.applied, f.failures);
                println!("  Orders issued: {}", f.orders);
                println!("  Final posture: {}", f.final_posture.as_deref().unwrap_or("-"));
                println!("  Final maneuvers: {}", f.final_maneuvers.join(", "));
                println!("  Units left: {}", f.units_left);
            }
        }
        _ => {
            eprintln!("Unknown format '{}', defaulting to json", args.format);
            print_json(&result);
        }
    }
}

fn print_json(result: &SkirmishResult) {
    match serde_json::to_string_pretty(result) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("Failed to serialize result: {e}"),
    }
}
