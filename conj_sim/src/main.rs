//! Demo entrypoint: run one of the six literal end-to-end scenarios against
//! a `SimContext`-backed engine and print the result.
//!
//! A developer/test convenience, not the production CLI surface — no flag
//! surface beyond selecting a scenario and a seed.

use clap::Parser;
use conj_sim::{ScenarioId, ScenarioRunner};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "conj-sim")]
#[command(about = "Run a conjunction-engine scenario against a deterministic simulation context")]
struct Args {
    /// Scenario to run.
    #[arg(
        short,
        long,
        default_value = "two-approaching",
        help = "empty-window, single-object, two-approaching, object-moves-away, same-catalog-suppression, throttling"
    )]
    scenario: String,

    /// Seed for the simulation context's virtual clock and RNG.
    #[arg(long, default_value = "42")]
    seed: u64,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let Some(scenario) = ScenarioId::from_name(&args.scenario) else {
        eprintln!("unknown scenario '{}'", args.scenario);
        eprintln!(
            "available scenarios: {}",
            ScenarioId::ALL.iter().map(|s| s.name()).collect::<Vec<_>>().join(", ")
        );
        std::process::exit(1);
    };

    let result = ScenarioRunner::new(args.seed).run(scenario).await;

    println!(
        "{} (seed={}): {}",
        result.scenario.name(),
        result.seed,
        if result.passed { "PASSED" } else { "FAILED" }
    );
    println!("  novel: {}, cancelled: {}", result.novel_count, result.cancelled_count);
    if let Some(reason) = &result.failure_reason {
        println!("  reason: {reason}");
    }

    if !result.passed {
        std::process::exit(1);
    }
}
