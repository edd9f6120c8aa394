//! Run a Monte Carlo volatility sweep for one scenario
//!
//! Outputs one summary row per volatility level plus the per-month rate
//! statistics of the scenario's own rate model

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use mortgage_strategy::{MonteCarloResult, ScenarioConfig, ScenarioRunner};

#[derive(Parser)]
#[command(about = "Monte Carlo volatility sweep")]
struct Args {
    /// Scenario JSON file
    scenario: PathBuf,

    /// Annual rate volatilities to sweep
    #[arg(long, value_delimiter = ',', default_value = "0.0,0.005,0.01,0.015,0.02")]
    volatilities: Vec<f64>,

    #[arg(long, default_value = "monte_carlo_sweep.csv")]
    sweep_output: PathBuf,

    #[arg(long, default_value = "rate_paths.csv")]
    rates_output: PathBuf,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let start = Instant::now();
    let file = File::open(&args.scenario).with_context(|| format!("opening {}", args.scenario.display()))?;
    let scenario: ScenarioConfig = serde_json::from_reader(BufReader::new(file)).context("parsing scenario")?;
    let runner = ScenarioRunner::new();

    println!(
        "Sweeping {} volatility levels, {} paths each...",
        args.volatilities.len(),
        scenario.monte_carlo.iterations
    );

    let results: Vec<(f64, MonteCarloResult)> = args
        .volatilities
        .iter()
        .copied()
        .zip(runner.sweep_volatility(&scenario, &args.volatilities)?)
        .collect();

    println!("Simulations complete in {:?}", start.elapsed());

    let file = File::create(&args.sweep_output).with_context(|| format!("creating {}", args.sweep_output.display()))?;
    let mut sweep = BufWriter::new(file);
    writeln!(
        sweep,
        "Volatility,Paths,Partial,PayoffProb,Balance_P10,Balance_P50,Balance_P90,Interest_Mean,Interest_StdDev,NetWorth_P10,NetWorth_P50,NetWorth_P90,PrepaymentWinsProb"
    )?;
    for (vol, r) in &results {
        writeln!(
            sweep,
            "{},{},{},{:.4},{:.2},{:.2},{:.2},{:.2},{:.2},{:.2},{:.2},{:.2},{}",
            vol,
            r.iterations,
            r.partial,
            r.probability_of_payoff,
            r.balance.p10,
            r.balance.p50,
            r.balance.p90,
            r.interest.mean,
            r.interest.std_dev,
            r.net_worth.p10,
            r.net_worth.p50,
            r.net_worth.p90,
            r.probability_prepayment_wins
                .map_or_else(String::new, |p| format!("{:.4}", p)),
        )?;
    }
    sweep.flush()?;
    println!("Sweep written to {}", args.sweep_output.display());

    // Rate statistics at the scenario's configured volatility
    let own = runner.simulate(&scenario)?;
    let file = File::create(&args.rates_output).with_context(|| format!("creating {}", args.rates_output.display()))?;
    let mut rates = BufWriter::new(file);
    writeln!(rates, "Month,Mean,P10,P50,P90,Min,Max")?;
    for m in &own.rate_paths {
        writeln!(
            rates,
            "{},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6}",
            m.month, m.mean, m.p10, m.p50, m.p90, m.min, m.max
        )?;
    }
    rates.flush()?;
    println!("Rate paths written to {}", args.rates_output.display());

    println!("\nSweep Summary:");
    for (vol, r) in &results {
        println!("  vol {:>6.3}: {}", vol, r.headline());
    }
    println!("\nTotal time: {:?}", start.elapsed());
    Ok(())
}
