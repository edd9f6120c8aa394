//! Mortgage Strategy CLI
//!
//! Command-line interface for running projections and simulations from a
//! scenario JSON file

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use mortgage_strategy::mortgage::LedgerEntryKind;
use mortgage_strategy::{ProjectionResult, ScenarioConfig, ScenarioRunner};

/// Projection and Monte Carlo engine for Canadian mortgage strategies
#[derive(Parser)]
#[command(name = "mortgage-strategy", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory holding brackets.csv; built-in tables when omitted
    #[arg(long, global = true)]
    tax_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Deterministic year-by-year projection at contract rates
    Project {
        /// Scenario JSON file
        scenario: PathBuf,
        /// CSV output path
        #[arg(short, long, default_value = "projection_output.csv")]
        output: PathBuf,
    },
    /// Monte Carlo simulation over stochastic rate paths
    Simulate {
        scenario: PathBuf,
        #[arg(short, long, default_value = "monte_carlo_result.json")]
        output: PathBuf,
        /// Override the scenario's iteration count
        #[arg(long)]
        iterations: Option<u32>,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long)]
        workers: Option<usize>,
    },
    /// Payment-by-payment ledger at contract rates
    Ledger {
        scenario: PathBuf,
        /// Last date to include (YYYY-MM-DD)
        #[arg(long)]
        until: NaiveDate,
        #[arg(short, long, default_value = "ledger_output.csv")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let runner = match &cli.tax_dir {
        Some(dir) => ScenarioRunner::from_csv_path(dir)
            .with_context(|| format!("loading tax tables from {}", dir.display()))?,
        None => ScenarioRunner::new(),
    };

    match cli.command {
        Commands::Project { scenario, output } => {
            let scenario = load_scenario(&scenario)?;
            let results = runner.compare_scenario(&scenario)?;
            for result in &results {
                print_projection(result);
            }
            write_projection_csv(&output, &results)?;
            println!("\nFull results written to: {}", output.display());
        }
        Commands::Simulate {
            scenario,
            output,
            iterations,
            seed,
            workers,
        } => {
            let mut scenario = load_scenario(&scenario)?;
            if let Some(n) = iterations {
                scenario.monte_carlo.iterations = n;
            }
            if let Some(s) = seed {
                scenario.monte_carlo.seed = s;
            }
            if workers.is_some() {
                scenario.monte_carlo.workers = workers;
            }
            let result = runner.simulate(&scenario)?;
            println!("{}", result.headline());

            let file = File::create(&output).with_context(|| format!("creating {}", output.display()))?;
            serde_json::to_writer_pretty(BufWriter::new(file), &result)?;
            println!("Results written to: {}", output.display());
        }
        Commands::Ledger { scenario, until, output } => {
            let scenario = load_scenario(&scenario)?;
            let ledger = runner.contract_ledger(&scenario.input, until)?;

            let mut file = BufWriter::new(
                File::create(&output).with_context(|| format!("creating {}", output.display()))?,
            );
            writeln!(file, "Date,Kind,Payment,Interest,Principal,Amount,Balance")?;
            for entry in &ledger.entries {
                let (kind, payment, interest, principal, amount) = match entry.kind {
                    LedgerEntryKind::Payment(p) => ("payment", p.payment, p.interest, p.principal, 0.0),
                    LedgerEntryKind::Prepayment(p) => ("prepayment", 0.0, 0.0, p.outcome.applied, p.outcome.penalty),
                    LedgerEntryKind::Renewal(s) => ("renewal", 0.0, 0.0, 0.0, s.opening_balance),
                    LedgerEntryKind::Refinance(r) => ("refinance", r.new_payment, 0.0, 0.0, r.penalty),
                    LedgerEntryKind::CreditLine(c) => ("credit_line", 0.0, 0.0, 0.0, c.amount),
                };
                writeln!(
                    file,
                    "{},{},{:.2},{:.2},{:.2},{:.2},{:.2}",
                    entry.date, kind, payment, interest, principal, amount, entry.balance
                )?;
            }
            println!(
                "{} ledger entries written to: {} (paid off: {})",
                ledger.entries.len(),
                output.display(),
                ledger
                    .paid_off_on
                    .map_or_else(|| "no".to_string(), |d| d.to_string())
            );
        }
    }

    Ok(())
}

fn load_scenario(path: &Path) -> Result<ScenarioConfig> {
    let file = File::open(path).with_context(|| format!("opening scenario {}", path.display()))?;
    let scenario: ScenarioConfig = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("parsing scenario {}", path.display()))?;
    Ok(scenario)
}

fn print_projection(result: &ProjectionResult) {
    println!("\nStrategy: {}", result.strategy);
    println!(
        "{:>4} {:>10} {:>14} {:>14} {:>14} {:>14} {:>14}",
        "Year", "Date", "Mortgage", "Interest", "Investment", "CreditLine", "NetWorth"
    );
    println!("{}", "-".repeat(92));
    for p in &result.points {
        println!(
            "{:>4} {:>10} {:>14.2} {:>14.2} {:>14.2} {:>14.2} {:>14.2}",
            p.year,
            p.date,
            p.mortgage_balance,
            p.cumulative_interest,
            p.investment_balance,
            p.credit_line_balance,
            p.net_worth
        );
    }

    let summary = result.summary();
    println!("\nSummary:");
    println!("  Final Balance: ${:.2}", summary.final_balance);
    println!("  Total Interest: ${:.2}", summary.total_interest);
    println!("  Total Penalties: ${:.2}", summary.total_penalties);
    println!("  Tax Refunds: ${:.2}", summary.total_tax_refunds);
    println!("  Final Net Worth: ${:.2}", summary.final_net_worth);
    if let Some(date) = summary.paid_off_on {
        println!("  Paid Off: {}", date);
    }
}

fn write_projection_csv(path: &Path, results: &[ProjectionResult]) -> Result<()> {
    let mut file = BufWriter::new(File::create(path).with_context(|| format!("creating {}", path.display()))?);
    writeln!(
        file,
        "Strategy,Year,Date,Rate,Payment,MortgageBalance,CumPrincipal,CumInterest,CumPrepaid,CumPenalties,\
         Investment,CreditLine,CumCreditInterest,CumTaxRefunds,PropertyValue,NetWorth"
    )?;
    for result in results {
        for p in &result.points {
            writeln!(
                file,
                "{},{},{},{:.6},{:.2},{:.2},{:.2},{:.2},{:.2},{:.2},{:.2},{:.2},{:.2},{:.2},{:.2},{:.2}",
                result.strategy,
                p.year,
                p.date,
                p.mortgage_rate,
                p.payment,
                p.mortgage_balance,
                p.cumulative_principal,
                p.cumulative_interest,
                p.cumulative_prepayments,
                p.cumulative_penalties,
                p.investment_balance,
                p.credit_line_balance,
                p.cumulative_credit_interest,
                p.cumulative_tax_refunds,
                p.property_value,
                p.net_worth
            )?;
        }
    }
    file.flush()?;
    Ok(())
}
