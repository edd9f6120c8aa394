//! Monte Carlo simulation over stochastic rate paths
//!
//! Each path draws its rates from an RNG seeded by the run seed and the path
//! index alone, runs the projection engine in isolation and hands back a small
//! outcome record. Outcomes are collected in index order and reduced
//! sequentially, so a seeded run gives identical statistics for any pool size.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use log::{info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::rate_model::{RateModelConfig, RatePathGenerator};
use super::result::{MonteCarloResult, SamplePath};
use super::stats::{DistributionSummary, RateMonthStats};
use crate::error::{EngineError, Result};
use crate::mortgage::Timeline;
use crate::projection::{ProjectionConfig, ProjectionEngine, ProjectionInput, RatePath};
use crate::tax::TaxEngine;

/// Most raw paths a run may retain
pub const MAX_SAMPLE_PATHS: usize = 1_000;

const SEED_STRIDE: u64 = 0x9E37_79B9_7F4A_7C15;

/// RNG seed of path `index` in a run seeded with `seed`
pub fn path_seed(seed: u64, index: usize) -> u64 {
    seed ^ (index as u64).wrapping_mul(SEED_STRIDE)
}

fn default_iterations() -> u32 {
    1_000
}

fn default_seed() -> u64 {
    42
}

fn default_sample_paths() -> usize {
    10
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloConfig {
    #[serde(default = "default_iterations")]
    pub iterations: u32,

    #[serde(default = "default_seed")]
    pub seed: u64,

    #[serde(default)]
    pub rate_model: RateModelConfig,

    /// Raw paths kept in the result, lowest indices first
    #[serde(default = "default_sample_paths")]
    pub sample_paths: usize,

    /// Worker threads; all available cores when unset
    #[serde(default)]
    pub workers: Option<usize>,

    /// Wall-clock budget; paths not started in time are skipped
    #[serde(default)]
    pub time_limit_ms: Option<u64>,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        Self {
            iterations: default_iterations(),
            seed: default_seed(),
            rate_model: RateModelConfig::default(),
            sample_paths: default_sample_paths(),
            workers: None,
            time_limit_ms: None,
        }
    }
}

impl MonteCarloConfig {
    pub fn validate(&self) -> Result<()> {
        if self.iterations == 0 {
            return Err(EngineError::validation("iterations", "must be positive"));
        }
        if self.sample_paths > MAX_SAMPLE_PATHS {
            return Err(EngineError::validation(
                "sample_paths",
                format!("at most {} paths may be retained, got {}", MAX_SAMPLE_PATHS, self.sample_paths),
            ));
        }
        if self.workers == Some(0) {
            return Err(EngineError::validation("workers", "must be positive when set"));
        }
        self.rate_model.validate()
    }
}

/// What one path contributes to the aggregate
#[derive(Debug, Clone)]
struct PathOutcome {
    index: usize,
    rates: Vec<f64>,
    balances: Vec<f64>,
    net_worth: Vec<f64>,
    terminal_balance: f64,
    terminal_interest: f64,
    terminal_investment: f64,
    terminal_net_worth: f64,
    paid_off: bool,
    /// Whether the non-leveraged side finished ahead, when compared
    prepayment_wins: Option<bool>,
}

/// Read-only inputs shared by every path of a run
struct PathContext<'r> {
    input: &'r ProjectionInput,
    timeline: &'r Timeline,
    generator: &'r dyn RatePathGenerator,
    primary: ProjectionEngine<'r>,
    challenger: Option<ProjectionEngine<'r>>,
    /// Primary is leveraged and the challenger is not
    leveraged_primary: bool,
    months: usize,
    seed: u64,
    /// Paths below this index keep their yearly series
    sample_paths: usize,
}

impl PathContext<'_> {
    fn run(&self, index: usize) -> Result<PathOutcome> {
        let mut rng = StdRng::seed_from_u64(path_seed(self.seed, index));
        let mut rates = self.generator.next_path(&mut rng, self.months);
        // Short paths hold their last rate, empty ones the contract rate
        let hold = rates
            .last()
            .copied()
            .unwrap_or(self.timeline.initial_segment().terms.annual_rate);
        rates.resize(self.months, hold);

        let result = self
            .primary
            .project_timeline(self.input, self.timeline, RatePath::Monthly(&rates))?;
        let terminal = *result
            .terminal()
            .ok_or_else(|| EngineError::validation("horizon_years", "projection produced no points"))?;

        let challenger_net_worth = match &self.challenger {
            Some(engine) => engine
                .project_timeline(self.input, self.timeline, RatePath::Monthly(&rates))?
                .terminal()
                .map(|p| p.net_worth),
            None => None,
        };
        let prepayment_wins = challenger_net_worth.map(|c| {
            if self.leveraged_primary {
                c > terminal.net_worth
            } else {
                terminal.net_worth > c
            }
        });

        let (balances, net_worth) = if index < self.sample_paths {
            (
                result.points.iter().map(|p| p.mortgage_balance).collect(),
                result.points.iter().map(|p| p.net_worth).collect(),
            )
        } else {
            (Vec::new(), Vec::new())
        };

        Ok(PathOutcome {
            index,
            balances,
            net_worth,
            rates,
            terminal_balance: terminal.mortgage_balance,
            terminal_interest: terminal.cumulative_interest,
            terminal_investment: terminal.investment_balance,
            terminal_net_worth: terminal.net_worth,
            paid_off: result.is_paid_off(),
            prepayment_wins,
        })
    }
}

/// Runs the projection engine over many simulated rate paths
#[derive(Debug, Clone, Copy)]
pub struct MonteCarloSimulator<'a> {
    tax: &'a TaxEngine,
    config: MonteCarloConfig,
}

impl<'a> MonteCarloSimulator<'a> {
    pub fn new(tax: &'a TaxEngine, config: MonteCarloConfig) -> Self {
        Self { tax, config }
    }

    pub fn config(&self) -> &MonteCarloConfig {
        &self.config
    }

    /// Simulate with the configured rate model
    ///
    /// With a `challenger`, both strategies see the same rate path and the
    /// result reports how often the non-leveraged side ends with the higher
    /// net worth. When neither or both are leveraged, that side is `primary`.
    pub fn run(
        &self,
        input: &ProjectionInput,
        primary: &ProjectionConfig,
        challenger: Option<&ProjectionConfig>,
    ) -> Result<MonteCarloResult> {
        input.validate()?;
        let contract_rate = input.segments[0].terms.annual_rate;
        let generator = self.config.rate_model.build(contract_rate)?;
        self.run_with(input, primary, challenger, generator.as_ref())
    }

    /// Simulate with a caller-supplied rate model
    pub fn run_with(
        &self,
        input: &ProjectionInput,
        primary: &ProjectionConfig,
        challenger: Option<&ProjectionConfig>,
        generator: &dyn RatePathGenerator,
    ) -> Result<MonteCarloResult> {
        self.config.validate()?;
        input.validate()?;
        primary.validate(input)?;
        if let Some(c) = challenger {
            c.validate(input)?;
        }
        let timeline = Timeline::compose(&input.segments, &input.events)?;

        let horizon = challenger.map_or(primary.horizon_years, |c| c.horizon_years.max(primary.horizon_years));
        let ctx = PathContext {
            input,
            timeline: &timeline,
            generator,
            primary: ProjectionEngine::new(self.tax, *primary),
            challenger: challenger.map(|c| ProjectionEngine::new(self.tax, *c)),
            leveraged_primary: primary.strategy.is_leveraged()
                && challenger.is_some_and(|c| !c.strategy.is_leveraged()),
            months: horizon as usize * 12,
            seed: self.config.seed,
            sample_paths: self.config.sample_paths,
        };

        let requested = self.config.iterations as usize;
        info!(
            "monte carlo: {} paths over {} years, seed {}, strategy {}{}",
            requested,
            horizon,
            self.config.seed,
            primary.strategy.name(),
            challenger.map_or(String::new(), |c| format!(" vs {}", c.strategy.name()))
        );

        let started = Instant::now();
        let deadline = self
            .config
            .time_limit_ms
            .map(|ms| started + Duration::from_millis(ms));
        let cancelled = AtomicBool::new(false);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.workers.unwrap_or(0))
            .build()
            .map_err(|e| EngineError::validation("workers", e.to_string()))?;

        let outcomes: Vec<Option<PathOutcome>> = pool.install(|| {
            (0..requested)
                .into_par_iter()
                .map(|i| {
                    if cancelled.load(Ordering::Relaxed) {
                        return Ok(None);
                    }
                    if deadline.is_some_and(|d| Instant::now() >= d) {
                        cancelled.store(true, Ordering::Relaxed);
                        return Ok(None);
                    }
                    ctx.run(i).map(Some).map_err(|e| EngineError::PathFailed {
                        path: i,
                        source: Box::new(e),
                    })
                })
                .collect::<Result<Vec<_>>>()
        })?;

        let completed: Vec<PathOutcome> = outcomes.into_iter().flatten().collect();
        let result = self.aggregate(&completed, requested, primary.horizon_years, ctx.months, challenger.is_some());

        if result.partial {
            warn!(
                "monte carlo stopped after {:?}: {} of {} paths completed",
                started.elapsed(),
                result.iterations,
                requested
            );
        }
        info!("{}", result.headline());
        Ok(result)
    }

    fn aggregate(
        &self,
        outcomes: &[PathOutcome],
        requested: usize,
        horizon_years: u32,
        months: usize,
        compared: bool,
    ) -> MonteCarloResult {
        let count = outcomes.len();
        let values = |f: fn(&PathOutcome) -> f64| outcomes.iter().map(f).collect::<Vec<f64>>();
        let share = |hits: usize| if count == 0 { 0.0 } else { hits as f64 / count as f64 };

        let investment = values(|o| o.terminal_investment);
        let investment = investment
            .iter()
            .any(|v| *v != 0.0)
            .then(|| DistributionSummary::from_values(&investment));

        let rate_paths = if count == 0 {
            Vec::new()
        } else {
            (0..months)
                .map(|m| {
                    let column: Vec<f64> = outcomes.iter().map(|o| o.rates[m]).collect();
                    RateMonthStats::from_values(m as u32 + 1, &column)
                })
                .collect()
        };

        let payoffs = outcomes.iter().filter(|o| o.paid_off).count();
        let probability_prepayment_wins = compared.then(|| {
            share(
                outcomes
                    .iter()
                    .filter(|o| o.prepayment_wins == Some(true))
                    .count(),
            )
        });

        let sample_paths = outcomes
            .iter()
            .filter(|o| o.index < self.config.sample_paths)
            .map(|o| SamplePath {
                index: o.index,
                rates: o.rates.clone(),
                balances: o.balances.clone(),
                net_worth: o.net_worth.clone(),
            })
            .collect();

        MonteCarloResult {
            iterations: count,
            requested_iterations: requested,
            partial: count < requested,
            seed: self.config.seed,
            horizon_years,
            balance: DistributionSummary::from_values(&values(|o| o.terminal_balance)),
            interest: DistributionSummary::from_values(&values(|o| o.terminal_interest)),
            investment,
            net_worth: DistributionSummary::from_values(&values(|o| o.terminal_net_worth)),
            rate_paths,
            probability_of_payoff: share(payoffs),
            probability_prepayment_wins,
            sample_paths,
        }
    }
}
