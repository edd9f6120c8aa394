//! Monte Carlo simulation of strategies over stochastic rate paths

mod rate_model;
mod stats;
mod monte_carlo;
mod result;

pub use rate_model::{ConstantRate, MeanRevertingRate, RateModelConfig, RateModelKind, RatePathGenerator, MONTH};
pub use stats::{mean, percentile_sorted, std_dev, DistributionSummary, RateMonthStats};
pub use monte_carlo::{path_seed, MonteCarloConfig, MonteCarloSimulator, MAX_SAMPLE_PATHS};
pub use result::{MonteCarloResult, SamplePath};
