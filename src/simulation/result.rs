//! Aggregated output of a Monte Carlo run

use serde::{Deserialize, Serialize};

use super::stats::{DistributionSummary, RateMonthStats};

/// One raw path kept for visualisation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SamplePath {
    pub index: usize,
    /// Annual mortgage rate per month
    pub rates: Vec<f64>,
    /// Year-end mortgage balances
    pub balances: Vec<f64>,
    /// Year-end net worth of the primary strategy
    pub net_worth: Vec<f64>,
}

/// Statistics over all completed paths
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonteCarloResult {
    /// Paths that completed and were aggregated
    pub iterations: usize,
    pub requested_iterations: usize,
    /// Set when the run was cut short by its time limit
    pub partial: bool,
    pub seed: u64,
    pub horizon_years: u32,

    /// Terminal mortgage balance
    pub balance: DistributionSummary,
    /// Cumulative mortgage interest at the horizon
    pub interest: DistributionSummary,
    /// Terminal investment balance, when the scenario holds investments
    pub investment: Option<DistributionSummary>,
    pub net_worth: DistributionSummary,

    pub rate_paths: Vec<RateMonthStats>,

    /// Share of paths whose balance reached zero by the horizon
    pub probability_of_payoff: f64,
    /// Share of paths where the non-leveraged strategy ends with more net
    /// worth than the leveraged one (the primary, if neither or both are)
    pub probability_prepayment_wins: Option<f64>,

    pub sample_paths: Vec<SamplePath>,
}

impl MonteCarloResult {
    /// One-line description for logs and CLI output
    pub fn headline(&self) -> String {
        let mut line = format!(
            "{} paths: balance p10/p50/p90 {:.0}/{:.0}/{:.0}, payoff {:.1}%",
            self.iterations,
            self.balance.p10,
            self.balance.p50,
            self.balance.p90,
            self.probability_of_payoff * 100.0
        );
        if let Some(p) = self.probability_prepayment_wins {
            line.push_str(&format!(", prepayment wins {:.1}%", p * 100.0));
        }
        if self.partial {
            line.push_str(" (partial)");
        }
        line
    }
}
