//! Scenario runner for strategy comparisons
//!
//! Pre-loads tax tables once, then allows running many projections and
//! simulations against them without re-reading CSV files.

use std::path::Path;

use chrono::NaiveDate;
use log::info;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::mortgage::{ContractLedger, Timeline};
use crate::projection::{ProjectionConfig, ProjectionEngine, ProjectionInput, ProjectionResult, RatePath, Strategy};
use crate::simulation::{MonteCarloConfig, MonteCarloResult, MonteCarloSimulator};
use crate::tax::TaxEngine;

fn default_horizon_years() -> u32 {
    25
}

/// Everything needed to run one household scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    #[serde(flatten)]
    pub input: ProjectionInput,

    #[serde(default = "default_horizon_years")]
    pub horizon_years: u32,

    #[serde(default)]
    pub strategy: Strategy,

    /// Strategy compared head to head with `strategy`
    #[serde(default)]
    pub challenger: Option<Strategy>,

    #[serde(default)]
    pub monte_carlo: MonteCarloConfig,
}

impl ScenarioConfig {
    pub fn projection_config(&self) -> ProjectionConfig {
        ProjectionConfig {
            horizon_years: self.horizon_years,
            strategy: self.strategy,
        }
    }

    pub fn challenger_config(&self) -> Option<ProjectionConfig> {
        self.challenger.map(|strategy| ProjectionConfig {
            horizon_years: self.horizon_years,
            strategy,
        })
    }

    pub fn validate(&self) -> Result<()> {
        self.input.validate()?;
        self.projection_config().validate(&self.input)?;
        if let Some(c) = self.challenger_config() {
            c.validate(&self.input)?;
        }
        self.monte_carlo.validate()
    }
}

/// Pre-loaded scenario runner
///
/// # Example
/// ```ignore
/// let runner = ScenarioRunner::from_csv()?;
///
/// let results = runner.compare(&input, &[baseline, prepay, leveraged])?;
/// for r in &results {
///     println!("{}: {:.0}", r.strategy, r.summary().final_net_worth);
/// }
/// ```
#[derive(Debug, Clone)]
pub struct ScenarioRunner {
    tax: TaxEngine,
}

impl ScenarioRunner {
    /// Create runner with the built-in Canadian tax tables
    pub fn new() -> Self {
        Self {
            tax: TaxEngine::canadian_defaults(),
        }
    }

    /// Create runner by loading tax tables from the default CSV directory
    pub fn from_csv() -> Result<Self> {
        Ok(Self {
            tax: TaxEngine::from_csv()?,
        })
    }

    /// Create runner from a specific tax table directory
    pub fn from_csv_path(path: &Path) -> Result<Self> {
        Ok(Self {
            tax: TaxEngine::from_csv_path(path)?,
        })
    }

    pub fn with_tax_engine(tax: TaxEngine) -> Self {
        Self { tax }
    }

    pub fn tax(&self) -> &TaxEngine {
        &self.tax
    }

    pub fn tax_mut(&mut self) -> &mut TaxEngine {
        &mut self.tax
    }

    /// Deterministic projection at contract rates
    pub fn run(&self, input: &ProjectionInput, config: ProjectionConfig) -> Result<ProjectionResult> {
        ProjectionEngine::new(&self.tax, config).project(input, RatePath::Contract)
    }

    /// Deterministic projection along a supplied monthly rate path
    pub fn run_on_path(
        &self,
        input: &ProjectionInput,
        config: ProjectionConfig,
        rates: &[f64],
    ) -> Result<ProjectionResult> {
        ProjectionEngine::new(&self.tax, config).project(input, RatePath::Monthly(rates))
    }

    pub fn run_scenario(&self, scenario: &ScenarioConfig) -> Result<ProjectionResult> {
        self.run(&scenario.input, scenario.projection_config())
    }

    /// Run several strategies on the same inputs
    pub fn compare(&self, input: &ProjectionInput, configs: &[ProjectionConfig]) -> Result<Vec<ProjectionResult>> {
        configs.iter().map(|config| self.run(input, *config)).collect()
    }

    /// The scenario's strategy, then its challenger when one is set
    pub fn compare_scenario(&self, scenario: &ScenarioConfig) -> Result<Vec<ProjectionResult>> {
        let mut configs = vec![scenario.projection_config()];
        configs.extend(scenario.challenger_config());
        self.compare(&scenario.input, &configs)
    }

    /// Payment-by-payment ledger at contract rates through `until`
    pub fn contract_ledger(&self, input: &ProjectionInput, until: NaiveDate) -> Result<ContractLedger> {
        input.validate()?;
        Timeline::compose(&input.segments, &input.events)?.contract_ledger(input.prepayment_policy, until)
    }

    /// Monte Carlo run of the scenario's strategy against its challenger
    pub fn simulate(&self, scenario: &ScenarioConfig) -> Result<MonteCarloResult> {
        scenario.validate()?;
        let primary = scenario.projection_config();
        let challenger = scenario.challenger_config();
        info!(
            "simulating {} over {} years",
            scenario.strategy.name(),
            scenario.horizon_years
        );
        MonteCarloSimulator::new(&self.tax, scenario.monte_carlo).run(&scenario.input, &primary, challenger.as_ref())
    }

    /// Simulate the scenario once per rate volatility, in the order given
    ///
    /// Levels run one after another so each gets the scenario's whole
    /// worker pool.
    pub fn sweep_volatility(&self, scenario: &ScenarioConfig, volatilities: &[f64]) -> Result<Vec<MonteCarloResult>> {
        volatilities
            .iter()
            .map(|&vol| {
                let mut level = scenario.clone();
                level.monte_carlo.rate_model.volatility = vol;
                self.simulate(&level)
            })
            .collect()
    }
}

impl Default for ScenarioRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mortgage::{LedgerEntryKind, MortgageTerms, PaymentFrequency, PrepaymentPolicy, TermSegment};
    use crate::projection::{InvestmentAssumption, PropertyAssumption};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn test_input() -> ProjectionInput {
        let terms = MortgageTerms::new(400_000.0, 0.05, 300, PaymentFrequency::Monthly).unwrap();
        ProjectionInput {
            segments: vec![TermSegment::new(terms, date(2024, 1, 1), 400_000.0)],
            events: vec![],
            prepayment_policy: PrepaymentPolicy::default(),
            credit_line: None,
            tax: None,
            property: PropertyAssumption {
                value: 650_000.0,
                annual_appreciation: 0.02,
            },
            investment: InvestmentAssumption::default(),
        }
    }

    #[test]
    fn test_compare_prepayment_amounts() {
        let runner = ScenarioRunner::new();
        let configs: Vec<_> = [0.0, 10_000.0, 20_000.0]
            .iter()
            .map(|&amount| ProjectionConfig {
                horizon_years: 10,
                strategy: Strategy::Prepayment {
                    annual_amount: amount,
                    allow_over_limit: false,
                },
            })
            .collect();

        let results = runner.compare(&test_input(), &configs).unwrap();
        assert_eq!(results.len(), 3);

        // Larger prepayments leave less interest paid
        assert!(results[2].summary().total_interest < results[1].summary().total_interest);
        assert!(results[1].summary().total_interest < results[0].summary().total_interest);
    }

    #[test]
    fn test_scenario_json_defaults() {
        let json = r#"{
            "segments": [{
                "terms": {"principal": 400000, "annual_rate": 0.05, "amortization_months": 300},
                "start_date": "2024-01-01",
                "opening_balance": 400000
            }],
            "property": {"value": 650000},
            "challenger": {"kind": "Prepayment", "annual_amount": 12000}
        }"#;
        let scenario: ScenarioConfig = serde_json::from_str(json).unwrap();
        scenario.validate().unwrap();
        assert_eq!(scenario.horizon_years, 25);
        assert_eq!(scenario.strategy, Strategy::Baseline);
        assert_eq!(scenario.monte_carlo.iterations, 1_000);

        let runner = ScenarioRunner::new();
        let results = runner.compare_scenario(&scenario).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[1].strategy, "prepayment");
    }

    #[test]
    fn test_contract_ledger_export() {
        let runner = ScenarioRunner::new();
        let ledger = runner.contract_ledger(&test_input(), date(2025, 1, 1)).unwrap();
        assert_eq!(ledger.entries.len(), 12);
        assert!(ledger
            .entries
            .iter()
            .all(|e| matches!(e.kind, LedgerEntryKind::Payment(_))));
    }

    #[test]
    fn test_simulate_small_run() {
        let runner = ScenarioRunner::new();
        let mut monte_carlo = MonteCarloConfig {
            iterations: 40,
            ..Default::default()
        };
        monte_carlo.sample_paths = 2;
        let scenario = ScenarioConfig {
            input: test_input(),
            horizon_years: 5,
            strategy: Strategy::Baseline,
            challenger: None,
            monte_carlo,
        };
        let result = runner.simulate(&scenario).unwrap();
        assert_eq!(result.iterations, 40);
        assert_eq!(result.sample_paths.len(), 2);
        assert_eq!(result.probability_of_payoff, 0.0);
    }
}
