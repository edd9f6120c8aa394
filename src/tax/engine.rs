//! Marginal rates, interest deductions and after-tax investment returns

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::tables::{TaxTable, FEDERAL};
use crate::error::{EngineError, Result};

/// Whose income the tax calculations apply to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxProfile {
    /// Province code, or `CA` for federal only
    pub jurisdiction: String,
    pub year: i32,
    pub taxable_income: f64,
}

impl TaxProfile {
    pub fn validate(&self) -> Result<()> {
        if !self.taxable_income.is_finite() || self.taxable_income < 0.0 {
            return Err(EngineError::validation(
                "tax.taxable_income",
                format!("must be non-negative, got {}", self.taxable_income),
            ));
        }
        Ok(())
    }
}

/// Composition of investment income, as fractions of the total return
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct IncomeBreakdown {
    #[serde(default)]
    pub interest: f64,
    #[serde(default)]
    pub eligible_dividends: f64,
    #[serde(default)]
    pub capital_gains: f64,
    #[serde(default)]
    pub return_of_capital: f64,
}

impl IncomeBreakdown {
    pub fn validate(&self) -> Result<()> {
        let parts = [
            self.interest,
            self.eligible_dividends,
            self.capital_gains,
            self.return_of_capital,
        ];
        if parts.iter().any(|p| !p.is_finite() || *p < 0.0) {
            return Err(EngineError::validation("income_breakdown", "shares must be non-negative"));
        }
        let total: f64 = parts.iter().sum();
        if (total - 1.0).abs() > 1e-6 {
            return Err(EngineError::validation(
                "income_breakdown",
                format!("shares must sum to 1, got {}", total),
            ));
        }
        Ok(())
    }
}

/// How each income type is taxed relative to ordinary income
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestmentTaxTreatment {
    /// Share of a capital gain included in income
    pub capital_gains_inclusion: f64,
    /// Gross-up applied to eligible dividends
    pub dividend_gross_up: f64,
    /// Federal eligible dividend credit as a share of the grossed-up dividend
    pub federal_dividend_credit: f64,
    /// Provincial eligible dividend credits keyed by upper-case jurisdiction
    #[serde(default)]
    pub provincial_dividend_credits: HashMap<String, f64>,
}

impl Default for InvestmentTaxTreatment {
    fn default() -> Self {
        let provincial_dividend_credits = [("ON", 0.10), ("BC", 0.12), ("AB", 0.0812)]
            .into_iter()
            .map(|(j, c)| (j.to_string(), c))
            .collect();
        Self {
            capital_gains_inclusion: 0.5,
            dividend_gross_up: 0.38,
            federal_dividend_credit: 0.150198,
            provincial_dividend_credits,
        }
    }
}

impl InvestmentTaxTreatment {
    /// Federal plus provincial credit; a province without an entry adds none
    pub fn dividend_tax_credit(&self, jurisdiction: &str) -> f64 {
        if jurisdiction.eq_ignore_ascii_case(FEDERAL) {
            return self.federal_dividend_credit;
        }
        self.federal_dividend_credit
            + self
                .provincial_dividend_credits
                .get(&jurisdiction.to_uppercase())
                .copied()
                .unwrap_or(0.0)
    }
}

/// Bracket tables keyed by jurisdiction and year
#[derive(Debug, Clone, Default)]
pub struct TaxEngine {
    tables: HashMap<(String, i32), TaxTable>,
    treatment: InvestmentTaxTreatment,
}

impl TaxEngine {
    pub fn new(tables: Vec<TaxTable>) -> Self {
        let mut engine = Self::default();
        for table in tables {
            engine.insert(table);
        }
        engine
    }

    /// Built-in federal, Ontario, British Columbia and Alberta tables
    pub fn canadian_defaults() -> Self {
        Self::new(super::tables::canadian_tables())
    }

    pub fn with_treatment(mut self, treatment: InvestmentTaxTreatment) -> Self {
        self.treatment = treatment;
        self
    }

    pub fn insert(&mut self, table: TaxTable) {
        self.tables
            .insert((table.jurisdiction.to_uppercase(), table.year), table);
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn table(&self, jurisdiction: &str, year: i32) -> Result<&TaxTable> {
        self.tables
            .get(&(jurisdiction.to_uppercase(), year))
            .ok_or_else(|| EngineError::UnknownTaxTable {
                jurisdiction: jurisdiction.to_string(),
                year,
            })
    }

    /// Combined marginal rate: federal plus the province when one is named
    pub fn marginal_rate(&self, income: f64, jurisdiction: &str, year: i32) -> Result<f64> {
        let local = self.table(jurisdiction, year)?;
        if local.jurisdiction.eq_ignore_ascii_case(FEDERAL) {
            return Ok(local.marginal_rate(income));
        }
        let federal = self.table(FEDERAL, year)?;
        Ok(federal.marginal_rate(income) + local.marginal_rate(income))
    }

    /// Combined tax payable on `income`
    pub fn tax_payable(&self, income: f64, jurisdiction: &str, year: i32) -> Result<f64> {
        let local = self.table(jurisdiction, year)?;
        if local.jurisdiction.eq_ignore_ascii_case(FEDERAL) {
            return Ok(local.tax_payable(income));
        }
        let federal = self.table(FEDERAL, year)?;
        Ok(federal.tax_payable(income) + local.tax_payable(income))
    }

    pub fn profile_marginal_rate(&self, profile: &TaxProfile) -> Result<f64> {
        self.marginal_rate(profile.taxable_income, &profile.jurisdiction, profile.year)
    }

    /// Refund value of deducting `deductible` (e.g. investment loan interest)
    pub fn deduction_value(&self, deductible: f64, profile: &TaxProfile) -> Result<f64> {
        if !deductible.is_finite() || deductible < 0.0 {
            return Err(EngineError::validation(
                "deductible_amount",
                format!("must be non-negative, got {}", deductible),
            ));
        }
        Ok(deductible * self.profile_marginal_rate(profile)?)
    }

    /// Blended tax rate on a return with the given composition
    pub fn investment_tax_rate(&self, breakdown: &IncomeBreakdown, profile: &TaxProfile) -> Result<f64> {
        breakdown.validate()?;
        let marginal = self.profile_marginal_rate(profile)?;
        let credit = self.treatment.dividend_tax_credit(&profile.jurisdiction);
        Ok(blended_rate(breakdown, &self.treatment, marginal, credit))
    }

    /// After-tax return; fully taxed as interest without a breakdown
    pub fn after_tax_return(
        &self,
        gross_return: f64,
        breakdown: Option<&IncomeBreakdown>,
        profile: &TaxProfile,
    ) -> Result<f64> {
        let rate = match breakdown {
            Some(b) => self.investment_tax_rate(b, profile)?,
            None => self.profile_marginal_rate(profile)?,
        };
        Ok(gross_return * (1.0 - rate))
    }
}

fn blended_rate(b: &IncomeBreakdown, t: &InvestmentTaxTreatment, marginal: f64, dividend_credit: f64) -> f64 {
    let dividend_rate = ((1.0 + t.dividend_gross_up) * (marginal - dividend_credit)).max(0.0);
    b.interest * marginal + b.eligible_dividends * dividend_rate + b.capital_gains * marginal * t.capital_gains_inclusion
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn profile(jurisdiction: &str, income: f64) -> TaxProfile {
        TaxProfile {
            jurisdiction: jurisdiction.to_string(),
            year: 2024,
            taxable_income: income,
        }
    }

    #[test]
    fn test_ontario_combined_marginal_rate() {
        let engine = TaxEngine::canadian_defaults();
        let rate = engine.marginal_rate(120_000.0, "ON", 2024).unwrap();
        assert_abs_diff_eq!(rate, 0.26 + 0.1116, epsilon = 1e-12);
        let fed_only = engine.marginal_rate(120_000.0, "CA", 2024).unwrap();
        assert_abs_diff_eq!(fed_only, 0.26, epsilon = 1e-12);
    }

    #[test]
    fn test_jurisdiction_is_case_insensitive() {
        let engine = TaxEngine::canadian_defaults();
        assert!(engine.marginal_rate(50_000.0, "bc", 2025).is_ok());
    }

    #[test]
    fn test_unknown_table_fails() {
        let engine = TaxEngine::canadian_defaults();
        assert!(matches!(
            engine.marginal_rate(50_000.0, "QC", 2024),
            Err(EngineError::UnknownTaxTable { .. })
        ));
        assert!(matches!(
            engine.marginal_rate(50_000.0, "ON", 1999),
            Err(EngineError::UnknownTaxTable { .. })
        ));
    }

    #[test]
    fn test_deduction_value() {
        let engine = TaxEngine::canadian_defaults();
        let value = engine.deduction_value(10_000.0, &profile("AB", 160_000.0)).unwrap();
        assert_abs_diff_eq!(value, 10_000.0 * (0.26 + 0.12), epsilon = 1e-9);
        assert!(engine.deduction_value(-1.0, &profile("AB", 160_000.0)).is_err());
    }

    #[test]
    fn test_capital_gains_taxed_at_half() {
        let engine = TaxEngine::canadian_defaults();
        let p = profile("ON", 120_000.0);
        let marginal = engine.profile_marginal_rate(&p).unwrap();
        let gains = IncomeBreakdown {
            capital_gains: 1.0,
            ..Default::default()
        };
        let after = engine.after_tax_return(0.08, Some(&gains), &p).unwrap();
        assert_abs_diff_eq!(after, 0.08 * (1.0 - marginal * 0.5), epsilon = 1e-12);

        let interest_only = engine.after_tax_return(0.08, None, &p).unwrap();
        assert!(interest_only < after);
    }

    #[test]
    fn test_return_of_capital_is_untaxed() {
        let engine = TaxEngine::canadian_defaults();
        let roc = IncomeBreakdown {
            return_of_capital: 1.0,
            ..Default::default()
        };
        let after = engine.after_tax_return(0.05, Some(&roc), &profile("ON", 90_000.0)).unwrap();
        assert_abs_diff_eq!(after, 0.05, epsilon = 1e-12);
    }

    #[test]
    fn test_dividends_taxed_below_interest() {
        let engine = TaxEngine::canadian_defaults();
        let p = profile("ON", 250_000.0);
        let divs = IncomeBreakdown {
            eligible_dividends: 1.0,
            ..Default::default()
        };
        let div_rate = engine.investment_tax_rate(&divs, &p).unwrap();
        let marginal = engine.profile_marginal_rate(&p).unwrap();
        assert!(div_rate > 0.0 && div_rate < marginal);
    }

    #[test]
    fn test_dividend_credit_follows_province() {
        let engine = TaxEngine::canadian_defaults();
        let divs = IncomeBreakdown {
            eligible_dividends: 1.0,
            ..Default::default()
        };
        let bc = profile("BC", 250_000.0);
        let ab = profile("AB", 250_000.0);
        let bc_marginal = engine.profile_marginal_rate(&bc).unwrap();
        let ab_marginal = engine.profile_marginal_rate(&ab).unwrap();

        let bc_rate = engine.investment_tax_rate(&divs, &bc).unwrap();
        let ab_rate = engine.investment_tax_rate(&divs, &ab).unwrap();
        assert_abs_diff_eq!(bc_rate, (1.38 * (bc_marginal - (0.150198 + 0.12))).max(0.0), epsilon = 1e-12);
        assert_abs_diff_eq!(ab_rate, (1.38 * (ab_marginal - (0.150198 + 0.0812))).max(0.0), epsilon = 1e-12);

        let t = InvestmentTaxTreatment::default();
        assert_abs_diff_eq!(t.dividend_tax_credit("on"), 0.250198, epsilon = 1e-12);
        assert_abs_diff_eq!(t.dividend_tax_credit("CA"), 0.150198, epsilon = 1e-12);
        assert_abs_diff_eq!(t.dividend_tax_credit("QC"), 0.150198, epsilon = 1e-12);
    }

    #[test]
    fn test_breakdown_must_sum_to_one() {
        let bad = IncomeBreakdown {
            interest: 0.5,
            capital_gains: 0.2,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_tax_payable_combines_tables() {
        let engine = TaxEngine::canadian_defaults();
        let tax = engine.tax_payable(50_000.0, "ON", 2024).unwrap();
        assert_abs_diff_eq!(tax, 50_000.0 * 0.15 + 50_000.0 * 0.0505, epsilon = 1e-6);
    }
}
