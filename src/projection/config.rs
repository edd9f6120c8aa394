//! Inputs and configuration for a projection run

use serde::{Deserialize, Serialize};

use crate::credit_line::CreditLineConfig;
use crate::error::{EngineError, Result};
use crate::mortgage::{MortgageEvent, PrepaymentPolicy, TermSegment};
use crate::tax::{IncomeBreakdown, TaxProfile};

/// Canonical horizons offered to callers; any positive horizon is accepted
pub const CANONICAL_HORIZONS: [u32; 3] = [10, 20, 30];

/// Longest horizon accepted, in years
pub const MAX_HORIZON_YEARS: u32 = 60;

/// Where a leveraged strategy's annual tax refund goes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum RefundUse {
    /// Prepay the mortgage within the annual privilege, invest the rest
    #[default]
    Prepay,
    Invest,
    /// Pay down the credit line, invest the rest
    RepayCreditLine,
}

fn default_true() -> bool {
    true
}

/// Household strategy applied on top of the contractual schedule
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Strategy {
    /// Scheduled payments and supplied events only
    Baseline,
    /// Lump-sum prepayment at the end of every projection year
    Prepayment {
        annual_amount: f64,
        #[serde(default)]
        allow_over_limit: bool,
    },
    /// Re-borrow repaid principal on the credit line and invest it
    Leveraged {
        #[serde(default)]
        initial_draw: f64,
        #[serde(default)]
        refund_use: RefundUse,
        #[serde(default = "default_true")]
        reborrow_principal: bool,
    },
}

impl Default for Strategy {
    fn default() -> Self {
        Strategy::Baseline
    }
}

impl Strategy {
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Baseline => "baseline",
            Strategy::Prepayment { .. } => "prepayment",
            Strategy::Leveraged { .. } => "leveraged",
        }
    }

    pub fn is_leveraged(&self) -> bool {
        matches!(self, Strategy::Leveraged { .. })
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Strategy::Prepayment { annual_amount, .. } if !annual_amount.is_finite() || *annual_amount < 0.0 => {
                Err(EngineError::validation(
                    "strategy.annual_amount",
                    format!("must be non-negative, got {}", annual_amount),
                ))
            }
            Strategy::Leveraged { initial_draw, .. } if !initial_draw.is_finite() || *initial_draw < 0.0 => {
                Err(EngineError::validation(
                    "strategy.initial_draw",
                    format!("must be non-negative, got {}", initial_draw),
                ))
            }
            _ => Ok(()),
        }
    }
}

/// Annual return earned on the investment account
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ReturnAssumption {
    Fixed(f64),
    /// Spread over the mortgage rate path
    SpreadOverPath(f64),
}

impl ReturnAssumption {
    pub fn resolve(&self, path_rate: f64) -> f64 {
        match self {
            ReturnAssumption::Fixed(r) => *r,
            ReturnAssumption::SpreadOverPath(spread) => path_rate + spread,
        }
    }
}

impl Default for ReturnAssumption {
    fn default() -> Self {
        ReturnAssumption::Fixed(0.06)
    }
}

/// Investment account held alongside the mortgage
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct InvestmentAssumption {
    #[serde(default)]
    pub opening_balance: f64,

    #[serde(default)]
    pub annual_return: ReturnAssumption,

    /// Taxed each year by income type when present, otherwise grows gross
    #[serde(default)]
    pub income_breakdown: Option<IncomeBreakdown>,
}

/// Property value estimate supplied by the caller
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PropertyAssumption {
    pub value: f64,
    #[serde(default)]
    pub annual_appreciation: f64,
}

impl PropertyAssumption {
    pub fn value_at(&self, year: u32) -> f64 {
        self.value * (1.0 + self.annual_appreciation).powi(year as i32)
    }
}

/// Everything a projection needs to know about the household
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionInput {
    /// Origination segment followed by any scheduled renewals
    pub segments: Vec<TermSegment>,

    #[serde(default)]
    pub events: Vec<MortgageEvent>,

    #[serde(default)]
    pub prepayment_policy: PrepaymentPolicy,

    #[serde(default)]
    pub credit_line: Option<CreditLineConfig>,

    #[serde(default)]
    pub tax: Option<TaxProfile>,

    pub property: PropertyAssumption,

    #[serde(default)]
    pub investment: InvestmentAssumption,
}

impl ProjectionInput {
    pub fn validate(&self) -> Result<()> {
        if self.segments.is_empty() {
            return Err(EngineError::validation("segments", "at least one term segment is required"));
        }
        for segment in &self.segments {
            segment.terms.validate()?;
        }
        let first = &self.segments[0];
        if !first.opening_balance.is_finite() || first.opening_balance < 0.0 {
            return Err(EngineError::validation(
                "segments[0].opening_balance",
                format!("must be non-negative, got {}", first.opening_balance),
            ));
        }
        self.prepayment_policy.validate()?;
        for event in &self.events {
            event.validate()?;
            if matches!(event, MortgageEvent::CreditLine(_)) && self.credit_line.is_none() {
                return Err(EngineError::validation(
                    "events",
                    "credit-line event supplied without a credit line",
                ));
            }
        }
        if let Some(line) = &self.credit_line {
            line.validate()?;
        }
        if let Some(tax) = &self.tax {
            tax.validate()?;
        }
        if !self.property.value.is_finite() || self.property.value < 0.0 {
            return Err(EngineError::validation(
                "property.value",
                format!("must be non-negative, got {}", self.property.value),
            ));
        }
        if self.property.annual_appreciation <= -1.0 {
            return Err(EngineError::validation("property.annual_appreciation", "must exceed -100%"));
        }
        let inv = &self.investment;
        if !inv.opening_balance.is_finite() || inv.opening_balance < 0.0 {
            return Err(EngineError::validation(
                "investment.opening_balance",
                format!("must be non-negative, got {}", inv.opening_balance),
            ));
        }
        if let ReturnAssumption::Fixed(r) = inv.annual_return {
            if !r.is_finite() || r <= -1.0 {
                return Err(EngineError::validation("investment.annual_return", "must exceed -100%"));
            }
        }
        if let Some(b) = &inv.income_breakdown {
            b.validate()?;
            if self.tax.is_none() {
                return Err(EngineError::validation(
                    "investment.income_breakdown",
                    "a tax profile is required to tax investment income",
                ));
            }
        }
        Ok(())
    }
}

/// Run-level settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectionConfig {
    pub horizon_years: u32,
    pub strategy: Strategy,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            horizon_years: 25,
            strategy: Strategy::Baseline,
        }
    }
}

impl ProjectionConfig {
    pub fn validate(&self, input: &ProjectionInput) -> Result<()> {
        if self.horizon_years == 0 || self.horizon_years > MAX_HORIZON_YEARS {
            return Err(EngineError::validation(
                "horizon_years",
                format!("must be within 1..={}, got {}", MAX_HORIZON_YEARS, self.horizon_years),
            ));
        }
        self.strategy.validate()?;
        if self.strategy.is_leveraged() && input.credit_line.is_none() {
            return Err(EngineError::validation(
                "credit_line",
                "the leveraged strategy requires a credit line",
            ));
        }
        Ok(())
    }
}
