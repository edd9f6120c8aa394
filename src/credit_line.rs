//! Secured revolving credit line used to fund leveraged investing
//!
//! Invariant: `0 <= balance <= limit` after every operation. Draws beyond the
//! available room are capped and the unfulfilled remainder is reported, and
//! capitalised interest that does not fit under the limit stays accrued.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Unused room on a facility: `max(0, limit - balance)`
pub fn available_credit(limit: f64, balance: f64) -> f64 {
    let limit = limit.max(0.0);
    (limit - balance.max(0.0)).clamp(0.0, limit)
}

/// Balance as a percentage of the limit, clamped to [0, 100]
///
/// A zero limit reports zero utilization.
pub fn utilization(balance: f64, limit: f64) -> f64 {
    if limit <= 0.0 {
        return 0.0;
    }
    (balance / limit * 100.0).clamp(0.0, 100.0)
}

/// Interest rate charged on the facility
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CreditLineRate {
    /// Fixed nominal annual rate
    Fixed(f64),
    /// Spread over the mortgage rate path (prime-linked facilities)
    SpreadOverPath(f64),
}

impl CreditLineRate {
    /// Annual rate given the path rate for the current month
    pub fn resolve(&self, path_rate: f64) -> f64 {
        match self {
            CreditLineRate::Fixed(r) => *r,
            CreditLineRate::SpreadOverPath(spread) => (path_rate + spread).max(0.0),
        }
    }
}

fn default_true() -> bool {
    true
}

/// Snapshot of the facility
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CreditLineState {
    pub limit: f64,
    #[serde(default)]
    pub balance: f64,
    /// Interest charged but neither paid nor added to the balance
    #[serde(default)]
    pub accrued_interest: f64,
}

/// Facility terms supplied by the caller
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CreditLineConfig {
    pub state: CreditLineState,
    pub rate: CreditLineRate,

    /// Add interest to the balance instead of paying it each period
    #[serde(default = "default_true")]
    pub capitalize_interest: bool,

    /// Limit grows by the mortgage principal repaid each period
    #[serde(default)]
    pub readvanceable: bool,

    /// Ceiling for a readvanceable limit
    #[serde(default)]
    pub max_limit: Option<f64>,
}

impl CreditLineConfig {
    pub fn validate(&self) -> Result<()> {
        let s = &self.state;
        if !s.limit.is_finite() || s.limit < 0.0 {
            return Err(EngineError::validation(
                "credit_line.limit",
                format!("must be non-negative, got {}", s.limit),
            ));
        }
        if !s.balance.is_finite() || s.balance < 0.0 || s.balance > s.limit {
            return Err(EngineError::validation(
                "credit_line.balance",
                format!("must be within [0, {}], got {}", s.limit, s.balance),
            ));
        }
        if s.accrued_interest < 0.0 {
            return Err(EngineError::validation(
                "credit_line.accrued_interest",
                "must be non-negative",
            ));
        }
        let rate = match self.rate {
            CreditLineRate::Fixed(r) => r,
            CreditLineRate::SpreadOverPath(spread) => spread,
        };
        if !rate.is_finite() || rate < 0.0 {
            return Err(EngineError::validation(
                "credit_line.rate",
                format!("must be non-negative, got {}", rate),
            ));
        }
        if let Some(max) = self.max_limit {
            if max < s.limit {
                return Err(EngineError::validation(
                    "credit_line.max_limit",
                    format!("{} is below the opening limit {}", max, s.limit),
                ));
            }
        }
        Ok(())
    }
}

/// Result of a draw request
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DrawOutcome {
    pub requested: f64,
    pub drawn: f64,
    /// Portion that did not fit under the limit
    pub unfulfilled: f64,
}

/// Interest charged for one period
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InterestCharge {
    pub interest: f64,
    pub capitalized: f64,
    /// Paid in cash by the borrower
    pub paid: f64,
    /// Left accrued because the limit was reached
    pub accrued: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CreditLineTotals {
    pub drawn: f64,
    pub repaid: f64,
    pub interest_charged: f64,
    pub interest_paid: f64,
    pub unfulfilled_draws: f64,
}

/// Live ledger of one facility
#[derive(Debug, Clone)]
pub struct CreditLine {
    state: CreditLineState,
    capitalize_interest: bool,
    readvanceable: bool,
    max_limit: Option<f64>,
    totals: CreditLineTotals,
}

impl CreditLine {
    pub fn open(config: &CreditLineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            state: config.state,
            capitalize_interest: config.capitalize_interest,
            readvanceable: config.readvanceable,
            max_limit: config.max_limit,
            totals: CreditLineTotals::default(),
        })
    }

    pub fn state(&self) -> CreditLineState {
        self.state
    }

    pub fn balance(&self) -> f64 {
        self.state.balance
    }

    /// Balance plus interest accrued but not yet capitalised
    pub fn amount_owing(&self) -> f64 {
        self.state.balance + self.state.accrued_interest
    }

    pub fn limit(&self) -> f64 {
        self.state.limit
    }

    pub fn totals(&self) -> &CreditLineTotals {
        &self.totals
    }

    pub fn is_readvanceable(&self) -> bool {
        self.readvanceable
    }

    pub fn available(&self) -> f64 {
        available_credit(self.state.limit, self.state.balance)
    }

    pub fn utilization(&self) -> f64 {
        utilization(self.state.balance, self.state.limit)
    }

    /// Borrow up to `amount`, capped at the available room
    pub fn draw(&mut self, amount: f64) -> DrawOutcome {
        let requested = amount.max(0.0);
        let drawn = requested.min(self.available());
        self.state.balance += drawn;
        self.totals.drawn += drawn;
        self.totals.unfulfilled_draws += requested - drawn;
        DrawOutcome {
            requested,
            drawn,
            unfulfilled: requested - drawn,
        }
    }

    /// Pay down accrued interest, then balance; returns the amount applied
    pub fn repay(&mut self, amount: f64) -> f64 {
        let mut remaining = amount.max(0.0);

        let to_interest = remaining.min(self.state.accrued_interest);
        self.state.accrued_interest -= to_interest;
        self.totals.interest_paid += to_interest;
        remaining -= to_interest;

        let to_balance = remaining.min(self.state.balance);
        self.state.balance -= to_balance;
        self.totals.repaid += to_balance;

        to_interest + to_balance
    }

    /// Charge one period of interest at a nominal annual rate
    pub fn accrue(&mut self, annual_rate: f64, periods_per_year: u32) -> InterestCharge {
        let interest = self.state.balance * annual_rate.max(0.0) / periods_per_year.max(1) as f64;
        self.totals.interest_charged += interest;

        if self.capitalize_interest {
            let capitalized = interest.min(self.available());
            self.state.balance += capitalized;
            self.state.accrued_interest += interest - capitalized;
            InterestCharge {
                interest,
                capitalized,
                paid: 0.0,
                accrued: interest - capitalized,
            }
        } else {
            self.totals.interest_paid += interest;
            InterestCharge {
                interest,
                capitalized: 0.0,
                paid: interest,
                accrued: 0.0,
            }
        }
    }

    /// Readvance: raise the limit by mortgage principal just repaid
    pub fn readvance(&mut self, principal_repaid: f64) {
        if !self.readvanceable || principal_repaid <= 0.0 {
            return;
        }
        let raised = self.state.limit + principal_repaid;
        self.state.limit = match self.max_limit {
            Some(max) => raised.min(max),
            None => raised,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;

    fn config(limit: f64, balance: f64) -> CreditLineConfig {
        CreditLineConfig {
            state: CreditLineState {
                limit,
                balance,
                accrued_interest: 0.0,
            },
            rate: CreditLineRate::Fixed(0.06),
            capitalize_interest: true,
            readvanceable: false,
            max_limit: None,
        }
    }

    #[test]
    fn test_draw_capped_reports_shortfall() {
        let mut line = CreditLine::open(&config(50_000.0, 45_000.0)).unwrap();
        let out = line.draw(8_000.0);
        assert_eq!(out.drawn, 5_000.0);
        assert_eq!(out.unfulfilled, 3_000.0);
        assert_eq!(line.balance(), 50_000.0);
        assert_eq!(line.utilization(), 100.0);
    }

    #[test]
    fn test_repay_clears_accrued_first() {
        let mut line = CreditLine::open(&config(10_000.0, 10_000.0)).unwrap();
        let charge = line.accrue(0.12, 12);
        assert_abs_diff_eq!(charge.accrued, 100.0, epsilon = 1e-9);
        assert_eq!(line.balance(), 10_000.0);

        let applied = line.repay(600.0);
        assert_eq!(applied, 600.0);
        assert_abs_diff_eq!(line.state().accrued_interest, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(line.balance(), 9_500.0, epsilon = 1e-9);
    }

    #[test]
    fn test_interest_capitalizes_into_balance() {
        let mut line = CreditLine::open(&config(100_000.0, 12_000.0)).unwrap();
        let charge = line.accrue(0.06, 12);
        assert_abs_diff_eq!(charge.capitalized, 60.0, epsilon = 1e-9);
        assert_abs_diff_eq!(line.balance(), 12_060.0, epsilon = 1e-9);
    }

    #[test]
    fn test_interest_paid_when_not_capitalized() {
        let mut cfg = config(100_000.0, 12_000.0);
        cfg.capitalize_interest = false;
        let mut line = CreditLine::open(&cfg).unwrap();
        let charge = line.accrue(0.06, 12);
        assert_abs_diff_eq!(charge.paid, 60.0, epsilon = 1e-9);
        assert_eq!(line.balance(), 12_000.0);
    }

    #[test]
    fn test_readvance_respects_ceiling() {
        let mut cfg = config(10_000.0, 0.0);
        cfg.readvanceable = true;
        cfg.max_limit = Some(12_000.0);
        let mut line = CreditLine::open(&cfg).unwrap();
        line.readvance(1_500.0);
        assert_eq!(line.limit(), 11_500.0);
        line.readvance(1_500.0);
        assert_eq!(line.limit(), 12_000.0);
    }

    #[test]
    fn test_balance_above_limit_rejected() {
        assert!(CreditLine::open(&config(1_000.0, 1_500.0)).is_err());
    }

    #[test]
    fn test_zero_limit_utilization() {
        assert_eq!(utilization(500.0, 0.0), 0.0);
        let mut line = CreditLine::open(&config(0.0, 0.0)).unwrap();
        assert_eq!(line.draw(100.0).unfulfilled, 100.0);
        assert_eq!(line.utilization(), 0.0);
    }

    proptest! {
        #[test]
        fn prop_available_credit_bounds(limit in 0.0f64..1e7, balance in -1e6f64..2e7) {
            let a = available_credit(limit, balance);
            prop_assert!(a >= 0.0);
            prop_assert!(a <= limit);
            if balance >= 0.0 {
                prop_assert!((a - (limit - balance).max(0.0)).abs() < 1e-6);
            }
        }

        #[test]
        fn prop_utilization_bounds(balance in -1e6f64..2e7, limit in -1e3f64..1e7) {
            let u = utilization(balance, limit);
            prop_assert!((0.0..=100.0).contains(&u));
            prop_assert_eq!(utilization(balance, 0.0), 0.0);
        }

        #[test]
        fn prop_ledger_keeps_balance_within_limit(
            ops in proptest::collection::vec((0u8..3, 0.0f64..50_000.0), 1..40)
        ) {
            let mut line = CreditLine::open(&config(100_000.0, 0.0)).unwrap();
            for (op, amount) in ops {
                match op {
                    0 => { line.draw(amount); }
                    1 => { line.repay(amount); }
                    _ => { line.accrue(0.2, 12); }
                }
                prop_assert!(line.balance() >= 0.0);
                prop_assert!(line.balance() <= line.limit() + 1e-9);
            }
        }
    }
}
