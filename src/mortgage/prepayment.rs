//! Annual prepayment privileges, carry-forward and over-limit penalties

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Penalty charged on the over-limit portion, in percent
pub const DEFAULT_PENALTY_RATE_PCT: f64 = 1.5;

/// Default annual privilege as a fraction of the segment's original principal
pub const DEFAULT_ANNUAL_LIMIT_PCT: f64 = 0.15;

/// Penalty on an over-limit amount: `over_limit * rate_pct / 100`
///
/// Negative inputs are treated as zero.
pub fn prepayment_penalty(over_limit: f64, penalty_rate_pct: f64) -> f64 {
    over_limit.max(0.0) * penalty_rate_pct.max(0.0) / 100.0
}

fn default_annual_limit_pct() -> f64 {
    DEFAULT_ANNUAL_LIMIT_PCT
}

fn default_penalty_rate_pct() -> f64 {
    DEFAULT_PENALTY_RATE_PCT
}

/// Lender rules governing prepayments
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PrepaymentPolicy {
    /// Annual penalty-free limit as a fraction of original principal
    #[serde(default = "default_annual_limit_pct")]
    pub annual_limit_pct: f64,

    /// Whether unused limit rolls into the next calendar year
    #[serde(default)]
    pub carry_forward: bool,

    /// Penalty on the over-limit portion, in percent
    #[serde(default = "default_penalty_rate_pct")]
    pub penalty_rate_pct: f64,

    /// Ceiling on the over-limit portion, as a fraction of original principal
    #[serde(default)]
    pub max_over_limit_pct: Option<f64>,

    /// Recompute the contractual payment after each prepayment
    #[serde(default)]
    pub recast_after_prepayment: bool,
}

impl Default for PrepaymentPolicy {
    fn default() -> Self {
        Self {
            annual_limit_pct: DEFAULT_ANNUAL_LIMIT_PCT,
            carry_forward: false,
            penalty_rate_pct: DEFAULT_PENALTY_RATE_PCT,
            max_over_limit_pct: None,
            recast_after_prepayment: false,
        }
    }
}

impl PrepaymentPolicy {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.annual_limit_pct) {
            return Err(EngineError::validation(
                "prepayment_policy.annual_limit_pct",
                format!("must be within [0, 1], got {}", self.annual_limit_pct),
            ));
        }
        if !self.penalty_rate_pct.is_finite() || self.penalty_rate_pct < 0.0 {
            return Err(EngineError::validation(
                "prepayment_policy.penalty_rate_pct",
                format!("must be non-negative, got {}", self.penalty_rate_pct),
            ));
        }
        if let Some(max) = self.max_over_limit_pct {
            if !max.is_finite() || max < 0.0 {
                return Err(EngineError::validation(
                    "prepayment_policy.max_over_limit_pct",
                    format!("must be non-negative, got {}", max),
                ));
            }
        }
        Ok(())
    }
}

/// Prepayment capacity for one calendar year
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnnualPrepaymentBudget {
    pub year: i32,
    pub limit: f64,
    pub carry_forward: f64,
    /// Amount applied within limit + carry-forward
    pub used: f64,
    /// Amount applied above the limit with the penalty elected
    pub over_limit: f64,
    pub penalties: f64,
}

impl AnnualPrepaymentBudget {
    fn new(year: i32, limit: f64, carry_forward: f64) -> Self {
        Self {
            year,
            limit,
            carry_forward,
            used: 0.0,
            over_limit: 0.0,
            penalties: 0.0,
        }
    }

    /// Remaining penalty-free capacity
    pub fn available(&self) -> f64 {
        (self.limit + self.carry_forward - self.used).max(0.0)
    }

    /// Unused share of this year's own limit; carry-forward is consumed first
    pub fn unused_limit(&self) -> f64 {
        let used_from_limit = (self.used - self.carry_forward).max(0.0);
        (self.limit - used_from_limit).max(0.0)
    }
}

/// Result of one prepayment request
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PrepaymentOutcome {
    pub requested: f64,
    /// Principal reduction, including any over-limit portion
    pub applied: f64,
    pub over_limit: f64,
    pub penalty: f64,
    /// Cash leaving the borrower's pocket: applied + penalty
    pub total_outlay: f64,
}

/// Tracks prepayment usage across the calendar years of a mortgage
#[derive(Debug, Clone)]
pub struct PrepaymentTracker {
    policy: PrepaymentPolicy,
    base_principal: f64,
    first_year: i32,
    budgets: BTreeMap<i32, AnnualPrepaymentBudget>,
}

impl PrepaymentTracker {
    pub fn new(policy: PrepaymentPolicy, base_principal: f64, origination: NaiveDate) -> Self {
        Self {
            policy,
            base_principal,
            first_year: origination.year(),
            budgets: BTreeMap::new(),
        }
    }

    pub fn policy(&self) -> &PrepaymentPolicy {
        &self.policy
    }

    /// Annual limit in dollars under the current base principal
    pub fn annual_limit(&self) -> f64 {
        self.base_principal * self.policy.annual_limit_pct
    }

    /// Reset the limit base after a refinance; usage this year is kept
    pub fn rebase(&mut self, principal: f64, date: NaiveDate) {
        self.base_principal = principal;
        let limit = self.annual_limit();
        self.budget_mut(date.year()).limit = limit;
    }

    /// Budget for a year, opening it (with carry-forward) if needed
    pub fn budget(&mut self, year: i32) -> AnnualPrepaymentBudget {
        *self.budget_mut(year)
    }

    /// All budgets opened so far, in year order
    pub fn budgets(&self) -> impl Iterator<Item = &AnnualPrepaymentBudget> {
        self.budgets.values()
    }

    fn budget_mut(&mut self, year: i32) -> &mut AnnualPrepaymentBudget {
        let carry = self.carry_into(year);
        let limit = self.annual_limit();
        self.budgets
            .entry(year)
            .or_insert_with(|| AnnualPrepaymentBudget::new(year, limit, carry))
    }

    fn carry_into(&self, year: i32) -> f64 {
        if !self.policy.carry_forward || year <= self.first_year {
            return 0.0;
        }
        match self.budgets.get(&(year - 1)) {
            Some(prev) => prev.unused_limit(),
            // A year with no prepayments left its whole limit unused
            None => self.annual_limit(),
        }
    }

    /// Apply a prepayment request against the budget for the calendar year of `date`
    ///
    /// Without `allow_over_limit` the amount is capped at the available
    /// capacity. With it, the excess is applied and penalised, but a request
    /// above the absolute ceiling fails. The outstanding balance always caps
    /// the amount applied.
    pub fn request(
        &mut self,
        date: NaiveDate,
        requested: f64,
        allow_over_limit: bool,
        outstanding_balance: f64,
    ) -> Result<PrepaymentOutcome> {
        self.request_in(date.year(), date, requested, allow_over_limit, outstanding_balance)
    }

    /// Like [`request`](Self::request), charged to `year`'s budget
    pub fn request_in(
        &mut self,
        year: i32,
        date: NaiveDate,
        requested: f64,
        allow_over_limit: bool,
        outstanding_balance: f64,
    ) -> Result<PrepaymentOutcome> {
        if !requested.is_finite() || requested < 0.0 {
            return Err(EngineError::validation(
                "prepayment.amount",
                format!("must be non-negative, got {}", requested),
            ));
        }

        let max_over = self
            .policy
            .max_over_limit_pct
            .map(|pct| pct * self.base_principal);
        let penalty_rate = self.policy.penalty_rate_pct;
        let budget = self.budget_mut(year);
        let available = budget.available();

        if allow_over_limit {
            if let Some(max_over) = max_over {
                // The over-limit ceiling is a yearly allowance
                let absolute = available + (max_over - budget.over_limit).max(0.0);
                if requested > absolute + 1e-9 {
                    return Err(EngineError::PrepaymentExceedsLimit {
                        date,
                        requested,
                        limit: absolute,
                    });
                }
            }
        }

        let balance = outstanding_balance.max(0.0);
        let applied = if allow_over_limit {
            requested.min(balance)
        } else {
            requested.min(available).min(balance)
        };
        let within = applied.min(available);
        let over_limit = applied - within;
        let penalty = prepayment_penalty(over_limit, penalty_rate);

        budget.used += within;
        budget.over_limit += over_limit;
        budget.penalties += penalty;

        Ok(PrepaymentOutcome {
            requested,
            applied,
            over_limit,
            penalty,
            total_outlay: applied + penalty,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn tracker(carry_forward: bool) -> PrepaymentTracker {
        let policy = PrepaymentPolicy {
            annual_limit_pct: 0.10,
            carry_forward,
            ..Default::default()
        };
        PrepaymentTracker::new(policy, 400_000.0, date(2024, 1, 1))
    }

    #[test]
    fn test_within_limit_has_no_penalty() {
        let mut t = tracker(false);
        let out = t.request(date(2024, 6, 1), 20_000.0, false, 390_000.0).unwrap();
        assert_eq!(out.applied, 20_000.0);
        assert_eq!(out.over_limit, 0.0);
        assert_eq!(out.penalty, 0.0);
        assert_eq!(out.total_outlay, 20_000.0);
    }

    #[test]
    fn test_capped_without_election() {
        let mut t = tracker(false);
        let out = t.request(date(2024, 6, 1), 55_000.0, false, 390_000.0).unwrap();
        assert_eq!(out.applied, 40_000.0);
        assert_eq!(out.over_limit, 0.0);
        let again = t.request(date(2024, 9, 1), 5_000.0, false, 350_000.0).unwrap();
        assert_eq!(again.applied, 0.0);
    }

    #[test]
    fn test_over_limit_election_is_penalised() {
        let mut t = tracker(false);
        let out = t.request(date(2024, 6, 1), 50_000.0, true, 390_000.0).unwrap();
        assert_eq!(out.applied, 50_000.0);
        assert_eq!(out.over_limit, 10_000.0);
        assert_abs_diff_eq!(out.penalty, 150.0, epsilon = 1e-9);
        assert_abs_diff_eq!(out.total_outlay, 50_150.0, epsilon = 1e-9);
    }

    fn carry_tracker() -> PrepaymentTracker {
        let policy = PrepaymentPolicy {
            annual_limit_pct: 0.10,
            carry_forward: true,
            max_over_limit_pct: Some(0.05),
            ..Default::default()
        };
        PrepaymentTracker::new(policy, 400_000.0, date(2024, 1, 1))
    }

    #[test]
    fn test_carry_forward_with_over_limit_election() {
        let mut t = carry_tracker();
        t.request(date(2024, 3, 1), 15_000.0, false, 500_000.0).unwrap();

        // 25k unused carries in: 40k limit + 25k carry = 65k penalty-free
        let b = t.budget(2025);
        assert_eq!(b.carry_forward, 25_000.0);
        assert_eq!(b.available(), 65_000.0);

        // Ceiling is capacity plus 5% of principal
        let err = t.request(date(2025, 2, 1), 90_000.0, true, 500_000.0).unwrap_err();
        assert!(matches!(err, EngineError::PrepaymentExceedsLimit { limit, .. } if (limit - 85_000.0).abs() < 1e-9));

        let out = t.request(date(2025, 2, 1), 75_000.0, true, 500_000.0).unwrap();
        assert_eq!(out.applied, 75_000.0);
        assert_eq!(out.over_limit, 10_000.0);
        assert_abs_diff_eq!(out.penalty, 150.0, epsilon = 1e-9);

        // Only 10k of the yearly over-limit allowance is left
        let err = t.request(date(2025, 8, 1), 15_000.0, true, 500_000.0).unwrap_err();
        assert!(matches!(err, EngineError::PrepaymentExceedsLimit { limit, .. } if (limit - 10_000.0).abs() < 1e-9));
        let out = t.request(date(2025, 8, 1), 10_000.0, true, 500_000.0).unwrap();
        assert_eq!(out.over_limit, 10_000.0);

        // Carry-forward and the whole 2025 limit were used; nothing rolls on
        assert_eq!(t.budget(2025).unused_limit(), 0.0);
        let next = t.budget(2026);
        assert_eq!(next.carry_forward, 0.0);
        assert_eq!(next.available(), 40_000.0);
    }

    #[test]
    fn test_carry_forward_drawn_before_own_limit() {
        let mut t = carry_tracker();
        // No 2024 prepayments: the whole 40k carries into 2025
        let out = t.request(date(2025, 5, 1), 50_000.0, false, 500_000.0).unwrap();
        assert_eq!(out.applied, 50_000.0);
        assert_eq!(out.over_limit, 0.0);

        // 40k from carry-forward, 10k from the 2025 limit
        assert_eq!(t.budget(2025).unused_limit(), 30_000.0);
        assert_eq!(t.budget(2026).carry_forward, 30_000.0);
        // One year only: 2026's carry never reaches 2027 unless unused there
        t.request(date(2026, 5, 1), 70_000.0, false, 500_000.0).unwrap();
        assert_eq!(t.budget(2027).carry_forward, 0.0);
    }

    #[test]
    fn test_absolute_ceiling_rejects_request() {
        let policy = PrepaymentPolicy {
            annual_limit_pct: 0.10,
            max_over_limit_pct: Some(0.05),
            ..Default::default()
        };
        let mut t = PrepaymentTracker::new(policy, 400_000.0, date(2024, 1, 1));
        let err = t.request(date(2024, 6, 1), 70_000.0, true, 390_000.0).unwrap_err();
        assert!(matches!(err, EngineError::PrepaymentExceedsLimit { limit, .. } if (limit - 60_000.0).abs() < 1e-9));
        assert!(t.request(date(2024, 6, 1), 60_000.0, true, 390_000.0).is_ok());
    }

    #[test]
    fn test_limit_resets_each_year_without_carry_forward() {
        let mut t = tracker(false);
        t.request(date(2024, 6, 1), 10_000.0, false, 390_000.0).unwrap();
        let next = t.budget(2025);
        assert_eq!(next.carry_forward, 0.0);
        assert_eq!(next.available(), 40_000.0);
    }

    #[test]
    fn test_carry_forward_rolls_unused_limit() {
        let mut t = tracker(true);
        t.request(date(2024, 6, 1), 10_000.0, false, 390_000.0).unwrap();
        let next = t.budget(2025);
        assert_eq!(next.carry_forward, 30_000.0);
        assert_eq!(next.available(), 70_000.0);
    }

    #[test]
    fn test_carry_forward_is_consumed_first_and_lasts_one_year() {
        let mut t = tracker(true);
        t.request(date(2024, 6, 1), 40_000.0, false, 390_000.0).unwrap();
        // Nothing unused in 2024
        assert_eq!(t.budget(2025).carry_forward, 0.0);
        t.request(date(2025, 6, 1), 10_000.0, false, 340_000.0).unwrap();
        // 2026 gets only what remains of 2025's own limit
        assert_eq!(t.budget(2026).carry_forward, 30_000.0);
        // 2026 untouched: 2027 carries one full year only
        assert_eq!(t.budget(2027).carry_forward, 40_000.0);
    }

    #[test]
    fn test_capped_by_outstanding_balance() {
        let mut t = tracker(false);
        let out = t.request(date(2024, 6, 1), 30_000.0, false, 12_000.0).unwrap();
        assert_eq!(out.applied, 12_000.0);
    }

    #[test]
    fn test_negative_request_is_rejected() {
        let mut t = tracker(false);
        assert!(matches!(
            t.request(date(2024, 6, 1), -1.0, false, 1.0),
            Err(EngineError::Validation { .. })
        ));
    }

    #[test]
    fn test_rebase_updates_current_limit() {
        let mut t = tracker(false);
        t.request(date(2024, 3, 1), 5_000.0, false, 390_000.0).unwrap();
        t.rebase(200_000.0, date(2024, 7, 1));
        let budget = t.budget(2024);
        assert_eq!(budget.limit, 20_000.0);
        assert_eq!(budget.available(), 15_000.0);
    }

    proptest! {
        #[test]
        fn prop_penalty_formula_and_monotonicity(
            x in 0.0f64..1_000_000.0,
            dx in 0.0f64..100_000.0,
            p in 0.0f64..10.0,
            dp in 0.0f64..5.0,
        ) {
            let base = prepayment_penalty(x, p);
            prop_assert!((base - x * p / 100.0).abs() < 1e-6);
            prop_assert!(prepayment_penalty(x + dx, p) >= base);
            prop_assert!(prepayment_penalty(x, p + dp) >= base);
            prop_assert_eq!(prepayment_penalty(0.0, p), 0.0);
        }

        #[test]
        fn prop_used_never_exceeds_capacity_without_election(
            amounts in proptest::collection::vec(0.0f64..80_000.0, 1..8)
        ) {
            let mut t = tracker(true);
            for (i, amount) in amounts.iter().enumerate() {
                let d = date(2024 + (i as i32 / 2), 3 + (i as u32 % 2) * 6, 1);
                t.request(d, *amount, false, 1_000_000.0).unwrap();
            }
            for b in t.budgets() {
                prop_assert!(b.used <= b.limit + b.carry_forward + 1e-6);
                prop_assert_eq!(b.over_limit, 0.0);
            }
        }
    }
}
