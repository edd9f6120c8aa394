//! Closed-form amortization of a mortgage segment
//!
//! Canadian fixed-rate mortgages quote a nominal rate compounded semi-annually.
//! The quoted rate is first turned into the equivalent effective annual rate and
//! then into an effective rate per payment period, so every frequency produces
//! the same effective annual cost. All balances are computed analytically from
//! the opening balance, so results do not depend on accumulated rounding.

use serde::{Deserialize, Serialize};

use super::terms::{Compounding, MortgageTerms, PaymentFrequency};
use crate::error::{EngineError, Result};

/// Balances below this are treated as fully repaid
pub const PAID_OFF_TOLERANCE: f64 = 0.005;

/// Effective rate per payment period for a quoted nominal rate
///
/// `(1 + r/m)^(m/n) - 1` where `m` is the compounding frequency and `n`
/// the number of payments per year.
pub fn periodic_rate(annual_rate: f64, compounding: Compounding, payments_per_year: u32) -> f64 {
    let m = compounding.periods_per_year() as f64;
    let n = payments_per_year as f64;
    (1.0 + annual_rate / m).powf(m / n) - 1.0
}

/// Level payment that retires `balance` over `periods` at `rate` per period
pub fn level_payment(balance: f64, rate: f64, periods: u32) -> f64 {
    if periods == 0 {
        return balance;
    }
    if rate.abs() < 1e-15 {
        return balance / periods as f64;
    }
    balance * rate / (1.0 - (1.0 + rate).powi(-(periods as i32)))
}

/// Balance remaining after `k` level payments
pub fn balance_after(balance: f64, rate: f64, payment: f64, k: u32) -> f64 {
    if rate.abs() < 1e-15 {
        return (balance - payment * k as f64).max(0.0);
    }
    let growth = (1.0 + rate).powi(k as i32);
    (balance * growth - payment * (growth - 1.0) / rate).max(0.0)
}

/// Principal/interest split of one scheduled payment
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AmortizationPeriod {
    /// 1-indexed payment number
    pub period: u32,
    pub opening_balance: f64,
    pub payment: f64,
    pub interest: f64,
    pub principal: f64,
    pub closing_balance: f64,
}

/// Payment schedule for one balance under one set of terms
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AmortizationSchedule {
    pub opening_balance: f64,
    pub periodic_rate: f64,
    pub payment: f64,
    /// Scheduled payments until the balance reaches zero
    pub periods: u32,
    pub frequency: PaymentFrequency,
}

impl AmortizationSchedule {
    /// Schedule for a fresh set of terms
    pub fn new(terms: &MortgageTerms) -> Result<Self> {
        terms.validate()?;
        Self::for_remaining(
            terms.principal,
            terms.annual_rate,
            terms.compounding,
            terms.frequency,
            terms.amortization_months,
        )
    }

    /// Schedule for `balance` over the remaining amortization in months
    pub fn for_remaining(
        balance: f64,
        annual_rate: f64,
        compounding: Compounding,
        frequency: PaymentFrequency,
        remaining_months: u32,
    ) -> Result<Self> {
        if !annual_rate.is_finite() || annual_rate < 0.0 {
            return Err(EngineError::InvalidTerms(format!(
                "annual rate must be non-negative, got {}",
                annual_rate
            )));
        }
        if remaining_months == 0 {
            return Err(EngineError::InvalidTerms(
                "amortization must be positive".to_string(),
            ));
        }

        let n = frequency.periods_per_year();
        let rate = periodic_rate(annual_rate, compounding, n);

        let (payment, periods) = match frequency.acceleration_divisor() {
            Some(divisor) => {
                // Accelerated schedules pay a fraction of the monthly payment
                // more often, which shortens the amortization.
                let monthly_rate = periodic_rate(annual_rate, compounding, 12);
                let monthly = level_payment(balance, monthly_rate, remaining_months);
                let payment = monthly / divisor;
                (payment, periods_to_retire(balance, rate, payment))
            }
            None => {
                let periods = ((remaining_months as f64) * n as f64 / 12.0).round().max(1.0) as u32;
                (level_payment(balance, rate, periods), periods)
            }
        };

        Ok(Self {
            opening_balance: balance,
            periodic_rate: rate,
            payment,
            periods,
            frequency,
        })
    }

    /// Schedule keeping an agreed payment rather than deriving one
    pub fn with_payment(balance: f64, periodic_rate: f64, payment: f64, frequency: PaymentFrequency) -> Self {
        Self {
            opening_balance: balance,
            periodic_rate,
            payment,
            periods: periods_to_retire(balance, periodic_rate, payment),
            frequency,
        }
    }

    /// Balance after `k` payments
    pub fn balance_after(&self, k: u32) -> f64 {
        if k >= self.periods {
            return 0.0;
        }
        balance_after(self.opening_balance, self.periodic_rate, self.payment, k)
    }

    /// Split of the k-th payment (1-indexed)
    pub fn period(&self, k: u32) -> AmortizationPeriod {
        let opening = self.balance_after(k.saturating_sub(1));
        let closing = if k == 0 { opening } else { self.balance_after(k) };
        let interest = if k == 0 { 0.0 } else { opening * self.periodic_rate };
        let principal = opening - closing;
        AmortizationPeriod {
            period: k,
            opening_balance: opening,
            payment: if k == 0 { 0.0 } else { interest + principal },
            interest,
            principal,
            closing_balance: closing,
        }
    }

    /// Interest paid over the whole schedule
    pub fn total_interest(&self) -> f64 {
        (1..=self.periods).map(|k| self.period(k).interest).sum()
    }
}

/// Payments needed to retire `balance` with a level `payment`
///
/// Returns `u32::MAX` when the payment does not cover interest.
pub fn periods_to_retire(balance: f64, rate: f64, payment: f64) -> u32 {
    if balance <= PAID_OFF_TOLERANCE {
        return 0;
    }
    if payment <= 0.0 {
        return u32::MAX;
    }
    if rate.abs() < 1e-15 {
        return (balance / payment).ceil() as u32;
    }
    let ratio = 1.0 - balance * rate / payment;
    if ratio <= 0.0 {
        return u32::MAX;
    }
    let n = -ratio.ln() / (1.0 + rate).ln();
    // Absorb floating noise so an exact schedule does not gain a period
    (n - 1e-9).ceil().max(1.0) as u32
}
