//! Mortgage terms, payment frequencies and term segments

use chrono::{Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Upper bound on a quoted nominal rate accepted by the engine
pub const MAX_ANNUAL_RATE: f64 = 0.30;

/// Longest amortization accepted (40 years)
pub const MAX_AMORTIZATION_MONTHS: u32 = 480;

/// How often the quoted nominal rate compounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Compounding {
    /// Twice a year, the standard for Canadian fixed-rate mortgages
    #[default]
    SemiAnnual,
    /// Once per month
    Monthly,
    /// Once per year
    Annual,
}

impl Compounding {
    pub fn periods_per_year(&self) -> u32 {
        match self {
            Compounding::SemiAnnual => 2,
            Compounding::Monthly => 12,
            Compounding::Annual => 1,
        }
    }
}

/// Payment schedule of a mortgage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PaymentFrequency {
    #[default]
    Monthly,
    SemiMonthly,
    BiWeekly,
    Weekly,
    /// Half of the monthly payment, paid every two weeks
    AcceleratedBiWeekly,
    /// A quarter of the monthly payment, paid every week
    AcceleratedWeekly,
}

impl PaymentFrequency {
    /// Map a raw payments-per-year count onto a schedule
    pub fn from_periods_per_year(periods: i64) -> Result<Self> {
        match periods {
            12 => Ok(PaymentFrequency::Monthly),
            24 => Ok(PaymentFrequency::SemiMonthly),
            26 => Ok(PaymentFrequency::BiWeekly),
            52 => Ok(PaymentFrequency::Weekly),
            p if p <= 0 => Err(EngineError::InvalidTerms(format!(
                "payment frequency must be positive, got {}",
                p
            ))),
            p => Err(EngineError::InvalidTerms(format!(
                "unsupported payment frequency of {} payments per year",
                p
            ))),
        }
    }

    pub fn periods_per_year(&self) -> u32 {
        match self {
            PaymentFrequency::Monthly => 12,
            PaymentFrequency::SemiMonthly => 24,
            PaymentFrequency::BiWeekly | PaymentFrequency::AcceleratedBiWeekly => 26,
            PaymentFrequency::Weekly | PaymentFrequency::AcceleratedWeekly => 52,
        }
    }

    /// Divisor applied to the monthly payment for accelerated schedules
    pub fn acceleration_divisor(&self) -> Option<f64> {
        match self {
            PaymentFrequency::AcceleratedBiWeekly => Some(2.0),
            PaymentFrequency::AcceleratedWeekly => Some(4.0),
            _ => None,
        }
    }

    /// Date of the k-th payment (k = 0 is the start date itself)
    pub fn payment_date(&self, start: NaiveDate, k: u32) -> NaiveDate {
        let shifted = match self {
            PaymentFrequency::Monthly => start.checked_add_months(Months::new(k)),
            PaymentFrequency::SemiMonthly => start
                .checked_add_months(Months::new(k / 2))
                .and_then(|d| {
                    if k % 2 == 1 {
                        d.checked_add_days(Days::new(15))
                    } else {
                        Some(d)
                    }
                }),
            PaymentFrequency::BiWeekly | PaymentFrequency::AcceleratedBiWeekly => {
                start.checked_add_days(Days::new(14 * k as u64))
            }
            PaymentFrequency::Weekly | PaymentFrequency::AcceleratedWeekly => {
                start.checked_add_days(Days::new(7 * k as u64))
            }
        };
        shifted.unwrap_or(NaiveDate::MAX)
    }

    /// Number of payments falling on or before `date`
    pub fn payments_through(&self, start: NaiveDate, date: NaiveDate) -> u32 {
        if date <= start {
            return 0;
        }
        let days = (date - start).num_days() as f64;
        let period_days = 365.25 / self.periods_per_year() as f64;
        let mut k = (days / period_days).floor() as u32;
        while self.payment_date(start, k + 1) <= date {
            k += 1;
        }
        while k > 0 && self.payment_date(start, k) > date {
            k -= 1;
        }
        k
    }
}

/// Contractual terms of one mortgage segment
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MortgageTerms {
    /// Amount amortized by this segment
    pub principal: f64,

    /// Quoted nominal annual rate (0.05 = 5%)
    pub annual_rate: f64,

    #[serde(default)]
    pub compounding: Compounding,

    /// Amortization length in months
    pub amortization_months: u32,

    #[serde(default)]
    pub frequency: PaymentFrequency,
}

impl MortgageTerms {
    /// Build validated terms with semi-annual compounding
    pub fn new(
        principal: f64,
        annual_rate: f64,
        amortization_months: u32,
        frequency: PaymentFrequency,
    ) -> Result<Self> {
        let terms = Self {
            principal,
            annual_rate,
            compounding: Compounding::SemiAnnual,
            amortization_months,
            frequency,
        };
        terms.validate()?;
        Ok(terms)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.annual_rate.is_finite() || self.annual_rate < 0.0 {
            return Err(EngineError::InvalidTerms(format!(
                "annual rate must be non-negative, got {}",
                self.annual_rate
            )));
        }
        if self.amortization_months == 0 {
            return Err(EngineError::InvalidTerms(
                "amortization must be positive".to_string(),
            ));
        }
        if self.annual_rate > MAX_ANNUAL_RATE {
            return Err(EngineError::validation(
                "annual_rate",
                format!("{} exceeds the maximum of {}", self.annual_rate, MAX_ANNUAL_RATE),
            ));
        }
        if self.amortization_months > MAX_AMORTIZATION_MONTHS {
            return Err(EngineError::validation(
                "amortization_months",
                format!(
                    "{} exceeds the maximum of {}",
                    self.amortization_months, MAX_AMORTIZATION_MONTHS
                ),
            ));
        }
        if !self.principal.is_finite() || self.principal < 0.0 {
            return Err(EngineError::validation(
                "principal",
                format!("must be non-negative, got {}", self.principal),
            ));
        }
        Ok(())
    }

    /// Total number of scheduled payments over the amortization
    pub fn amortization_periods(&self) -> u32 {
        let periods = self.amortization_months as f64 * self.frequency.periods_per_year() as f64 / 12.0;
        periods.round().max(1.0) as u32
    }

    /// Same terms applied to a different opening balance
    pub fn with_principal(&self, principal: f64) -> Self {
        Self { principal, ..*self }
    }
}

/// A span of the mortgage's life governed by one set of terms
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TermSegment {
    pub terms: MortgageTerms,

    /// Date the terms take effect
    pub start_date: NaiveDate,

    /// Balance the terms apply to at `start_date`
    pub opening_balance: f64,

    /// Contract term length in months (e.g. 60 for a five-year term)
    #[serde(default)]
    pub term_months: Option<u32>,
}

impl TermSegment {
    pub fn new(terms: MortgageTerms, start_date: NaiveDate, opening_balance: f64) -> Self {
        Self {
            terms,
            start_date,
            opening_balance,
            term_months: None,
        }
    }

    pub fn with_term_months(mut self, months: u32) -> Self {
        self.term_months = Some(months);
        self
    }

    /// Maturity date of the contract term, if one was given
    pub fn end_date(&self) -> Option<NaiveDate> {
        self.term_months
            .and_then(|m| self.start_date.checked_add_months(Months::new(m)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_rejects_negative_rate() {
        let result = MortgageTerms::new(400_000.0, -0.01, 300, PaymentFrequency::Monthly);
        assert!(matches!(result, Err(EngineError::InvalidTerms(_))));
    }

    #[test]
    fn test_rejects_zero_amortization() {
        let result = MortgageTerms::new(400_000.0, 0.05, 0, PaymentFrequency::Monthly);
        assert!(matches!(result, Err(EngineError::InvalidTerms(_))));
    }

    #[test]
    fn test_rejects_negative_principal() {
        let result = MortgageTerms::new(-1.0, 0.05, 300, PaymentFrequency::Monthly);
        assert!(matches!(result, Err(EngineError::Validation { ref field, .. }) if field == "principal"));
    }

    #[test]
    fn test_non_positive_frequency_is_invalid_terms() {
        assert!(matches!(
            PaymentFrequency::from_periods_per_year(0),
            Err(EngineError::InvalidTerms(_))
        ));
        assert!(matches!(
            PaymentFrequency::from_periods_per_year(-12),
            Err(EngineError::InvalidTerms(_))
        ));
        assert_eq!(
            PaymentFrequency::from_periods_per_year(26).unwrap(),
            PaymentFrequency::BiWeekly
        );
    }

    #[test]
    fn test_amortization_periods() {
        let monthly = MortgageTerms::new(1.0, 0.05, 300, PaymentFrequency::Monthly).unwrap();
        assert_eq!(monthly.amortization_periods(), 300);
        let biweekly = MortgageTerms::new(1.0, 0.05, 300, PaymentFrequency::BiWeekly).unwrap();
        assert_eq!(biweekly.amortization_periods(), 650);
    }

    #[test]
    fn test_payments_through_monthly() {
        let start = date(2024, 1, 15);
        let freq = PaymentFrequency::Monthly;
        assert_eq!(freq.payments_through(start, start), 0);
        assert_eq!(freq.payments_through(start, date(2024, 2, 14)), 0);
        assert_eq!(freq.payments_through(start, date(2024, 2, 15)), 1);
        assert_eq!(freq.payments_through(start, date(2026, 1, 15)), 24);
    }

    #[test]
    fn test_payments_through_biweekly() {
        let start = date(2024, 1, 1);
        let freq = PaymentFrequency::BiWeekly;
        assert_eq!(freq.payments_through(start, date(2024, 1, 14)), 0);
        assert_eq!(freq.payments_through(start, date(2024, 1, 15)), 1);
        assert_eq!(freq.payments_through(start, date(2024, 12, 31)), 26);
    }

    #[test]
    fn test_segment_end_date() {
        let terms = MortgageTerms::new(1.0, 0.05, 300, PaymentFrequency::Monthly).unwrap();
        let seg = TermSegment::new(terms, date(2024, 3, 1), 1.0).with_term_months(60);
        assert_eq!(seg.end_date(), Some(date(2029, 3, 1)));
    }
}
