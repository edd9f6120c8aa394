//! Dated events applied to a mortgage over its life

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use super::prepayment::PrepaymentOutcome;
use super::terms::{PaymentFrequency, TermSegment, MAX_AMORTIZATION_MONTHS, MAX_ANNUAL_RATE};
use crate::error::{EngineError, Result};

/// Lump-sum principal prepayment
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PrepaymentEvent {
    pub date: NaiveDate,
    pub amount: f64,
    /// Pay above the annual privilege and accept the penalty
    #[serde(default)]
    pub allow_over_limit: bool,
    /// Calendar year whose privilege is drawn on; the year of `date` if unset
    #[serde(default)]
    pub budget_year: Option<i32>,
}

impl PrepaymentEvent {
    pub fn new(date: NaiveDate, amount: f64) -> Self {
        Self {
            date,
            amount,
            allow_over_limit: false,
            budget_year: None,
        }
    }

    /// Charge the prepayment to another calendar year's privilege
    pub fn in_budget_year(mut self, year: i32) -> Self {
        self.budget_year = Some(year);
        self
    }

    pub fn privilege_year(&self) -> i32 {
        self.budget_year.unwrap_or_else(|| self.date.year())
    }
}

/// A prepayment after the tracker has priced it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AppliedPrepayment {
    pub event: PrepaymentEvent,
    pub outcome: PrepaymentOutcome,
}

/// Cost of breaking the current term early
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub enum RefinancePenalty {
    #[default]
    None,
    /// Three months of interest at the outgoing rate
    ThreeMonthsInterest,
    Fixed(f64),
}

impl RefinancePenalty {
    pub fn amount(&self, balance: f64, outgoing_rate: f64) -> f64 {
        match self {
            RefinancePenalty::None => 0.0,
            RefinancePenalty::ThreeMonthsInterest => balance.max(0.0) * outgoing_rate * 3.0 / 12.0,
            RefinancePenalty::Fixed(amount) => amount.max(0.0),
        }
    }
}

/// Mid-term refinance: closes the active segment and opens a new one
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RefinancingEvent {
    pub date: NaiveDate,
    pub new_rate: f64,

    /// New amortization; the remaining amortization is kept when absent
    #[serde(default)]
    pub new_amortization_months: Option<u32>,

    #[serde(default)]
    pub new_frequency: Option<PaymentFrequency>,

    /// Extra amount borrowed at refinance
    #[serde(default)]
    pub additional_borrowing: f64,

    /// Principal paid down at refinance
    #[serde(default)]
    pub prepaid_amount: f64,

    #[serde(default)]
    pub penalty: RefinancePenalty,

    /// Add the break penalty to the new principal instead of paying it
    #[serde(default)]
    pub capitalize_penalty: bool,

    #[serde(default)]
    pub term_months: Option<u32>,
}

impl RefinancingEvent {
    pub fn new(date: NaiveDate, new_rate: f64) -> Self {
        Self {
            date,
            new_rate,
            new_amortization_months: None,
            new_frequency: None,
            additional_borrowing: 0.0,
            prepaid_amount: 0.0,
            penalty: RefinancePenalty::None,
            capitalize_penalty: false,
            term_months: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.new_rate.is_finite() || self.new_rate < 0.0 {
            return Err(EngineError::InvalidTerms(format!(
                "refinance rate must be non-negative, got {}",
                self.new_rate
            )));
        }
        if self.new_rate > MAX_ANNUAL_RATE {
            return Err(EngineError::validation(
                "refinance.new_rate",
                format!("{} exceeds the maximum of {}", self.new_rate, MAX_ANNUAL_RATE),
            ));
        }
        match self.new_amortization_months {
            Some(0) => {
                return Err(EngineError::InvalidTerms(
                    "refinance amortization must be positive".to_string(),
                ))
            }
            Some(m) if m > MAX_AMORTIZATION_MONTHS => {
                return Err(EngineError::validation(
                    "refinance.new_amortization_months",
                    format!("{} exceeds the maximum of {}", m, MAX_AMORTIZATION_MONTHS),
                ))
            }
            _ => {}
        }
        if !self.additional_borrowing.is_finite() || self.additional_borrowing < 0.0 {
            return Err(EngineError::validation(
                "refinance.additional_borrowing",
                format!("must be non-negative, got {}", self.additional_borrowing),
            ));
        }
        if !self.prepaid_amount.is_finite() || self.prepaid_amount < 0.0 {
            return Err(EngineError::validation(
                "refinance.prepaid_amount",
                format!("must be non-negative, got {}", self.prepaid_amount),
            ));
        }
        Ok(())
    }
}

/// What a refinance did to the mortgage
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RefinanceOutcome {
    pub balance_before: f64,
    pub balance_after: f64,
    pub penalty: f64,
    pub new_payment: f64,
    pub segment: TermSegment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CreditLineAction {
    /// Borrow and invest the proceeds
    Draw,
    /// Pay down the balance from outside cash
    Repay,
}

/// Manual movement on the secured credit line
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CreditLineEvent {
    pub date: NaiveDate,
    pub action: CreditLineAction,
    pub amount: f64,
}

/// Any dated event a projection can carry
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MortgageEvent {
    Prepayment(PrepaymentEvent),
    Refinance(RefinancingEvent),
    CreditLine(CreditLineEvent),
}

impl MortgageEvent {
    pub fn date(&self) -> NaiveDate {
        match self {
            MortgageEvent::Prepayment(e) => e.date,
            MortgageEvent::Refinance(e) => e.date,
            MortgageEvent::CreditLine(e) => e.date,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            MortgageEvent::Prepayment(e) if !e.amount.is_finite() || e.amount < 0.0 => Err(
                EngineError::validation("prepayment.amount", format!("must be non-negative, got {}", e.amount)),
            ),
            MortgageEvent::CreditLine(e) if !e.amount.is_finite() || e.amount < 0.0 => Err(
                EngineError::validation("credit_line_event.amount", format!("must be non-negative, got {}", e.amount)),
            ),
            MortgageEvent::Refinance(e) => e.validate(),
            _ => Ok(()),
        }
    }
}

impl From<PrepaymentEvent> for MortgageEvent {
    fn from(e: PrepaymentEvent) -> Self {
        MortgageEvent::Prepayment(e)
    }
}

impl From<RefinancingEvent> for MortgageEvent {
    fn from(e: RefinancingEvent) -> Self {
        MortgageEvent::Refinance(e)
    }
}

impl From<CreditLineEvent> for MortgageEvent {
    fn from(e: CreditLineEvent) -> Self {
        MortgageEvent::CreditLine(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_three_months_interest_penalty() {
        let p = RefinancePenalty::ThreeMonthsInterest.amount(300_000.0, 0.05);
        assert!((p - 3_750.0).abs() < 1e-9);
        assert_eq!(RefinancePenalty::None.amount(300_000.0, 0.05), 0.0);
        assert_eq!(RefinancePenalty::Fixed(-5.0).amount(300_000.0, 0.05), 0.0);
    }

    #[test]
    fn test_event_deserializes_with_defaults() {
        let json = r#"{"type":"Refinance","date":"2027-06-01","new_rate":0.039}"#;
        let event: MortgageEvent = serde_json::from_str(json).unwrap();
        match event {
            MortgageEvent::Refinance(r) => {
                assert_eq!(r.new_rate, 0.039);
                assert_eq!(r.penalty, RefinancePenalty::None);
                assert!(r.new_amortization_months.is_none());
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_refinance_terms_checked_up_front() {
        let date = NaiveDate::from_ymd_opt(2027, 1, 1).unwrap();
        let negative: MortgageEvent = RefinancingEvent::new(date, -0.02).into();
        assert!(matches!(negative.validate(), Err(EngineError::InvalidTerms(_))));

        let usurious: MortgageEvent = RefinancingEvent::new(date, 0.45).into();
        assert!(matches!(
            usurious.validate(),
            Err(EngineError::Validation { ref field, .. }) if field == "refinance.new_rate"
        ));

        let mut zero = RefinancingEvent::new(date, 0.04);
        zero.new_amortization_months = Some(0);
        assert!(matches!(zero.validate(), Err(EngineError::InvalidTerms(_))));

        let mut ok = RefinancingEvent::new(date, 0.04);
        ok.new_amortization_months = Some(240);
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn test_negative_amount_fails_validation() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let event: MortgageEvent = PrepaymentEvent::new(date, -10.0).into();
        assert!(matches!(event.validate(), Err(EngineError::Validation { .. })));
    }
}
