//! Payment-by-payment state of a mortgage
//!
//! The ledger owns the active term segment, the outstanding balance and the
//! prepayment tracker. It is stepped one payment at a time by the timeline
//! composer (at contract rates) and by the projection engine (at the rates of
//! a supplied path).

use chrono::NaiveDate;
use log::debug;
use serde::{Deserialize, Serialize};

use super::amortization::{periodic_rate, AmortizationSchedule, PAID_OFF_TOLERANCE};
use super::events::{AppliedPrepayment, PrepaymentEvent, RefinanceOutcome, RefinancingEvent};
use super::prepayment::{PrepaymentPolicy, PrepaymentTracker};
use super::terms::{MortgageTerms, TermSegment};
use crate::error::Result;

/// One scheduled payment as it was actually made
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeriodPayment {
    pub date: NaiveDate,
    /// 1-indexed count of payments since origination
    pub period: u32,
    /// Nominal annual rate the interest was charged at
    pub annual_rate: f64,
    pub payment: f64,
    pub interest: f64,
    /// Negative when the payment did not cover interest
    pub principal: f64,
    pub balance: f64,
}

/// Running totals since origination
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LedgerTotals {
    pub interest: f64,
    pub scheduled_principal: f64,
    pub prepaid: f64,
    pub prepayment_penalties: f64,
    pub refinance_penalties: f64,
    pub borrowed: f64,
}

impl LedgerTotals {
    /// All principal repaid, scheduled and prepaid
    pub fn principal(&self) -> f64 {
        self.scheduled_principal + self.prepaid
    }

    pub fn penalties(&self) -> f64 {
        self.prepayment_penalties + self.refinance_penalties
    }
}

#[derive(Debug, Clone)]
pub struct MortgageLedger {
    segment: TermSegment,
    history: Vec<TermSegment>,
    balance: f64,
    payment: f64,
    periods_in_segment: u32,
    total_periods: u32,
    tracker: PrepaymentTracker,
    totals: LedgerTotals,
    paid_off_on: Option<NaiveDate>,
}

impl MortgageLedger {
    /// Open a ledger on the first segment of a mortgage
    pub fn open(segment: TermSegment, policy: PrepaymentPolicy) -> Result<Self> {
        segment.terms.validate()?;
        policy.validate()?;
        let payment = contractual_payment(&segment.terms, segment.opening_balance)?;
        let tracker = PrepaymentTracker::new(policy, segment.opening_balance, segment.start_date);

        Ok(Self {
            segment,
            history: vec![segment],
            balance: segment.opening_balance,
            payment,
            periods_in_segment: 0,
            total_periods: 0,
            tracker,
            totals: LedgerTotals::default(),
            paid_off_on: None,
        })
    }

    pub fn balance(&self) -> f64 {
        self.balance
    }

    /// Contractual payment of the active segment
    pub fn payment(&self) -> f64 {
        self.payment
    }

    pub fn segment(&self) -> &TermSegment {
        &self.segment
    }

    /// Every segment opened so far, in order
    pub fn segments(&self) -> &[TermSegment] {
        &self.history
    }

    pub fn totals(&self) -> &LedgerTotals {
        &self.totals
    }

    pub fn tracker(&self) -> &PrepaymentTracker {
        &self.tracker
    }

    pub fn periods_elapsed(&self) -> u32 {
        self.total_periods
    }

    pub fn is_paid_off(&self) -> bool {
        self.balance <= PAID_OFF_TOLERANCE
    }

    pub fn paid_off_on(&self) -> Option<NaiveDate> {
        self.paid_off_on
    }

    /// Nominal rate of the active contract
    pub fn contract_rate(&self) -> f64 {
        self.segment.terms.annual_rate
    }

    pub fn next_payment_date(&self) -> NaiveDate {
        self.segment
            .terms
            .frequency
            .payment_date(self.segment.start_date, self.periods_in_segment + 1)
    }

    /// Amortization months left in the active segment
    pub fn remaining_months(&self) -> u32 {
        let n = self.segment.terms.frequency.periods_per_year() as f64;
        let elapsed = (self.periods_in_segment as f64 * 12.0 / n).round() as u32;
        self.segment.terms.amortization_months.saturating_sub(elapsed).max(1)
    }

    /// Make the next scheduled payment, charging interest at `annual_rate`
    ///
    /// The contractual payment does not move with the rate. If the rate rises
    /// far enough that interest exceeds the payment, the shortfall is added to
    /// the balance.
    pub fn pay(&mut self, annual_rate: f64) -> PeriodPayment {
        let date = self.next_payment_date();
        self.periods_in_segment += 1;
        self.total_periods += 1;

        let terms = &self.segment.terms;
        let rate = periodic_rate(annual_rate.max(0.0), terms.compounding, terms.frequency.periods_per_year());

        let opening = self.balance;
        let interest = opening * rate;
        let due = opening + interest;
        let payment = if opening <= 0.0 { 0.0 } else { self.payment.min(due) };
        let mut closing = due - payment;
        if closing <= PAID_OFF_TOLERANCE {
            closing = 0.0;
        }
        let principal = opening - closing;

        self.balance = closing;
        self.totals.interest += interest;
        self.totals.scheduled_principal += principal;
        self.mark_paid_off(date);

        PeriodPayment {
            date,
            period: self.total_periods,
            annual_rate,
            payment,
            interest,
            principal,
            balance: closing,
        }
    }

    /// Apply a lump-sum prepayment through the annual privilege tracker
    pub fn prepay(&mut self, event: &PrepaymentEvent) -> Result<AppliedPrepayment> {
        let outcome = self
            .tracker
            .request_in(
                event.privilege_year(),
                event.date,
                event.amount,
                event.allow_over_limit,
                self.balance,
            )?;

        self.balance = (self.balance - outcome.applied).max(0.0);
        if self.balance <= PAID_OFF_TOLERANCE {
            self.balance = 0.0;
        }
        self.totals.prepaid += outcome.applied;
        self.totals.prepayment_penalties += outcome.penalty;
        self.mark_paid_off(event.date);

        if outcome.applied > 0.0 && self.tracker.policy().recast_after_prepayment && !self.is_paid_off() {
            self.payment = self.recast_payment()?;
        }

        Ok(AppliedPrepayment {
            event: *event,
            outcome,
        })
    }

    /// Close the active segment and open a new one at the post-event balance
    pub fn refinance(&mut self, event: &RefinancingEvent) -> Result<RefinanceOutcome> {
        event.validate()?;

        let balance_before = self.balance;
        let penalty = event.penalty.amount(balance_before, self.contract_rate());
        let prepaid = event.prepaid_amount.min(balance_before);
        let mut balance = balance_before - prepaid + event.additional_borrowing;
        if event.capitalize_penalty {
            balance += penalty;
        }

        let terms = MortgageTerms {
            principal: balance,
            annual_rate: event.new_rate,
            compounding: self.segment.terms.compounding,
            amortization_months: event
                .new_amortization_months
                .unwrap_or_else(|| self.remaining_months()),
            frequency: event.new_frequency.unwrap_or(self.segment.terms.frequency),
        };
        let mut segment = TermSegment::new(terms, event.date, balance);
        segment.term_months = event.term_months;
        self.open_segment(segment)?;

        self.totals.prepaid += prepaid;
        self.totals.borrowed += event.additional_borrowing;
        self.totals.refinance_penalties += penalty;
        self.tracker.rebase(balance, event.date);

        debug!(
            "refinance on {}: balance {:.2} -> {:.2} at {:.4}, penalty {:.2}",
            event.date, balance_before, balance, event.new_rate, penalty
        );

        Ok(RefinanceOutcome {
            balance_before,
            balance_after: balance,
            penalty,
            new_payment: self.payment,
            segment: self.segment,
        })
    }

    /// Start a scheduled renewal segment at the current balance
    pub fn renew(&mut self, scheduled: &TermSegment) -> Result<TermSegment> {
        let mut segment = *scheduled;
        segment.opening_balance = self.balance;
        segment.terms.principal = self.balance;
        self.open_segment(segment)?;
        debug!(
            "renewal on {}: balance {:.2} at {:.4}",
            segment.start_date, segment.opening_balance, segment.terms.annual_rate
        );
        Ok(self.segment)
    }

    fn open_segment(&mut self, segment: TermSegment) -> Result<()> {
        segment.terms.validate()?;
        self.payment = contractual_payment(&segment.terms, segment.opening_balance)?;
        self.balance = segment.opening_balance;
        self.segment = segment;
        self.periods_in_segment = 0;
        self.history.push(segment);
        if self.balance > PAID_OFF_TOLERANCE {
            self.paid_off_on = None;
        }
        Ok(())
    }

    fn recast_payment(&self) -> Result<f64> {
        let terms = &self.segment.terms;
        let schedule = AmortizationSchedule::for_remaining(
            self.balance,
            terms.annual_rate,
            terms.compounding,
            terms.frequency,
            self.remaining_months(),
        )?;
        Ok(schedule.payment)
    }

    fn mark_paid_off(&mut self, date: NaiveDate) {
        if self.paid_off_on.is_none() && self.is_paid_off() {
            self.paid_off_on = Some(date);
        }
    }
}

fn contractual_payment(terms: &MortgageTerms, balance: f64) -> Result<f64> {
    let schedule = AmortizationSchedule::for_remaining(
        balance,
        terms.annual_rate,
        terms.compounding,
        terms.frequency,
        terms.amortization_months,
    )?;
    Ok(schedule.payment)
}
