//! Working state of one projection run

use chrono::NaiveDate;
use log::debug;

use super::config::{ProjectionInput, RefundUse};
use crate::credit_line::CreditLine;
use crate::error::Result;
use crate::mortgage::{
    CreditLineAction, CreditLineEvent, LedgerEntryKind, MortgageLedger, PeriodPayment, PrepaymentEvent,
    Timeline, TimelineEvent,
};

/// Mutable state carried from payment to payment
///
/// Owned by a single run and dropped with it; Monte Carlo paths never share
/// one.
#[derive(Debug, Clone)]
pub struct ProjectionState {
    pub ledger: MortgageLedger,

    pub credit: Option<CreditLine>,

    /// Market value of the investment account
    pub investment: f64,

    /// Cash put into the investment account after the opening balance
    pub contributions: f64,

    /// Deductible credit-line interest charged in the current year
    pub year_deductible_interest: f64,

    /// Credit-line interest paid out of pocket
    pub credit_interest_paid: f64,

    pub tax_refunds: f64,

    /// Strategy prepayments, including refunds applied to the mortgage
    pub strategy_prepaid: f64,

    /// Last annual rate charged on the mortgage
    pub mortgage_rate: f64,
}

impl ProjectionState {
    /// Open the mortgage ledger and credit line for a fresh run
    pub fn open(timeline: &Timeline, input: &ProjectionInput) -> Result<Self> {
        let ledger = MortgageLedger::open(*timeline.initial_segment(), input.prepayment_policy)?;
        let credit = input.credit_line.as_ref().map(CreditLine::open).transpose()?;
        let mortgage_rate = ledger.contract_rate();

        Ok(Self {
            ledger,
            credit,
            investment: input.investment.opening_balance,
            contributions: 0.0,
            year_deductible_interest: 0.0,
            credit_interest_paid: 0.0,
            tax_refunds: 0.0,
            strategy_prepaid: 0.0,
            mortgage_rate,
        })
    }

    pub fn credit_balance(&self) -> f64 {
        self.credit.as_ref().map_or(0.0, |c| c.amount_owing())
    }

    pub fn credit_interest_charged(&self) -> f64 {
        self.credit.as_ref().map_or(0.0, |c| c.totals().interest_charged)
    }

    /// Apply a timeline event, routing credit-line movements to the facility
    pub fn apply_event(&mut self, event: &TimelineEvent) -> Result<()> {
        if let LedgerEntryKind::CreditLine(movement) = event.apply(&mut self.ledger)? {
            self.move_credit(&movement);
        }
        Ok(())
    }

    fn move_credit(&mut self, movement: &CreditLineEvent) {
        match movement.action {
            CreditLineAction::Draw => {
                self.draw_and_invest(movement.amount);
            }
            CreditLineAction::Repay => {
                if let Some(line) = self.credit.as_mut() {
                    line.repay(movement.amount);
                }
            }
        }
    }

    /// Borrow on the credit line and put the proceeds to work
    pub fn draw_and_invest(&mut self, amount: f64) -> f64 {
        let Some(line) = self.credit.as_mut() else {
            return 0.0;
        };
        let outcome = line.draw(amount);
        if outcome.unfulfilled > 0.0 {
            debug!(
                "credit draw capped: requested {:.2}, drawn {:.2}",
                outcome.requested, outcome.drawn
            );
        }
        self.investment += outcome.drawn;
        self.contributions += outcome.drawn;
        outcome.drawn
    }

    /// Credit-line bookkeeping after a scheduled mortgage payment
    pub fn after_payment(
        &mut self,
        payment: &PeriodPayment,
        credit_rate: Option<f64>,
        periods_per_year: u32,
        reborrow: bool,
    ) {
        let (Some(line), Some(rate)) = (self.credit.as_mut(), credit_rate) else {
            return;
        };
        let repaid = payment.principal.max(0.0);
        line.readvance(repaid);
        let charge = line.accrue(rate, periods_per_year);
        // Capitalised interest uses room first; only what is left is re-borrowed
        let room = line.available().min(repaid);

        self.year_deductible_interest += charge.interest;
        self.credit_interest_paid += charge.paid;
        if reborrow && room > 0.0 {
            self.draw_and_invest(room);
        }
    }

    /// Compound the investment account over one payment period
    pub fn grow_investment(&mut self, annual_return: f64, periods_per_year: u32) {
        let periodic = (1.0 + annual_return).powf(1.0 / periods_per_year.max(1) as f64) - 1.0;
        self.investment *= 1.0 + periodic;
    }

    /// Prepay the mortgage at a strategy's request
    pub fn strategy_prepay(&mut self, event: &PrepaymentEvent) -> Result<f64> {
        let applied = self.ledger.prepay(event)?;
        self.strategy_prepaid += applied.outcome.applied;
        Ok(applied.outcome.applied)
    }

    /// Put a year's tax refund to the chosen use
    pub fn apply_refund(
        &mut self,
        refund: f64,
        refund_use: RefundUse,
        date: NaiveDate,
        budget_year: i32,
    ) -> Result<()> {
        self.tax_refunds += refund;
        let leftover = match refund_use {
            RefundUse::Invest => refund,
            RefundUse::Prepay => {
                let event = PrepaymentEvent::new(date, refund).in_budget_year(budget_year);
                refund - self.strategy_prepay(&event)?
            }
            RefundUse::RepayCreditLine => match self.credit.as_mut() {
                Some(line) => refund - line.repay(refund),
                None => refund,
            },
        };
        self.investment += leftover;
        self.contributions += leftover;
        Ok(())
    }
}
