//! Core projection engine for year-by-year mortgage strategy projections

use chrono::{Datelike, Months, NaiveDate};
use log::debug;

use super::config::{ProjectionConfig, ProjectionInput, RefundUse, Strategy};
use super::points::{ProjectionResult, YearlyProjectionPoint};
use super::state::ProjectionState;
use crate::error::{EngineError, Result};
use crate::mortgage::{PaymentFrequency, PrepaymentEvent, Timeline};
use crate::tax::TaxEngine;

/// Interest rates charged on the mortgage during a run
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RatePath<'a> {
    /// Each segment's contract rate
    Contract,
    /// One annual rate for the whole horizon
    Constant(f64),
    /// Annual rate per month from origination; the last rate holds past the end
    Monthly(&'a [f64]),
}

impl RatePath<'_> {
    /// Rate for the 1-indexed `month` since origination
    pub fn rate_for(&self, month: u32, contract_rate: f64) -> f64 {
        match self {
            RatePath::Contract => contract_rate,
            RatePath::Constant(r) => *r,
            RatePath::Monthly(rates) => {
                if rates.is_empty() {
                    return contract_rate;
                }
                let idx = (month.max(1) as usize - 1).min(rates.len() - 1);
                rates[idx]
            }
        }
    }
}

/// Tax factors resolved once per run
#[derive(Debug, Clone, Copy)]
struct TaxFactors {
    /// Share of investment return lost to tax each year
    investment_drag: f64,
}

/// Main projection engine
///
/// Holds read-only tax tables by reference so that many runs, including
/// parallel Monte Carlo paths, can share one set.
#[derive(Debug, Clone, Copy)]
pub struct ProjectionEngine<'a> {
    tax: &'a TaxEngine,
    config: ProjectionConfig,
}

impl<'a> ProjectionEngine<'a> {
    /// Create a new projection engine with given tax tables and config
    pub fn new(tax: &'a TaxEngine, config: ProjectionConfig) -> Self {
        Self { tax, config }
    }

    pub fn config(&self) -> &ProjectionConfig {
        &self.config
    }

    /// Validate inputs, then project along `rates`
    pub fn project(&self, input: &ProjectionInput, rates: RatePath<'_>) -> Result<ProjectionResult> {
        input.validate()?;
        self.config.validate(input)?;
        let timeline = Timeline::compose(&input.segments, &input.events)?;
        self.project_timeline(input, &timeline, rates)
    }

    /// Project an already validated input along `rates`
    ///
    /// The timeline is composed once by the caller and walked here, which is
    /// what lets the Monte Carlo simulator skip re-validation per path.
    pub fn project_timeline(
        &self,
        input: &ProjectionInput,
        timeline: &Timeline,
        rates: RatePath<'_>,
    ) -> Result<ProjectionResult> {
        let strategy = self.config.strategy;
        let factors = self.tax_factors(input)?;
        let origination = timeline.origination();
        let mut state = ProjectionState::open(timeline, input)?;
        let mut cursor = timeline.cursor();
        let mut result = ProjectionResult::new(strategy.name());

        let (reborrow, refund_use) = match strategy {
            Strategy::Leveraged {
                initial_draw,
                refund_use,
                reborrow_principal,
            } => {
                if initial_draw > 0.0 {
                    state.draw_and_invest(initial_draw);
                }
                (reborrow_principal, refund_use)
            }
            _ => (false, RefundUse::Invest),
        };

        for year in 1..=self.config.horizon_years {
            let year_end = origination
                .checked_add_months(Months::new(12 * year))
                .ok_or_else(|| EngineError::validation("horizon_years", "projection runs past the calendar"))?;

            // Scheduled payments, with events dated before each one applied first
            loop {
                let pay_date = state.ledger.next_payment_date();
                if pay_date > year_end {
                    break;
                }
                for event in cursor.take_before(pay_date) {
                    state.apply_event(event)?;
                }

                let month = PaymentFrequency::Monthly.payments_through(origination, pay_date);
                let path_rate = rates.rate_for(month, state.ledger.contract_rate());
                let periods = state.ledger.segment().terms.frequency.periods_per_year();

                let payment = state.ledger.pay(path_rate);
                state.mortgage_rate = path_rate;

                let credit_rate = input.credit_line.as_ref().map(|c| c.rate.resolve(path_rate));
                state.after_payment(&payment, credit_rate, periods, reborrow);

                let gross = input.investment.annual_return.resolve(path_rate);
                state.grow_investment(gross * (1.0 - factors.investment_drag), periods);
            }

            // Events after the last payment of the year
            for event in cursor.take_through(year_end) {
                state.apply_event(event)?;
            }

            // Year-end cash decisions land on the anniversary after its payment and
            // events, charged to the calendar year that just closed
            let budget_year = year_end.pred_opt().unwrap_or(year_end).year();

            if let Strategy::Prepayment {
                annual_amount,
                allow_over_limit,
            } = strategy
            {
                if annual_amount > 0.0 && !state.ledger.is_paid_off() {
                    state.strategy_prepay(&PrepaymentEvent {
                        date: year_end,
                        amount: annual_amount,
                        allow_over_limit,
                        budget_year: Some(budget_year),
                    })?;
                }
            }

            if let Some(profile) = &input.tax {
                if state.year_deductible_interest > 0.0 {
                    let refund = self.tax.deduction_value(state.year_deductible_interest, profile)?;
                    state.apply_refund(refund, refund_use, year_end, budget_year)?;
                }
            }
            state.year_deductible_interest = 0.0;

            result.add_point(self.point(year, year_end, &state, input));
        }

        result.paid_off_on = state.ledger.paid_off_on();
        debug!(
            "projected {} years under {}: balance {:.2}, net worth {:.2}",
            self.config.horizon_years,
            strategy.name(),
            state.ledger.balance(),
            result.terminal().map(|p| p.net_worth).unwrap_or(0.0)
        );
        Ok(result)
    }

    fn tax_factors(&self, input: &ProjectionInput) -> Result<TaxFactors> {
        let investment_drag = match (&input.investment.income_breakdown, &input.tax) {
            (Some(breakdown), Some(profile)) => self.tax.investment_tax_rate(breakdown, profile)?,
            _ => 0.0,
        };
        // Resolve the profile's tables up front so a missing one fails before any work
        if let Some(profile) = &input.tax {
            self.tax.profile_marginal_rate(profile)?;
        }
        Ok(TaxFactors { investment_drag })
    }

    fn point(
        &self,
        year: u32,
        date: NaiveDate,
        state: &ProjectionState,
        input: &ProjectionInput,
    ) -> YearlyProjectionPoint {
        let ledger = &state.ledger;
        let totals = ledger.totals();
        let property_value = input.property.value_at(year);
        let mortgage_balance = ledger.balance();
        let credit_line_balance = state.credit_balance();

        YearlyProjectionPoint {
            year,
            date,
            mortgage_balance,
            mortgage_rate: state.mortgage_rate,
            payment: if ledger.is_paid_off() { 0.0 } else { ledger.payment() },
            cumulative_principal: totals.principal(),
            cumulative_interest: totals.interest,
            cumulative_prepayments: totals.prepaid,
            cumulative_penalties: totals.penalties(),
            investment_balance: state.investment,
            credit_line_balance,
            cumulative_credit_interest: state.credit_interest_charged(),
            cumulative_tax_refunds: state.tax_refunds,
            property_value,
            net_worth: property_value - mortgage_balance + state.investment - credit_line_balance,
        }
    }
}
