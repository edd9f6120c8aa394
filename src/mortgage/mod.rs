//! Mortgage terms, amortization, prepayment privileges and event timelines

mod terms;
mod amortization;
mod prepayment;
mod events;
mod ledger;
mod timeline;

pub use terms::{Compounding, MortgageTerms, PaymentFrequency, TermSegment, MAX_AMORTIZATION_MONTHS, MAX_ANNUAL_RATE};
pub use amortization::{
    balance_after, level_payment, periodic_rate, periods_to_retire, AmortizationPeriod, AmortizationSchedule,
    PAID_OFF_TOLERANCE,
};
pub use prepayment::{
    prepayment_penalty, AnnualPrepaymentBudget, PrepaymentOutcome, PrepaymentPolicy, PrepaymentTracker,
    DEFAULT_ANNUAL_LIMIT_PCT, DEFAULT_PENALTY_RATE_PCT,
};
pub use events::{
    AppliedPrepayment, CreditLineAction, CreditLineEvent, MortgageEvent, PrepaymentEvent, RefinanceOutcome,
    RefinancePenalty, RefinancingEvent,
};
pub use ledger::{LedgerTotals, MortgageLedger, PeriodPayment};
pub use timeline::{ContractLedger, LedgerEntry, LedgerEntryKind, Timeline, TimelineCursor, TimelineEvent};
