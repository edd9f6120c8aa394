//! Chronological composition of term segments and dated events
//!
//! The composer validates a mortgage's segment history and event list, then
//! fixes the canonical order in which events are applied:
//!
//! - events are ordered by date
//! - on the same date: prepayments, then renewals, then refinances, then
//!   credit-line movements, so a prepayment lowers the balance before a new
//!   payment is derived from it
//! - an event dated on a payment date is applied after that payment

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::events::{AppliedPrepayment, CreditLineEvent, MortgageEvent, PrepaymentEvent, RefinanceOutcome, RefinancingEvent};
use super::ledger::{LedgerTotals, MortgageLedger, PeriodPayment};
use super::prepayment::PrepaymentPolicy;
use super::terms::TermSegment;
use crate::error::{EngineError, Result};

/// An event placed on the timeline
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TimelineEvent {
    Prepayment(PrepaymentEvent),
    /// A supplied segment taking over at its start date
    Renewal(TermSegment),
    Refinance(RefinancingEvent),
    CreditLine(CreditLineEvent),
}

impl TimelineEvent {
    pub fn date(&self) -> NaiveDate {
        match self {
            TimelineEvent::Prepayment(e) => e.date,
            TimelineEvent::Renewal(s) => s.start_date,
            TimelineEvent::Refinance(e) => e.date,
            TimelineEvent::CreditLine(e) => e.date,
        }
    }

    /// Tie-break order for events sharing a date
    fn rank(&self) -> u8 {
        match self {
            TimelineEvent::Prepayment(_) => 0,
            TimelineEvent::Renewal(_) => 1,
            TimelineEvent::Refinance(_) => 2,
            TimelineEvent::CreditLine(_) => 3,
        }
    }

    /// Apply the event to a mortgage ledger
    ///
    /// Credit-line events do not touch the mortgage and are handed back
    /// unchanged for the caller to route.
    pub fn apply(&self, ledger: &mut MortgageLedger) -> Result<LedgerEntryKind> {
        Ok(match self {
            TimelineEvent::Prepayment(e) => LedgerEntryKind::Prepayment(ledger.prepay(e)?),
            TimelineEvent::Renewal(s) => LedgerEntryKind::Renewal(ledger.renew(s)?),
            TimelineEvent::Refinance(e) => LedgerEntryKind::Refinance(ledger.refinance(e)?),
            TimelineEvent::CreditLine(e) => LedgerEntryKind::CreditLine(*e),
        })
    }
}

impl From<MortgageEvent> for TimelineEvent {
    fn from(event: MortgageEvent) -> Self {
        match event {
            MortgageEvent::Prepayment(e) => TimelineEvent::Prepayment(e),
            MortgageEvent::Refinance(e) => TimelineEvent::Refinance(e),
            MortgageEvent::CreditLine(e) => TimelineEvent::CreditLine(e),
        }
    }
}

/// What happened at one ledger checkpoint
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum LedgerEntryKind {
    Payment(PeriodPayment),
    Prepayment(AppliedPrepayment),
    Renewal(TermSegment),
    Refinance(RefinanceOutcome),
    CreditLine(CreditLineEvent),
}

/// Balance checkpoint in the flat ledger
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub date: NaiveDate,
    /// Mortgage balance after the entry
    pub balance: f64,
    pub kind: LedgerEntryKind,
}

/// Contract-rate ledger produced by the composer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractLedger {
    pub entries: Vec<LedgerEntry>,
    /// Segments with opening balances recomputed from the ledger
    pub segments: Vec<TermSegment>,
    pub totals: LedgerTotals,
    pub paid_off_on: Option<NaiveDate>,
}

impl ContractLedger {
    /// Balance right after the last checkpoint on or before `date`
    pub fn balance_on(&self, date: NaiveDate) -> Option<f64> {
        self.entries
            .iter()
            .take_while(|e| e.date <= date)
            .last()
            .map(|e| e.balance)
    }
}

/// Validated, ordered view of a mortgage's life
#[derive(Debug, Clone, PartialEq)]
pub struct Timeline {
    initial: TermSegment,
    events: Vec<TimelineEvent>,
}

impl Timeline {
    /// Validate segments and events and fix their order
    ///
    /// The first segment is the origination; later ones are renewals whose
    /// opening balances are recomputed when the ledger reaches them.
    pub fn compose(segments: &[TermSegment], events: &[MortgageEvent]) -> Result<Self> {
        let initial = *segments
            .first()
            .ok_or_else(|| EngineError::validation("segments", "at least one term segment is required"))?;
        initial.terms.validate()?;

        for pair in segments.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            let overlaps = next.start_date <= prev.start_date
                || prev.end_date().is_some_and(|end| next.start_date < end);
            if overlaps {
                return Err(EngineError::OverlappingSegment {
                    start: next.start_date,
                    previous_start: prev.start_date,
                });
            }
            next.terms.validate()?;
        }

        let origination = initial.start_date;
        let mut ordered: Vec<TimelineEvent> = Vec::with_capacity(events.len() + segments.len());
        for event in events {
            event.validate()?;
            if event.date() < origination {
                return Err(EngineError::EventBeforeOrigination {
                    date: event.date(),
                    origination,
                });
            }
            ordered.push((*event).into());
        }
        ordered.extend(segments.iter().skip(1).copied().map(TimelineEvent::Renewal));

        // Stable: same-date, same-kind events keep their input order
        ordered.sort_by(|a, b| a.date().cmp(&b.date()).then(a.rank().cmp(&b.rank())));

        Ok(Self {
            initial,
            events: ordered,
        })
    }

    pub fn initial_segment(&self) -> &TermSegment {
        &self.initial
    }

    pub fn origination(&self) -> NaiveDate {
        self.initial.start_date
    }

    pub fn events(&self) -> &[TimelineEvent] {
        &self.events
    }

    pub fn cursor(&self) -> TimelineCursor<'_> {
        TimelineCursor {
            events: &self.events,
            next: 0,
        }
    }

    /// Walk every payment and event up to `until` at contract rates
    pub fn contract_ledger(&self, policy: PrepaymentPolicy, until: NaiveDate) -> Result<ContractLedger> {
        let mut ledger = MortgageLedger::open(self.initial, policy)?;
        let mut cursor = self.cursor();
        let mut entries = Vec::new();

        loop {
            let pay_date = ledger.next_payment_date();
            if pay_date > until {
                break;
            }
            for event in cursor.take_before(pay_date) {
                let kind = event.apply(&mut ledger)?;
                entries.push(LedgerEntry {
                    date: event.date(),
                    balance: ledger.balance(),
                    kind,
                });
            }
            if ledger.is_paid_off() {
                if cursor.peek().map_or(true, |e| e.date() > until) {
                    break;
                }
                // Nothing to pay; jump ahead to the next event
                ledger.pay(0.0);
                continue;
            }
            let payment = ledger.pay(ledger.contract_rate());
            entries.push(LedgerEntry {
                date: payment.date,
                balance: payment.balance,
                kind: LedgerEntryKind::Payment(payment),
            });
        }

        for event in cursor.take_through(until) {
            let kind = event.apply(&mut ledger)?;
            entries.push(LedgerEntry {
                date: event.date(),
                balance: ledger.balance(),
                kind,
            });
        }

        Ok(ContractLedger {
            entries,
            segments: ledger.segments().to_vec(),
            totals: *ledger.totals(),
            paid_off_on: ledger.paid_off_on(),
        })
    }
}

/// Linear reader over a timeline's ordered events
#[derive(Debug, Clone)]
pub struct TimelineCursor<'a> {
    events: &'a [TimelineEvent],
    next: usize,
}

impl<'a> TimelineCursor<'a> {
    /// Consume events dated strictly before `date`
    pub fn take_before(&mut self, date: NaiveDate) -> &'a [TimelineEvent] {
        self.take_while(|d| d < date)
    }

    /// Consume events dated on or before `date`
    pub fn take_through(&mut self, date: NaiveDate) -> &'a [TimelineEvent] {
        self.take_while(|d| d <= date)
    }

    pub fn peek(&self) -> Option<&'a TimelineEvent> {
        self.events.get(self.next)
    }

    pub fn is_exhausted(&self) -> bool {
        self.next >= self.events.len()
    }

    fn take_while(&mut self, keep: impl Fn(NaiveDate) -> bool) -> &'a [TimelineEvent] {
        let start = self.next;
        while self.next < self.events.len() && keep(self.events[self.next].date()) {
            self.next += 1;
        }
        &self.events[start..self.next]
    }
}
