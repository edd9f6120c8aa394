use approx::assert_abs_diff_eq;
use chrono::NaiveDate;
use mortgage_strategy::credit_line::{CreditLineConfig, CreditLineRate, CreditLineState};
use mortgage_strategy::mortgage::{LedgerEntryKind, MortgageEvent, PrepaymentEvent, RefinancingEvent};
use mortgage_strategy::projection::{
    InvestmentAssumption, PropertyAssumption, RatePath, RefundUse, ReturnAssumption,
};
use mortgage_strategy::tax::{IncomeBreakdown, TaxProfile};
use mortgage_strategy::{
    AmortizationSchedule, MortgageTerms, PaymentFrequency, PrepaymentPolicy, ProjectionConfig, ProjectionEngine,
    ProjectionInput, ScenarioRunner, Strategy, TaxEngine, TermSegment, Timeline,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn origination() -> TermSegment {
    let terms = MortgageTerms::new(400_000.0, 0.05, 300, PaymentFrequency::Monthly).unwrap();
    TermSegment::new(terms, date(2024, 1, 1), 400_000.0)
}

fn household() -> ProjectionInput {
    ProjectionInput {
        segments: vec![origination()],
        events: vec![],
        prepayment_policy: PrepaymentPolicy::default(),
        credit_line: Some(CreditLineConfig {
            state: CreditLineState {
                limit: 0.0,
                balance: 0.0,
                accrued_interest: 0.0,
            },
            rate: CreditLineRate::SpreadOverPath(0.01),
            capitalize_interest: true,
            readvanceable: true,
            max_limit: Some(520_000.0),
        }),
        tax: Some(TaxProfile {
            jurisdiction: "ON".to_string(),
            year: 2024,
            taxable_income: 140_000.0,
        }),
        property: PropertyAssumption {
            value: 650_000.0,
            annual_appreciation: 0.03,
        },
        investment: InvestmentAssumption {
            opening_balance: 0.0,
            annual_return: ReturnAssumption::Fixed(0.07),
            income_breakdown: Some(IncomeBreakdown {
                eligible_dividends: 0.3,
                capital_gains: 0.7,
                ..Default::default()
            }),
        },
    }
}

#[test]
fn lump_prepayment_at_month_24_keeps_contractual_payment() {
    let prepay: MortgageEvent = PrepaymentEvent::new(date(2026, 1, 1), 20_000.0).into();
    let timeline = Timeline::compose(&[origination()], &[prepay]).unwrap();
    let ledger = timeline
        .contract_ledger(PrepaymentPolicy::default(), date(2026, 6, 1))
        .unwrap();

    let schedule = AmortizationSchedule::new(&origination().terms).unwrap();
    assert_abs_diff_eq!(schedule.payment, 2_326.42, epsilon = 0.01);

    let after = ledger
        .entries
        .iter()
        .find(|e| matches!(e.kind, LedgerEntryKind::Prepayment(_)))
        .unwrap();
    assert_abs_diff_eq!(after.balance, schedule.balance_after(24) - 20_000.0, epsilon = 1e-6);

    let later: Vec<f64> = ledger
        .entries
        .iter()
        .filter_map(|e| match e.kind {
            LedgerEntryKind::Payment(p) if p.date > date(2026, 1, 1) => Some(p.payment),
            _ => None,
        })
        .collect();
    assert_eq!(later.len(), 5);
    assert!(later.iter().all(|p| (p - schedule.payment).abs() < 1e-9));
}

#[test]
fn full_amortization_reaches_zero_at_term_end() {
    let schedule = AmortizationSchedule::new(&origination().terms).unwrap();
    assert_abs_diff_eq!(schedule.balance_after(300), 0.0, epsilon = 1e-6);

    let runner = ScenarioRunner::new();
    let mut input = household();
    input.credit_line = None;
    input.investment = InvestmentAssumption::default();
    let result = runner
        .run(
            &input,
            ProjectionConfig {
                horizon_years: 25,
                strategy: Strategy::Baseline,
            },
        )
        .unwrap();
    assert_eq!(result.terminal().unwrap().mortgage_balance, 0.0);
    assert_eq!(result.paid_off_on, Some(date(2049, 1, 1)));
}

#[test]
fn deterministic_runs_are_byte_identical() {
    let tax = TaxEngine::canadian_defaults();
    let config = ProjectionConfig {
        horizon_years: 20,
        strategy: Strategy::Leveraged {
            initial_draw: 0.0,
            refund_use: RefundUse::Prepay,
            reborrow_principal: true,
        },
    };
    let rates: Vec<f64> = (0..240).map(|m| 0.05 + 0.01 * ((m as f64) / 40.0).sin()).collect();

    let engine = ProjectionEngine::new(&tax, config);
    let a = engine.project(&household(), RatePath::Monthly(&rates)).unwrap();
    let b = engine.project(&household(), RatePath::Monthly(&rates)).unwrap();

    let a = serde_json::to_string(&a.points).unwrap();
    let b = serde_json::to_string(&b.points).unwrap();
    assert_eq!(a, b);
}

#[test]
fn net_worth_identity_holds_every_year() {
    let runner = ScenarioRunner::new();
    let result = runner
        .run(
            &household(),
            ProjectionConfig {
                horizon_years: 30,
                strategy: Strategy::Leveraged {
                    initial_draw: 0.0,
                    refund_use: RefundUse::RepayCreditLine,
                    reborrow_principal: true,
                },
            },
        )
        .unwrap();

    assert_eq!(result.points.len(), 30);
    for p in &result.points {
        let expected = p.property_value - p.mortgage_balance + p.investment_balance - p.credit_line_balance;
        assert_abs_diff_eq!(p.net_worth, expected, epsilon = 1e-6);
        assert!(p.credit_line_balance <= 520_000.0 + 1e-6);
    }
    // The mortgage is converted into investment debt rather than repaid early
    let year10 = &result.points[9];
    assert!(year10.credit_line_balance > 50_000.0);
    assert!(year10.cumulative_tax_refunds > 0.0);
}

#[test]
fn refinance_mid_term_opens_new_rate() {
    let mut input = household();
    input.credit_line = None;
    let mut refi = RefinancingEvent::new(date(2027, 1, 1), 0.035);
    refi.additional_borrowing = 30_000.0;
    input.events.push(refi.into());

    let runner = ScenarioRunner::new();
    let result = runner
        .run(
            &input,
            ProjectionConfig {
                horizon_years: 5,
                strategy: Strategy::Baseline,
            },
        )
        .unwrap();
    let year3 = &result.points[2];
    let year4 = &result.points[3];
    assert_eq!(year3.mortgage_rate, 0.05);
    assert_eq!(year4.mortgage_rate, 0.035);
    // New borrowing lifts the balance; the lower rate cuts the payment
    assert!(year4.mortgage_balance > year3.mortgage_balance);
    assert!(year4.payment < year3.payment);
    assert_abs_diff_eq!(year4.cumulative_penalties, 0.0);
}

#[test]
fn leveraged_and_prepayment_strategies_compare_on_same_inputs() {
    let runner = ScenarioRunner::new();
    let configs = [
        ProjectionConfig {
            horizon_years: 10,
            strategy: Strategy::Baseline,
        },
        ProjectionConfig {
            horizon_years: 10,
            strategy: Strategy::Prepayment {
                annual_amount: 15_000.0,
                allow_over_limit: false,
            },
        },
        ProjectionConfig {
            horizon_years: 10,
            strategy: Strategy::Leveraged {
                initial_draw: 0.0,
                refund_use: RefundUse::Invest,
                reborrow_principal: true,
            },
        },
    ];
    let results = runner.compare(&household(), &configs).unwrap();
    let names: Vec<&str> = results.iter().map(|r| r.strategy.as_str()).collect();
    assert_eq!(names, ["baseline", "prepayment", "leveraged"]);

    let baseline = results[0].terminal().unwrap();
    let prepay = results[1].terminal().unwrap();
    let leveraged = results[2].terminal().unwrap();
    assert!(prepay.cumulative_interest < baseline.cumulative_interest);
    assert_abs_diff_eq!(leveraged.mortgage_balance, baseline.mortgage_balance, epsilon = 1e-6);
    assert!(leveraged.investment_balance > 0.0);
}
