//! Mortgage Strategy - projection and Monte Carlo engine for Canadian mortgages
//!
//! This library provides:
//! - Semi-annual compounding amortization with exact closed-form balances
//! - Annual prepayment privileges with carry-forward and over-limit penalties
//! - Chronological composition of renewals, refinances and lump-sum events
//! - A revolving credit-line ledger for leveraged investing
//! - Bracket-based marginal tax, interest deductions and investment tax drag
//! - Year-by-year deterministic projections of net worth
//! - Parallel, reproducible Monte Carlo simulation over stochastic rate paths
//!
//! The engine performs no I/O apart from the optional tax-table CSV loader.

pub mod error;
pub mod mortgage;
pub mod credit_line;
pub mod tax;
pub mod projection;
pub mod simulation;
pub mod scenario;

// Re-export commonly used types
pub use error::{EngineError, Result};
pub use mortgage::{AmortizationSchedule, MortgageTerms, PaymentFrequency, PrepaymentPolicy, TermSegment, Timeline};
pub use credit_line::{CreditLine, CreditLineConfig};
pub use tax::TaxEngine;
pub use projection::{ProjectionConfig, ProjectionEngine, ProjectionInput, ProjectionResult, Strategy, YearlyProjectionPoint};
pub use simulation::{MonteCarloConfig, MonteCarloResult, MonteCarloSimulator};
pub use scenario::{ScenarioConfig, ScenarioRunner};
