//! Deterministic projection engine for one interest-rate path

mod config;
mod state;
mod engine;
mod points;

pub use config::{
    InvestmentAssumption, ProjectionConfig, ProjectionInput, PropertyAssumption, RefundUse, ReturnAssumption,
    Strategy, CANONICAL_HORIZONS, MAX_HORIZON_YEARS,
};
pub use state::ProjectionState;
pub use engine::{ProjectionEngine, RatePath};
pub use points::{ProjectionResult, ProjectionSummary, YearlyProjectionPoint};
