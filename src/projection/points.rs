//! Year-indexed output of a projection run

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// State of the household's balance sheet at the end of one projection year
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct YearlyProjectionPoint {
    /// Projection year (1-indexed)
    pub year: u32,
    /// Anniversary of origination closing the year
    pub date: NaiveDate,

    pub mortgage_balance: f64,
    pub mortgage_rate: f64,
    /// Contractual payment in force at year end
    pub payment: f64,
    pub cumulative_principal: f64,
    pub cumulative_interest: f64,
    pub cumulative_prepayments: f64,
    pub cumulative_penalties: f64,

    pub investment_balance: f64,
    /// Balance plus any accrued, uncapitalised interest
    pub credit_line_balance: f64,
    pub cumulative_credit_interest: f64,
    pub cumulative_tax_refunds: f64,

    pub property_value: f64,
    /// Home equity plus investments less the credit line
    pub net_worth: f64,
}

impl YearlyProjectionPoint {
    pub fn home_equity(&self) -> f64 {
        self.property_value - self.mortgage_balance
    }
}

/// Complete projection result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionResult {
    /// Strategy the points were produced under
    pub strategy: String,

    /// One point per projection year
    pub points: Vec<YearlyProjectionPoint>,

    /// Date the balance first reached zero, if within the horizon
    pub paid_off_on: Option<NaiveDate>,
}

impl ProjectionResult {
    pub fn new(strategy: &str) -> Self {
        Self {
            strategy: strategy.to_string(),
            points: Vec::new(),
            paid_off_on: None,
        }
    }

    /// Add a year-end point
    pub fn add_point(&mut self, point: YearlyProjectionPoint) {
        self.points.push(point);
    }

    /// Last point of the horizon
    pub fn terminal(&self) -> Option<&YearlyProjectionPoint> {
        self.points.last()
    }

    pub fn is_paid_off(&self) -> bool {
        self.paid_off_on.is_some()
    }

    /// Get summary statistics
    pub fn summary(&self) -> ProjectionSummary {
        let last = self.points.last();
        let first_paid_off_year = self
            .points
            .iter()
            .find(|p| p.mortgage_balance <= 0.0)
            .map(|p| p.year);

        ProjectionSummary {
            strategy: self.strategy.clone(),
            years: self.points.len() as u32,
            final_balance: last.map(|p| p.mortgage_balance).unwrap_or(0.0),
            total_interest: last.map(|p| p.cumulative_interest).unwrap_or(0.0),
            total_penalties: last.map(|p| p.cumulative_penalties).unwrap_or(0.0),
            final_investment: last.map(|p| p.investment_balance).unwrap_or(0.0),
            final_credit_line: last.map(|p| p.credit_line_balance).unwrap_or(0.0),
            total_tax_refunds: last.map(|p| p.cumulative_tax_refunds).unwrap_or(0.0),
            final_net_worth: last.map(|p| p.net_worth).unwrap_or(0.0),
            paid_off_on: self.paid_off_on,
            first_paid_off_year,
        }
    }
}

/// Headline figures for a projection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionSummary {
    pub strategy: String,
    pub years: u32,
    pub final_balance: f64,
    pub total_interest: f64,
    pub total_penalties: f64,
    pub final_investment: f64,
    pub final_credit_line: f64,
    pub total_tax_refunds: f64,
    pub final_net_worth: f64,
    pub paid_off_on: Option<NaiveDate>,
    pub first_paid_off_year: Option<u32>,
}
