//! Error types shared by every engine component

use chrono::NaiveDate;
use thiserror::Error;

/// Failure outcomes returned by the engine
#[derive(Debug, Error)]
pub enum EngineError {
    /// Mortgage terms that cannot be amortized
    #[error("invalid mortgage terms: {0}")]
    InvalidTerms(String),

    /// Malformed or out-of-range input, rejected before computation
    #[error("invalid input: {field}: {reason}")]
    Validation { field: String, reason: String },

    /// Term segments that are not strictly sequential
    #[error("term segment starting {start} overlaps the segment starting {previous_start}")]
    OverlappingSegment {
        start: NaiveDate,
        previous_start: NaiveDate,
    },

    /// An event dated before the mortgage was originated
    #[error("event dated {date} precedes mortgage origination on {origination}")]
    EventBeforeOrigination {
        date: NaiveDate,
        origination: NaiveDate,
    },

    /// Prepayment above the absolute ceiling, even with the penalty elected
    #[error("prepayment of {requested:.2} on {date} exceeds the absolute limit of {limit:.2}")]
    PrepaymentExceedsLimit {
        date: NaiveDate,
        requested: f64,
        limit: f64,
    },

    /// No bracket table for the requested jurisdiction and year
    #[error("no tax table for jurisdiction {jurisdiction} in {year}")]
    UnknownTaxTable { jurisdiction: String, year: i32 },

    /// Bracket table file could not be read or parsed
    #[error("failed to load tax tables: {0}")]
    TaxTableLoad(String),

    /// A single Monte Carlo path failed; fatal to the whole run
    #[error("monte carlo path {path} failed: {source}")]
    PathFailed {
        path: usize,
        #[source]
        source: Box<EngineError>,
    },
}

impl EngineError {
    /// Shorthand for a validation failure on a named field
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        EngineError::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl From<csv::Error> for EngineError {
    fn from(e: csv::Error) -> Self {
        EngineError::TaxTableLoad(e.to_string())
    }
}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        EngineError::TaxTableLoad(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_names_field() {
        let err = EngineError::validation("principal", "must be positive");
        assert_eq!(err.to_string(), "invalid input: principal: must be positive");
    }

    #[test]
    fn test_path_failure_keeps_source() {
        let inner = EngineError::UnknownTaxTable {
            jurisdiction: "QC".into(),
            year: 2024,
        };
        let err = EngineError::PathFailed {
            path: 7,
            source: Box::new(inner),
        };
        let msg = err.to_string();
        assert!(msg.contains("path 7"));
        assert!(msg.contains("QC"));
    }
}
