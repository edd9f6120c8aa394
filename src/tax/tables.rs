//! Progressive bracket tables by jurisdiction and year

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Jurisdiction code of the federal table
pub const FEDERAL: &str = "CA";

/// Rate applying to income from `lower` up to the next bracket
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TaxBracket {
    pub lower: f64,
    pub rate: f64,
}

/// One jurisdiction's brackets for one tax year
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxTable {
    pub jurisdiction: String,
    pub year: i32,
    pub brackets: Vec<TaxBracket>,
}

impl TaxTable {
    /// Build a table from `(lower, rate)` pairs
    pub fn new(jurisdiction: &str, year: i32, brackets: &[(f64, f64)]) -> Result<Self> {
        let table = Self {
            jurisdiction: jurisdiction.to_string(),
            year,
            brackets: brackets
                .iter()
                .map(|&(lower, rate)| TaxBracket { lower, rate })
                .collect(),
        };
        table.validate()?;
        Ok(table)
    }

    pub fn validate(&self) -> Result<()> {
        let field = format!("tax_table.{}.{}", self.jurisdiction, self.year);
        let first = self
            .brackets
            .first()
            .ok_or_else(|| EngineError::validation(&field, "no brackets"))?;
        if first.lower != 0.0 {
            return Err(EngineError::validation(&field, "first bracket must start at zero"));
        }
        for pair in self.brackets.windows(2) {
            if pair[1].lower <= pair[0].lower {
                return Err(EngineError::validation(&field, "bracket thresholds must increase"));
            }
        }
        if self.brackets.iter().any(|b| !(0.0..=1.0).contains(&b.rate)) {
            return Err(EngineError::validation(&field, "rates must be within [0, 1]"));
        }
        Ok(())
    }

    /// Rate on the next dollar earned above `income`
    pub fn marginal_rate(&self, income: f64) -> f64 {
        let income = income.max(0.0);
        self.brackets
            .iter()
            .take_while(|b| b.lower <= income)
            .last()
            .map(|b| b.rate)
            .unwrap_or(0.0)
    }

    /// Total tax on `income`
    pub fn tax_payable(&self, income: f64) -> f64 {
        let income = income.max(0.0);
        let mut tax = 0.0;
        for (i, bracket) in self.brackets.iter().enumerate() {
            if income <= bracket.lower {
                break;
            }
            let upper = self
                .brackets
                .get(i + 1)
                .map(|b| b.lower)
                .unwrap_or(f64::INFINITY);
            tax += (income.min(upper) - bracket.lower) * bracket.rate;
        }
        tax
    }
}

/// Federal and provincial tables for 2024 and 2025
///
/// Provincial surtaxes and credits are not modelled.
pub(crate) fn canadian_tables() -> Vec<TaxTable> {
    let raw: &[(&str, i32, &[(f64, f64)])] = &[
        (
            FEDERAL,
            2024,
            &[(0.0, 0.15), (55_867.0, 0.205), (111_733.0, 0.26), (173_205.0, 0.29), (246_752.0, 0.33)],
        ),
        (
            FEDERAL,
            2025,
            &[(0.0, 0.15), (57_375.0, 0.205), (114_750.0, 0.26), (177_882.0, 0.29), (253_414.0, 0.33)],
        ),
        (
            "ON",
            2024,
            &[(0.0, 0.0505), (51_446.0, 0.0915), (102_894.0, 0.1116), (150_000.0, 0.1216), (220_000.0, 0.1316)],
        ),
        (
            "ON",
            2025,
            &[(0.0, 0.0505), (52_886.0, 0.0915), (105_775.0, 0.1116), (150_000.0, 0.1216), (220_000.0, 0.1316)],
        ),
        (
            "BC",
            2024,
            &[
                (0.0, 0.0506),
                (47_937.0, 0.077),
                (95_875.0, 0.105),
                (110_076.0, 0.1229),
                (133_664.0, 0.147),
                (181_232.0, 0.168),
                (252_752.0, 0.205),
            ],
        ),
        (
            "BC",
            2025,
            &[
                (0.0, 0.0506),
                (49_279.0, 0.077),
                (98_560.0, 0.105),
                (113_158.0, 0.1229),
                (137_407.0, 0.147),
                (186_306.0, 0.168),
                (259_829.0, 0.205),
            ],
        ),
        (
            "AB",
            2024,
            &[(0.0, 0.10), (148_269.0, 0.12), (177_922.0, 0.13), (237_230.0, 0.14), (355_845.0, 0.15)],
        ),
        (
            "AB",
            2025,
            &[(0.0, 0.10), (151_234.0, 0.12), (181_481.0, 0.13), (241_974.0, 0.14), (362_961.0, 0.15)],
        ),
    ];

    raw.iter()
        .map(|(jurisdiction, year, brackets)| TaxTable {
            jurisdiction: jurisdiction.to_string(),
            year: *year,
            brackets: brackets
                .iter()
                .map(|&(lower, rate)| TaxBracket { lower, rate })
                .collect(),
        })
        .collect()
}
