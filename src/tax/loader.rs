//! CSV-based bracket table loader
//!
//! Loads bracket tables from data/tax/brackets.csv with the columns
//! `jurisdiction,year,lower,rate`, one row per bracket.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;

use super::tables::{TaxBracket, TaxTable};
use crate::error::Result;

/// Default path to the tax table directory
pub const DEFAULT_TAX_TABLE_PATH: &str = "data/tax";

/// File name of the bracket table inside the directory
pub const BRACKETS_FILE: &str = "brackets.csv";

#[derive(Debug, Deserialize)]
struct BracketRecord {
    jurisdiction: String,
    year: i32,
    lower: f64,
    rate: f64,
}

/// Load every table from `<dir>/brackets.csv`
pub fn load_tax_tables(dir: &Path) -> Result<Vec<TaxTable>> {
    let file = File::open(dir.join(BRACKETS_FILE))?;
    read_tax_tables(file)
}

/// Parse bracket rows from any reader, grouping them into validated tables
pub fn read_tax_tables<R: Read>(reader: R) -> Result<Vec<TaxTable>> {
    let mut reader = csv::Reader::from_reader(reader);
    let mut grouped: BTreeMap<(String, i32), Vec<TaxBracket>> = BTreeMap::new();

    for result in reader.deserialize() {
        let record: BracketRecord = result?;
        grouped
            .entry((record.jurisdiction.trim().to_uppercase(), record.year))
            .or_default()
            .push(TaxBracket {
                lower: record.lower,
                rate: record.rate,
            });
    }

    let mut tables = Vec::with_capacity(grouped.len());
    for ((jurisdiction, year), mut brackets) in grouped {
        brackets.sort_by(|a, b| a.lower.total_cmp(&b.lower));
        let table = TaxTable {
            jurisdiction,
            year,
            brackets,
        };
        table.validate()?;
        tables.push(table);
    }

    Ok(tables)
}
