//! Tax tables and the calculations built on them

mod tables;
mod engine;
pub mod loader;

pub use tables::{TaxBracket, TaxTable, FEDERAL};
pub use engine::{IncomeBreakdown, InvestmentTaxTreatment, TaxEngine, TaxProfile};
pub use loader::{load_tax_tables, DEFAULT_TAX_TABLE_PATH};

use std::path::Path;

use crate::error::Result;

impl TaxEngine {
    /// Load tables from CSV in the default location (data/tax/)
    pub fn from_csv() -> Result<Self> {
        Self::from_csv_path(Path::new(DEFAULT_TAX_TABLE_PATH))
    }

    /// Load tables from CSV in a specific directory
    pub fn from_csv_path(path: &Path) -> Result<Self> {
        Ok(Self::new(load_tax_tables(path)?))
    }
}
