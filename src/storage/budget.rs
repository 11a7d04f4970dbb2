//! Budget table
//!
//! Manages loading and saving budget entries to budget.csv

use std::path::PathBuf;

use crate::config::CsvFormat;
use crate::error::BookError;
use crate::models::{BudgetEntry, BudgetPeriod, Money};

use super::file_io::{at_line, field, read_csv_table, write_csv_atomic};

pub const BUDGET_HEADER: [&str; 3] = ["account", "period", "target"];

/// Table of budget entries
pub struct BudgetTable {
    path: PathBuf,
    format: CsvFormat,
}

impl BudgetTable {
    pub fn new(path: PathBuf, format: CsvFormat) -> Self {
        Self { path, format }
    }

    /// Load entries; duplicates are kept for the engine to reject
    pub fn load(&self) -> Result<Vec<BudgetEntry>, BookError> {
        let rows = read_csv_table(&self.path, self.format.delimiter_byte())?;
        let amount_format = self.format.amount_format();

        rows.into_iter()
            .map(|(line, record)| {
                let err = |message: String| at_line(&self.path, line, message);
                let period =
                    BudgetPeriod::parse(field(&record, 1)).map_err(|e| err(e.to_string()))?;
                let target = Money::parse_with(field(&record, 2), &amount_format)
                    .map_err(|e| err(e.to_string()))?;
                BudgetEntry::new(field(&record, 0), period, target).map_err(|e| err(e.to_string()))
            })
            .collect()
    }

    pub fn save(&self, entries: &[BudgetEntry]) -> Result<(), BookError> {
        let rows: Vec<Vec<String>> = entries
            .iter()
            .map(|entry| {
                vec![
                    entry.account.clone(),
                    entry.period.to_string(),
                    self.format.format_amount(entry.target),
                ]
            })
            .collect();

        write_csv_atomic(&self.path, self.format.delimiter_byte(), &BUDGET_HEADER, &rows)
    }
}
