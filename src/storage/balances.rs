//! Balance assertion table (balances.csv)

use std::path::PathBuf;

use crate::config::CsvFormat;
use crate::error::BookError;
use crate::models::{BalanceAssertion, Money};

use super::accounts::{parse_date, DATE_FORMAT};
use super::file_io::{at_line, field, read_csv_table, write_csv_atomic};

pub const BALANCE_HEADER: [&str; 3] = ["date", "account", "balance"];

pub struct BalanceTable {
    path: PathBuf,
    format: CsvFormat,
}

impl BalanceTable {
    pub fn new(path: PathBuf, format: CsvFormat) -> Self {
        Self { path, format }
    }

    pub fn load(&self) -> Result<Vec<BalanceAssertion>, BookError> {
        let rows = read_csv_table(&self.path, self.format.delimiter_byte())?;
        let amount_format = self.format.amount_format();

        rows.into_iter()
            .map(|(line, record)| {
                let err = |message: String| at_line(&self.path, line, message);
                let date = parse_date(field(&record, 0)).map_err(&err)?;
                let balance = Money::parse_with(field(&record, 2), &amount_format)
                    .map_err(|e| err(e.to_string()))?;
                BalanceAssertion::new(date, field(&record, 1), balance)
                    .map_err(|e| err(e.to_string()))
            })
            .collect()
    }

    /// Save assertions sorted by date, then account
    pub fn save(&self, assertions: &[BalanceAssertion]) -> Result<(), BookError> {
        let mut sorted: Vec<&BalanceAssertion> = assertions.iter().collect();
        sorted.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.account.cmp(&b.account)));

        let rows: Vec<Vec<String>> = sorted
            .into_iter()
            .map(|a| {
                vec![
                    a.date.format(DATE_FORMAT).to_string(),
                    a.account.clone(),
                    self.format.format_amount(a.balance),
                ]
            })
            .collect();

        write_csv_atomic(&self.path, self.format.delimiter_byte(), &BALANCE_HEADER, &rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    #[test]
    fn test_save_and_load_with_comma_decimals() {
        let temp_dir = TempDir::new().unwrap();
        let format = CsvFormat {
            delimiter: ';',
            decimal_separator: ',',
            ..CsvFormat::default()
        };
        let table = BalanceTable::new(temp_dir.path().join("balances.csv"), format);

        let later = BalanceAssertion::new(
            NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            "Assets:Checking",
            Money::from_cents(-123456),
        )
        .unwrap();
        let earlier = BalanceAssertion::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            "Assets:Checking",
            Money::from_cents(1000),
        )
        .unwrap();

        table.save(&[later.clone(), earlier.clone()]).unwrap();
        let contents = std::fs::read_to_string(temp_dir.path().join("balances.csv")).unwrap();
        assert!(contents.contains("-1234,56"));

        assert_eq!(table.load().unwrap(), vec![earlier, later]);
    }

    #[test]
    fn test_bad_balance_reports_line() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("balances.csv");
        std::fs::write(&path, "date,account,balance\n2024-01-01,Assets:Checking,lots\n").unwrap();

        let err = BalanceTable::new(path, CsvFormat::default()).load().unwrap_err();
        assert!(err.to_string().contains("balances.csv:2"));
    }
}
