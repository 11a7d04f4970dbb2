//! Account table
//!
//! Manages loading and saving accounts to accounts.csv

use chrono::NaiveDate;
use std::path::PathBuf;

use crate::config::CsvFormat;
use crate::error::BookError;
use crate::models::{Account, AccountType, Currency, Money};

use super::file_io::{at_line, field, read_csv_table, write_csv_atomic};

pub const ACCOUNT_HEADER: [&str; 7] = [
    "identifier",
    "type",
    "currency",
    "opening_balance",
    "open_date",
    "close_date",
    "description",
];

/// Date format of every stored table
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Table of accounts
pub struct AccountTable {
    path: PathBuf,
    format: CsvFormat,
}

impl AccountTable {
    pub fn new(path: PathBuf, format: CsvFormat) -> Self {
        Self { path, format }
    }

    /// Load every account in file order
    pub fn load(&self) -> Result<Vec<Account>, BookError> {
        let rows = read_csv_table(&self.path, self.format.delimiter_byte())?;
        let amount_format = self.format.amount_format();

        let mut accounts = Vec::with_capacity(rows.len());
        for (line, record) in rows {
            let err = |message: String| at_line(&self.path, line, message);

            let type_str = field(&record, 1);
            let account_type = AccountType::parse(type_str)
                .ok_or_else(|| err(format!("unknown account type '{}'", type_str)))?;
            let mut account =
                Account::new(field(&record, 0), account_type).map_err(|e| err(e.to_string()))?;

            let currency = field(&record, 2);
            if !currency.is_empty() {
                account = account.with_currency(Currency::new(currency).map_err(|e| err(e.to_string()))?);
            }

            let opening = field(&record, 3);
            if !opening.is_empty() {
                let balance =
                    Money::parse_with(opening, &amount_format).map_err(|e| err(e.to_string()))?;
                account = account.with_opening_balance(balance);
            }

            let open = parse_optional_date(field(&record, 4)).map_err(&err)?;
            let close = parse_optional_date(field(&record, 5)).map_err(&err)?;
            account = account
                .with_lifetime(open, close)
                .map_err(|e| err(e.to_string()))?;

            let description = field(&record, 6);
            if !description.is_empty() {
                account = account.with_description(description);
            }

            accounts.push(account);
        }

        Ok(accounts)
    }

    /// Save accounts, sorted by identifier
    pub fn save<'a>(&self, accounts: impl IntoIterator<Item = &'a Account>) -> Result<(), BookError> {
        let mut rows: Vec<Vec<String>> = accounts
            .into_iter()
            .map(|account| {
                vec![
                    account.identifier().to_string(),
                    account.account_type().to_string(),
                    account
                        .currency()
                        .map(|c| c.to_string())
                        .unwrap_or_default(),
                    account
                        .opening_balance()
                        .map(|m| self.format.format_amount(m))
                        .unwrap_or_default(),
                    format_optional_date(account.open_date()),
                    format_optional_date(account.close_date()),
                    account.description().to_string(),
                ]
            })
            .collect();
        rows.sort_by(|a, b| a[0].cmp(&b[0]));

        write_csv_atomic(&self.path, self.format.delimiter_byte(), &ACCOUNT_HEADER, &rows)
    }
}

/// Parse a stored date; blank is `None`
pub(crate) fn parse_optional_date(s: &str) -> Result<Option<NaiveDate>, String> {
    if s.is_empty() {
        return Ok(None);
    }
    parse_date(s).map(Some)
}

pub(crate) fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, DATE_FORMAT).map_err(|_| format!("invalid date '{}'", s))
}

pub(crate) fn format_optional_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format(DATE_FORMAT).to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn table(temp_dir: &TempDir) -> AccountTable {
        AccountTable::new(temp_dir.path().join("accounts.csv"), CsvFormat::default())
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let table = table(&temp_dir);

        let checking = Account::new("Assets:Checking", AccountType::Asset)
            .unwrap()
            .with_currency(Currency::new("USD").unwrap())
            .with_opening_balance(Money::from_cents(10050))
            .with_lifetime(NaiveDate::from_ymd_opt(2024, 1, 1), None)
            .unwrap()
            .with_description("Main account");
        let groceries = Account::new("Expense:Groceries", AccountType::Expense).unwrap();

        table.save([&groceries, &checking]).unwrap();
        let loaded = table.load().unwrap();

        assert_eq!(loaded, vec![checking, groceries]);
    }

    #[test]
    fn test_load_reports_file_and_line() {
        let temp_dir = TempDir::new().unwrap();
        let table = table(&temp_dir);
        std::fs::write(
            temp_dir.path().join("accounts.csv"),
            "identifier,type,currency,opening_balance,open_date,close_date,description\n\
             Assets:Checking,asset,,,,,\n\
             Assets:Mystery,treasure,,,,,\n",
        )
        .unwrap();

        let err = table.load().unwrap_err();
        let message = err.to_string();
        assert!(message.contains("accounts.csv:3"));
        assert!(message.contains("treasure"));
    }

    #[test]
    fn test_load_rejects_bad_date() {
        let temp_dir = TempDir::new().unwrap();
        let table = table(&temp_dir);
        std::fs::write(
            temp_dir.path().join("accounts.csv"),
            "identifier,type,currency,opening_balance,open_date,close_date,description\n\
             Assets:Checking,asset,,,01/02/2024,,\n",
        )
        .unwrap();

        assert!(table.load().unwrap_err().to_string().contains("invalid date"));
    }

    #[test]
    fn test_missing_file_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        assert!(table(&temp_dir).load().unwrap().is_empty());
    }
}
