//! Transaction table
//!
//! One row per posting. Consecutive rows sharing an `id` form one
//! transaction; ids are renumbered 1..n on every save.

use chrono::NaiveDate;
use std::path::PathBuf;

use crate::config::CsvFormat;
use crate::error::BookError;
use crate::models::{Currency, Money, Posting, Transaction};

use super::accounts::{format_optional_date, parse_date, parse_optional_date, DATE_FORMAT};
use super::file_io::{at_line, field, read_csv_table, write_csv_atomic};

pub const TRANSACTION_HEADER: [&str; 9] = [
    "id",
    "date",
    "description",
    "account",
    "amount",
    "currency",
    "memo",
    "statement_date",
    "statement_description",
];

/// Table of transactions in recording order
pub struct TransactionTable {
    path: PathBuf,
    format: CsvFormat,
}

struct Group {
    id: String,
    line: u64,
    date: NaiveDate,
    description: Option<String>,
    postings: Vec<Posting>,
}

impl Group {
    fn finish(self) -> Transaction {
        Transaction::from_stored(self.date, self.description, self.postings)
    }
}

impl TransactionTable {
    pub fn new(path: PathBuf, format: CsvFormat) -> Self {
        Self { path, format }
    }

    /// Load transactions without structural checks
    ///
    /// `currency_of` supplies the currency of postings whose currency cell is
    /// blank.
    pub fn load<F>(&self, currency_of: F) -> Result<Vec<Transaction>, BookError>
    where
        F: Fn(&str) -> Currency,
    {
        let rows = read_csv_table(&self.path, self.format.delimiter_byte())?;
        let amount_format = self.format.amount_format();

        let mut transactions = Vec::new();
        let mut current: Option<Group> = None;

        for (line, record) in rows {
            let err = |message: String| at_line(&self.path, line, message);

            let id = field(&record, 0);
            if id.is_empty() {
                return Err(err("missing transaction id".into()));
            }
            let date = parse_date(field(&record, 1)).map_err(&err)?;
            let account = field(&record, 3);
            if account.is_empty() {
                return Err(err("missing account".into()));
            }
            let amount = Money::parse_with(field(&record, 4), &amount_format)
                .map_err(|e| err(e.to_string()))?;
            let currency = match field(&record, 5) {
                "" => currency_of(account),
                code => Currency::new(code).map_err(|e| err(e.to_string()))?,
            };
            let memo = Some(field(&record, 6).to_string());
            let statement_date = parse_optional_date(field(&record, 7)).map_err(&err)?;
            let posting = Posting::from_stored(account, amount, currency, memo)
                .with_statement(statement_date, non_empty(field(&record, 8)));

            match current.as_mut() {
                Some(group) if group.id == id => {
                    if group.date != date {
                        return Err(err(format!(
                            "transaction {} is dated {} on line {} but {} here",
                            id, group.date, group.line, date
                        )));
                    }
                    if group.description.is_none() {
                        group.description = non_empty(field(&record, 2));
                    }
                    group.postings.push(posting);
                }
                _ => {
                    if let Some(group) = current.take() {
                        transactions.push(group.finish());
                    }
                    current = Some(Group {
                        id: id.to_string(),
                        line,
                        date,
                        description: non_empty(field(&record, 2)),
                        postings: vec![posting],
                    });
                }
            }
        }
        if let Some(group) = current {
            transactions.push(group.finish());
        }

        Ok(transactions)
    }

    /// Save transactions, numbering them from 1 by position
    pub fn save(&self, transactions: &[Transaction]) -> Result<(), BookError> {
        let mut rows = Vec::new();
        for (idx, txn) in transactions.iter().enumerate() {
            let id = (idx + 1).to_string();
            let date = txn.date().format(DATE_FORMAT).to_string();
            for (posting_idx, posting) in txn.postings().iter().enumerate() {
                let description = if posting_idx == 0 {
                    txn.description().unwrap_or("").to_string()
                } else {
                    String::new()
                };
                rows.push(vec![
                    id.clone(),
                    date.clone(),
                    description,
                    posting.account().to_string(),
                    self.format.format_amount(posting.amount()),
                    posting.currency().to_string(),
                    posting.memo().unwrap_or("").to_string(),
                    format_optional_date(posting.statement_date()),
                    posting.statement_description().unwrap_or("").to_string(),
                ]);
            }
        }

        write_csv_atomic(
            &self.path,
            self.format.delimiter_byte(),
            &TRANSACTION_HEADER,
            &rows,
        )
    }
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn cad() -> Currency {
        Currency::new("CAD").unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn write_table(temp_dir: &TempDir, body: &str) -> TransactionTable {
        let path = temp_dir.path().join("transactions.csv");
        std::fs::write(&path, format!("{}\n{}", TRANSACTION_HEADER.join(","), body)).unwrap();
        TransactionTable::new(path, CsvFormat::default())
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let table = TransactionTable::new(temp_dir.path().join("transactions.csv"), CsvFormat::default());

        let txns = vec![
            Transaction::new(
                date(2024, 1, 5),
                Some("Grocery Store".into()),
                vec![
                    Posting::new("Assets:Checking", Money::from_cents(-5000), cad())
                        .unwrap()
                        .with_memo("card 1234")
                        .with_statement(Some(date(2024, 1, 7)), Some("GROCERY STORE #12".into())),
                    Posting::new("Expense:Groceries", Money::from_cents(5000), cad()).unwrap(),
                ],
            )
            .unwrap(),
            Transaction::new(
                date(2024, 1, 6),
                None,
                vec![
                    Posting::new("Assets:Checking", Money::from_cents(-1200), cad()).unwrap(),
                    Posting::new("Expense:Fun", Money::from_cents(1200), cad()).unwrap(),
                ],
            )
            .unwrap(),
        ];

        table.save(&txns).unwrap();
        let loaded = table.load(|_| cad()).unwrap();
        assert_eq!(loaded, txns);
    }

    #[test]
    fn test_consecutive_ids_group() {
        let temp_dir = TempDir::new().unwrap();
        let table = write_table(
            &temp_dir,
            "7,2024-01-05,Rent,Assets:Checking,-1000.00,,\n\
             7,2024-01-05,,Expense:Rent,1000.00,,\n\
             3,2024-01-06,Bus,Assets:Checking,-3.50,USD,\n\
             3,2024-01-06,,Expense:Transit,3.50,USD,\n",
        );

        let loaded = table.load(|_| cad()).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].description(), Some("Rent"));
        assert_eq!(loaded[0].postings()[0].currency(), &cad());
        assert_eq!(loaded[1].postings()[1].currency().as_str(), "USD");
    }

    #[test]
    fn test_unbalanced_rows_still_load() {
        let temp_dir = TempDir::new().unwrap();
        let table = write_table(
            &temp_dir,
            "1,2024-01-05,Oops,Assets:Checking,-10.00,,\n1,2024-01-05,,Expense:Misc,9.00,,\n",
        );

        let loaded = table.load(|_| cad()).unwrap();
        assert!(!loaded[0].is_balanced());
    }

    #[test]
    fn test_date_mismatch_is_storage_error() {
        let temp_dir = TempDir::new().unwrap();
        let table = write_table(
            &temp_dir,
            "1,2024-01-05,Rent,Assets:Checking,-10.00,,\n1,2024-01-06,,Expense:Rent,10.00,,\n",
        );

        let err = table.load(|_| cad()).unwrap_err();
        assert!(matches!(err, BookError::Storage(_)));
        assert!(err.to_string().contains("transactions.csv:3"));
    }

    #[test]
    fn test_bad_amount_is_storage_error() {
        let temp_dir = TempDir::new().unwrap();
        let table = write_table(&temp_dir, "1,2024-01-05,Rent,Assets:Checking,ten,,\n");

        let err = table.load(|_| cad()).unwrap_err();
        assert!(err.to_string().contains("transactions.csv:2"));
    }

    #[test]
    fn test_statement_columns_are_optional() {
        let temp_dir = TempDir::new().unwrap();
        let table = write_table(
            &temp_dir,
            "1,2024-01-05,Rent,Assets:Checking,-10.00,,,2024-01-08,RENT PMT\n\
             1,2024-01-05,,Expense:Rent,10.00,,\n",
        );

        let loaded = table.load(|_| cad()).unwrap();
        let postings = loaded[0].postings();
        assert_eq!(postings[0].statement_date(), Some(date(2024, 1, 8)));
        assert_eq!(postings[0].statement_description(), Some("RENT PMT"));
        assert_eq!(postings[1].statement_date(), None);

        let bad = write_table(&temp_dir, "1,2024-01-05,Rent,Assets:Checking,-10.00,,,someday,\n");
        assert!(bad.load(|_| cad()).unwrap_err().to_string().contains("transactions.csv:2"));
    }
}
