//! Spreadsheet export
//!
//! Writes one row per posting with the stored transaction columns followed by
//! columns that are handy for pivot tables: the account type, the fiscal year
//! and month of the transaction, and the other accounts it touches.

use csv::WriterBuilder;
use std::io::Write;

use crate::config::CsvFormat;
use crate::error::BookResult;
use crate::models::{fiscal_month, fiscal_year, Ledger};

use super::accounts::{format_optional_date, DATE_FORMAT};
use super::transactions::TRANSACTION_HEADER;

const EXTRA_HEADER: [&str; 4] = ["account_type", "fiscal_year", "fiscal_month", "other_accounts"];

/// Export options
#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub format: CsvFormat,
    pub first_fiscal_month: u32,
    /// Separator between the entries of `other_accounts`
    pub join_separator: String,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            format: CsvFormat::default(),
            first_fiscal_month: 1,
            join_separator: " | ".to_string(),
        }
    }
}

/// Export every posting of the ledger; returns the number of rows written
pub fn export_transactions_csv<W: Write>(
    ledger: &Ledger,
    options: &ExportOptions,
    writer: W,
) -> BookResult<usize> {
    let mut csv = WriterBuilder::new()
        .delimiter(options.format.delimiter_byte())
        .from_writer(writer);
    csv.write_record(TRANSACTION_HEADER.iter().chain(EXTRA_HEADER.iter()))?;

    let mut written = 0;
    for (idx, txn) in ledger.transactions().iter().enumerate() {
        let year = fiscal_year(txn.date(), options.first_fiscal_month).to_string();
        let month = fiscal_month(txn.date(), options.first_fiscal_month).to_string();

        for (posting_idx, posting) in txn.postings().iter().enumerate() {
            let mut others: Vec<&str> = txn
                .postings()
                .iter()
                .map(|p| p.account())
                .filter(|account| *account != posting.account())
                .collect();
            others.dedup();
            let account_type = ledger
                .account(posting.account())
                .map(|a| a.account_type().to_string())
                .unwrap_or_default();

            csv.write_record([
                (idx + 1).to_string(),
                txn.date().format(DATE_FORMAT).to_string(),
                if posting_idx == 0 {
                    txn.description().unwrap_or("").to_string()
                } else {
                    String::new()
                },
                posting.account().to_string(),
                options.format.format_amount(posting.amount()),
                posting.currency().to_string(),
                posting.memo().unwrap_or("").to_string(),
                format_optional_date(posting.statement_date()),
                posting.statement_description().unwrap_or("").to_string(),
                account_type,
                year.clone(),
                month.clone(),
                others.join(&options.join_separator),
            ])?;
            written += 1;
        }
    }
    csv.flush()?;
    Ok(written)
}
