//! Ledger CLI commands
//!
//! Verification, balances, registers, reversals, reclassification and export.

use chrono::{Local, NaiveDate};
use std::path::Path;
use tracing::{info, warn};

use crate::audit::{AuditEntry, AuditLogger, Operation};
use crate::display::{format_balances, format_register, format_validation_report, AccountBalance};
use crate::error::{BookError, BookResult, MergeConflictError};
use crate::import::classify;
use crate::models::AccountType;
use crate::services::{ValidationReport, Validator};
use crate::storage::file_io::write_atomic;
use crate::storage::{export_transactions_csv, Storage};

/// Validate the whole ledger; returns whether it is valid
pub fn handle_verify_command(storage: &Storage) -> BookResult<bool> {
    let ledger = storage.load_ledger()?;
    let validator = Validator::new(storage.settings().validation_options());

    let report = validator.validate(&ledger);
    println!("{}", format_validation_report(&report));
    println!(
        "{} accounts, {} transactions, {} balance assertions",
        ledger.accounts().count(),
        ledger.len(),
        ledger.assertions().len()
    );

    let logger = AuditLogger::new(storage.paths().audit_log());
    if let Some(recorded) = logger.last_revision()? {
        if recorded != ledger.revision() {
            warn!(%recorded, current = %ledger.revision(), "ledger revision differs from audit log");
            println!("Note: the ledger files changed since the last recorded operation.");
        }
    }
    Ok(report.is_valid())
}

/// Show balances, opening balances included
pub fn handle_balance_command(
    storage: &Storage,
    as_of: Option<NaiveDate>,
    account_type: Option<String>,
) -> BookResult<()> {
    let ledger = storage.load_ledger()?;
    let account_type = account_type
        .map(|t| t.parse::<AccountType>())
        .transpose()?;
    let as_of = as_of
        .or_else(|| ledger.last_date())
        .unwrap_or_else(|| Local::now().date_naive());

    let mut balances = Vec::new();
    for account in ledger.accounts() {
        if account_type.is_some_and(|t| t != account.account_type()) {
            continue;
        }
        balances.push(AccountBalance {
            identifier: account.identifier().to_string(),
            account_type: account.account_type(),
            currency: ledger.currency_of(account).clone(),
            balance: ledger.balance_with_opening(account.identifier(), as_of)?,
        });
    }

    println!("Balances as of {}", as_of);
    println!("{}", format_balances(&balances));
    Ok(())
}

pub fn handle_register_command(storage: &Storage, account: &str) -> BookResult<()> {
    let ledger = storage.load_ledger()?;
    let identifier = ledger.require_account(account.trim())?.identifier().to_string();
    let lines = ledger.register(&identifier)?;
    println!("{}", format_register(&identifier, &lines));
    Ok(())
}

/// Append the reversal of transaction `number` (1-based, as in transactions.csv)
pub fn handle_reverse_command(
    storage: &Storage,
    number: usize,
    date: Option<NaiveDate>,
) -> BookResult<()> {
    let ledger = storage.load_ledger()?;
    let position = number
        .checked_sub(1)
        .ok_or_else(|| BookError::transaction_not_found(number))?;
    let original = ledger
        .transaction(position)
        .ok_or_else(|| BookError::transaction_not_found(number))?
        .clone();
    let date = date.unwrap_or_else(|| Local::now().date_naive());

    let reversed = ledger.clone().with_reversal(position, date)?;
    let validator = Validator::new(storage.settings().validation_options());
    if let ValidationReport::Invalid(violations) = validator.validate(&reversed) {
        println!("{}", format_validation_report(&ValidationReport::Invalid(violations.clone())));
        return Err(MergeConflictError { violations }.into());
    }

    storage.save_ledger(&reversed)?;
    AuditLogger::new(storage.paths().audit_log()).log(&AuditEntry::reversal(
        number,
        date,
        &original,
        &ledger.revision(),
        &reversed.revision(),
    ))?;
    info!(number, %date, "reversed transaction");

    println!("Reversed transaction #{} as #{} on {}", number, reversed.len(), date);
    Ok(())
}

/// Move postings off `from` to the account the classification rules pick
///
/// A transaction is matched on its description, then on the statement
/// descriptions of its postings.
pub fn handle_reclassify_command(storage: &Storage, from: &str) -> BookResult<()> {
    let ledger = storage.load_ledger()?;
    let from = ledger.require_account(from.trim())?.identifier().to_string();
    let rules = &storage.settings().import.rules;
    if rules.is_empty() {
        println!("No classification rules configured.");
        return Ok(());
    }

    let (reclassified, positions) = ledger.clone().with_reclassified(&from, |txn| {
        txn.description()
            .into_iter()
            .chain(txn.postings().iter().filter_map(|p| p.statement_description()))
            .find_map(|text| classify(rules, text))
            .map(str::to_string)
    });
    if positions.is_empty() {
        println!("Nothing to reclassify in {}.", from);
        return Ok(());
    }

    let validator = Validator::new(storage.settings().validation_options());
    if let ValidationReport::Invalid(violations) = validator.validate(&reclassified) {
        println!("{}", format_validation_report(&ValidationReport::Invalid(violations.clone())));
        return Err(MergeConflictError { violations }.into());
    }

    let numbers: Vec<usize> = positions.iter().map(|p| p + 1).collect();
    storage.save_ledger(&reclassified)?;
    AuditLogger::new(storage.paths().audit_log()).log(&AuditEntry::reclassify(
        &from,
        &numbers,
        &ledger.revision(),
        &reclassified.revision(),
    ))?;
    info!(from = %from, count = numbers.len(), "reclassified transactions");

    let listed: Vec<String> = numbers.iter().map(|n| format!("#{}", n)).collect();
    println!("Reclassified {} transaction(s): {}", numbers.len(), listed.join(", "));
    Ok(())
}

/// Write the spreadsheet export to `output`, or to stdout
pub fn handle_export_command(storage: &Storage, output: Option<&Path>) -> BookResult<()> {
    let ledger = storage.load_ledger()?;
    let options = storage.settings().export_options();

    match output {
        Some(path) => {
            let mut written = 0;
            write_atomic(path, |writer| {
                written = export_transactions_csv(&ledger, &options, writer)?;
                Ok(())
            })?;
            info!(rows = written, file = %path.display(), "exported transactions");
            println!("Exported {} postings to {}", written, path.display());
        }
        None => {
            export_transactions_csv(&ledger, &options, std::io::stdout().lock())?;
        }
    }
    Ok(())
}

/// Show the most recent audit entries
pub fn handle_log_command(
    storage: &Storage,
    count: usize,
    operation: Option<Operation>,
) -> BookResult<()> {
    let logger = AuditLogger::new(storage.paths().audit_log());
    if !logger.exists() {
        println!("No audit log yet.");
        return Ok(());
    }
    for entry in logger.read_recent(count, operation)? {
        println!("{}", entry.format_human_readable());
    }
    Ok(())
}
