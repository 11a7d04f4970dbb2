//! Import display formatting
//!
//! Proposal summaries, review items and the final report of an import.

use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::models::Transaction;
use crate::services::{ImportProposal, ImportReport, ReviewItem};

use super::ledger::truncate;

#[derive(Tabled)]
struct ReviewRow {
    #[tabled(rename = "Id")]
    id: String,
    #[tabled(rename = "Row")]
    row: usize,
    #[tabled(rename = "Candidate")]
    candidate: String,
    #[tabled(rename = "Existing")]
    existing: String,
    #[tabled(rename = "Days apart")]
    days_apart: i64,
}

#[derive(Tabled)]
struct DecodeErrorRow {
    #[tabled(rename = "Row")]
    row: usize,
    #[tabled(rename = "Error")]
    error: String,
}

#[derive(Tabled)]
struct SkippedRowView {
    #[tabled(rename = "Row")]
    row: usize,
    #[tabled(rename = "Account")]
    account: String,
    #[tabled(rename = "Asserted through")]
    cutoff: String,
}

/// One-line summary of a transaction: date, description and amounts
pub fn format_transaction_summary(txn: &Transaction) -> String {
    let amounts: Vec<String> = txn
        .postings()
        .iter()
        .map(|p| format!("{} {} {}", p.account(), p.amount(), p.currency()))
        .collect();
    format!(
        "{} {} [{}]",
        txn.date(),
        truncate(txn.description().unwrap_or("(no description)"), 30),
        amounts.join(", ")
    )
}

/// Format items waiting for a human decision
pub fn format_review_items(items: &[ReviewItem]) -> String {
    if items.is_empty() {
        return "Nothing to review.".to_string();
    }

    let rows = items.iter().map(|item| ReviewRow {
        id: item.id.to_string(),
        row: item.row_number,
        candidate: format_transaction_summary(&item.candidate),
        existing: format!(
            "#{} {}",
            item.existing.position + 1,
            format_transaction_summary(&item.existing.transaction)
        ),
        days_apart: item.existing.days_apart,
    });

    Table::new(rows).with(Style::sharp()).to_string()
}

/// Format what an import proposes to do
pub fn format_proposal(proposal: &ImportProposal) -> String {
    let mut output = String::new();

    output.push_str(&format!("Import from {}\n", proposal.source));
    output.push_str(&format!("  New:           {}\n", proposal.new.len()));
    output.push_str(&format!("  Duplicates:    {}\n", proposal.duplicates.len()));
    output.push_str(&format!("  To review:     {}\n", proposal.review.len()));
    output.push_str(&format!("  Decode errors: {}\n", proposal.decode_errors.len()));
    if !proposal.skipped.is_empty() {
        output.push_str(&format!("  Skipped:       {}\n", proposal.skipped.len()));
    }
    if !proposal.new_accounts.is_empty() {
        let names: Vec<&str> = proposal
            .new_accounts
            .iter()
            .map(|a| a.identifier())
            .collect();
        output.push_str(&format!("  New accounts:  {}\n", names.join(", ")));
    }

    if !proposal.decode_errors.is_empty() {
        let rows = proposal.decode_errors.iter().map(|e| DecodeErrorRow {
            row: e.row_number,
            error: e.error.to_string(),
        });
        output.push('\n');
        output.push_str(&Table::new(rows).with(Style::sharp()).to_string());
        output.push('\n');
    }

    if !proposal.skipped.is_empty() {
        let rows = proposal.skipped.iter().map(|s| SkippedRowView {
            row: s.row_number,
            account: s.account.clone(),
            cutoff: s.cutoff.to_string(),
        });
        output.push('\n');
        output.push_str(&Table::new(rows).with(Style::sharp()).to_string());
        output.push('\n');
    }

    if !proposal.review.is_empty() {
        output.push('\n');
        output.push_str(&format_review_items(&proposal.review));
        output.push('\n');
    }

    output
}

/// Format the outcome of a resolved import
pub fn format_import_report(report: &ImportReport) -> String {
    let mut output = String::new();

    output.push_str(&format!("Import from {}: {}\n", report.source, report.state));
    output.push_str(&format!("  Decoded:       {}\n", report.decoded));
    output.push_str(&format!("  New:           {}\n", report.new));
    output.push_str(&format!("  Duplicates:    {}\n", report.duplicates));
    output.push_str(&format!(
        "  Reviewed:      {} ({} accepted, {} rejected)\n",
        report.review, report.accepted, report.rejected
    ));
    output.push_str(&format!("  Merged:        {}\n", report.merged));
    if report.decode_errors > 0 {
        output.push_str(&format!("  Decode errors: {}\n", report.decode_errors));
    }
    if report.skipped > 0 {
        output.push_str(&format!("  Skipped:       {}\n", report.skipped));
    }

    output
}
