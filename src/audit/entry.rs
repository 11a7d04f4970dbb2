//! Audit entry data structures
//!
//! Defines the operations that change a book and the entry format itself.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::services::{ImportReport, Violation};

/// Types of operations that can be audited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// A new book was created
    Init,
    /// An import merged into the ledger
    Import,
    /// An import failed validation and left the ledger untouched
    Rollback,
    /// A transaction was cancelled by an offsetting one
    Reverse,
    /// A pending proposal was thrown away
    Discard,
    /// Postings moved to the account picked by the classification rules
    Reclassify,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Init => write!(f, "INIT"),
            Operation::Import => write!(f, "IMPORT"),
            Operation::Rollback => write!(f, "ROLLBACK"),
            Operation::Reverse => write!(f, "REVERSE"),
            Operation::Discard => write!(f, "DISCARD"),
            Operation::Reclassify => write!(f, "RECLASSIFY"),
        }
    }
}

/// A single audit log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// When the operation occurred (UTC)
    pub timestamp: DateTime<Utc>,

    pub operation: Operation,

    /// Ledger revision the operation started from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision_before: Option<String>,

    /// Ledger revision written by the operation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision_after: Option<String>,

    /// One-line summary
    pub summary: String,

    /// Structured details (import report, violations, reversed transaction)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl AuditEntry {
    fn new(operation: Operation, summary: String) -> Self {
        Self {
            timestamp: Utc::now(),
            operation,
            revision_before: None,
            revision_after: None,
            summary,
            details: None,
        }
    }

    pub fn init(base_dir: &std::path::Path) -> Self {
        Self::new(
            Operation::Init,
            format!("Initialized book at {}", base_dir.display()),
        )
    }

    pub fn import_committed(report: &ImportReport, before: &str, after: &str) -> Self {
        let mut entry = Self::new(
            Operation::Import,
            format!(
                "Imported {} transactions from {} ({} duplicates, {} rejected)",
                report.merged, report.source, report.duplicates, report.rejected
            ),
        );
        entry.revision_before = Some(before.to_string());
        entry.revision_after = Some(after.to_string());
        entry.details = serde_json::to_value(report).ok();
        entry
    }

    pub fn import_rolled_back(report: &ImportReport, revision: &str, violations: &[Violation]) -> Self {
        let mut entry = Self::new(
            Operation::Rollback,
            format!(
                "Import from {} rolled back: {} violations",
                report.source,
                violations.len()
            ),
        );
        entry.revision_before = Some(revision.to_string());
        entry.details = Some(serde_json::json!({
            "report": report,
            "violations": violations,
        }));
        entry
    }

    /// `number` is the 1-based transaction number shown to the user
    pub fn reversal<T: Serialize>(
        number: usize,
        date: NaiveDate,
        reversed: &T,
        before: &str,
        after: &str,
    ) -> Self {
        let mut entry = Self::new(
            Operation::Reverse,
            format!("Reversed transaction #{} on {}", number, date),
        );
        entry.revision_before = Some(before.to_string());
        entry.revision_after = Some(after.to_string());
        entry.details = serde_json::to_value(reversed).ok();
        entry
    }

    pub fn discard(source: &str, proposal_id: &uuid::Uuid) -> Self {
        Self::new(
            Operation::Discard,
            format!("Discarded pending import {} from {}", proposal_id, source),
        )
    }

    /// `numbers` are the 1-based transaction numbers that changed
    pub fn reclassify(from: &str, numbers: &[usize], before: &str, after: &str) -> Self {
        let mut entry = Self::new(
            Operation::Reclassify,
            format!("Reclassified {} transactions away from {}", numbers.len(), from),
        );
        entry.revision_before = Some(before.to_string());
        entry.revision_after = Some(after.to_string());
        entry.details = Some(serde_json::json!({ "from": from, "transactions": numbers }));
        entry
    }

    /// Format the entry for human-readable output
    pub fn format_human_readable(&self) -> String {
        let mut output = format!(
            "[{}] {} {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
            self.operation,
            self.summary
        );

        if let (Some(before), Some(after)) = (&self.revision_before, &self.revision_after) {
            output.push_str(&format!("\n  Revision: {} -> {}", short(before), short(after)));
        }

        output
    }
}

fn short(revision: &str) -> &str {
    revision.get(..12).unwrap_or(revision)
}
