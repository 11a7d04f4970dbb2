//! Audit logging for balancebook
//!
//! Every operation that rewrites the ledger (import, rollback, reversal) is
//! recorded in an append-only JSONL log together with the ledger revisions
//! before and after.
//!
//! # Example
//!
//! ```rust,ignore
//! use balancebook::audit::{AuditEntry, AuditLogger};
//!
//! let logger = AuditLogger::new(paths.audit_log());
//! logger.log(&AuditEntry::import_committed(&report, &before, &after))?;
//! ```

mod entry;
mod logger;

pub use entry::{AuditEntry, Operation};
pub use logger::AuditLogger;
