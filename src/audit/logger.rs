//! Append-only JSONL audit log
//!
//! One entry per line. Reading is lenient about blank lines but a line that
//! does not parse is reported with its line number.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;

use crate::error::{BookError, BookResult};

use super::entry::{AuditEntry, Operation};

/// Reads and appends entries of one book's audit log
pub struct AuditLogger {
    log_path: PathBuf,
}

impl AuditLogger {
    pub fn new(log_path: PathBuf) -> Self {
        Self { log_path }
    }

    /// Append the entry and flush it before returning
    pub fn log(&self, entry: &AuditEntry) -> BookResult<()> {
        let json = serde_json::to_string(entry)
            .map_err(|e| BookError::Json(format!("Failed to serialize audit entry: {}", e)))?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .map_err(|e| BookError::Io(format!("Failed to open audit log: {}", e)))?;
        writeln!(file, "{}", json)
            .and_then(|_| file.flush())
            .map_err(|e| BookError::Io(format!("Failed to write audit entry: {}", e)))
    }

    /// Every entry, oldest first
    pub fn read_all(&self) -> BookResult<Vec<AuditEntry>> {
        if !self.log_path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.log_path)
            .map_err(|e| BookError::Io(format!("Failed to open audit log: {}", e)))?;

        let mut entries = Vec::new();
        for (idx, line) in BufReader::new(file).lines().enumerate() {
            let line_number = idx + 1;
            let line = line.map_err(|e| {
                BookError::Io(format!("Failed to read audit log line {}: {}", line_number, e))
            })?;
            if line.trim().is_empty() {
                continue;
            }
            let entry = serde_json::from_str(&line).map_err(|e| {
                BookError::Json(format!("Audit log line {}: {}", line_number, e))
            })?;
            entries.push(entry);
        }
        Ok(entries)
    }

    /// The last `count` entries, optionally only those of one operation
    pub fn read_recent(&self, count: usize, operation: Option<Operation>) -> BookResult<Vec<AuditEntry>> {
        let mut entries = self.read_all()?;
        if let Some(operation) = operation {
            entries.retain(|entry| entry.operation == operation);
        }
        let start = entries.len().saturating_sub(count);
        Ok(entries.split_off(start))
    }

    /// Ledger revision written by the most recent operation that changed the ledger
    pub fn last_revision(&self) -> BookResult<Option<String>> {
        Ok(self
            .read_all()?
            .into_iter()
            .rev()
            .find_map(|entry| entry.revision_after))
    }

    pub fn exists(&self) -> bool {
        self.log_path.exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn create_test_logger() -> (AuditLogger, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let logger = AuditLogger::new(temp_dir.path().join("audit.log"));
        (logger, temp_dir)
    }

    fn reversal(number: usize, after: &str) -> AuditEntry {
        let date = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        AuditEntry::reversal(number, date, &number, "before", after)
    }

    #[test]
    fn test_log_and_read() {
        let (logger, temp) = create_test_logger();

        logger.log(&AuditEntry::init(temp.path())).unwrap();

        let entries = logger.read_all().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].operation, Operation::Init);
    }

    #[test]
    fn test_read_recent_by_operation() {
        let (logger, temp) = create_test_logger();

        logger.log(&AuditEntry::init(temp.path())).unwrap();
        for n in 1..=4 {
            logger.log(&reversal(n, &format!("rev-{}", n))).unwrap();
            logger.log(&AuditEntry::discard("bank.csv", &uuid::Uuid::new_v4())).unwrap();
        }

        let recent = logger.read_recent(3, None).unwrap();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[2].operation, Operation::Discard);

        let reversals = logger.read_recent(2, Some(Operation::Reverse)).unwrap();
        assert_eq!(reversals.len(), 2);
        assert!(reversals[0].summary.contains("#3"));
        assert!(reversals[1].summary.contains("#4"));

        assert!(logger.read_recent(5, Some(Operation::Import)).unwrap().is_empty());
    }

    #[test]
    fn test_last_revision_skips_read_only_entries() {
        let (logger, temp) = create_test_logger();
        assert_eq!(logger.last_revision().unwrap(), None);

        logger.log(&AuditEntry::init(temp.path())).unwrap();
        assert_eq!(logger.last_revision().unwrap(), None);

        logger.log(&reversal(1, "rev-1")).unwrap();
        logger.log(&AuditEntry::discard("bank.csv", &uuid::Uuid::new_v4())).unwrap();
        assert_eq!(logger.last_revision().unwrap().as_deref(), Some("rev-1"));
    }

    #[test]
    fn test_corrupt_line_names_its_number() {
        let (logger, temp) = create_test_logger();
        logger.log(&AuditEntry::init(temp.path())).unwrap();
        let mut file = OpenOptions::new().append(true).open(temp.path().join("audit.log")).unwrap();
        writeln!(file, "\n{{not json").unwrap();

        let err = logger.read_all().unwrap_err();
        assert!(err.to_string().contains("line 3"));
    }

    #[test]
    fn test_empty_log() {
        let (logger, _temp) = create_test_logger();

        assert!(!logger.exists());
        assert!(logger.read_all().unwrap().is_empty());
    }
}
