//! File I/O utilities with atomic writes
//!
//! Provides safe file operations that won't corrupt data on failure, for
//! both the CSV tables and the JSON side files.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use serde::{de::DeserializeOwned, Serialize};
use tracing::warn;

use crate::error::BookError;

/// Write a file atomically (write to temp, then rename)
///
/// The file is either completely written or not modified at all.
pub fn write_atomic<P, F>(path: P, write: F) -> Result<(), BookError>
where
    P: AsRef<Path>,
    F: FnOnce(&mut BufWriter<File>) -> Result<(), BookError>,
{
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            BookError::Storage(format!(
                "Failed to create directory {}: {}",
                parent.display(),
                e
            ))
        })?;
    }

    // Temp file in the same directory, so the rename stays on one filesystem
    let mut temp_name = path.as_os_str().to_owned();
    temp_name.push(".tmp");
    let temp_path = std::path::PathBuf::from(temp_name);

    let file = File::create(&temp_path)
        .map_err(|e| BookError::Storage(format!("Failed to create temp file: {}", e)))?;
    let mut writer = BufWriter::new(file);

    let written = write(&mut writer).and_then(|_| {
        writer
            .flush()
            .map_err(|e| BookError::Storage(format!("Failed to flush data: {}", e)))?;
        writer
            .get_ref()
            .sync_all()
            .map_err(|e| BookError::Storage(format!("Failed to sync data: {}", e)))
    });
    if let Err(err) = written {
        let _ = fs::remove_file(&temp_path);
        return Err(err);
    }

    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        BookError::Storage(format!("Failed to rename temp file: {}", e))
    })?;

    Ok(())
}

/// Read JSON from a file, returning `None` if the file doesn't exist
pub fn read_json<T, P>(path: P) -> Result<Option<T>, BookError>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();

    if !path.exists() {
        return Ok(None);
    }

    let file = File::open(path)
        .map_err(|e| BookError::Storage(format!("Failed to open {}: {}", path.display(), e)))?;

    let reader = BufReader::new(file);
    serde_json::from_reader(reader)
        .map(Some)
        .map_err(|e| BookError::Storage(format!("Failed to parse {}: {}", path.display(), e)))
}

/// Write JSON to a file atomically
pub fn write_json_atomic<T, P>(path: P, data: &T) -> Result<(), BookError>
where
    T: Serialize,
    P: AsRef<Path>,
{
    write_atomic(path, |writer| {
        serde_json::to_writer_pretty(writer, data)
            .map_err(|e| BookError::Storage(format!("Failed to serialize data: {}", e)))
    })
}

/// Data records of a CSV table with their line numbers
///
/// A missing file is an empty table.
pub fn read_csv_table<P: AsRef<Path>>(
    path: P,
    delimiter: u8,
) -> Result<Vec<(u64, StringRecord)>, BookError> {
    let path = path.as_ref();

    if !path.exists() {
        warn!(file = %path.display(), "table missing, treating it as empty");
        return Ok(Vec::new());
    }

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .flexible(true)
        .from_path(path)
        .map_err(|e| BookError::Storage(format!("Failed to open {}: {}", path.display(), e)))?;

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result
            .map_err(|e| BookError::Storage(format!("Failed to read {}: {}", path.display(), e)))?;
        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        rows.push((line, record));
    }
    Ok(rows)
}

/// Write a CSV table atomically, header first
pub fn write_csv_atomic<P: AsRef<Path>>(
    path: P,
    delimiter: u8,
    header: &[&str],
    rows: &[Vec<String>],
) -> Result<(), BookError> {
    write_atomic(path, |writer| {
        let mut csv = WriterBuilder::new().delimiter(delimiter).from_writer(writer);
        csv.write_record(header)?;
        for row in rows {
            csv.write_record(row)?;
        }
        csv.flush()?;
        Ok(())
    })
}

/// A storage error pointing at a line of a table
pub fn at_line(path: &Path, line: u64, message: impl std::fmt::Display) -> BookError {
    BookError::Storage(format!("{}:{}: {}", path.display(), line, message))
}

/// Field of a record, trimmed; missing fields read as empty
pub fn field(record: &StringRecord, index: usize) -> &str {
    record.get(index).map(str::trim).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
    struct TestData {
        name: String,
        value: i32,
    }

    #[test]
    fn test_read_nonexistent_returns_none() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nonexistent.json");

        let data: Option<TestData> = read_json(&path).unwrap();
        assert_eq!(data, None);
    }

    #[test]
    fn test_write_and_read_json() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("test.json");

        let data = TestData {
            name: "test".to_string(),
            value: 42,
        };

        write_json_atomic(&path, &data).unwrap();
        assert!(path.exists());
        assert!(!temp_dir.path().join("test.json.tmp").exists());

        let loaded: Option<TestData> = read_json(&path).unwrap();
        assert_eq!(loaded, Some(data));
    }

    #[test]
    fn test_csv_round_trip_with_line_numbers() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("table.csv");

        write_csv_atomic(
            &path,
            b';',
            &["a", "b"],
            &[
                vec!["1".into(), "x;y".into()],
                vec!["2".into(), "z".into()],
            ],
        )
        .unwrap();

        let rows = read_csv_table(&path, b';').unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].0, 2);
        assert_eq!(field(&rows[0].1, 1), "x;y");
        assert_eq!(field(&rows[1].1, 5), "");
    }

    #[test]
    fn test_missing_table_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let rows = read_csv_table(temp_dir.path().join("none.csv"), b',').unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_at_line_message() {
        let err = at_line(Path::new("accounts.csv"), 3, "bad type");
        assert_eq!(err.to_string(), "Storage error: accounts.csv:3: bad type");
    }
}
