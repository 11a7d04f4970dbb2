//! Import sources
//!
//! Adapters turning raw bank rows into [`CandidateFields`] for the import
//! pipeline. The pipeline never sees a CSV record; everything format-specific
//! lives here.

pub mod mapping;
pub mod rules;

pub use mapping::{ColumnMapping, TextEncoding};
pub use rules::{classify, ClassificationRule};

use csv::{ByteRecord, ReaderBuilder, StringRecord};
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use tracing::{debug, warn};

use crate::error::{BookError, BookResult};
use crate::models::{Currency, StructuralError};
use crate::services::import::{CandidateFields, CandidatePosting, DecodeError};

/// Decodes one raw row into typed fields
pub trait ImportSource {
    fn decode(&self, row: &StringRecord, row_number: usize) -> Result<CandidateFields, DecodeError>;

    /// Whether the first record is a header
    fn has_header(&self) -> bool {
        true
    }

    fn delimiter(&self) -> u8 {
        b','
    }

    fn encoding(&self) -> TextEncoding {
        TextEncoding::Utf8
    }
}

/// Rows a source decoded, and the ones it could not
#[derive(Debug, Clone, Default)]
pub struct DecodedRows {
    pub rows: Vec<CandidateFields>,
    pub errors: Vec<DecodeError>,
}

/// Decode every record of a CSV stream; row numbers are file line numbers
pub fn decode_reader<R: Read>(source: &dyn ImportSource, reader: R) -> BookResult<DecodedRows> {
    let mut reader = ReaderBuilder::new()
        .has_headers(source.has_header())
        .delimiter(source.delimiter())
        .flexible(true)
        .from_reader(reader);

    let mut decoded = DecodedRows::default();
    for (idx, result) in reader.byte_records().enumerate() {
        let raw = result?;
        if raw.iter().all(|field| field.trim_ascii().is_empty()) {
            continue;
        }
        let row_number = raw
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(idx + 1);
        let record = match source.encoding().decode(&raw) {
            Ok(record) => record,
            Err(error) => {
                warn!(row = row_number, %error, "could not read row text");
                decoded.errors.push(DecodeError { row_number, error });
                continue;
            }
        };
        match source.decode(&record, row_number) {
            Ok(fields) => decoded.rows.push(fields),
            Err(err) => {
                warn!(row = row_number, error = %err.error, "could not decode row");
                decoded.errors.push(err);
            }
        }
    }
    debug!(rows = decoded.rows.len(), errors = decoded.errors.len(), "decoded source");
    Ok(decoded)
}

pub fn decode_file(source: &dyn ImportSource, path: &Path) -> BookResult<DecodedRows> {
    let file = std::fs::File::open(path)
        .map_err(|e| BookError::Import(format!("Cannot open {}: {}", path.display(), e)))?;
    decode_reader(source, file)
}

/// Guess the column mapping of an export from its first record
///
/// Without an explicit `delimiter`, whichever of comma, semicolon or tab
/// occurs most often in the first line is used.
pub fn detect_mapping(path: &Path, delimiter: Option<u8>) -> BookResult<ColumnMapping> {
    let file = std::fs::File::open(path)
        .map_err(|e| BookError::Import(format!("Cannot open {}: {}", path.display(), e)))?;
    let mut line = Vec::new();
    BufReader::new(file).read_until(b'\n', &mut line)?;
    if line.trim_ascii().is_empty() {
        return Err(BookError::Import(format!("{} is empty", path.display())));
    }

    let delimiter = delimiter.unwrap_or_else(|| sniff_delimiter(&line));
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(line.as_slice());
    let mut raw = ByteRecord::new();
    if !reader.read_byte_record(&mut raw)? {
        return Err(BookError::Import(format!("{} is empty", path.display())));
    }
    let first: StringRecord = raw
        .iter()
        .map(|field| String::from_utf8_lossy(field).into_owned())
        .collect();

    let mapping = ColumnMapping::detect(&first).with_delimiter(char::from(delimiter));
    debug!(?mapping, "detected column mapping");
    Ok(mapping)
}

/// Most frequent of comma, semicolon and tab; comma on a tie
fn sniff_delimiter(line: &[u8]) -> u8 {
    let count = |d: u8| line.iter().filter(|&&b| b == d).count();
    [b';', b'\t']
        .into_iter()
        .fold(b',', |best, d| if count(d) > count(best) { d } else { best })
}

/// A bank or card CSV export for one account
///
/// Each row becomes a two-posting transaction between the imported account
/// and a counter-account picked by the classification rules.
#[derive(Debug, Clone)]
pub struct BankCsvSource {
    pub mapping: ColumnMapping,
    /// Label of the account the export belongs to
    pub account: String,
    /// Counter-account label when no rule matches
    pub counter_account: String,
    pub rules: Vec<ClassificationRule>,
    /// Currency of every posting; `None` takes each account's own
    pub currency: Option<Currency>,
}

impl BankCsvSource {
    pub fn new(
        mapping: ColumnMapping,
        account: impl Into<String>,
        counter_account: impl Into<String>,
    ) -> Self {
        Self {
            mapping,
            account: account.into(),
            counter_account: counter_account.into(),
            rules: Vec::new(),
            currency: None,
        }
    }

    pub fn with_rules(mut self, rules: Vec<ClassificationRule>) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_currency(mut self, currency: Currency) -> Self {
        self.currency = Some(currency);
        self
    }

    fn field(&self, record: &StringRecord, column: Option<usize>) -> Option<String> {
        column
            .and_then(|col| record.get(col))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    fn decode_fields(&self, record: &StringRecord, row_number: usize) -> Result<CandidateFields, StructuralError> {
        let date_str = record
            .get(self.mapping.date_column)
            .ok_or_else(|| StructuralError::InvalidDate("missing date column".into()))?;
        let date = self.mapping.parse_date(date_str)?;
        let amount = self.mapping.parse_amount(record)?;
        let payee = self.field(record, self.mapping.payee_column);
        let memo = self.field(record, self.mapping.memo_column);

        let counter = payee
            .as_deref()
            .and_then(|p| classify(&self.rules, p))
            .unwrap_or(&self.counter_account);

        let mut own = CandidatePosting::new(self.account.clone(), amount);
        let mut other = CandidatePosting::new(counter, -amount);
        if let Some(currency) = &self.currency {
            own = own.with_currency(currency.clone());
            other = other.with_currency(currency.clone());
        }
        if let Some(memo) = memo {
            own = own.with_memo(memo);
        }
        own = own.with_statement(
            self.mapping.parse_statement_date(record, date)?,
            self.mapping.statement_description(record),
        );

        Ok(CandidateFields {
            row_number,
            date,
            description: payee,
            postings: vec![own, other],
        })
    }
}

impl ImportSource for BankCsvSource {
    fn decode(&self, row: &StringRecord, row_number: usize) -> Result<CandidateFields, DecodeError> {
        self.decode_fields(row, row_number)
            .map_err(|error| DecodeError { row_number, error })
    }

    fn has_header(&self) -> bool {
        self.mapping.has_header
    }

    fn delimiter(&self) -> u8 {
        u8::try_from(self.mapping.delimiter).unwrap_or(b',')
    }

    fn encoding(&self) -> TextEncoding {
        self.mapping.encoding
    }
}
