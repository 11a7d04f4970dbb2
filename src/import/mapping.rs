//! Column mapping for bank CSV exports
//!
//! Describes where the date, amount, payee and memo live in a bank's CSV
//! layout, with presets for common formats and detection from a header row.

use chrono::NaiveDate;
use csv::{ByteRecord, StringRecord};
use serde::{Deserialize, Serialize};

use crate::models::{AmountFormat, Money, StructuralError};

/// Formats tried after the configured one fails
const FALLBACK_DATE_FORMATS: [&str; 8] = [
    "%Y-%m-%d", "%m/%d/%Y", "%m/%d/%y", "%d/%m/%Y", "%d/%m/%y", "%Y/%m/%d", "%m-%d-%Y", "%d-%m-%Y",
];

/// Character encoding of a bank export
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextEncoding {
    #[default]
    Utf8,
    /// ISO-8859-1; every byte is a character
    Latin1,
}

impl TextEncoding {
    /// Decode one raw record, keeping its position in the file
    pub fn decode(self, record: &ByteRecord) -> Result<StringRecord, StructuralError> {
        let mut decoded = match self {
            Self::Utf8 => StringRecord::from_byte_record(record.clone())
                .map_err(|e| StructuralError::InvalidEncoding(e.to_string()))?,
            Self::Latin1 => record
                .iter()
                .map(|field| field.iter().map(|&b| char::from(b)).collect::<String>())
                .collect(),
        };
        decoded.set_position(record.position().cloned());
        Ok(decoded)
    }
}

impl std::str::FromStr for TextEncoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "").as_str() {
            "utf8" => Ok(Self::Utf8),
            "latin1" | "iso88591" => Ok(Self::Latin1),
            other => Err(format!("unknown encoding '{}'; expected utf-8 or latin-1", other)),
        }
    }
}

/// Column mapping configuration for CSV import
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnMapping {
    /// Index of the date column
    pub date_column: usize,
    /// Index of the amount column (or separate inflow/outflow columns)
    pub amount_column: Option<usize>,
    /// Index of the outflow column (if using separate columns)
    pub outflow_column: Option<usize>,
    /// Index of the inflow column (if using separate columns)
    pub inflow_column: Option<usize>,
    /// Index of the payee/description column
    pub payee_column: Option<usize>,
    /// Index of the memo/notes column
    pub memo_column: Option<usize>,
    /// Date the bank printed on the statement, when it differs from the row date
    pub statement_date_column: Option<usize>,
    /// Columns joined into the statement description
    pub statement_description_columns: Vec<usize>,
    pub statement_join_separator: String,
    /// Date format string (e.g., "%Y-%m-%d", "%m/%d/%Y")
    pub date_format: String,
    /// Whether the first row is a header
    pub has_header: bool,
    /// Delimiter character
    pub delimiter: char,
    /// Whether to invert amounts (some banks use positive for debits)
    pub invert_amounts: bool,
    pub decimal_separator: char,
    pub thousands_separator: Option<char>,
    pub currency_symbol: Option<String>,
    pub encoding: TextEncoding,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            date_column: 0,
            amount_column: Some(1),
            outflow_column: None,
            inflow_column: None,
            payee_column: Some(2),
            memo_column: None,
            statement_date_column: None,
            statement_description_columns: Vec::new(),
            statement_join_separator: " | ".to_string(),
            date_format: "%Y-%m-%d".to_string(),
            has_header: true,
            delimiter: ',',
            invert_amounts: false,
            decimal_separator: '.',
            thousands_separator: Some(','),
            currency_symbol: Some("$".to_string()),
            encoding: TextEncoding::Utf8,
        }
    }
}

impl ColumnMapping {
    /// Create a new column mapping
    pub fn new() -> Self {
        Self::default()
    }

    /// Common mapping for bank CSV exports (date, description, amount)
    pub fn simple_bank() -> Self {
        Self {
            amount_column: Some(2),
            payee_column: Some(1),
            date_format: "%m/%d/%Y".to_string(),
            ..Self::default()
        }
    }

    /// Common mapping for credit card CSV exports
    pub fn credit_card() -> Self {
        Self {
            amount_column: Some(2),
            payee_column: Some(1),
            memo_column: Some(3),
            date_format: "%m/%d/%Y".to_string(),
            // Credit cards often show positive for purchases
            invert_amounts: true,
            ..Self::default()
        }
    }

    /// Mapping for separate inflow/outflow columns
    pub fn separate_inout(
        date_col: usize,
        outflow_col: usize,
        inflow_col: usize,
        payee_col: usize,
    ) -> Self {
        Self {
            date_column: date_col,
            amount_column: None,
            outflow_column: Some(outflow_col),
            inflow_column: Some(inflow_col),
            payee_column: Some(payee_col),
            ..Self::default()
        }
    }

    /// Headerless date/description/debit/credit/balance layout
    pub fn debit_credit_no_header() -> Self {
        Self {
            has_header: false,
            ..Self::separate_inout(0, 2, 3, 1)
        }
    }

    /// Look up a preset by name
    pub fn preset(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().replace('-', "_").as_str() {
            "default" => Some(Self::default()),
            "simple_bank" => Some(Self::simple_bank()),
            "credit_card" => Some(Self::credit_card()),
            "debit_credit" | "debit_credit_no_header" => Some(Self::debit_credit_no_header()),
            _ => None,
        }
    }

    /// Names accepted by [`ColumnMapping::preset`]
    pub fn preset_names() -> &'static [&'static str] {
        &["default", "simple_bank", "credit_card", "debit_credit"]
    }

    /// Set the date format
    pub fn with_date_format(mut self, format: &str) -> Self {
        self.date_format = format.to_string();
        self
    }

    /// Set whether first row is header
    pub fn with_header(mut self, has_header: bool) -> Self {
        self.has_header = has_header;
        self
    }

    /// Set the delimiter
    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_encoding(mut self, encoding: TextEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn amount_format(&self) -> AmountFormat {
        AmountFormat {
            decimal_separator: self.decimal_separator,
            thousands_separator: self.thousands_separator,
            currency_symbol: self.currency_symbol.clone(),
        }
    }

    /// Parse a date with the configured format, then the common fallbacks
    pub fn parse_date(&self, s: &str) -> Result<NaiveDate, StructuralError> {
        let s = s.trim();
        std::iter::once(self.date_format.as_str())
            .chain(FALLBACK_DATE_FORMATS)
            .find_map(|format| NaiveDate::parse_from_str(s, format).ok())
            .ok_or_else(|| StructuralError::InvalidDate(s.to_string()))
    }

    /// Statement date of a record; the row date when no column is mapped or it is blank
    pub fn parse_statement_date(&self, record: &StringRecord, row_date: NaiveDate) -> Result<NaiveDate, StructuralError> {
        match self.statement_date_column.and_then(|col| record.get(col)).map(str::trim) {
            Some(s) if !s.is_empty() => self.parse_date(s),
            _ => Ok(row_date),
        }
    }

    /// Non-blank statement description columns, joined; the payee column when none are set
    pub fn statement_description(&self, record: &StringRecord) -> Option<String> {
        let columns: Vec<usize> = if self.statement_description_columns.is_empty() {
            self.payee_column.into_iter().collect()
        } else {
            self.statement_description_columns.clone()
        };
        let parts: Vec<&str> = columns
            .iter()
            .filter_map(|&col| record.get(col))
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        (!parts.is_empty()).then(|| parts.join(&self.statement_join_separator))
    }

    /// Signed amount of a record, negative for money leaving the account
    pub fn parse_amount(&self, record: &StringRecord) -> Result<Money, StructuralError> {
        let format = self.amount_format();
        let parse = |s: &str| {
            Money::parse_with(s, &format).map_err(|e| StructuralError::InvalidAmount(e.to_string()))
        };

        let amount = if let Some(amount_col) = self.amount_column {
            let amount_str = record
                .get(amount_col)
                .ok_or_else(|| StructuralError::InvalidAmount("missing amount column".into()))?;
            parse(amount_str)?
        } else {
            let (Some(outflow_col), Some(inflow_col)) = (self.outflow_column, self.inflow_column)
            else {
                return Err(StructuralError::InvalidAmount(
                    "mapping has neither an amount column nor outflow/inflow columns".into(),
                ));
            };

            let outflow_str = record.get(outflow_col).map(str::trim).unwrap_or("");
            let inflow_str = record.get(inflow_col).map(str::trim).unwrap_or("");

            let outflow = if outflow_str.is_empty() {
                Money::zero()
            } else {
                -parse(outflow_str)?.abs()
            };
            let inflow = if inflow_str.is_empty() {
                Money::zero()
            } else {
                parse(inflow_str)?.abs()
            };
            outflow + inflow
        };

        Ok(if self.invert_amounts { -amount } else { amount })
    }

    /// Detect column mapping from the first record of a file
    pub fn detect(first: &StringRecord) -> Self {
        if looks_like_data_row(first) {
            // headerless: date, description, debit, credit[, balance]
            if first.len() >= 4 {
                let numeric = |col: usize| {
                    let s = first.get(col).map(str::trim).unwrap_or("");
                    s.is_empty() || Money::parse(s).is_ok()
                };
                if numeric(2) && numeric(3) {
                    return Self::debit_credit_no_header();
                }
            }
            return Self::default().with_header(false);
        }

        let mut mapping = Self::new();
        mapping.payee_column = None;
        mapping.amount_column = None;

        for (idx, header) in first.iter().enumerate() {
            let h = header.trim().to_lowercase();

            if h.contains("value date") || h.contains("statement date") {
                mapping.statement_date_column = Some(idx);
            } else if h.contains("date") || h.contains("posted") {
                mapping.date_column = idx;
            } else if h.contains("amount") && mapping.amount_column.is_none() {
                mapping.amount_column = Some(idx);
            } else if h.contains("debit") || h.contains("outflow") || h.contains("withdrawal") {
                mapping.outflow_column = Some(idx);
            } else if h.contains("credit") || h.contains("inflow") || h.contains("deposit") {
                mapping.inflow_column = Some(idx);
            } else if h.contains("description")
                || h.contains("payee")
                || h.contains("merchant")
                || h.contains("name")
            {
                mapping.payee_column = Some(idx);
            } else if h.contains("memo") || h.contains("note") {
                mapping.memo_column = Some(idx);
            }
        }

        // If we have separate inflow/outflow, clear the amount column
        if mapping.outflow_column.is_some() && mapping.inflow_column.is_some() {
            mapping.amount_column = None;
        }

        mapping
    }
}

/// True when the first field parses as a date
fn looks_like_data_row(record: &StringRecord) -> bool {
    record.get(0).is_some_and(|first| {
        let first = first.trim();
        FALLBACK_DATE_FORMATS
            .iter()
            .any(|format| NaiveDate::parse_from_str(first, format).is_ok())
    })
}
