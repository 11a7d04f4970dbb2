//! Book settings
//!
//! Read from `balancebook.yaml` in the book directory. Every field has a
//! default, so a missing file or a partial file both work.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::paths::BookPaths;
use crate::error::{BookError, BookResult};
use crate::import::{ClassificationRule, ColumnMapping};
use crate::models::{AmountFormat, Currency, Money};
use crate::services::{AccountMap, MatchOptions, Normalization, ValidationOptions};
use crate::storage::export::ExportOptions;
use crate::storage::file_io::write_atomic;

/// How the book's own CSV tables are written
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvFormat {
    pub delimiter: char,
    pub decimal_separator: char,
    pub thousands_separator: Option<char>,
    pub currency_symbol: Option<String>,
}

impl Default for CsvFormat {
    fn default() -> Self {
        Self {
            delimiter: ',',
            decimal_separator: '.',
            thousands_separator: None,
            currency_symbol: None,
        }
    }
}

impl CsvFormat {
    pub fn delimiter_byte(&self) -> u8 {
        u8::try_from(self.delimiter).unwrap_or(b',')
    }

    pub fn amount_format(&self) -> AmountFormat {
        AmountFormat {
            decimal_separator: self.decimal_separator,
            thousands_separator: self.thousands_separator,
            currency_symbol: self.currency_symbol.clone(),
        }
    }

    pub fn format_amount(&self, amount: Money) -> String {
        amount.format_with_separator(self.decimal_separator)
    }
}

/// File names of the data tables, relative to the book directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataFiles {
    pub accounts: String,
    pub transactions: String,
    pub balances: String,
    pub budget: String,
}

impl Default for DataFiles {
    fn default() -> Self {
        Self {
            accounts: "accounts.csv".to_string(),
            transactions: "transactions.csv".to_string(),
            balances: "balances.csv".to_string(),
            budget: "budget.csv".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationSettings {
    /// Require transactions to be recorded in date order
    pub strict_chronology: bool,
}

/// A named bank export layout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportProfile {
    /// Preset name used when no explicit mapping is given
    #[serde(default)]
    pub preset: Option<String>,
    #[serde(default)]
    pub mapping: Option<ColumnMapping>,
    /// Account the export belongs to
    pub account: String,
    /// Counter-account when no classification rule matches
    pub counter_account: String,
    #[serde(default)]
    pub currency: Option<String>,
    /// Source label to ledger account translations
    #[serde(default)]
    pub accounts: BTreeMap<String, String>,
}

impl ImportProfile {
    pub fn column_mapping(&self) -> BookResult<ColumnMapping> {
        if let Some(mapping) = &self.mapping {
            return Ok(mapping.clone());
        }
        match &self.preset {
            Some(name) => ColumnMapping::preset(name)
                .ok_or_else(|| BookError::Config(format!("Unknown mapping preset: {}", name))),
            None => Ok(ColumnMapping::default()),
        }
    }

    pub fn account_map(&self) -> AccountMap {
        let mut map = AccountMap::new();
        for (label, account) in &self.accounts {
            map.insert(label.clone(), account.clone());
        }
        map
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportSettings {
    /// Largest date gap still flagged for review
    pub date_tolerance_days: u32,
    pub strip_punctuation: bool,
    pub profiles: BTreeMap<String, ImportProfile>,
    /// Payee classification rules, first match wins
    pub rules: Vec<ClassificationRule>,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            date_tolerance_days: 3,
            strip_punctuation: true,
            profiles: BTreeMap::new(),
            rules: Vec::new(),
        }
    }
}

/// Settings for one book
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Schema version for migration support
    pub schema_version: u32,

    /// Currency of accounts that declare none
    pub default_currency: String,

    /// First month of the fiscal year (1-12)
    pub first_fiscal_month: u32,

    /// Separator between joined account names in exports
    pub join_separator: String,

    pub files: DataFiles,
    pub csv: CsvFormat,
    pub validation: ValidationSettings,
    pub import: ImportSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            schema_version: 1,
            default_currency: "CAD".to_string(),
            first_fiscal_month: 1,
            join_separator: " | ".to_string(),
            files: DataFiles::default(),
            csv: CsvFormat::default(),
            validation: ValidationSettings::default(),
            import: ImportSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from disk, or use the defaults if the file doesn't exist
    pub fn load_or_create(paths: &BookPaths) -> BookResult<Self> {
        let settings_path = paths.settings_file();

        if !settings_path.exists() {
            return Ok(Settings::default());
        }

        let contents = std::fs::read_to_string(&settings_path)
            .map_err(|e| BookError::Io(format!("Failed to read settings file: {}", e)))?;
        let settings: Settings = serde_yaml::from_str(&contents)
            .map_err(|e| BookError::Config(format!("Failed to parse settings file: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Save settings to disk
    pub fn save(&self, paths: &BookPaths) -> BookResult<()> {
        paths.ensure_directories()?;
        let contents = serde_yaml::to_string(self)?;
        write_atomic(paths.settings_file(), |writer| {
            use std::io::Write;
            writer.write_all(contents.as_bytes())?;
            Ok(())
        })
    }

    /// Reject values the engine cannot work with
    pub fn validate(&self) -> BookResult<()> {
        self.currency()?;
        if !(1..=12).contains(&self.first_fiscal_month) {
            return Err(BookError::Config(format!(
                "first_fiscal_month must be between 1 and 12, got {}",
                self.first_fiscal_month
            )));
        }
        if !self.csv.delimiter.is_ascii() {
            return Err(BookError::Config(format!(
                "CSV delimiter must be a single ASCII character, got '{}'",
                self.csv.delimiter
            )));
        }
        if self.csv.thousands_separator == Some(self.csv.decimal_separator) {
            return Err(BookError::Config(
                "Decimal and thousands separators must differ".into(),
            ));
        }
        Ok(())
    }

    pub fn currency(&self) -> BookResult<Currency> {
        Currency::new(&self.default_currency)
            .map_err(|e| BookError::Config(format!("default_currency: {}", e)))
    }

    pub fn export_options(&self) -> ExportOptions {
        ExportOptions {
            format: self.csv.clone(),
            first_fiscal_month: self.first_fiscal_month,
            join_separator: self.join_separator.clone(),
        }
    }

    pub fn match_options(&self) -> MatchOptions {
        MatchOptions {
            date_tolerance_days: self.import.date_tolerance_days,
            normalization: Normalization {
                strip_punctuation: self.import.strip_punctuation,
            },
        }
    }

    pub fn validation_options(&self) -> ValidationOptions {
        ValidationOptions {
            strict_chronology: self.validation.strict_chronology,
            normalization: self.match_options().normalization,
        }
    }

    pub fn profile(&self, name: &str) -> BookResult<&ImportProfile> {
        self.import
            .profiles
            .get(name)
            .ok_or_else(|| BookError::Config(format!("No import profile named '{}'", name)))
    }
}
