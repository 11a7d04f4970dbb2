//! Configuration module for balancebook
//!
//! This module provides configuration management including:
//! - Book directory resolution
//! - YAML settings with defaults for every field

pub mod paths;
pub mod settings;

pub use paths::BookPaths;
pub use settings::{CsvFormat, DataFiles, ImportProfile, ImportSettings, Settings, ValidationSettings};
