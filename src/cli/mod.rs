//! CLI command handlers
//!
//! This module contains the implementation of CLI commands,
//! bridging the clap argument parsing with the service layer.

pub mod budget;
pub mod import;
pub mod ledger;

pub use budget::{handle_budget_command, BudgetCommands};
pub use import::{handle_import_command, handle_review_command, ImportArgs, ReviewCommands};
pub use ledger::{
    handle_balance_command, handle_export_command, handle_log_command, handle_reclassify_command,
    handle_register_command, handle_reverse_command, handle_verify_command,
};

use crate::audit::{AuditEntry, AuditLogger};
use crate::error::BookResult;
use crate::storage::Storage;

/// Create the settings file and empty tables
pub fn handle_init_command(storage: &Storage) -> BookResult<()> {
    let paths = storage.paths();
    let fresh = !paths.is_initialized();

    storage.initialize()?;
    if fresh {
        AuditLogger::new(paths.audit_log()).log(&AuditEntry::init(paths.base_dir()))?;
        println!("Initialized balancebook at: {}", paths.base_dir().display());
    } else {
        println!("Book already initialized at: {}", paths.base_dir().display());
    }
    Ok(())
}

/// Show paths and the effective settings
pub fn handle_config_command(storage: &Storage) -> BookResult<()> {
    let paths = storage.paths();
    println!("balancebook configuration");
    println!("=========================");
    println!("Book directory: {}", paths.base_dir().display());
    println!("Settings file:  {}", paths.settings_file().display());
    println!("Audit log:      {}", paths.audit_log().display());
    println!();
    print!("{}", serde_yaml::to_string(storage.settings())?);
    Ok(())
}
