//! Display formatting for terminal output
//!
//! Renders reports, registers and import results as tables.

pub mod budget;
pub mod import;
pub mod ledger;

pub use budget::format_budget_report;
pub use import::{format_import_report, format_proposal, format_review_items, format_transaction_summary};
pub use ledger::{
    format_balances, format_register, format_validation_report, format_violations, AccountBalance,
};
