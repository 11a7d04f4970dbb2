//! Budget CLI commands
//!
//! Setting targets and reporting variance against actual postings.

use clap::Subcommand;

use crate::display::{format_budget_report, format_validation_report};
use crate::error::{BookError, BookResult};
use crate::models::{BudgetEntry, BudgetPeriod, Money};
use crate::services::{BudgetEngine, ValidationReport, Validator};
use crate::storage::Storage;

/// Budget subcommands
#[derive(Subcommand)]
pub enum BudgetCommands {
    /// Show target, actual and variance per account
    Report {
        /// Only this period (e.g. "2024-03", "2024", "FY2025", "2024-11-15..2024-12-31")
        #[arg(short, long)]
        period: Option<String>,

        /// Only this account
        #[arg(short, long)]
        account: Option<String>,
    },

    /// Set the target of an account for a period
    Set {
        /// Account identifier
        account: String,
        /// Budget period
        period: String,
        /// Target amount (e.g. "400" or "400.00")
        amount: String,
    },

    /// Remove the target of an account for a period
    Unset {
        account: String,
        period: String,
    },
}

/// Handle a budget command
pub fn handle_budget_command(storage: &Storage, cmd: BudgetCommands) -> BookResult<()> {
    match cmd {
        BudgetCommands::Report { period, account } => {
            let ledger = storage.load_ledger()?;
            let validator = Validator::new(storage.settings().validation_options());
            let validated = validator.certify(&ledger).map_err(|violations| {
                let count = violations.len();
                println!("{}", format_validation_report(&ValidationReport::Invalid(violations)));
                BookError::Storage(format!(
                    "The ledger has {} violation(s); fix them before budgeting",
                    count
                ))
            })?;

            let period = period.as_deref().map(BudgetPeriod::parse).transpose()?;
            let entries: Vec<BudgetEntry> = storage
                .load_budget()?
                .into_iter()
                .filter(|e| period.as_ref().map_or(true, |p| &e.period == p))
                .filter(|e| account.as_deref().map_or(true, |a| e.account == a.trim()))
                .collect();

            let engine = BudgetEngine::new(storage.settings().first_fiscal_month);
            let rows = engine.report(&validated, &entries)?;
            let totals = engine.totals(&rows)?;
            println!("{}", format_budget_report(&rows, &totals));
        }

        BudgetCommands::Set {
            account,
            period,
            amount,
        } => {
            let ledger = storage.load_ledger()?;
            let identifier = ledger.require_account(account.trim())?.identifier().to_string();
            let period = BudgetPeriod::parse(&period)?;
            let target = Money::parse(&amount)
                .map_err(|e| BookError::Config(format!("Invalid amount: {}", e)))?;
            let entry = BudgetEntry::new(&identifier, period, target)?;

            let mut entries = storage.load_budget()?;
            match entries
                .iter_mut()
                .find(|e| e.account == entry.account && e.period == entry.period)
            {
                Some(existing) => existing.target = entry.target,
                None => entries.push(entry.clone()),
            }
            storage.save_budget(&entries)?;
            println!("Budget set: {}", entry);
        }

        BudgetCommands::Unset { account, period } => {
            let period = BudgetPeriod::parse(&period)?;
            let account = account.trim();
            let mut entries = storage.load_budget()?;
            let before = entries.len();
            entries.retain(|e| !(e.account == account && e.period == period));
            if entries.len() == before {
                return Err(BookError::NotFound {
                    entity_type: "Budget entry",
                    identifier: format!("{} {}", account, period),
                });
            }
            storage.save_budget(&entries)?;
            println!("Budget removed: {} {}", account, period);
        }
    }

    Ok(())
}
