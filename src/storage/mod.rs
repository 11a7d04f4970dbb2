//! Storage layer for balancebook
//!
//! CSV tables with atomic writes, plus the JSON file holding an import
//! proposal between `import` and `review`.

pub mod accounts;
pub mod balances;
pub mod budget;
pub mod export;
pub mod file_io;
pub mod transactions;

pub use accounts::AccountTable;
pub use balances::BalanceTable;
pub use budget::BudgetTable;
pub use export::{export_transactions_csv, ExportOptions};
pub use file_io::{read_json, write_json_atomic};
pub use transactions::TransactionTable;

use tracing::{debug, info};

use crate::config::{BookPaths, Settings};
use crate::error::BookError;
use crate::models::{BudgetEntry, Ledger};
use crate::services::ImportProposal;

/// Main storage coordinator that provides access to all tables
pub struct Storage {
    paths: BookPaths,
    pub accounts: AccountTable,
    pub transactions: TransactionTable,
    pub balances: BalanceTable,
    pub budget: BudgetTable,
    settings: Settings,
}

impl Storage {
    pub fn new(paths: BookPaths, settings: Settings) -> Self {
        let format = settings.csv.clone();
        let files = &settings.files;
        Self {
            accounts: AccountTable::new(paths.table(&files.accounts), format.clone()),
            transactions: TransactionTable::new(paths.table(&files.transactions), format.clone()),
            balances: BalanceTable::new(paths.table(&files.balances), format.clone()),
            budget: BudgetTable::new(paths.table(&files.budget), format),
            paths,
            settings,
        }
    }

    /// Open the book at `paths`, reading its settings file
    pub fn open(paths: BookPaths) -> Result<Self, BookError> {
        let settings = Settings::load_or_create(&paths)?;
        Ok(Self::new(paths, settings))
    }

    pub fn paths(&self) -> &BookPaths {
        &self.paths
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Load every table into a ledger
    pub fn load_ledger(&self) -> Result<Ledger, BookError> {
        let default_currency = self.settings.currency()?;
        let accounts = self.accounts.load()?;

        let transactions = self.transactions.load(|identifier| {
            accounts
                .iter()
                .find(|a| a.identifier() == identifier)
                .and_then(|a| a.currency().cloned())
                .unwrap_or_else(|| default_currency.clone())
        })?;
        let assertions = self.balances.load()?;

        debug!(
            accounts = accounts.len(),
            transactions = transactions.len(),
            assertions = assertions.len(),
            "loaded ledger"
        );
        Ledger::from_parts(default_currency, accounts, transactions, assertions)
    }

    /// Write every table of the ledger
    pub fn save_ledger(&self, ledger: &Ledger) -> Result<(), BookError> {
        self.paths.ensure_directories()?;
        self.accounts.save(ledger.accounts())?;
        self.transactions.save(ledger.transactions())?;
        self.balances.save(ledger.assertions())?;
        info!(transactions = ledger.len(), "saved ledger");
        Ok(())
    }

    pub fn load_budget(&self) -> Result<Vec<BudgetEntry>, BookError> {
        self.budget.load()
    }

    pub fn save_budget(&self, entries: &[BudgetEntry]) -> Result<(), BookError> {
        self.budget.save(entries)
    }

    /// The proposal waiting for review, if any
    pub fn load_pending(&self) -> Result<Option<ImportProposal>, BookError> {
        read_json(self.paths.pending_import())
    }

    pub fn save_pending(&self, proposal: &ImportProposal) -> Result<(), BookError> {
        write_json_atomic(self.paths.pending_import(), proposal)
    }

    pub fn clear_pending(&self) -> Result<(), BookError> {
        let path = self.paths.pending_import();
        if path.exists() {
            std::fs::remove_file(&path).map_err(|e| {
                BookError::Storage(format!("Failed to remove {}: {}", path.display(), e))
            })?;
        }
        Ok(())
    }

    /// Write the settings file and empty tables for a new book
    pub fn initialize(&self) -> Result<(), BookError> {
        self.paths.ensure_directories()?;
        if !self.paths.is_initialized() {
            self.settings.save(&self.paths)?;
        }
        let ledger = self.load_ledger()?;
        self.save_ledger(&ledger)?;
        if !self.budget_file_exists() {
            self.save_budget(&[])?;
        }
        Ok(())
    }

    fn budget_file_exists(&self) -> bool {
        self.paths.table(&self.settings.files.budget).exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Account, AccountType, Currency, Money, Posting, Transaction};
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn storage(temp_dir: &TempDir) -> Storage {
        Storage::new(
            BookPaths::with_base_dir(temp_dir.path().to_path_buf()),
            Settings::default(),
        )
    }

    #[test]
    fn test_initialize_creates_tables() {
        let temp_dir = TempDir::new().unwrap();
        let storage = storage(&temp_dir);
        storage.initialize().unwrap();

        assert!(temp_dir.path().join("balancebook.yaml").exists());
        assert!(temp_dir.path().join("accounts.csv").exists());
        assert!(temp_dir.path().join("transactions.csv").exists());
        assert!(temp_dir.path().join("balances.csv").exists());
        assert!(temp_dir.path().join("budget.csv").exists());
        assert!(storage.load_ledger().unwrap().is_empty());
    }

    #[test]
    fn test_blank_currency_takes_account_currency() {
        let temp_dir = TempDir::new().unwrap();
        let storage = storage(&temp_dir);
        let usd = Currency::new("USD").unwrap();

        let ledger = Ledger::new(Currency::new("CAD").unwrap())
            .with_account(
                Account::new("Assets:Brokerage", AccountType::Asset)
                    .unwrap()
                    .with_currency(usd.clone()),
            )
            .unwrap()
            .with_account(Account::new("Equity:Opening", AccountType::Equity).unwrap().with_currency(usd.clone()))
            .unwrap();
        storage.save_ledger(&ledger).unwrap();

        std::fs::write(
            temp_dir.path().join("transactions.csv"),
            "id,date,description,account,amount,currency,memo\n\
             1,2024-01-01,Deposit,Assets:Brokerage,100.00,,\n\
             1,2024-01-01,,Equity:Opening,-100.00,,\n",
        )
        .unwrap();

        let loaded = storage.load_ledger().unwrap();
        let txn = loaded.transaction(0).unwrap();
        assert!(txn.postings().iter().all(|p| p.currency() == &usd));
    }

    #[test]
    fn test_ledger_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let storage = storage(&temp_dir);
        let cad = Currency::new("CAD").unwrap();

        let ledger = Ledger::new(cad.clone())
            .with_account(Account::new("Assets:Checking", AccountType::Asset).unwrap())
            .unwrap()
            .with_account(Account::new("Expense:Groceries", AccountType::Expense).unwrap())
            .unwrap()
            .with_transaction(
                Transaction::new(
                    NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
                    Some("Grocery Store".into()),
                    vec![
                        Posting::new("Assets:Checking", Money::from_cents(-5000), cad.clone()).unwrap(),
                        Posting::new("Expense:Groceries", Money::from_cents(5000), cad).unwrap(),
                    ],
                )
                .unwrap(),
            );

        storage.save_ledger(&ledger).unwrap();
        let loaded = storage.load_ledger().unwrap();
        assert_eq!(loaded, ledger);
        assert_eq!(loaded.revision(), ledger.revision());
    }

    #[test]
    fn test_pending_proposal_lifecycle() {
        let temp_dir = TempDir::new().unwrap();
        let storage = storage(&temp_dir);

        assert!(storage.load_pending().unwrap().is_none());
        storage.clear_pending().unwrap();
    }
}
