//! The ledger value
//!
//! A ledger is a default currency, a set of accounts, the transactions in
//! recording order and the balance assertions read from the statement file.
//! Every "change" consumes the ledger and returns a new one; nothing here
//! validates cross-entity invariants, that is the validator's job.
//!
//! Transaction positions are zero-based. `transactions.csv` numbers them from 1.

use chrono::NaiveDate;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use super::account::{Account, AccountType};
use super::assertion::BalanceAssertion;
use super::money::{Currency, Money};
use super::structural::StructuralError;
use super::transaction::Transaction;
use crate::error::{BookError, BookResult};

/// One line of an account register
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterLine {
    pub date: NaiveDate,
    pub position: usize,
    pub description: Option<String>,
    pub amount: Money,
    /// Running balance after this line, excluding the opening balance
    pub balance: Money,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ledger {
    default_currency: Currency,
    accounts: BTreeMap<String, Account>,
    transactions: Vec<Transaction>,
    assertions: Vec<BalanceAssertion>,
}

impl Ledger {
    /// Create an empty ledger
    pub fn new(default_currency: Currency) -> Self {
        Self {
            default_currency,
            accounts: BTreeMap::new(),
            transactions: Vec::new(),
            assertions: Vec::new(),
        }
    }

    /// Assemble a ledger from stored tables
    pub fn from_parts(
        default_currency: Currency,
        accounts: Vec<Account>,
        transactions: Vec<Transaction>,
        assertions: Vec<BalanceAssertion>,
    ) -> BookResult<Self> {
        let mut ledger = Self::new(default_currency);
        for account in accounts {
            ledger = ledger.with_account(account)?;
        }
        ledger.transactions = transactions;
        ledger.assertions = assertions;
        Ok(ledger)
    }

    /// Add an account; an identifier already in the ledger is rejected
    pub fn with_account(mut self, account: Account) -> BookResult<Self> {
        if self.accounts.contains_key(account.identifier()) {
            return Err(BookError::duplicate_account(account.identifier()));
        }
        self.accounts.insert(account.identifier().to_string(), account);
        Ok(self)
    }

    /// Append a transaction without validating it
    pub fn with_transaction(mut self, transaction: Transaction) -> Self {
        self.transactions.push(transaction);
        self
    }

    pub fn with_assertion(mut self, assertion: BalanceAssertion) -> Self {
        self.assertions.push(assertion);
        self
    }

    /// Append the reversal of the transaction at `position`
    pub fn with_reversal(self, position: usize, date: NaiveDate) -> BookResult<Self> {
        let reversal = self
            .transaction(position)
            .ok_or_else(|| BookError::transaction_not_found(position))?
            .reversal(date);
        Ok(self.with_transaction(reversal))
    }

    /// Move postings off `from` wherever `target` names a new account
    ///
    /// Returns the new ledger and the positions of the transactions that changed.
    pub fn with_reclassified<F>(mut self, from: &str, target: F) -> (Self, Vec<usize>)
    where
        F: Fn(&Transaction) -> Option<String>,
    {
        let mut changed = Vec::new();
        for (position, txn) in self.transactions.iter_mut().enumerate() {
            let Some(to) = target(txn) else { continue };
            if let Some(moved) = txn.reclassified(from, &to) {
                *txn = moved;
                changed.push(position);
            }
        }
        (self, changed)
    }

    pub fn default_currency(&self) -> &Currency {
        &self.default_currency
    }

    pub fn account(&self, identifier: &str) -> Option<&Account> {
        self.accounts.get(identifier)
    }

    /// Look up an account, failing with `NotFound`
    pub fn require_account(&self, identifier: &str) -> BookResult<&Account> {
        self.account(identifier)
            .ok_or_else(|| BookError::account_not_found(identifier))
    }

    /// Accounts in identifier order
    pub fn accounts(&self) -> impl Iterator<Item = &Account> {
        self.accounts.values()
    }

    pub fn accounts_of_type(&self, account_type: AccountType) -> Vec<&Account> {
        self.accounts
            .values()
            .filter(|a| a.account_type() == account_type)
            .collect()
    }

    pub fn transaction(&self, position: usize) -> Option<&Transaction> {
        self.transactions.get(position)
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn assertions(&self) -> &[BalanceAssertion] {
        &self.assertions
    }

    /// The latest balance assertion on an account
    pub fn newest_assertion(&self, identifier: &str) -> Option<&BalanceAssertion> {
        self.assertions
            .iter()
            .filter(|a| a.account == identifier)
            .max_by_key(|a| a.date)
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// The declared currency of an account, else the ledger default
    pub fn currency_of<'a>(&'a self, account: &'a Account) -> &'a Currency {
        account.currency().unwrap_or(&self.default_currency)
    }

    pub fn effective_currency(&self, identifier: &str) -> BookResult<&Currency> {
        let account = self.require_account(identifier)?;
        Ok(self.currency_of(account))
    }

    /// Latest transaction date, if any
    pub fn last_date(&self) -> Option<NaiveDate> {
        self.transactions.iter().map(Transaction::date).max()
    }

    /// Sum of the account's postings dated on or before `as_of`
    ///
    /// Only postings in the account's effective currency count. The opening
    /// balance is not included; see [`Ledger::balance_with_opening`].
    pub fn balance(&self, identifier: &str, as_of: NaiveDate) -> BookResult<Money> {
        let currency = self.effective_currency(identifier)?;
        self.sum_postings(identifier, currency, |date| date <= as_of)
    }

    /// Opening balance plus [`Ledger::balance`]
    pub fn balance_with_opening(&self, identifier: &str, as_of: NaiveDate) -> BookResult<Money> {
        let account = self.require_account(identifier)?;
        let opening = account.opening_balance().unwrap_or_default();
        let postings = self.balance(identifier, as_of)?;
        opening
            .checked_add(postings)
            .ok_or_else(|| StructuralError::Overflow(self.currency_of(account).clone()).into())
    }

    /// Sum of the account's postings whose transaction date satisfies `include`
    pub(crate) fn sum_postings(
        &self,
        identifier: &str,
        currency: &Currency,
        include: impl Fn(NaiveDate) -> bool,
    ) -> BookResult<Money> {
        let mut total = Money::zero();
        for txn in self.transactions.iter().filter(|t| include(t.date())) {
            for posting in txn.postings() {
                if posting.account() == identifier && posting.currency() == currency {
                    total = total
                        .checked_add(posting.amount())
                        .ok_or_else(|| StructuralError::Overflow(currency.clone()))?;
                }
            }
        }
        Ok(total)
    }

    /// Running-balance lines for an account, by date then position
    pub fn register(&self, identifier: &str) -> BookResult<Vec<RegisterLine>> {
        let currency = self.effective_currency(identifier)?;

        let mut entries: Vec<(NaiveDate, usize, &Transaction, Money)> = Vec::new();
        for (position, txn) in self.transactions.iter().enumerate() {
            for posting in txn.postings() {
                if posting.account() == identifier && posting.currency() == currency {
                    entries.push((txn.date(), position, txn, posting.amount()));
                }
            }
        }
        // stable: postings of one transaction keep declaration order
        entries.sort_by_key(|(date, position, _, _)| (*date, *position));

        let mut running = Money::zero();
        let mut lines = Vec::with_capacity(entries.len());
        for (date, position, txn, amount) in entries {
            running = running
                .checked_add(amount)
                .ok_or_else(|| StructuralError::Overflow(currency.clone()))?;
            lines.push(RegisterLine {
                date,
                position,
                description: txn.description().map(str::to_string),
                amount,
                balance: running,
            });
        }
        Ok(lines)
    }

    /// Content fingerprint, used to detect stale import proposals
    pub fn revision(&self) -> String {
        let mut hasher = Sha256::new();
        let mut field = |value: &str| {
            hasher.update(value.as_bytes());
            hasher.update([0x1f]);
        };

        field(self.default_currency.as_str());
        for account in self.accounts.values() {
            field(account.identifier());
            field(&account.account_type().to_string());
            field(account.currency().map(Currency::as_str).unwrap_or("-"));
            field(&optional(account.opening_balance()));
            field(&optional(account.open_date()));
            field(&optional(account.close_date()));
            field(account.description());
        }
        for txn in &self.transactions {
            field("txn");
            field(&txn.date().to_string());
            field(txn.description().unwrap_or("-"));
            for posting in txn.postings() {
                field(posting.account());
                field(&posting.amount().cents().to_string());
                field(posting.currency().as_str());
                field(posting.memo().unwrap_or("-"));
                field(&optional(posting.statement_date()));
                field(posting.statement_description().unwrap_or("-"));
            }
        }
        for assertion in &self.assertions {
            field("assert");
            field(&assertion.date.to_string());
            field(&assertion.account);
            field(&assertion.balance.cents().to_string());
        }

        format!("{:x}", hasher.finalize())
    }
}

fn optional<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}
