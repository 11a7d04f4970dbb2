//! Core data models for balancebook
//!
//! This module contains the bookkeeping domain: accounts, postings,
//! transactions, the ledger value, budget targets and balance assertions.
//! Constructors reject malformed single entities with a [`StructuralError`].

pub mod account;
pub mod assertion;
pub mod budget;
pub mod ledger;
pub mod money;
pub mod period;
pub mod structural;
pub mod transaction;

pub use account::{Account, AccountType, NormalBalance};
pub use assertion::BalanceAssertion;
pub use budget::BudgetEntry;
pub use ledger::{Ledger, RegisterLine};
pub use money::{AmountFormat, Currency, Money, MoneyParseError};
pub use period::{fiscal_month, fiscal_year, BudgetPeriod};
pub use structural::StructuralError;
pub use transaction::{Posting, Transaction, REVERSAL_PREFIX};
