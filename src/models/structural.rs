//! Structural validation errors
//!
//! Raised by the model constructors when a single entity is malformed. These
//! never involve another entity: cross-entity checks belong to the validator.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::money::{Currency, Money};

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StructuralError {
    #[error("Account identifier cannot be empty")]
    EmptyIdentifier,

    #[error("Account identifier '{0}' has an empty segment")]
    EmptySegment(String),

    #[error("Currency cannot be empty")]
    EmptyCurrency,

    #[error("Invalid currency code '{0}'")]
    InvalidCurrency(String),

    #[error("Unknown account type '{0}'")]
    UnknownAccountType(String),

    #[error("Account '{account}' closes on {close} before it opens on {open}")]
    CloseBeforeOpen {
        account: String,
        open: chrono::NaiveDate,
        close: chrono::NaiveDate,
    },

    #[error("Posting to '{0}' has a zero amount")]
    ZeroAmount(String),

    #[error("A transaction needs at least two postings, got {0}")]
    TooFewPostings(usize),

    #[error("Transaction does not balance: {currency} postings sum to {residual}")]
    Unbalanced { currency: Currency, residual: Money },

    #[error("Amount overflow while summing {0} postings")]
    Overflow(Currency),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("Invalid text encoding: {0}")]
    InvalidEncoding(String),

    #[error("Invalid budget period: {0}")]
    InvalidPeriod(String),
}
