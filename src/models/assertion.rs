//! Balance assertions
//!
//! A statement balance the ledger must reproduce for an account on a date.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::account::normalize_identifier;
use super::money::Money;
use super::structural::StructuralError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceAssertion {
    pub date: NaiveDate,
    pub account: String,
    /// Opening balance plus postings up to and including `date`
    pub balance: Money,
}

impl BalanceAssertion {
    pub fn new(date: NaiveDate, account: &str, balance: Money) -> Result<Self, StructuralError> {
        Ok(Self {
            date,
            account: normalize_identifier(account)?,
            balance,
        })
    }
}
