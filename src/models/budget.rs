//! Budget target model
//!
//! A target amount for one account over one budget period.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::account::normalize_identifier;
use super::money::Money;
use super::period::BudgetPeriod;
use super::structural::StructuralError;

/// A budget target for a specific account in a specific period
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetEntry {
    /// The account this target is for
    pub account: String,

    /// The budget period
    pub period: BudgetPeriod,

    /// Target amount, in the account's natural sign
    pub target: Money,
}

impl BudgetEntry {
    /// Create a budget entry, validating the account identifier
    pub fn new(account: &str, period: BudgetPeriod, target: Money) -> Result<Self, StructuralError> {
        Ok(Self {
            account: normalize_identifier(account)?,
            period,
            target,
        })
    }
}

impl fmt::Display for BudgetEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.account, self.period, self.target)
    }
}
