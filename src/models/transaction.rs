//! Transaction and posting models
//!
//! A transaction is a dated, balanced group of postings. Once built it is
//! immutable: corrections are appended as reversals instead of edits.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::account::normalize_identifier;
use super::money::{Currency, Money};
use super::structural::StructuralError;
use crate::services::matcher::{DedupKey, Normalization};

/// Prefix given to the description of reversal transactions
pub const REVERSAL_PREFIX: &str = "Reversal of:";

/// One signed amount against one account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    account: String,
    amount: Money,
    currency: Currency,
    #[serde(default)]
    memo: Option<String>,
    /// Date the bank booked the posting, when it differs from the transaction's
    #[serde(default, skip_serializing_if = "Option::is_none")]
    statement_date: Option<NaiveDate>,
    /// Description as printed on the bank statement
    #[serde(default, skip_serializing_if = "Option::is_none")]
    statement_description: Option<String>,
}

impl Posting {
    /// Create a posting; zero amounts and empty account identifiers are rejected
    pub fn new(account: &str, amount: Money, currency: Currency) -> Result<Self, StructuralError> {
        let account = normalize_identifier(account)?;
        if amount.is_zero() {
            return Err(StructuralError::ZeroAmount(account));
        }
        Ok(Self {
            account,
            amount,
            currency,
            memo: None,
            statement_date: None,
            statement_description: None,
        })
    }

    /// Build a posting exactly as stored, without structural checks
    pub fn from_stored(
        account: impl Into<String>,
        amount: Money,
        currency: Currency,
        memo: Option<String>,
    ) -> Self {
        Self {
            account: account.into(),
            amount,
            currency,
            memo: memo.filter(|m| !m.trim().is_empty()),
            statement_date: None,
            statement_description: None,
        }
    }

    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        let memo = memo.into();
        self.memo = if memo.trim().is_empty() {
            None
        } else {
            Some(memo)
        };
        self
    }

    /// Attach what the bank statement says about this posting
    pub fn with_statement(mut self, date: Option<NaiveDate>, description: Option<String>) -> Self {
        self.statement_date = date;
        self.statement_description = description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        self
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    pub fn amount(&self) -> Money {
        self.amount
    }

    pub fn currency(&self) -> &Currency {
        &self.currency
    }

    pub fn memo(&self) -> Option<&str> {
        self.memo.as_deref()
    }

    pub fn statement_date(&self) -> Option<NaiveDate> {
        self.statement_date
    }

    pub fn statement_description(&self) -> Option<&str> {
        self.statement_description.as_deref()
    }

    fn negated(&self) -> Self {
        Self {
            amount: -self.amount,
            ..self.clone()
        }
    }
}

impl fmt::Display for Posting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.account, self.amount, self.currency)
    }
}

/// A balanced group of two or more postings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    date: NaiveDate,
    #[serde(default)]
    description: Option<String>,
    postings: Vec<Posting>,
}

impl Transaction {
    /// Create a transaction, enforcing the double-entry law per currency
    pub fn new(
        date: NaiveDate,
        description: Option<String>,
        postings: Vec<Posting>,
    ) -> Result<Self, StructuralError> {
        let txn = Self::from_stored(date, description, postings);
        txn.check_structure()?;
        if let Some((currency, residual)) = txn.residuals()?.into_iter().next() {
            return Err(StructuralError::Unbalanced { currency, residual });
        }
        Ok(txn)
    }

    /// Build a transaction exactly as stored; the validator reports any problem
    pub fn from_stored(
        date: NaiveDate,
        description: Option<String>,
        postings: Vec<Posting>,
    ) -> Self {
        Self {
            date,
            description: description
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
            postings,
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn postings(&self) -> &[Posting] {
        &self.postings
    }

    /// Posting count and zero-amount checks
    pub fn check_structure(&self) -> Result<(), StructuralError> {
        if self.postings.len() < 2 {
            return Err(StructuralError::TooFewPostings(self.postings.len()));
        }
        if let Some(p) = self.postings.iter().find(|p| p.amount.is_zero()) {
            return Err(StructuralError::ZeroAmount(p.account.clone()));
        }
        Ok(())
    }

    /// Signed sum of the postings for every currency present
    pub fn currency_sums(&self) -> Result<BTreeMap<Currency, Money>, StructuralError> {
        let mut sums: BTreeMap<Currency, Money> = BTreeMap::new();
        for p in &self.postings {
            let entry = sums.entry(p.currency.clone()).or_default();
            *entry = entry
                .checked_add(p.amount)
                .ok_or_else(|| StructuralError::Overflow(p.currency.clone()))?;
        }
        Ok(sums)
    }

    /// Currencies whose postings do not sum to exactly zero
    pub fn residuals(&self) -> Result<Vec<(Currency, Money)>, StructuralError> {
        Ok(self
            .currency_sums()?
            .into_iter()
            .filter(|(_, sum)| !sum.is_zero())
            .collect())
    }

    pub fn is_balanced(&self) -> bool {
        matches!(self.residuals(), Ok(r) if r.is_empty())
    }

    /// Whether any posting targets the given account
    pub fn touches(&self, account: &str) -> bool {
        self.postings.iter().any(|p| p.account == account)
    }

    /// Dedup key under the default normalization rules
    pub fn dedup_key(&self) -> DedupKey {
        DedupKey::compute(self, &Normalization::default())
    }

    /// A copy with every posting to `from` moved to `to`; `None` when nothing moves
    pub fn reclassified(&self, from: &str, to: &str) -> Option<Self> {
        if from == to || !self.touches(from) {
            return None;
        }
        let postings = self
            .postings
            .iter()
            .map(|p| {
                if p.account == from {
                    Posting {
                        account: to.to_string(),
                        ..p.clone()
                    }
                } else {
                    p.clone()
                }
            })
            .collect();
        Some(Self {
            postings,
            ..self.clone()
        })
    }

    /// An offsetting transaction that cancels this one
    pub fn reversal(&self, date: NaiveDate) -> Self {
        let description = match &self.description {
            Some(d) => format!("{} {}", REVERSAL_PREFIX, d),
            None => format!("{} transaction of {}", REVERSAL_PREFIX, self.date),
        };
        Self {
            date,
            description: Some(description),
            postings: self.postings.iter().map(Posting::negated).collect(),
        }
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.date, self.description.as_deref().unwrap_or("(no description)"))?;
        for p in &self.postings {
            write!(f, " | {}", p)?;
        }
        Ok(())
    }
}
