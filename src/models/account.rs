//! Account model
//!
//! Accounts are identified by a hierarchical, colon-separated path such as
//! `Assets:Checking` or `Expense:Groceries`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::money::{Currency, Money};
use super::structural::StructuralError;

/// The five account classes of double-entry bookkeeping
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AccountType {
    Asset,
    Liability,
    Equity,
    Income,
    Expense,
}

/// Which side of a posting increases an account
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalBalance {
    /// Positive amounts increase the account
    Debit,
    /// Negative amounts increase the account
    Credit,
}

impl AccountType {
    pub const ALL: [AccountType; 5] = [
        Self::Asset,
        Self::Liability,
        Self::Equity,
        Self::Income,
        Self::Expense,
    ];

    /// Asset and Expense increase on debit; the others increase on credit
    pub fn normal_balance(&self) -> NormalBalance {
        match self {
            Self::Asset | Self::Expense => NormalBalance::Debit,
            Self::Liability | Self::Income | Self::Equity => NormalBalance::Credit,
        }
    }

    /// Multiplier turning a raw posting sum into an increase of this account
    pub fn normal_sign(&self) -> i64 {
        match self.normal_balance() {
            NormalBalance::Debit => 1,
            NormalBalance::Credit => -1,
        }
    }

    /// Parse account type from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "asset" | "assets" => Some(Self::Asset),
            "liability" | "liabilities" => Some(Self::Liability),
            "equity" => Some(Self::Equity),
            "income" | "revenue" => Some(Self::Income),
            "expense" | "expenses" => Some(Self::Expense),
            _ => None,
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Asset => "Asset",
            Self::Liability => "Liability",
            Self::Equity => "Equity",
            Self::Income => "Income",
            Self::Expense => "Expense",
        };
        f.pad(name)
    }
}

impl std::str::FromStr for AccountType {
    type Err = StructuralError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| StructuralError::UnknownAccountType(s.to_string()))
    }
}

/// Validate a hierarchical account identifier and return it trimmed
pub fn normalize_identifier(identifier: &str) -> Result<String, StructuralError> {
    let identifier = identifier.trim();
    if identifier.is_empty() {
        return Err(StructuralError::EmptyIdentifier);
    }
    if identifier.split(':').any(|segment| segment.trim().is_empty()) {
        return Err(StructuralError::EmptySegment(identifier.to_string()));
    }
    Ok(identifier.to_string())
}

/// A ledger account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    identifier: String,
    account_type: AccountType,
    currency: Option<Currency>,
    opening_balance: Option<Money>,
    open_date: Option<NaiveDate>,
    close_date: Option<NaiveDate>,
    #[serde(default)]
    description: String,
}

impl Account {
    /// Create a new account with no currency, opening balance or lifetime
    pub fn new(identifier: &str, account_type: AccountType) -> Result<Self, StructuralError> {
        Ok(Self {
            identifier: normalize_identifier(identifier)?,
            account_type,
            currency: None,
            opening_balance: None,
            open_date: None,
            close_date: None,
            description: String::new(),
        })
    }

    pub fn with_currency(mut self, currency: Currency) -> Self {
        self.currency = Some(currency);
        self
    }

    pub fn with_opening_balance(mut self, balance: Money) -> Self {
        self.opening_balance = Some(balance);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the open and close dates; a close date before the open date is rejected
    pub fn with_lifetime(
        mut self,
        open: Option<NaiveDate>,
        close: Option<NaiveDate>,
    ) -> Result<Self, StructuralError> {
        if let (Some(open), Some(close)) = (open, close) {
            if close < open {
                return Err(StructuralError::CloseBeforeOpen {
                    account: self.identifier,
                    open,
                    close,
                });
            }
        }
        self.open_date = open;
        self.close_date = close;
        Ok(self)
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn account_type(&self) -> AccountType {
        self.account_type
    }

    /// Declared currency; `None` means the ledger default applies
    pub fn currency(&self) -> Option<&Currency> {
        self.currency.as_ref()
    }

    pub fn opening_balance(&self) -> Option<Money> {
        self.opening_balance
    }

    pub fn open_date(&self) -> Option<NaiveDate> {
        self.open_date
    }

    pub fn close_date(&self) -> Option<NaiveDate> {
        self.close_date
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Whether the account is open on the given date
    pub fn is_open_on(&self, date: NaiveDate) -> bool {
        self.open_date.map_or(true, |open| date >= open)
            && self.close_date.map_or(true, |close| date <= close)
    }

    /// The parent path, e.g. `Expense` for `Expense:Groceries`
    pub fn parent(&self) -> Option<&str> {
        self.identifier.rsplit_once(':').map(|(parent, _)| parent)
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.identifier, self.account_type)
    }
}
