//! Integrity validator
//!
//! Checks a whole ledger and reports every violation it finds, in a fixed
//! order: referential integrity, balance, currency, dedup-key uniqueness,
//! chronology (strict mode only), stored structure, account lifetimes and
//! balance assertions. Validation never errors; problems are data.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;
use tracing::debug;

use super::matcher::{DedupKey, Normalization};
use crate::models::Ledger;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViolationKind {
    Referential,
    Balance,
    Currency,
    DuplicateKey,
    Chronology,
    Structural,
    AccountLifetime,
    BalanceAssertion,
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Referential => "referential",
            Self::Balance => "balance",
            Self::Currency => "currency",
            Self::DuplicateKey => "duplicate-key",
            Self::Chronology => "chronology",
            Self::Structural => "structural",
            Self::AccountLifetime => "account-lifetime",
            Self::BalanceAssertion => "balance-assertion",
        };
        f.pad(name)
    }
}

/// What a violation points at; positions are zero-based
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityRef {
    Transaction { position: usize },
    Posting { position: usize, index: usize },
    Assertion { index: usize },
}

impl EntityRef {
    /// Transaction position, if the entity belongs to one
    pub fn position(&self) -> Option<usize> {
        match self {
            Self::Transaction { position } | Self::Posting { position, .. } => Some(*position),
            Self::Assertion { .. } => None,
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transaction { position } => write!(f, "transaction #{}", position + 1),
            Self::Posting { position, index } => {
                write!(f, "transaction #{} posting {}", position + 1, index + 1)
            }
            Self::Assertion { index } => write!(f, "assertion {}", index + 1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub kind: ViolationKind,
    pub entity: EntityRef,
    pub message: String,
}

impl Violation {
    fn new(kind: ViolationKind, entity: EntityRef, message: impl Into<String>) -> Self {
        Self {
            kind,
            entity,
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind, self.entity, self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationReport {
    Valid,
    /// Never empty
    Invalid(Vec<Violation>),
}

impl ValidationReport {
    pub fn from_violations(violations: Vec<Violation>) -> Self {
        if violations.is_empty() {
            Self::Valid
        } else {
            Self::Invalid(violations)
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    pub fn violations(&self) -> &[Violation] {
        match self {
            Self::Valid => &[],
            Self::Invalid(violations) => violations,
        }
    }

    pub fn into_violations(self) -> Vec<Violation> {
        match self {
            Self::Valid => Vec::new(),
            Self::Invalid(violations) => violations,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationOptions {
    /// Require transactions to be recorded in date order
    pub strict_chronology: bool,
    /// Normalization used for dedup-key uniqueness
    pub normalization: Normalization,
}

/// Proof that a ledger passed validation
#[derive(Debug, Clone, Copy)]
pub struct ValidatedLedger<'a> {
    ledger: &'a Ledger,
}

impl<'a> ValidatedLedger<'a> {
    pub fn ledger(&self) -> &'a Ledger {
        self.ledger
    }
}

impl Deref for ValidatedLedger<'_> {
    type Target = Ledger;

    fn deref(&self) -> &Ledger {
        self.ledger
    }
}

#[derive(Debug, Clone, Default)]
pub struct Validator {
    options: ValidationOptions,
}

impl Validator {
    pub fn new(options: ValidationOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ValidationOptions {
        &self.options
    }

    /// Run every check and collect all violations
    pub fn validate(&self, ledger: &Ledger) -> ValidationReport {
        let mut violations = Vec::new();

        let passes: [(&str, fn(&Self, &Ledger, &mut Vec<Violation>)); 8] = [
            ("referential", Self::check_references),
            ("balance", Self::check_balance),
            ("currency", Self::check_currencies),
            ("duplicate-key", Self::check_unique_keys),
            ("chronology", Self::check_chronology),
            ("structural", Self::check_structure),
            ("account-lifetime", Self::check_lifetimes),
            ("balance-assertion", Self::check_assertions),
        ];
        for (name, pass) in passes {
            let before = violations.len();
            pass(self, ledger, &mut violations);
            debug!(pass = name, found = violations.len() - before, "validator pass");
        }

        ValidationReport::from_violations(violations)
    }

    /// Validate and hand back a proof token on success
    pub fn certify<'a>(&self, ledger: &'a Ledger) -> Result<ValidatedLedger<'a>, Vec<Violation>> {
        match self.validate(ledger) {
            ValidationReport::Valid => Ok(ValidatedLedger { ledger }),
            ValidationReport::Invalid(violations) => Err(violations),
        }
    }

    fn check_references(&self, ledger: &Ledger, out: &mut Vec<Violation>) {
        for (position, txn) in ledger.transactions().iter().enumerate() {
            for (index, posting) in txn.postings().iter().enumerate() {
                if ledger.account(posting.account()).is_none() {
                    out.push(Violation::new(
                        ViolationKind::Referential,
                        EntityRef::Posting { position, index },
                        format!("unknown account '{}'", posting.account()),
                    ));
                }
            }
        }
        for (index, assertion) in ledger.assertions().iter().enumerate() {
            if ledger.account(&assertion.account).is_none() {
                out.push(Violation::new(
                    ViolationKind::Referential,
                    EntityRef::Assertion { index },
                    format!("unknown account '{}'", assertion.account),
                ));
            }
        }
    }

    fn check_balance(&self, ledger: &Ledger, out: &mut Vec<Violation>) {
        for (position, txn) in ledger.transactions().iter().enumerate() {
            let entity = EntityRef::Transaction { position };
            match txn.residuals() {
                Ok(residuals) => {
                    for (currency, residual) in residuals {
                        out.push(Violation::new(
                            ViolationKind::Balance,
                            entity,
                            format!("{} postings sum to {}", currency, residual),
                        ));
                    }
                }
                Err(err) => out.push(Violation::new(ViolationKind::Balance, entity, err.to_string())),
            }
        }
    }

    fn check_currencies(&self, ledger: &Ledger, out: &mut Vec<Violation>) {
        for (position, txn) in ledger.transactions().iter().enumerate() {
            for (index, posting) in txn.postings().iter().enumerate() {
                let Some(account) = ledger.account(posting.account()) else {
                    continue;
                };
                let expected = ledger.currency_of(account);
                if posting.currency() != expected {
                    out.push(Violation::new(
                        ViolationKind::Currency,
                        EntityRef::Posting { position, index },
                        format!(
                            "posting in {} but '{}' is kept in {}",
                            posting.currency(),
                            account.identifier(),
                            expected
                        ),
                    ));
                }
            }
        }
    }

    fn check_unique_keys(&self, ledger: &Ledger, out: &mut Vec<Violation>) {
        let mut first_seen: HashMap<DedupKey, usize> = HashMap::new();
        for (position, txn) in ledger.transactions().iter().enumerate() {
            let key = DedupKey::compute(txn, &self.options.normalization);
            if let Some(first) = first_seen.get(&key) {
                out.push(Violation::new(
                    ViolationKind::DuplicateKey,
                    EntityRef::Transaction { position },
                    format!("same dedup key as transaction #{}", first + 1),
                ));
            } else {
                first_seen.insert(key, position);
            }
        }
    }

    fn check_chronology(&self, ledger: &Ledger, out: &mut Vec<Violation>) {
        if !self.options.strict_chronology {
            return;
        }
        for (position, pair) in ledger.transactions().windows(2).enumerate() {
            if pair[1].date() < pair[0].date() {
                out.push(Violation::new(
                    ViolationKind::Chronology,
                    EntityRef::Transaction { position: position + 1 },
                    format!("dated {} after a transaction dated {}", pair[1].date(), pair[0].date()),
                ));
            }
        }
    }

    fn check_structure(&self, ledger: &Ledger, out: &mut Vec<Violation>) {
        for (position, txn) in ledger.transactions().iter().enumerate() {
            if let Err(err) = txn.check_structure() {
                out.push(Violation::new(
                    ViolationKind::Structural,
                    EntityRef::Transaction { position },
                    err.to_string(),
                ));
            }
        }
    }

    fn check_lifetimes(&self, ledger: &Ledger, out: &mut Vec<Violation>) {
        for (position, txn) in ledger.transactions().iter().enumerate() {
            for (index, posting) in txn.postings().iter().enumerate() {
                let Some(account) = ledger.account(posting.account()) else {
                    continue;
                };
                if !account.is_open_on(txn.date()) {
                    out.push(Violation::new(
                        ViolationKind::AccountLifetime,
                        EntityRef::Posting { position, index },
                        format!("'{}' is not open on {}", account.identifier(), txn.date()),
                    ));
                }
            }
        }
    }

    fn check_assertions(&self, ledger: &Ledger, out: &mut Vec<Violation>) {
        for (index, assertion) in ledger.assertions().iter().enumerate() {
            if ledger.account(&assertion.account).is_none() {
                continue;
            }
            let entity = EntityRef::Assertion { index };
            match ledger.balance_with_opening(&assertion.account, assertion.date) {
                Ok(actual) if actual == assertion.balance => {}
                Ok(actual) => out.push(Violation::new(
                    ViolationKind::BalanceAssertion,
                    entity,
                    format!(
                        "'{}' on {}: expected {}, ledger has {} (off by {})",
                        assertion.account,
                        assertion.date,
                        assertion.balance,
                        actual,
                        actual - assertion.balance
                    ),
                )),
                Err(err) => out.push(Violation::new(
                    ViolationKind::BalanceAssertion,
                    entity,
                    err.to_string(),
                )),
            }
        }
    }
}
