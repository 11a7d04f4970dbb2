//! Import pipeline
//!
//! Turns decoded bank rows into ledger transactions in two phases:
//!
//! 1. [`ImportPipeline::propose`] decodes rows into transactions and runs the
//!    matcher, producing a serializable [`ImportProposal`].
//! 2. [`ImportPipeline::resolve`] applies the review decisions, merges the
//!    accepted transactions, validates the result and either commits it or
//!    rolls back to the original ledger.
//!
//! The ledger passed in is never changed; a committed import returns a new one.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::matcher::{Classification, ExistingMatch, MatchOptions, Matcher};
use super::validator::{ValidationOptions, ValidationReport, Validator, ViolationKind};
use crate::error::{BookError, BookResult, MergeConflictError};
use crate::models::{Account, Currency, Ledger, Money, Posting, StructuralError, Transaction};

/// One posting of a decoded row; the account is still a source label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidatePosting {
    pub account: String,
    pub amount: Money,
    /// `None` takes the account's effective currency
    pub currency: Option<Currency>,
    pub memo: Option<String>,
    /// Date and wording as printed on the statement
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statement_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statement_description: Option<String>,
}

impl CandidatePosting {
    pub fn new(account: impl Into<String>, amount: Money) -> Self {
        Self {
            account: account.into(),
            amount,
            currency: None,
            memo: None,
            statement_date: None,
            statement_description: None,
        }
    }

    pub fn with_currency(mut self, currency: Currency) -> Self {
        self.currency = Some(currency);
        self
    }

    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = Some(memo.into());
        self
    }

    pub fn with_statement(mut self, date: NaiveDate, description: Option<String>) -> Self {
        self.statement_date = Some(date);
        self.statement_description = description;
        self
    }
}

/// Typed fields of one source row, before any validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateFields {
    /// 1-based row number in the source file
    pub row_number: usize,
    pub date: NaiveDate,
    pub description: Option<String>,
    pub postings: Vec<CandidatePosting>,
}

/// A row that could not become a transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodeError {
    pub row_number: usize,
    pub error: StructuralError,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row {}: {}", self.row_number, self.error)
    }
}

impl std::error::Error for DecodeError {}

/// Translation from source labels to ledger account identifiers
///
/// Unmapped labels are used verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountMap(BTreeMap<String, String>);

impl AccountMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, label: impl Into<String>, account: impl Into<String>) -> Self {
        self.insert(label, account);
        self
    }

    pub fn insert(&mut self, label: impl Into<String>, account: impl Into<String>) {
        self.0.insert(label.into(), account.into());
    }

    pub fn resolve<'a>(&'a self, label: &'a str) -> &'a str {
        self.0.get(label).map(String::as_str).unwrap_or(label)
    }
}

/// Everything the first phase needs
#[derive(Debug, Clone, Default)]
pub struct ImportRequest {
    /// Where the rows came from, for the audit log
    pub source: String,
    pub rows: Vec<CandidateFields>,
    /// Rows the source adapter could not decode
    pub source_errors: Vec<DecodeError>,
    pub account_map: AccountMap,
    /// Accounts the caller explicitly creates with this import
    pub new_accounts: Vec<Account>,
}

/// Identifier of one review item within a proposal
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReviewId(u32);

impl ReviewId {
    pub fn new(n: u32) -> Self {
        Self(n)
    }

    pub fn number(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for ReviewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&format!("R{}", self.0))
    }
}

impl std::str::FromStr for ReviewId {
    type Err = BookError;

    /// Parse "R3", "r3" or "3"
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let digits = s
            .strip_prefix('R')
            .or_else(|| s.strip_prefix('r'))
            .unwrap_or(s);
        digits
            .parse()
            .map(Self)
            .map_err(|_| BookError::Import(format!("Invalid review id: {}", s)))
    }
}

/// A row dated on or before the last balance assertion of an account it touches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedRow {
    pub row_number: usize,
    pub account: String,
    /// Date of the assertion that closed the period
    pub cutoff: NaiveDate,
}

/// A decoded transaction together with its source row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposedTransaction {
    pub row_number: usize,
    pub transaction: Transaction,
}

/// A probable duplicate waiting for a human decision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewItem {
    pub id: ReviewId,
    pub row_number: usize,
    pub candidate: Transaction,
    pub existing: ExistingMatch,
}

/// Result of the first phase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportProposal {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub source: String,
    /// Revision of the ledger the proposal was built against
    pub base_revision: String,
    pub new: Vec<ProposedTransaction>,
    pub duplicates: Vec<ProposedTransaction>,
    pub review: Vec<ReviewItem>,
    pub decode_errors: Vec<DecodeError>,
    #[serde(default)]
    pub skipped: Vec<SkippedRow>,
    pub new_accounts: Vec<Account>,
}

impl ImportProposal {
    /// Rows that became transactions
    pub fn decoded(&self) -> usize {
        self.new.len() + self.duplicates.len() + self.review.len()
    }

    pub fn review_item(&self, id: ReviewId) -> Option<&ReviewItem> {
        self.review.iter().find(|item| item.id == id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReviewDecision {
    /// Not a duplicate; merge the candidate
    Accept,
    /// A duplicate; drop the candidate
    Reject,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewDecisions(BTreeMap<ReviewId, ReviewDecision>);

impl ReviewDecisions {
    pub fn new() -> Self {
        Self::default()
    }

    /// The same decision for every review item of a proposal
    pub fn all(proposal: &ImportProposal, decision: ReviewDecision) -> Self {
        Self(proposal.review.iter().map(|item| (item.id, decision)).collect())
    }

    pub fn decide(&mut self, id: ReviewId, decision: ReviewDecision) {
        self.0.insert(id, decision);
    }

    pub fn with(mut self, id: ReviewId, decision: ReviewDecision) -> Self {
        self.decide(id, decision);
        self
    }

    pub fn get(&self, id: ReviewId) -> Option<ReviewDecision> {
        self.0.get(&id).copied()
    }
}

/// Pipeline stages, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImportState {
    Decoding,
    Matching,
    Merging,
    Validating,
    Committed,
    RolledBack,
}

impl fmt::Display for ImportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Decoding => "decoding",
            Self::Matching => "matching",
            Self::Merging => "merging",
            Self::Validating => "validating",
            Self::Committed => "committed",
            Self::RolledBack => "rolled back",
        };
        f.pad(name)
    }
}

/// Counts describing a finished import
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    pub proposal_id: Uuid,
    pub source: String,
    pub state: ImportState,
    pub decoded: usize,
    pub duplicates: usize,
    pub review: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub new: usize,
    pub merged: usize,
    pub decode_errors: usize,
    #[serde(default)]
    pub skipped: usize,
}

#[derive(Debug, Clone)]
pub enum ImportOutcome {
    Committed {
        ledger: Ledger,
        report: ImportReport,
    },
    /// The merged ledger failed validation; `ledger` is the original
    RolledBack {
        ledger: Ledger,
        report: ImportReport,
        conflict: MergeConflictError,
    },
}

impl ImportOutcome {
    pub fn ledger(&self) -> &Ledger {
        match self {
            Self::Committed { ledger, .. } | Self::RolledBack { ledger, .. } => ledger,
        }
    }

    pub fn into_ledger(self) -> Ledger {
        match self {
            Self::Committed { ledger, .. } | Self::RolledBack { ledger, .. } => ledger,
        }
    }

    pub fn report(&self) -> &ImportReport {
        match self {
            Self::Committed { report, .. } | Self::RolledBack { report, .. } => report,
        }
    }

    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed { .. })
    }
}

/// The two-phase import pipeline
#[derive(Debug, Clone, Default)]
pub struct ImportPipeline {
    matcher: Matcher,
    validator: Validator,
}

impl ImportPipeline {
    /// Create a pipeline; validation reuses the matcher's normalization
    pub fn new(matching: MatchOptions, validation: ValidationOptions) -> Self {
        Self {
            matcher: Matcher::new(matching),
            validator: Validator::new(ValidationOptions {
                normalization: matching.normalization,
                ..validation
            }),
        }
    }

    /// Decode and match; nothing is merged yet
    pub fn propose(&self, ledger: &Ledger, request: ImportRequest) -> ImportProposal {
        let id = Uuid::new_v4();
        info!(proposal = %id, source = %request.source, rows = request.rows.len(), state = %ImportState::Decoding);

        let mut decode_errors = request.source_errors.clone();
        let mut candidates = Vec::with_capacity(request.rows.len());
        let mut row_numbers = Vec::with_capacity(request.rows.len());
        let mut skipped = Vec::new();
        for row in &request.rows {
            if let Some(closed) = asserted_period(ledger, &request.account_map, row) {
                debug!(row = row.row_number, account = %closed.account, cutoff = %closed.cutoff, "row precedes balance assertion");
                skipped.push(closed);
                continue;
            }
            match self.decode_row(ledger, &request, row) {
                Ok(txn) => {
                    candidates.push(txn);
                    row_numbers.push(row.row_number);
                }
                Err(error) => {
                    warn!(row = row.row_number, %error, "row rejected");
                    decode_errors.push(DecodeError {
                        row_number: row.row_number,
                        error,
                    });
                }
            }
        }

        decode_errors.sort_by_key(|e| e.row_number);
        if !skipped.is_empty() {
            info!(proposal = %id, skipped = skipped.len(), "rows skipped by balance assertions");
        }

        info!(proposal = %id, candidates = candidates.len(), state = %ImportState::Matching);
        let classes = self.matcher.classify(ledger, &candidates);

        let mut new = Vec::new();
        let mut duplicates = Vec::new();
        let mut review = Vec::new();
        for ((transaction, row_number), class) in candidates.into_iter().zip(row_numbers).zip(classes) {
            match class {
                Classification::New => new.push(ProposedTransaction {
                    row_number,
                    transaction,
                }),
                Classification::Duplicate { .. } => duplicates.push(ProposedTransaction {
                    row_number,
                    transaction,
                }),
                Classification::Review(existing) => review.push(ReviewItem {
                    id: ReviewId(review.len() as u32 + 1),
                    row_number,
                    candidate: transaction,
                    existing,
                }),
            }
        }

        ImportProposal {
            id,
            created_at: Utc::now(),
            source: request.source,
            base_revision: ledger.revision(),
            new,
            duplicates,
            review,
            decode_errors,
            skipped,
            new_accounts: request.new_accounts,
        }
    }

    fn decode_row(
        &self,
        ledger: &Ledger,
        request: &ImportRequest,
        row: &CandidateFields,
    ) -> Result<Transaction, StructuralError> {
        let mut postings = Vec::with_capacity(row.postings.len());
        for candidate in &row.postings {
            let account = request.account_map.resolve(&candidate.account);
            let currency = match &candidate.currency {
                Some(currency) => currency.clone(),
                None => effective_currency(ledger, &request.new_accounts, account),
            };
            let mut posting = Posting::new(account, candidate.amount, currency)?;
            if let Some(memo) = &candidate.memo {
                posting = posting.with_memo(memo.clone());
            }
            posting = posting.with_statement(
                candidate.statement_date,
                candidate.statement_description.clone(),
            );
            postings.push(posting);
        }
        Transaction::new(row.date, row.description.clone(), postings)
    }

    /// Apply decisions, merge, validate, and commit or roll back
    pub fn resolve(
        &self,
        ledger: &Ledger,
        proposal: ImportProposal,
        decisions: &ReviewDecisions,
    ) -> BookResult<ImportOutcome> {
        if ledger.revision() != proposal.base_revision {
            return Err(BookError::StaleProposal);
        }
        let known: HashSet<ReviewId> = proposal.review.iter().map(|item| item.id).collect();
        if let Some(unknown) = decisions.0.keys().find(|id| !known.contains(id)) {
            return Err(BookError::UnknownReviewItem(*unknown));
        }
        let unresolved: Vec<ReviewId> = proposal
            .review
            .iter()
            .map(|item| item.id)
            .filter(|id| decisions.get(*id).is_none())
            .collect();
        if !unresolved.is_empty() {
            return Err(BookError::UnresolvedReview(unresolved));
        }

        let mut report = ImportReport {
            proposal_id: proposal.id,
            source: proposal.source.clone(),
            state: ImportState::Merging,
            decoded: proposal.decoded(),
            duplicates: proposal.duplicates.len(),
            review: proposal.review.len(),
            accepted: 0,
            rejected: 0,
            new: proposal.new.len(),
            merged: 0,
            decode_errors: proposal.decode_errors.len(),
            skipped: proposal.skipped.len(),
        };
        info!(proposal = %proposal.id, state = %report.state);

        let mut merging: Vec<(usize, Transaction)> = proposal
            .new
            .into_iter()
            .map(|p| (p.row_number, p.transaction))
            .collect();
        for item in proposal.review {
            match decisions.get(item.id) {
                Some(ReviewDecision::Accept) => {
                    report.accepted += 1;
                    merging.push((item.row_number, item.candidate));
                }
                _ => report.rejected += 1,
            }
        }
        merging.sort_by_key(|(row_number, _)| *row_number);
        report.merged = merging.len();

        let base_len = ledger.len();
        let mut merged = ledger.clone();
        for account in proposal.new_accounts {
            merged = merged.with_account(account)?;
        }
        for (_, txn) in merging {
            merged = merged.with_transaction(txn);
        }

        report.state = ImportState::Validating;
        info!(proposal = %report.proposal_id, merged = report.merged, state = %report.state);
        match self.validator.validate(&merged) {
            ValidationReport::Valid => {
                report.state = ImportState::Committed;
                info!(proposal = %report.proposal_id, state = %report.state);
                Ok(ImportOutcome::Committed {
                    ledger: merged,
                    report,
                })
            }
            ValidationReport::Invalid(violations) => {
                if let Some(v) = violations.iter().find(|v| {
                    v.kind == ViolationKind::DuplicateKey
                        && v.entity.position().is_some_and(|p| p >= base_len)
                }) {
                    error!(violation = %v, "merged transaction collides with an existing key");
                    return Err(BookError::Internal(format!(
                        "matcher let a duplicate through: {}",
                        v
                    )));
                }

                report.state = ImportState::RolledBack;
                warn!(
                    proposal = %report.proposal_id,
                    violations = violations.len(),
                    state = %report.state
                );
                Ok(ImportOutcome::RolledBack {
                    ledger: ledger.clone(),
                    report,
                    conflict: MergeConflictError { violations },
                })
            }
        }
    }

    /// Propose, then resolve every review item with the same decision
    pub fn import_all(
        &self,
        ledger: &Ledger,
        request: ImportRequest,
        decision: ReviewDecision,
    ) -> BookResult<ImportOutcome> {
        let proposal = self.propose(ledger, request);
        let decisions = ReviewDecisions::all(&proposal, decision);
        self.resolve(ledger, proposal, &decisions)
    }
}

/// The newest assertion covering `row`, if any account it touches has one
fn asserted_period(ledger: &Ledger, account_map: &AccountMap, row: &CandidateFields) -> Option<SkippedRow> {
    row.postings
        .iter()
        .filter_map(|candidate| ledger.newest_assertion(account_map.resolve(&candidate.account)))
        .filter(|assertion| row.date <= assertion.date)
        .max_by_key(|assertion| assertion.date)
        .map(|assertion| SkippedRow {
            row_number: row.row_number,
            account: assertion.account.clone(),
            cutoff: assertion.date,
        })
}

/// Currency a posting to `account` takes when the row does not name one
fn effective_currency(ledger: &Ledger, new_accounts: &[Account], account: &str) -> Currency {
    if let Some(existing) = ledger.account(account) {
        return ledger.currency_of(existing).clone();
    }
    new_accounts
        .iter()
        .find(|a| a.identifier() == account)
        .and_then(|a| a.currency().cloned())
        .unwrap_or_else(|| ledger.default_currency().clone())
}
