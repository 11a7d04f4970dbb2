//! Service layer for balancebook
//!
//! The accounting engine proper: the integrity validator, the deduplication
//! matcher, the two-phase import pipeline and the budgeting engine. Services
//! take typed values and return typed values; they never touch files.

pub mod budget;
pub mod import;
pub mod matcher;
pub mod validator;

pub use budget::{BudgetEngine, BudgetRow, BudgetTotal};
pub use import::{
    AccountMap, CandidateFields, CandidatePosting, DecodeError, ImportOutcome, ImportPipeline,
    ImportProposal, ImportReport, ImportRequest, ImportState, ReviewDecision, ReviewDecisions,
    ReviewId, ReviewItem,
};
pub use matcher::{
    Classification, DedupKey, ExistingMatch, MatchOptions, Matcher, Normalization, Partition,
    Signature,
};
pub use validator::{
    EntityRef, ValidatedLedger, ValidationOptions, ValidationReport, Validator, Violation,
    ViolationKind,
};
