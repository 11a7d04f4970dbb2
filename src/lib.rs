//! balancebook - personal double-entry bookkeeping on CSV files
//!
//! The ledger lives in a handful of CSV tables. The library loads them into
//! an immutable [`Ledger`](models::Ledger) value, checks every invariant of
//! double-entry bookkeeping, imports bank exports without re-recording what
//! is already there, and reports budget variance.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - `config`: Book directory resolution and YAML settings
//! - `error`: Custom error types
//! - `models`: Money, accounts, transactions, periods and the ledger value
//! - `services`: Validator, dedup matcher, import pipeline, budget engine
//! - `import`: Bank CSV adapters feeding the import pipeline
//! - `storage`: CSV tables with atomic writes
//! - `audit`: Append-only audit log
//! - `display`: Table rendering for the terminal
//! - `cli`: Command handlers for the binary
//!
//! # Example
//!
//! ```rust,ignore
//! use balancebook::config::BookPaths;
//! use balancebook::services::{ImportPipeline, ReviewDecision};
//! use balancebook::storage::Storage;
//!
//! let storage = Storage::open(BookPaths::new()?)?;
//! let ledger = storage.load_ledger()?;
//! let outcome = ImportPipeline::default().import_all(&ledger, request, ReviewDecision::Reject)?;
//! if outcome.is_committed() {
//!     storage.save_ledger(outcome.ledger())?;
//! }
//! ```

pub mod audit;
pub mod cli;
pub mod config;
pub mod display;
pub mod error;
pub mod import;
pub mod logging;
pub mod models;
pub mod services;
pub mod storage;

pub use error::{BookError, BookResult};
