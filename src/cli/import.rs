//! CLI commands for bank imports and review
//!
//! `import` decodes a bank export and proposes the merge. When every row is
//! either new or an exact duplicate, or when `--accept-all`/`--reject-all`
//! settles the probable duplicates, the merge happens right away. Otherwise
//! the proposal is saved and `review` finishes it.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};
use tracing::warn;

use crate::audit::{AuditEntry, AuditLogger};
use crate::display::{format_import_report, format_proposal, format_review_items, format_violations};
use crate::error::{BookError, BookResult};
use crate::import::{decode_file, detect_mapping, BankCsvSource, ColumnMapping, TextEncoding};
use crate::models::{Account, AccountType, Currency, Ledger};
use crate::services::{
    AccountMap, ImportOutcome, ImportPipeline, ImportProposal, ImportRequest, ReviewDecision,
    ReviewDecisions, ReviewId,
};
use crate::storage::Storage;

/// Arguments of the import command
#[derive(Args)]
pub struct ImportArgs {
    /// Bank or card CSV export
    pub file: PathBuf,

    /// Import profile from the settings file
    #[arg(short, long, conflicts_with_all = ["preset", "account"])]
    pub profile: Option<String>,

    /// Column mapping preset (default, simple_bank, credit_card, debit_credit);
    /// detected from the file when omitted
    #[arg(long)]
    pub preset: Option<String>,

    /// Account the export belongs to
    #[arg(short, long)]
    pub account: Option<String>,

    /// Counter-account when no classification rule matches
    #[arg(short, long, default_value = "Expense:Uncategorized")]
    pub counter: String,

    /// Currency of every imported posting
    #[arg(long)]
    pub currency: Option<String>,

    /// Field delimiter; sniffed from the first line when omitted
    #[arg(long)]
    pub delimiter: Option<char>,

    /// Text encoding of the export (utf-8, latin-1)
    #[arg(long)]
    pub encoding: Option<TextEncoding>,

    /// Create accounts the export references but the ledger lacks
    #[arg(long)]
    pub create_accounts: bool,

    /// Merge every probable duplicate
    #[arg(long, conflicts_with = "reject_all")]
    pub accept_all: bool,

    /// Drop every probable duplicate
    #[arg(long)]
    pub reject_all: bool,
}

/// Review subcommands for a pending import
#[derive(Subcommand)]
pub enum ReviewCommands {
    /// Show the pending import and its probable duplicates
    Show,

    /// Decide every review item and finish the import
    Resolve {
        /// Items to merge (e.g. R1 R3)
        #[arg(long, num_args = 1..)]
        accept: Vec<ReviewId>,

        /// Items to drop as duplicates
        #[arg(long, num_args = 1..)]
        reject: Vec<ReviewId>,

        /// Merge every item not listed
        #[arg(long, conflicts_with = "reject_rest")]
        accept_rest: bool,

        /// Drop every item not listed
        #[arg(long)]
        reject_rest: bool,
    },

    /// Throw the pending import away
    Discard,
}

fn pipeline(storage: &Storage) -> ImportPipeline {
    let settings = storage.settings();
    ImportPipeline::new(settings.match_options(), settings.validation_options())
}

/// Handle the import command
pub fn handle_import_command(storage: &Storage, args: ImportArgs) -> BookResult<()> {
    if let Some(pending) = storage.load_pending()? {
        return Err(BookError::Import(format!(
            "An import from {} is waiting for review; run `balancebook review resolve` or `balancebook review discard` first",
            pending.source
        )));
    }
    if !args.file.exists() {
        return Err(BookError::Import(format!("File not found: {}", args.file.display())));
    }

    let ledger = storage.load_ledger()?;
    let (source, account_map) = build_source(storage, &args)?;
    let decoded = decode_file(&source, &args.file)?;

    let new_accounts = if args.create_accounts {
        missing_accounts(&ledger, &account_map, &decoded.rows)
    } else {
        Vec::new()
    };

    let request = ImportRequest {
        source: args.file.display().to_string(),
        rows: decoded.rows,
        source_errors: decoded.errors,
        account_map,
        new_accounts,
    };

    let pipeline = pipeline(storage);
    let proposal = pipeline.propose(&ledger, request);
    print!("{}", format_proposal(&proposal));

    let decisions = if proposal.review.is_empty() {
        ReviewDecisions::new()
    } else if args.accept_all {
        ReviewDecisions::all(&proposal, ReviewDecision::Accept)
    } else if args.reject_all {
        ReviewDecisions::all(&proposal, ReviewDecision::Reject)
    } else {
        storage.save_pending(&proposal)?;
        println!();
        println!(
            "{} probable duplicate(s) need a decision. Finish with:",
            proposal.review.len()
        );
        println!("  balancebook review resolve --accept <ids> --reject <ids>");
        return Ok(());
    };

    finish(storage, &pipeline, &ledger, proposal, &decisions)
}

/// Handle a review command
pub fn handle_review_command(storage: &Storage, cmd: ReviewCommands) -> BookResult<()> {
    let Some(proposal) = storage.load_pending()? else {
        println!("No pending import.");
        return Ok(());
    };

    match cmd {
        ReviewCommands::Show => {
            print!("{}", format_proposal(&proposal));
            if proposal.review.is_empty() {
                println!("{}", format_review_items(&proposal.review));
            }
            Ok(())
        }
        ReviewCommands::Resolve {
            accept,
            reject,
            accept_rest,
            reject_rest,
        } => {
            let mut decisions = ReviewDecisions::new();
            if accept_rest {
                decisions = ReviewDecisions::all(&proposal, ReviewDecision::Accept);
            } else if reject_rest {
                decisions = ReviewDecisions::all(&proposal, ReviewDecision::Reject);
            }
            for id in accept {
                decisions.decide(id, ReviewDecision::Accept);
            }
            for id in reject {
                decisions.decide(id, ReviewDecision::Reject);
            }

            let ledger = storage.load_ledger()?;
            let pipeline = pipeline(storage);
            finish(storage, &pipeline, &ledger, proposal, &decisions)
        }
        ReviewCommands::Discard => {
            storage.clear_pending()?;
            AuditLogger::new(storage.paths().audit_log())
                .log(&AuditEntry::discard(&proposal.source, &proposal.id))?;
            println!("Discarded the pending import from {}.", proposal.source);
            Ok(())
        }
    }
}

/// Resolve the proposal, then save and audit whatever happened
fn finish(
    storage: &Storage,
    pipeline: &ImportPipeline,
    ledger: &Ledger,
    proposal: ImportProposal,
    decisions: &ReviewDecisions,
) -> BookResult<()> {
    let audit = AuditLogger::new(storage.paths().audit_log());
    let before = ledger.revision();

    let outcome = match pipeline.resolve(ledger, proposal, decisions) {
        Ok(outcome) => outcome,
        Err(BookError::StaleProposal) => {
            storage.clear_pending()?;
            return Err(BookError::StaleProposal);
        }
        Err(err) => return Err(err),
    };

    match outcome {
        ImportOutcome::Committed { ledger, report } => {
            storage.save_ledger(&ledger)?;
            storage.clear_pending()?;
            audit.log(&AuditEntry::import_committed(&report, &before, &ledger.revision()))?;
            print!("{}", format_import_report(&report));
            Ok(())
        }
        ImportOutcome::RolledBack {
            report, conflict, ..
        } => {
            storage.clear_pending()?;
            audit.log(&AuditEntry::import_rolled_back(&report, &before, &conflict.violations))?;
            print!("{}", format_import_report(&report));
            println!("{}", format_violations(&conflict.violations));
            println!("The ledger was left unchanged.");
            Err(conflict.into())
        }
    }
}

fn build_source(storage: &Storage, args: &ImportArgs) -> BookResult<(BankCsvSource, AccountMap)> {
    let settings = storage.settings();
    let rules = settings.import.rules.clone();

    let delimiter = args
        .delimiter
        .map(|d| {
            u8::try_from(d).map_err(|_| BookError::Import(format!("Delimiter '{}' is not ASCII", d)))
        })
        .transpose()?;
    let adjust = |mut mapping: ColumnMapping| {
        if let Some(d) = delimiter {
            mapping.delimiter = char::from(d);
        }
        if let Some(encoding) = args.encoding {
            mapping.encoding = encoding;
        }
        mapping
    };

    if let Some(name) = &args.profile {
        let profile = settings.profile(name)?;
        let mut source = BankCsvSource::new(
            adjust(profile.column_mapping()?),
            profile.account.clone(),
            profile.counter_account.clone(),
        )
        .with_rules(rules);
        if let Some(code) = args.currency.as_ref().or(profile.currency.as_ref()) {
            source = source.with_currency(Currency::new(code)?);
        }
        return Ok((source, profile.account_map()));
    }

    let account = args.account.clone().ok_or_else(|| {
        BookError::Import("Either --profile or --account is required".into())
    })?;
    let mapping = match &args.preset {
        Some(name) => ColumnMapping::preset(name).ok_or_else(|| {
            BookError::Import(format!(
                "Unknown preset '{}'; expected one of: {}",
                name,
                ColumnMapping::preset_names().join(", ")
            ))
        })?,
        None => detect_mapping(Path::new(&args.file), delimiter)?,
    };

    let mut source = BankCsvSource::new(adjust(mapping), account, args.counter.clone()).with_rules(rules);
    if let Some(code) = &args.currency {
        source = source.with_currency(Currency::new(code)?);
    }
    Ok((source, AccountMap::new()))
}

/// Accounts named by the rows but absent from the ledger
///
/// The type comes from the first identifier segment ("Expense:Coffee" is an
/// expense); identifiers whose type cannot be told are left for the validator
/// to report.
fn missing_accounts(
    ledger: &Ledger,
    account_map: &AccountMap,
    rows: &[crate::services::CandidateFields],
) -> Vec<Account> {
    let labels: BTreeSet<&str> = rows
        .iter()
        .flat_map(|row| row.postings.iter())
        .map(|p| account_map.resolve(&p.account).trim())
        .filter(|id| ledger.account(id).is_none())
        .collect();

    labels
        .into_iter()
        .filter_map(|identifier| {
            let top = identifier.split(':').next().unwrap_or(identifier);
            match AccountType::parse(top).map(|t| Account::new(identifier, t)) {
                Some(Ok(account)) => Some(account),
                _ => {
                    warn!(account = identifier, "cannot infer an account type; not creating it");
                    None
                }
            }
        })
        .collect()
}
