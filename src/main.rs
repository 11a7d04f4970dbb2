use std::path::PathBuf;

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use balancebook::audit::Operation;
use balancebook::cli::{
    handle_balance_command, handle_budget_command, handle_config_command, handle_export_command,
    handle_import_command, handle_init_command, handle_log_command, handle_reclassify_command,
    handle_register_command, handle_reverse_command, handle_review_command, handle_verify_command,
    BudgetCommands, ImportArgs, ReviewCommands,
};
use balancebook::config::BookPaths;
use balancebook::logging::init_tracing;
use balancebook::storage::Storage;

#[derive(Parser)]
#[command(
    name = "balancebook",
    version,
    about = "Personal double-entry bookkeeping on CSV files",
    long_about = "balancebook keeps a double-entry ledger in plain CSV files. It imports \
                  bank exports without duplicating what is already recorded, validates \
                  the whole ledger, and reports balances and budget variance."
)]
struct Cli {
    /// Book directory
    #[arg(long, global = true, env = "BALANCEBOOK_DIR")]
    dir: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new book
    Init,

    /// Validate the whole ledger
    Verify,

    /// Show account balances
    Balance {
        /// Balance date (YYYY-MM-DD); defaults to the last transaction
        #[arg(long)]
        as_of: Option<NaiveDate>,

        /// Only accounts of this type (asset, liability, equity, income, expense)
        #[arg(short = 't', long = "type")]
        account_type: Option<String>,
    },

    /// Show the register of one account
    Register {
        /// Account identifier
        account: String,
    },

    /// Import a bank CSV export
    Import(ImportArgs),

    /// Review a pending import
    #[command(subcommand)]
    Review(ReviewCommands),

    /// Budget targets and variance
    #[command(subcommand)]
    Budget(BudgetCommands),

    /// Cancel a transaction with an offsetting one
    Reverse {
        /// Transaction number, as in transactions.csv
        number: usize,

        /// Date of the reversal (YYYY-MM-DD); defaults to today
        #[arg(short, long)]
        date: Option<NaiveDate>,
    },

    /// Move postings off a catch-all account using the classification rules
    Reclassify {
        /// Account to move postings away from
        #[arg(long, default_value = "Expense:Uncategorized")]
        from: String,
    },

    /// Export every posting with fiscal columns for spreadsheets
    Export {
        /// Output file; stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show recent audit log entries
    Log {
        #[arg(short = 'n', long, default_value = "20")]
        count: usize,

        /// Only entries of this operation
        #[arg(long, value_enum)]
        operation: Option<Operation>,
    },

    /// Show current configuration and paths
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let paths = match cli.dir {
        Some(dir) => BookPaths::with_base_dir(dir),
        None => BookPaths::new()?,
    };
    let storage = Storage::open(paths)?;

    match cli.command {
        Some(Commands::Init) => handle_init_command(&storage)?,
        Some(Commands::Verify) => {
            if !handle_verify_command(&storage)? {
                std::process::exit(1);
            }
        }
        Some(Commands::Balance { as_of, account_type }) => {
            handle_balance_command(&storage, as_of, account_type)?
        }
        Some(Commands::Register { account }) => handle_register_command(&storage, &account)?,
        Some(Commands::Import(args)) => handle_import_command(&storage, args)?,
        Some(Commands::Review(cmd)) => handle_review_command(&storage, cmd)?,
        Some(Commands::Budget(cmd)) => handle_budget_command(&storage, cmd)?,
        Some(Commands::Reverse { number, date }) => {
            handle_reverse_command(&storage, number, date)?
        }
        Some(Commands::Reclassify { from }) => handle_reclassify_command(&storage, &from)?,
        Some(Commands::Export { output }) => handle_export_command(&storage, output.as_deref())?,
        Some(Commands::Log { count, operation }) => handle_log_command(&storage, count, operation)?,
        Some(Commands::Config) => handle_config_command(&storage)?,
        None => {
            println!("balancebook - double-entry bookkeeping on CSV files");
            println!();
            println!("Run 'balancebook --help' for usage information.");
            println!("Run 'balancebook init' to create a book.");
        }
    }

    Ok(())
}
