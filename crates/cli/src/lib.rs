//! `athenaeum`
//!
//! The command line circulation desk. Every subcommand maps onto one engine
//! operation from `athenaeum_core` and prints its outcome as JSON, so the
//! desk can be driven by hand or scripted against.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use athenaeum_core::access::Role;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt};

mod commands;

/// Database file used when neither `--database` nor `ATHENAEUM_DB` is set.
pub const DEFAULT_DATABASE: &str = "library.db";

/// Command line surface of the desk.
#[derive(Debug, Parser)]
#[command(name = "athenaeum", version, about = "Circulation desk for the Athenaeum library")]
pub struct Cli {
    /// Path to the library database file.
    #[arg(long, global = true, env = "ATHENAEUM_DB", default_value = DEFAULT_DATABASE)]
    pub database: PathBuf,

    /// Barcode of the acting user. Most commands are checked against this
    /// user's role.
    #[arg(
        long = "as",
        global = true,
        value_name = "USER_BARCODE",
        env = "ATHENAEUM_USER"
    )]
    pub acting_user: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Account role accepted on the command line.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum RoleArg {
    Member,
    Librarian,
}

impl From<RoleArg> for Role {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::Member => Self::Member,
            RoleArg::Librarian => Self::Librarian,
        }
    }
}

/// One subcommand per desk operation.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Register a user and print their account, barcode included.
    Register {
        /// Full name.
        #[arg(long)]
        name: String,
        /// Email address. Librarians must use the @library.com domain.
        #[arg(long)]
        email: String,
        /// Account password.
        #[arg(long)]
        password: String,
        /// Account role.
        #[arg(long, value_enum, default_value = "member")]
        role: RoleArg,
    },
    /// Look a user up by barcode.
    FindUser { barcode: String },
    /// List every registered user.
    ListUsers,
    /// Delete a member account.
    DeleteUser { barcode: String },

    /// Add a book to the catalog and print it, barcode included.
    AddBook {
        #[arg(long)]
        title: String,
        #[arg(long)]
        author: String,
        /// Subject category the book is shelved under.
        #[arg(long)]
        category: String,
        /// Publication date, YYYY-MM-DD.
        #[arg(long)]
        published: NaiveDate,
    },
    /// Edit a book; omitted fields keep their current value.
    UpdateBook {
        barcode: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        author: Option<String>,
        #[arg(long)]
        category: Option<String>,
        /// Publication date, YYYY-MM-DD.
        #[arg(long)]
        published: Option<NaiveDate>,
    },
    /// Delete a book together with its copies, loans and reservations.
    DeleteBook { barcode: String },
    /// Show one book with its availability counts.
    FindBook { barcode: String },
    /// List the whole catalog with availability counts.
    ListBooks,

    /// Add a copy of a book to the racks.
    AddCopy {
        book: String,
        /// Rack location, for example "3B".
        #[arg(long)]
        rack: String,
    },
    /// List the copies of a book.
    Copies { book: String },
    /// Edit a copy; omitted fields keep their current value.
    UpdateCopy {
        book: String,
        copy_id: i64,
        #[arg(long)]
        rack: Option<String>,
        /// Override the shelf flag (true or false).
        #[arg(long)]
        available: Option<bool>,
    },
    /// Delete a copy that is not out on loan.
    DeleteCopy { book: String, copy_id: i64 },

    /// Issue a book to a member at the desk.
    Issue { user: String, book: String },
    /// Check a book out to the acting member themselves.
    Checkout { book: String },
    /// Take a returned book back and settle any fine.
    Return { loan_id: i64 },
    /// Extend an open loan by a full loan period.
    Renew { loan_id: i64 },
    /// Report every overdue loan and notify the borrowers.
    ScanOverdue,

    /// Reserve a fully checked-out book for a user.
    Reserve { user: String, book: String },
    /// Cancel a pending reservation.
    CancelReservation { reservation_id: i64 },

    /// A user's full borrowing history.
    History { user_id: i64 },
    /// The books a user currently has out.
    CheckedOut { user_id: i64 },
    /// A user's fine ledger.
    Fines { user_id: i64 },
    /// A user's notification inbox.
    Notifications { user_id: i64 },
}

#[allow(
    clippy::missing_inline_in_public_items,
    reason = "Executed once per run, never across crate boundaries"
)]
#[allow(
    clippy::print_stderr,
    reason = "Tracing might not be available here if run_safe() failed before its initialization"
)]
#[allow(clippy::exit, reason = "A failed desk operation must leave a nonzero status")]
pub fn run() {
    if let Err(error) = run_safe() {
        eprintln!("athenaeum: {error:#}");
        std::process::exit(1);
    }
}

/// Encapsulated run function that returns errors instead of panicking, so
/// `run()` can keep its plain entry point signature.
fn run_safe() -> Result<()> {
    let subscriber = fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("unable to set global tracing subscriber")?;

    let cli = Cli::parse();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(commands::execute(cli))
}
