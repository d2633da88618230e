//! CLI entry and dispatch.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "folio")]
#[command(version)]
#[command(about = "Versioned plain-text page store")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Book directory containing the pages (default: current directory)
    #[arg(long, default_value = ".")]
    book: String,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Lists pages, newest first
    List {
        /// Emit the listing as JSON
        #[arg(long)]
        json: bool,
    },
    /// Prints a page's current text
    Show {
        /// Page name (file stem without extension)
        page: String,
    },
    /// Prints a page's recorded edit history
    History {
        page: String,
    },
    /// Prints a page's text as of N versions ago
    Checkout {
        page: String,

        /// How many versions to step back from the latest
        #[arg(long, default_value_t = 1)]
        back: usize,
    },
    /// Sets a page's text and flushes it
    Write {
        page: String,

        /// New text; read from stdin when omitted
        #[arg(long)]
        text: Option<String>,
    },
    /// Flushes a page's unsaved edits to disk
    Flush {
        page: String,
    },
}

pub fn run() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Commands::List { json } => commands::list(&cli.book, json),
        Commands::Show { page } => commands::show(&cli.book, &page),
        Commands::History { page } => commands::history(&cli.book, &page),
        Commands::Checkout { page, back } => commands::checkout(&cli.book, &page, back),
        Commands::Write { page, text } => commands::write(&cli.book, &page, text),
        Commands::Flush { page } => commands::flush(&cli.book, &page),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("FOLIO_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
