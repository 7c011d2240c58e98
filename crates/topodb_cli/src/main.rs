//! topodb CLI
//!
//! Command-line tools for topodb stores.
//!
//! # Commands
//!
//! - `init` - Apply the schema definition's generated DDL to a database
//! - `apply` - Apply a topology event file to a database
//! - `delete-source` - Delete everything a source system contributed
//! - `version` - Show version information

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// topodb command-line tools.
#[derive(Parser)]
#[command(name = "topodb")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the database file
    #[arg(global = true, short, long)]
    db: Option<PathBuf>,

    /// Path to the schema definition JSON file
    #[arg(global = true, short, long)]
    schema: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply the schema definition's generated DDL to the database
    Init,

    /// Apply a topology event file (JSON) to the database
    Apply {
        /// Path to the event file
        file: PathBuf,

        /// Classify the payload by this event-type string instead of
        /// expecting a tagged event file
        #[arg(short = 't', long)]
        event_type: Option<String>,

        /// Print one JSON operation result per line
        #[arg(long)]
        json: bool,
    },

    /// Delete everything the identified source system contributed
    DeleteSource {
        /// The opaque source identifier value
        value: String,

        /// The source identifier type
        #[arg(short = 't', long, default_value = topodb_ingest::SUPPORTED_SOURCE_TYPE)]
        source_type: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Init => {
            let db = cli.db.ok_or("Database path required for init")?;
            let schema = cli.schema.ok_or("Schema definition required for init")?;
            commands::init::run(&db, &schema)?;
        }
        Commands::Apply {
            file,
            event_type,
            json,
        } => {
            let db = cli.db.ok_or("Database path required for apply")?;
            let schema = cli.schema.ok_or("Schema definition required for apply")?;
            commands::apply::run(&db, &schema, &file, event_type.as_deref(), json)?;
        }
        Commands::DeleteSource { value, source_type } => {
            let db = cli.db.ok_or("Database path required for delete-source")?;
            let schema = cli
                .schema
                .ok_or("Schema definition required for delete-source")?;
            commands::delete_source::run(&db, &schema, &source_type, &value)?;
        }
        Commands::Version => {
            println!("topodb CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("topodb Ingest v{}", topodb_ingest::VERSION);
        }
    }

    Ok(())
}
