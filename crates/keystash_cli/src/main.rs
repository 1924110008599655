//! KeyStash CLI
//!
//! Command-line access to a KeyStash store directory.
//!
//! # Commands
//!
//! - `get` - Print a key's value or list
//! - `put` - Store a value or a whole list
//! - `append` - Append one element to a list
//! - `remove` - Remove list elements by position or by equality
//! - `clear` - Delete a key
//! - `stress` - Concurrent append/remove churn against one list

mod commands;

use clap::{ArgGroup, Parser, Subcommand, ValueEnum};
use keystash_core::{CborConverter, Config, Converter, KeyValueStore, StoreResult};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// KeyStash command-line store tools.
#[derive(Parser)]
#[command(name = "keystash")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the store directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    /// Artifact format
    #[arg(global = true, short, long, value_enum, default_value_t = Format::Json)]
    format: Format,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Json,
    Cbor,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the contents of a key
    Get {
        /// Key to read
        key: String,

        /// Read the key as a list (absent keys print `[]`)
        #[arg(short, long)]
        list: bool,
    },

    /// Store a JSON value under a key
    Put {
        /// Key to write
        key: String,

        /// JSON payload (an array when `--list` is given)
        json: String,

        /// Store the payload as a list
        #[arg(short, long)]
        list: bool,
    },

    /// Append a JSON element to a list
    Append {
        /// List key
        key: String,

        /// JSON element
        json: String,
    },

    /// Remove elements from a list
    #[command(group(ArgGroup::new("target").required(true).args(["index", "equals"])))]
    Remove {
        /// List key
        key: String,

        /// Remove the element at this position
        #[arg(short, long)]
        index: Option<usize>,

        /// Remove the first element equal to this JSON
        #[arg(short, long)]
        equals: Option<String>,

        /// With `--equals`, remove every equal element
        #[arg(short, long, requires = "equals")]
        all: bool,
    },

    /// Delete a key
    Clear {
        /// Key to delete
        key: String,

        /// Report the key as an empty list
        #[arg(short, long)]
        list: bool,
    },

    /// Run concurrent append/remove churn against one list
    Stress {
        /// List key to churn (in memory unless `--path` is given)
        #[arg(default_value = "stress")]
        key: String,

        /// Number of worker threads
        #[arg(short, long, default_value = "4")]
        threads: usize,

        /// Operations per thread
        #[arg(short, long, default_value = "250")]
        ops: usize,

        /// Print every update observed on the list
        #[arg(short, long)]
        show_updates: bool,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Commands::Version = cli.command {
        println!("KeyStash CLI v{}", env!("CARGO_PKG_VERSION"));
        println!("KeyStash Core v{}", keystash_core::VERSION);
        return Ok(());
    }

    // Stress may run without a directory; everything else needs one
    if let Commands::Stress { .. } = cli.command {
        if cli.path.is_none() {
            let store = KeyValueStore::open_in_memory()?;
            return dispatch(&store, cli.command);
        }
    }

    let path = cli.path.clone().ok_or("Store path required (--path)")?;
    match cli.format {
        Format::Json => dispatch(&open(&path, keystash_core::JsonConverter::new())?, cli.command),
        Format::Cbor => dispatch(&open(&path, CborConverter::new())?, cli.command),
    }
}

fn open<C: Converter>(path: &Path, converter: C) -> StoreResult<KeyValueStore<C>> {
    KeyValueStore::open_with_converter(path, converter, Config::default())
}

fn dispatch<C: Converter>(
    store: &KeyValueStore<C>,
    command: Commands,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Get { key, list } => commands::read::get(store, &key, list)?,
        Commands::Put { key, json, list } => commands::write::put(store, &key, &json, list)?,
        Commands::Append { key, json } => commands::write::append(store, &key, &json)?,
        Commands::Remove {
            key,
            index,
            equals,
            all,
        } => match (index, equals) {
            (Some(index), _) => commands::write::remove_at(store, &key, index)?,
            (None, Some(json)) => commands::write::remove_equal(store, &key, &json, all)?,
            (None, None) => return Err("either --index or --equals is required".into()),
        },
        Commands::Clear { key, list } => commands::write::clear(store, &key, list)?,
        Commands::Stress {
            key,
            threads,
            ops,
            show_updates,
        } => commands::stress::run(store, &key, threads, ops, show_updates)?,
        Commands::Version => {}
    }
    Ok(())
}
