//! csvstore CLI
//!
//! Command-line access to record stores kept as delimited files in a
//! directory-backed blob store.
//!
//! # Commands
//!
//! - `schema` - Describe the configured object classes
//! - `search` - List records, optionally one identifier
//! - `create`, `update`, `add-values`, `remove-values`, `delete` - Modify records
//! - `latest-token`, `sync` - Track changes between snapshots
//! - `resolve`, `authenticate` - Look up users by display name
//! - `test` - Check configuration and storage

mod commands;

use clap::{Parser, Subcommand};
use commands::Context;
use csvstore_core::{Connector, ConnectorConfig, DEFAULT_OBJECT_CLASS};
use csvstore_storage::FileBlobStore;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Record store tools.
#[derive(Parser)]
#[command(name = "csvstore")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the JSON connector configuration
    #[arg(global = true, short, long)]
    config: Option<PathBuf>,

    /// Directory acting as the blob store root
    #[arg(global = true, short, long)]
    root: Option<PathBuf>,

    /// Object class to operate on
    #[arg(global = true, short, long, default_value = DEFAULT_OBJECT_CLASS)]
    object_class: String,

    /// Output format (text, json)
    #[arg(global = true, short, long, default_value = "text")]
    format: String,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Describe the configured object classes
    Schema,

    /// List records
    Search {
        /// Only the record with this identifier
        #[arg(short, long)]
        uid: Option<String>,
    },

    /// Create a record
    Create {
        /// Attribute as name=value; repeat a name for several values
        #[arg(short, long = "attr", value_parser = commands::parse_attr)]
        attrs: Vec<(String, String)>,
    },

    /// Replace attributes of a record
    Update {
        /// Identifier of the record
        uid: String,

        /// Attribute as name=value; repeat a name for several values
        #[arg(short, long = "attr", value_parser = commands::parse_attr)]
        attrs: Vec<(String, String)>,
    },

    /// Add values to attributes of a record
    AddValues {
        /// Identifier of the record
        uid: String,

        /// Attribute as name=value; repeat a name for several values
        #[arg(short, long = "attr", value_parser = commands::parse_attr)]
        attrs: Vec<(String, String)>,
    },

    /// Remove values from attributes of a record
    RemoveValues {
        /// Identifier of the record
        uid: String,

        /// Attribute as name=value; repeat a name for several values
        #[arg(short, long = "attr", value_parser = commands::parse_attr)]
        attrs: Vec<(String, String)>,
    },

    /// Delete a record
    Delete {
        /// Identifier of the record
        uid: String,
    },

    /// Capture the file and print a token to sync from
    LatestToken,

    /// Print changes since a token
    Sync {
        /// Token returned by a previous sync or latest-token
        token: String,
    },

    /// Print the identifier of a user
    Resolve {
        /// Display name of the user
        username: String,
    },

    /// Check a user's password
    Authenticate {
        /// Display name of the user
        username: String,

        /// Password to check
        password: String,
    },

    /// Check configuration and storage
    Test,

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
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Commands::Version = cli.command {
        println!("csvstore CLI v{}", env!("CARGO_PKG_VERSION"));
        println!("csvstore core v{}", csvstore_core::VERSION);
        return Ok(());
    }

    let config_path = cli.config.ok_or("configuration path required (--config)")?;
    let root = cli.root.ok_or("blob store root required (--root)")?;
    let config = ConnectorConfig::from_path(&config_path)?;
    let connector = Connector::open(config, Arc::new(FileBlobStore::new(&root)))?;
    let ctx = Context::new(&connector, &cli.object_class, &cli.format);

    match cli.command {
        Commands::Schema => commands::schema::run(&ctx)?,
        Commands::Search { uid } => commands::query::search(&ctx, uid.as_deref())?,
        Commands::Create { attrs } => commands::modify::create(&ctx, attrs)?,
        Commands::Update { uid, attrs } => commands::modify::update(&ctx, &uid, attrs)?,
        Commands::AddValues { uid, attrs } => commands::modify::add_values(&ctx, &uid, attrs)?,
        Commands::RemoveValues { uid, attrs } => {
            commands::modify::remove_values(&ctx, &uid, attrs)?
        }
        Commands::Delete { uid } => commands::modify::delete(&ctx, &uid)?,
        Commands::LatestToken => commands::sync::latest_token(&ctx)?,
        Commands::Sync { token } => commands::sync::run(&ctx, &token)?,
        Commands::Resolve { username } => commands::query::resolve(&ctx, &username)?,
        Commands::Authenticate { username, password } => {
            commands::query::authenticate(&ctx, &username, password)?
        }
        Commands::Test => {
            connector.test()?;
            println!("OK");
        }
        Commands::Version => {}
    }

    Ok(())
}
