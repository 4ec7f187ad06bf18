//! # Endpoint Hub CLI (`ephub`)
//!
//! ## Usage
//!
//! ```bash
//! ephub --config ./config/ephub.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ephub init` | Create the SQLite database and the model directory |
//! | `ephub import <file>` | Import a Postman collection into a module |
//! | `ephub modules` | List modules and their endpoint counts |
//! | `ephub train` | Build and publish the search index |
//! | `ephub search "<query>"` | Search the published index |
//! | `ephub export <id>` | Print or save an endpoint's Postman item |
//! | `ephub serve` | Start the HTTP API |
//!
//! Logging goes to stderr. `RUST_LOG` overrides the level; `--verbose`
//! switches the default from `info` to `debug`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use endpoint_hub::postman::ImportMeta;
use endpoint_hub::{config, export, import, migrate, search, server, train};

/// Endpoint Hub CLI: semantic search over API endpoint catalogs.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file.
#[derive(Parser)]
#[command(
    name = "ephub",
    about = "Endpoint Hub: semantic search over API endpoint catalogs",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/ephub.toml")]
    config: PathBuf,

    /// Log at debug level.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema and the model directory.
    ///
    /// Idempotent; running it multiple times is safe.
    Init,

    /// Import a Postman collection (v2.x JSON).
    Import {
        /// Path to the collection file.
        file: PathBuf,

        /// Module the endpoints belong to; created if missing.
        #[arg(long)]
        module: String,

        /// Person or system recorded as the author.
        #[arg(long)]
        created_by: String,

        /// Visibility label stored with every endpoint.
        #[arg(long)]
        visibility: Option<String>,

        /// Extra keywords mixed into every endpoint's keyword text.
        #[arg(long)]
        keywords: Option<String>,
    },

    /// List modules.
    Modules,

    /// Build the corpus, embed it and publish a new index generation.
    Train,

    /// Search endpoints.
    Search {
        /// The search query (English or Spanish).
        query: String,

        /// Number of results (defaults to `retrieval.default_top_k`).
        #[arg(long)]
        top_k: Option<usize>,
    },

    /// Export an endpoint's original Postman item.
    Export {
        /// Endpoint id.
        id: String,

        /// Output file path (default: stdout).
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Start the HTTP API on `[server].bind`.
    Serve,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "endpoint_hub={0},ephub={0},tower_http=info,sqlx=warn",
            default
        ))
    });

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            std::fs::create_dir_all(&cfg.model.dir)?;
            println!("Database initialized successfully.");
        }
        Commands::Import {
            file,
            module,
            created_by,
            visibility,
            keywords,
        } => {
            let meta = ImportMeta {
                module,
                created_by,
                visibility,
                keywords,
            };
            import::run_import(&cfg, &file, &meta).await?;
        }
        Commands::Modules => {
            import::run_modules(&cfg).await?;
        }
        Commands::Train => {
            train::run_train(&cfg).await?;
        }
        Commands::Search { query, top_k } => {
            search::run_search(&cfg, &query, top_k).await?;
        }
        Commands::Export { id, output } => {
            export::run_export(&cfg, &id, output.as_deref()).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
