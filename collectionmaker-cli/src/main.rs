//! Collectionmaker - batch-import benchmark for document stores

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use collectionmaker_cli::commands::{self, Backend};
use collectionmaker_cli::config::{CliConfig, ConfigManager};
use collectionmaker_cli::init_logging;
use collectionmaker_core::CollectionOptions;
use secrecy::{ExposeSecret, SecretString};

/// Drive concurrent batch imports against a document store
#[derive(Parser)]
#[command(name = "collectionmaker", author, version, about, long_about = None)]
struct Cli {
    /// Default log level when RUST_LOG is unset
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Coordinator endpoint; repeat for round-robin over several
    #[arg(long = "endpoint", global = true)]
    endpoints: Vec<String>,

    /// User for basic authentication
    #[arg(long, global = true)]
    username: Option<String>,

    /// Password for basic authentication
    #[arg(long, env = "COLLECTIONMAKER_PASSWORD", hide_env_values = true, global = true)]
    password: Option<String>,

    /// Database holding the collection
    #[arg(long, global = true)]
    database: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import batches of generated documents and report latencies
    Batchimport {
        /// Number of concurrent workers
        #[arg(long)]
        parallelism: Option<u64>,

        /// Batches per worker
        #[arg(long)]
        number: Option<u64>,

        /// Delay before each worker starts, in milliseconds
        #[arg(long)]
        start_delay: Option<u64>,

        /// Payload bytes per document
        #[arg(long)]
        payload_size: Option<usize>,

        /// Documents per batch
        #[arg(long)]
        batch_size: Option<u64>,

        /// Target collection
        #[arg(long)]
        collection: Option<String>,

        /// Per-request deadline in seconds
        #[arg(long)]
        request_timeout: Option<u64>,

        /// Print a progress line every this many batches
        #[arg(long)]
        progress_every: Option<u64>,

        /// Store to write to
        #[arg(long, value_enum, default_value_t = Backend::Http)]
        backend: Backend,

        /// Write a JSON report to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Create the database and collection used by batchimport
    Setup {
        /// Collection to create
        #[arg(long)]
        collection: Option<String>,

        /// Number of shards for a new collection
        #[arg(long)]
        shards: Option<u32>,

        /// Replication factor for a new collection
        #[arg(long)]
        replication_factor: Option<u32>,
    },

    /// Print the number of documents in a collection
    Count {
        /// Collection to count
        #[arg(long)]
        collection: Option<String>,
    },

    /// Show or initialize the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Write the effective configuration to the config file
    Init,
}

impl Cli {
    fn load_config(&self) -> Result<ConfigManager> {
        let mut manager = match &self.config {
            Some(path) => ConfigManager::load_with_path(path)?,
            None => ConfigManager::load()?,
        };
        let connection = &mut manager.config_mut().connection;
        if !self.endpoints.is_empty() {
            connection.endpoints.clone_from(&self.endpoints);
        }
        if let Some(username) = &self.username {
            connection.username.clone_from(username);
        }
        if let Some(password) = &self.password {
            connection.password = SecretString::new(password.clone().into());
        }
        if let Some(database) = &self.database {
            connection.database.clone_from(database);
        }
        Ok(manager)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    let manager = cli.load_config()?;
    tracing::debug!(path = %manager.path().display(), "Configuration loaded");

    match cli.command {
        Commands::Batchimport {
            parallelism,
            number,
            start_delay,
            payload_size,
            batch_size,
            collection,
            request_timeout,
            progress_every,
            backend,
            output,
        } => {
            let CliConfig {
                connection,
                batchimport: mut bench,
            } = manager.into_config();
            if let Some(v) = parallelism {
                bench.parallelism = v;
            }
            if let Some(v) = number {
                bench.batches_per_worker = v;
            }
            if let Some(v) = start_delay {
                bench.start_delay_ms = v;
            }
            if let Some(v) = payload_size {
                bench.payload_size = v;
            }
            if let Some(v) = batch_size {
                bench.batch_size = v;
            }
            if let Some(v) = collection {
                bench.collection = v;
            }
            if let Some(v) = request_timeout {
                bench.request_timeout_secs = v;
            }
            if let Some(v) = progress_every {
                bench.progress_every = v;
            }
            commands::batchimport(&connection, &bench, backend, output.as_deref()).await?;
        }
        Commands::Setup {
            collection,
            shards,
            replication_factor,
        } => {
            let config = manager.config();
            let collection = collection.unwrap_or_else(|| config.batchimport.collection.clone());
            let options = CollectionOptions {
                number_of_shards: shards,
                replication_factor,
            };
            commands::setup(&config.connection, &collection, &options).await?;
        }
        Commands::Count { collection } => {
            let config = manager.config();
            let collection = collection.unwrap_or_else(|| config.batchimport.collection.clone());
            commands::count(&config.connection, &collection).await?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                println!("# {}", manager.path().display());
                print!("{}", toml::to_string_pretty(manager.config())?);
                if !manager.config().connection.password.expose_secret().is_empty() {
                    println!("# connection.password is set (not shown)");
                }
            }
            ConfigAction::Init => {
                manager.save()?;
                println!("Wrote {}", manager.path().display());
            }
        },
    }

    Ok(())
}
