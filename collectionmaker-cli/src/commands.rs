//! Command implementations behind the `collectionmaker` binary

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::ValueEnum;
use collectionmaker_core::store::http::is_system_name;
use collectionmaker_core::{
    BenchConfig, CollectionOptions, ConnectionConfig, DocumentStore, HttpDocumentStore,
    InMemoryStore, ProgressSink, RunReport, RunResult, WorkerCoordinator,
};
use tracing::info;

/// Where batches are sent
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// Document API over HTTP
    #[default]
    Http,
    /// In-process store; measures the client side only
    Memory,
}

/// Run the benchmark and optionally write the JSON report.
///
/// The report is saved before worker failures are turned into an error, so
/// a failed run still leaves its statistics behind.
pub async fn batchimport(
    connection: &ConnectionConfig,
    config: &BenchConfig,
    backend: Backend,
    output: Option<&Path>,
) -> Result<RunResult> {
    config.validate()?;
    let report = match backend {
        Backend::Http => {
            let store = HttpDocumentStore::connect(connection)
                .context("failed to set up document store client")?;
            run_with_store(store, config).await?
        }
        Backend::Memory => {
            info!(collection = %config.collection, "Using in-memory store");
            run_with_store(InMemoryStore::with_collection(&config.collection), config).await?
        }
    };

    if let Some(path) = output {
        report
            .save_json(path)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        info!(path = %path.display(), "Report written");
    }
    Ok(report.into_result()?)
}

async fn run_with_store<S: DocumentStore>(store: S, config: &BenchConfig) -> Result<RunReport> {
    let coordinator = WorkerCoordinator::new(Arc::new(store), ProgressSink::stdout());
    Ok(coordinator.run(config).await?)
}

/// Create the database and collection a run needs, leaving existing ones
pub async fn setup(
    connection: &ConnectionConfig,
    collection: &str,
    options: &CollectionOptions,
) -> Result<()> {
    let store =
        HttpDocumentStore::connect(connection).context("failed to set up document store client")?;

    let created = store
        .ensure_database()
        .await
        .with_context(|| format!("failed to provision database {}", store.database()))?;
    println!(
        "Database {}: {}",
        store.database(),
        if created { "created" } else { "exists" }
    );

    if is_system_name(collection) {
        store
            .open_collection(collection)
            .await
            .with_context(|| format!("system collection {collection} is not available"))?;
        println!("Collection {collection}: system collection, left untouched");
        return Ok(());
    }

    store
        .ensure_collection(collection, options)
        .await
        .with_context(|| format!("failed to provision collection {collection}"))?;
    println!("Collection {collection}: ready");
    Ok(())
}

/// Print the number of documents in a collection
pub async fn count(connection: &ConnectionConfig, collection: &str) -> Result<u64> {
    let store =
        HttpDocumentStore::connect(connection).context("failed to set up document store client")?;
    let handle = store
        .open_collection(collection)
        .await
        .with_context(|| format!("failed to open collection {collection}"))?;
    let documents = store.count(&handle).await?;
    println!("Collection {collection}: {documents} documents");
    Ok(documents)
}
