use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use pcrec_admin::{Command, Config};
use pcrec_core::source::parse_payload;
use pcrec_core::{
    load_sync_config, resolve_from_store_then_source, ConfigStore, DbConfig, Publisher,
    SourceReader, SyncConfig, SyncOutcome, SyncRunner, SyncScheduler,
};
use pcrec_db::PgConfigStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    // Setup logging (stderr to keep stdout clean for JSON output)
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let config = Config::parse();

    let sync_config = load_sync_config(config.config.as_deref())
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;

    info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(DbConfig::default().max_connections)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;

    let store = PgConfigStore::new(pool);
    store
        .init_schema()
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;
    let store: Arc<dyn ConfigStore> = Arc::new(store);

    match config.command {
        Command::Serve => serve(store, &sync_config).await?,
        Command::Sync => sync_once(store, &sync_config).await?,
        Command::Seed => seed(store, &sync_config).await?,
        Command::Publish { output } => publish(store, &sync_config, output.as_deref()).await?,
        Command::List => list(store.as_ref()).await?,
        Command::Get { key } => get(store.as_ref(), &key).await?,
        Command::Put { key, file } => put(store.as_ref(), &key, &file).await?,
    }

    Ok(())
}

fn build_runner(store: Arc<dyn ConfigStore>, sync_config: &SyncConfig) -> SyncRunner {
    SyncRunner::new(
        store,
        SourceReader::new(&sync_config.source_location),
        Publisher::new(sync_config.publish_location.clone()),
    )
}

/// Run the periodic loop until Ctrl-C
async fn serve(store: Arc<dyn ConfigStore>, sync_config: &SyncConfig) -> anyhow::Result<()> {
    let runner = Arc::new(build_runner(store, sync_config));
    let scheduler = SyncScheduler::new(runner, sync_config);

    if !sync_config.enabled {
        warn!("Periodic sync disabled (SYNC_ENABLED); waiting for shutdown only");
    }
    scheduler.start();

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    info!("Shutting down sync loop...");
    scheduler.shutdown().await;
    print_json(&scheduler.status())?;
    Ok(())
}

/// Run one sync on demand
async fn sync_once(store: Arc<dyn ConfigStore>, sync_config: &SyncConfig) -> anyhow::Result<()> {
    let scheduler = SyncScheduler::new(Arc::new(build_runner(store, sync_config)), sync_config);
    let outcome = scheduler.trigger_now().await;

    print_json(&serde_json::json!({
        "status": outcome.status,
        "message": outcome.message,
        "state": scheduler.status(),
    }))?;
    ensure_success(&outcome)
}

/// Load source files into the store without publishing
async fn seed(store: Arc<dyn ConfigStore>, sync_config: &SyncConfig) -> anyhow::Result<()> {
    let runner = SyncRunner::new(
        store,
        SourceReader::new(&sync_config.source_location),
        Publisher::disabled(),
    );
    let outcome = runner.run_once().await;
    let stats = outcome.stats();
    info!(
        "Seed complete: {} created, {} updated, {} unchanged",
        stats.created, stats.updated, stats.unchanged
    );
    ensure_success(&outcome)
}

/// Publish stored configs, falling back to the source directory per key
async fn publish(
    store: Arc<dyn ConfigStore>,
    sync_config: &SyncConfig,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let Some(target) = output
        .map(Path::to_path_buf)
        .or_else(|| sync_config.publish_location.clone())
    else {
        bail!("No publish location. Pass --output or set PUBLIC_DATA_DIR.");
    };

    let reader = SourceReader::new(&sync_config.source_location);
    let resolved = resolve_from_store_then_source(store.as_ref(), &reader)
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;
    if !resolved.all_from_store() {
        warn!(
            source = %sync_config.source_location.display(),
            "Store incomplete; publishing source files for missing keys"
        );
    }

    Publisher::new(Some(target.clone()))
        .publish(&resolved.payloads)
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;

    println!(
        "Published components ({}) and rules ({}) to {}",
        resolved.components_origin.as_str(),
        resolved.rules_origin.as_str(),
        target.display()
    );
    Ok(())
}

async fn list(store: &dyn ConfigStore) -> anyhow::Result<()> {
    let entries = store.list().await?;
    if entries.is_empty() {
        eprintln!("No configs stored yet. Run: pcrec seed");
        return Ok(());
    }
    print_json(&entries)
}

async fn get(store: &dyn ConfigStore, key: &str) -> anyhow::Result<()> {
    match store.get(key).await? {
        Some(entry) => print_json(&entry),
        None => bail!("config not found: {}", key),
    }
}

async fn put(store: &dyn ConfigStore, key: &str, file: &Path) -> anyhow::Result<()> {
    let bytes = std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let name = file.display().to_string();
    let payload = parse_payload(&name, &bytes).map_err(|e| anyhow::anyhow!(e.user_message()))?;

    let entry = store.upsert(key, &payload).await?;
    info!("Stored {} at {}", entry.key, entry.updated_at);
    print_json(&entry)
}

fn ensure_success(outcome: &SyncOutcome) -> anyhow::Result<()> {
    if outcome.is_success() {
        Ok(())
    } else {
        bail!("Sync failed: {}", outcome.message)
    }
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
