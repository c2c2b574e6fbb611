//! herald server binary.
//!
//! Reads `herald.toml` (or the path given with `--config`) overlaid with
//! `HERALD_*` environment variables, opens the SQLite store, imports the
//! legacy flat files once, and serves the HTTP API.

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context as _, ensure};
use clap::Parser;
use herald_core::{
  bootstrap::{self, LegacyData},
  i18n::{Catalog, Translator},
};
use herald_server::{AppState, ServerConfig, telegram::TelegramDelivery};
use herald_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Herald broadcast server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "herald.toml")]
  config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Load configuration.
  let server_cfg = ServerConfig::load(&cli.config)
    .with_context(|| format!("failed to load configuration from {:?}", cli.config))?;
  ensure!(!server_cfg.bot_token.trim().is_empty(), "bot_token is missing");

  if let Some(parent) = server_cfg.store_path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {parent:?}"))?;
  }

  // Open SQLite store and run the one-time import.
  let store = SqliteStore::open_with(&server_cfg.store_path, server_cfg.store_config())
    .await
    .with_context(|| format!("failed to open store at {:?}", server_cfg.store_path))?;

  let legacy = LegacyData::read(&server_cfg.legacy_sources());
  bootstrap::run(&store, legacy)
    .await
    .context("legacy import failed")?;

  let catalog = server_cfg
    .translations_path
    .as_ref()
    .map(Catalog::load)
    .unwrap_or_default();

  let delivery = TelegramDelivery::new(&server_cfg.telegram_api_url, &server_cfg.bot_token)
    .context("failed to build HTTP client")?;

  // Build application state.
  let state = AppState {
    store:      Arc::new(store),
    delivery:   Arc::new(delivery),
    translator: Arc::new(Translator::new(catalog, server_cfg.default_locale)),
    config:     Arc::new(server_cfg.clone()),
  };

  let app = herald_server::router(state);
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!(admins = server_cfg.admin_ids.len(), "Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}
