//! HTTP surface and process wiring for the Herald broadcast service.
//!
//! Exposes an axum [`Router`] that maps inbound subscriber events and admin
//! commands onto the core operations, backed by any store implementing the
//! `herald-core` storage traits and any [`Delivery`] channel.

pub mod admin;
pub mod error;
pub mod subscribers;
pub mod telegram;

pub use error::ApiError;

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use axum::{
  Router,
  http::HeaderMap,
  routing::{get, post, put},
};
use config::{Config, ConfigError, Environment, File};
use herald_core::{
  Locale, SubscriberId,
  bootstrap::LegacySources,
  broadcast::{DEFAULT_CONCURRENCY, Delivery},
  i18n::Translator,
  store::{SettingsStore, StoreConfig, SubscriberDirectory},
};
use serde::{Deserialize, Deserializer, de};
use tower_http::trace::TraceLayer;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime configuration, deserialised from `herald.toml` and `HERALD_*`
/// environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:                    String,
  #[serde(default = "default_port")]
  pub port:                    u16,
  #[serde(default = "default_store_path")]
  pub store_path:              PathBuf,
  /// Bot API token. Required; an empty token is rejected at startup.
  #[serde(default)]
  pub bot_token:               String,
  #[serde(default = "default_telegram_api_url")]
  pub telegram_api_url:        String,
  #[serde(default, deserialize_with = "one_or_many_ids")]
  pub admin_ids:               Vec<SubscriberId>,
  #[serde(default)]
  pub default_locale:          Locale,
  #[serde(default = "default_broadcast_concurrency")]
  pub broadcast_concurrency:   usize,
  pub legacy_subscribers_path: Option<PathBuf>,
  pub legacy_settings_path:    Option<PathBuf>,
  pub translations_path:       Option<PathBuf>,
}

fn default_host() -> String { "127.0.0.1".to_string() }

fn default_port() -> u16 { 8080 }

fn default_store_path() -> PathBuf { PathBuf::from("data/herald.db") }

fn default_telegram_api_url() -> String { "https://api.telegram.org".to_string() }

fn default_broadcast_concurrency() -> usize { DEFAULT_CONCURRENCY }

/// Accepts `[1, 2]`, a bare `5` (what `HERALD_ADMIN_IDS=5` parses to) or
/// comma-separated text such as `"1, 2"`. List items may be numbers or text.
fn one_or_many_ids<'de, D>(deserializer: D) -> Result<Vec<SubscriberId>, D::Error>
where
  D: Deserializer<'de>,
{
  #[derive(Deserialize)]
  #[serde(untagged)]
  enum Id {
    Number(SubscriberId),
    Text(String),
  }

  #[derive(Deserialize)]
  #[serde(untagged)]
  enum Ids {
    One(Id),
    Many(Vec<Id>),
  }

  let items = match Ids::deserialize(deserializer)? {
    Ids::One(id) => vec![id],
    Ids::Many(ids) => ids,
  };

  let mut ids = Vec::with_capacity(items.len());
  for item in items {
    match item {
      Id::Number(id) => ids.push(id),
      Id::Text(text) => {
        for part in text.split(',').map(str::trim).filter(|p| !p.is_empty()) {
          let id = part
            .parse()
            .map_err(|_| de::Error::custom(format!("invalid admin id {part:?}")))?;
          ids.push(id);
        }
      }
    }
  }
  Ok(ids)
}

/// Prefix of the environment variables overriding file values.
pub const ENV_PREFIX: &str = "HERALD";

impl ServerConfig {
  /// Read `path` (optional) and overlay `HERALD_*` environment variables.
  pub fn load(path: &Path) -> Result<Self, ConfigError> { Self::load_with_env(path, None) }

  /// Like [`ServerConfig::load`], but reads the environment overrides from
  /// `env` instead of the process environment when given.
  pub fn load_with_env(
    path: &Path,
    env: Option<config::Map<String, String>>,
  ) -> Result<Self, ConfigError> {
    Config::builder()
      .add_source(File::from(path).required(false))
      .add_source(
        Environment::with_prefix(ENV_PREFIX)
          .try_parsing(true)
          .list_separator(",")
          .with_list_parse_key("admin_ids")
          .source(env),
      )
      .build()?
      .try_deserialize()
  }

  pub fn is_admin(&self, id: SubscriberId) -> bool { self.admin_ids.contains(&id) }

  pub fn store_config(&self) -> StoreConfig {
    StoreConfig {
      default_locale: self.default_locale,
      ..StoreConfig::default()
    }
  }

  pub fn legacy_sources(&self) -> LegacySources {
    LegacySources {
      subscribers_path: self.legacy_subscribers_path.clone(),
      settings_path:    self.legacy_settings_path.clone(),
    }
  }
}

// ─── Application state ────────────────────────────────────────────────────────

/// Storage required by the HTTP layer.
pub trait Backend: SubscriberDirectory + SettingsStore + 'static {}

impl<T: SubscriberDirectory + SettingsStore + 'static> Backend for T {}

/// Shared state threaded through all axum handlers.
pub struct AppState<S, D> {
  pub store:      Arc<S>,
  pub delivery:   Arc<D>,
  pub translator: Arc<Translator>,
  pub config:     Arc<ServerConfig>,
}

impl<S, D> Clone for AppState<S, D> {
  fn clone(&self) -> Self {
    Self {
      store:      Arc::clone(&self.store),
      delivery:   Arc::clone(&self.delivery),
      translator: Arc::clone(&self.translator),
      config:     Arc::clone(&self.config),
    }
  }
}

/// Header carrying the id of the admin issuing a command.
pub const ADMIN_HEADER: &str = "x-admin-id";

impl<S, D> AppState<S, D> {
  /// The admin id from [`ADMIN_HEADER`], if it names a configured admin.
  pub fn require_admin(&self, headers: &HeaderMap) -> Result<SubscriberId, ApiError> {
    let raw = headers
      .get(ADMIN_HEADER)
      .ok_or_else(|| ApiError::BadRequest(format!("missing {ADMIN_HEADER} header")))?;
    let id = raw
      .to_str()
      .ok()
      .and_then(|v| v.trim().parse().ok())
      .ok_or_else(|| ApiError::BadRequest(format!("invalid {ADMIN_HEADER} header")))?;
    if self.config.is_admin(id) {
      Ok(id)
    } else {
      Err(ApiError::Forbidden)
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the API router.
pub fn router<S, D>(state: AppState<S, D>) -> Router
where
  S: Backend,
  D: Delivery + 'static,
{
  Router::new()
    .route("/locales",                  get(subscribers::locales))
    .route(
      "/subscribers/{id}",
      get(subscribers::get_one::<S, D>).delete(subscribers::opt_out::<S, D>),
    )
    .route("/subscribers/{id}/contact", post(subscribers::contact::<S, D>))
    .route("/subscribers/{id}/locale",  put(subscribers::choose_locale::<S, D>))
    .route("/stats",                    get(admin::stats::<S, D>))
    .route(
      "/settings",
      get(admin::settings::<S, D>).patch(admin::update_settings::<S, D>),
    )
    .route("/broadcast",                post(admin::broadcast::<S, D>))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}
