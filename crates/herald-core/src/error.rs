//! Error types for `herald-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unsupported locale: {0:?}")]
  UnsupportedLocale(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
