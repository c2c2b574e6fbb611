//! Error type for `herald-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// The row violates `active = false ⇔ deactivated_at is set`.
  #[error("subscriber {0} has an inconsistent activation state")]
  InconsistentActivation(i64),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
