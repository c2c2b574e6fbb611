//! Subscriber — a recipient of broadcast messages.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Locale;

/// Externally-assigned recipient identity (a Telegram chat id). Never reused.
pub type SubscriberId = i64;

/// A row of the subscriber directory.
///
/// `active == false` exactly when `deactivated_at` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscriber {
  pub id:             SubscriberId,
  pub locale:         Locale,
  pub active:         bool,
  pub deactivated_at: Option<DateTime<Utc>>,
  pub created_at:     DateTime<Utc>,
}

/// Aggregate counts for administrative reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryStats {
  pub active:    u64,
  pub inactive:  u64,
  /// Active subscribers only.
  pub by_locale: BTreeMap<Locale, u64>,
}

impl DirectoryStats {
  pub fn total(&self) -> u64 { self.active + self.inactive }
}
