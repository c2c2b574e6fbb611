//! Storage traits for the subscriber directory and the settings table.
//!
//! The traits are implemented by storage backends (e.g.
//! `herald-store-sqlite`). The broadcast engine, the bootstrap importer and
//! the HTTP layer depend on these abstractions, not on a concrete backend.
//!
//! Every method is an independently committed unit of work. Mutations of a
//! single subscriber must be atomic in the backend (a conditional upsert, not
//! a read followed by a write) so concurrent events for the same id cannot
//! lose updates.

use std::future::Future;

use crate::{
  Locale, Settings,
  subscriber::{DirectoryStats, Subscriber, SubscriberId},
};

/// Values injected into a backend at construction.
#[derive(Debug, Clone)]
pub struct StoreConfig {
  /// Locale given to new subscribers and reported for unknown ids.
  pub default_locale:   Locale,
  /// Settings returned for keys that were never persisted.
  pub setting_defaults: Settings,
}

impl Default for StoreConfig {
  fn default() -> Self {
    Self {
      default_locale:   Locale::default(),
      setting_defaults: Settings::defaults(),
    }
  }
}

/// Shared error type of a backend.
pub trait Storage: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;
}

// ─── Subscriber directory ────────────────────────────────────────────────────

pub trait SubscriberDirectory: Storage {
  fn exists(
    &self,
    id: SubscriberId,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// The full record, or `None` for an unknown id.
  fn get(
    &self,
    id: SubscriberId,
  ) -> impl Future<Output = Result<Option<Subscriber>, Self::Error>> + Send + '_;

  /// The stored locale, or the default locale for an unknown id.
  fn get_locale(
    &self,
    id: SubscriberId,
  ) -> impl Future<Output = Result<Locale, Self::Error>> + Send + '_;

  /// Register a contact from `id`.
  ///
  /// Unknown ids are inserted active with the default locale; inactive ids
  /// are reactivated. The existing locale is never changed.
  fn get_or_create(
    &self,
    id: SubscriberId,
  ) -> impl Future<Output = Result<Locale, Self::Error>> + Send + '_;

  /// Move the lifecycle flag. Returns `true` only if the row changed state;
  /// unknown ids and redundant calls return `false`.
  fn set_active(
    &self,
    id: SubscriberId,
    active: bool,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Upsert `id` with `locale`, forcing it active. Returns `true` exactly
  /// when this call created the row.
  fn set_locale(
    &self,
    id: SubscriberId,
    locale: Locale,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Snapshot of every active id, ascending and without duplicates.
  fn active_ids(
    &self,
  ) -> impl Future<Output = Result<Vec<SubscriberId>, Self::Error>> + Send + '_;

  fn stats(
    &self,
  ) -> impl Future<Output = Result<DirectoryStats, Self::Error>> + Send + '_;
}

// ─── Settings ────────────────────────────────────────────────────────────────

pub trait SettingsStore: Storage {
  /// Defaults overlaid with every persisted row. Never fails: an unreadable
  /// table yields the defaults alone.
  fn load_settings(&self) -> impl Future<Output = Settings> + Send + '_;

  /// Upsert every key of `settings`. Either all keys are written or an
  /// error is returned and none are.
  fn save_settings(
    &self,
    settings: Settings,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}

// ─── Bootstrap target ────────────────────────────────────────────────────────

/// Result of one bootstrap import step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportOutcome {
  /// The target table already had rows; nothing was written.
  Skipped,
  /// The table was empty; this many new rows were inserted.
  Imported(usize),
}

/// Bulk inserts used by [`crate::bootstrap`].
///
/// Each method checks that its table is empty and inserts in the same
/// transaction, ignoring (never overwriting) existing keys.
pub trait LegacyImport: Storage {
  fn import_subscribers(
    &self,
    ids: Vec<SubscriberId>,
  ) -> impl Future<Output = Result<ImportOutcome, Self::Error>> + Send + '_;

  fn import_settings(
    &self,
    settings: Settings,
  ) -> impl Future<Output = Result<ImportOutcome, Self::Error>> + Send + '_;
}
