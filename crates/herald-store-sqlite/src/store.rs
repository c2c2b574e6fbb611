//! [`SqliteStore`] — the SQLite implementation of the Herald storage traits.

use std::path::Path;

use chrono::Utc;
use herald_core::{
  Locale, Settings,
  store::{
    ImportOutcome, LegacyImport, SettingsStore, Storage, StoreConfig,
    SubscriberDirectory,
  },
  subscriber::{DirectoryStats, Subscriber, SubscriberId},
};
use rusqlite::{OptionalExtension as _, TransactionBehavior};

use crate::{
  Error, Result,
  encode::{RawSubscriber, SUBSCRIBER_COLUMNS, decode_locale, encode_dt, encode_locale},
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// Subscriber directory and settings table backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn:   tokio_rusqlite::Connection,
  config: StoreConfig,
}

impl SqliteStore {
  /// Open (or create) a store at `path` with the default [`StoreConfig`].
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    Self::open_with(path, StoreConfig::default()).await
  }

  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open_with(path: impl AsRef<Path>, config: StoreConfig) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn, config };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    Self::open_in_memory_with(StoreConfig::default()).await
  }

  pub async fn open_in_memory_with(config: StoreConfig) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn, config };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn persisted_settings(&self) -> Result<Settings> {
    let rows: Vec<(String, String)> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare("SELECT key, value FROM settings")?;
        let rows = stmt
          .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(rows.into_iter().collect())
  }
}

// ─── Storage traits ──────────────────────────────────────────────────────────

impl Storage for SqliteStore {
  type Error = Error;
}

impl SubscriberDirectory for SqliteStore {
  async fn exists(&self, id: SubscriberId) -> Result<bool> {
    let found = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT 1 FROM subscribers WHERE subscriber_id = ?1",
            rusqlite::params![id],
            |_| Ok(()),
          )
          .optional()?)
      })
      .await?;
    Ok(found.is_some())
  }

  async fn get(&self, id: SubscriberId) -> Result<Option<Subscriber>> {
    let raw: Option<RawSubscriber> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {SUBSCRIBER_COLUMNS} FROM subscribers WHERE subscriber_id = ?1"),
            rusqlite::params![id],
            RawSubscriber::from_row,
          )
          .optional()?)
      })
      .await?;

    let default_locale = self.config.default_locale;
    raw.map(|r| r.into_subscriber(default_locale)).transpose()
  }

  async fn get_locale(&self, id: SubscriberId) -> Result<Locale> {
    let code: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT locale FROM subscribers WHERE subscriber_id = ?1",
            rusqlite::params![id],
            |row| row.get(0),
          )
          .optional()?)
      })
      .await?;

    let default_locale = self.config.default_locale;
    Ok(code.map_or(default_locale, |c| decode_locale(&c, default_locale)))
  }

  async fn get_or_create(&self, id: SubscriberId) -> Result<Locale> {
    let default_locale = self.config.default_locale;
    let locale_str     = encode_locale(default_locale);
    let now_str        = encode_dt(Utc::now());

    // One statement: insert, or reactivate and report the stored locale.
    let code: String = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "INSERT INTO subscribers (subscriber_id, locale, active, deactivated_at, created_at)
           VALUES (?1, ?2, 1, NULL, ?3)
           ON CONFLICT (subscriber_id)
           DO UPDATE SET active = 1, deactivated_at = NULL
           RETURNING locale",
          rusqlite::params![id, locale_str, now_str],
          |row| row.get(0),
        )?)
      })
      .await?;

    Ok(decode_locale(&code, default_locale))
  }

  async fn set_active(&self, id: SubscriberId, active: bool) -> Result<bool> {
    let now_str = encode_dt(Utc::now());

    let changed = self
      .conn
      .call(move |conn| {
        let changed = if active {
          conn.execute(
            "UPDATE subscribers SET active = 1, deactivated_at = NULL
             WHERE subscriber_id = ?1 AND active = 0",
            rusqlite::params![id],
          )?
        } else {
          conn.execute(
            "UPDATE subscribers SET active = 0, deactivated_at = ?2
             WHERE subscriber_id = ?1 AND active = 1",
            rusqlite::params![id, now_str],
          )?
        };
        Ok(changed)
      })
      .await?;

    if changed > 0 {
      tracing::debug!(subscriber = id, active, "subscriber lifecycle changed");
    }
    Ok(changed > 0)
  }

  async fn set_locale(&self, id: SubscriberId, locale: Locale) -> Result<bool> {
    let locale_str = encode_locale(locale);
    let now_str    = encode_dt(Utc::now());

    // Conditional insert first; the update branch runs only when the row
    // already existed. Both happen in one write transaction.
    let was_new = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let inserted = tx.execute(
          "INSERT INTO subscribers (subscriber_id, locale, active, deactivated_at, created_at)
           VALUES (?1, ?2, 1, NULL, ?3)
           ON CONFLICT (subscriber_id) DO NOTHING",
          rusqlite::params![id, locale_str, now_str],
        )?;
        if inserted == 0 {
          tx.execute(
            "UPDATE subscribers SET locale = ?2, active = 1, deactivated_at = NULL
             WHERE subscriber_id = ?1",
            rusqlite::params![id, locale_str],
          )?;
        }
        tx.commit()?;
        Ok(inserted > 0)
      })
      .await?;

    Ok(was_new)
  }

  async fn active_ids(&self) -> Result<Vec<SubscriberId>> {
    let ids = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT subscriber_id FROM subscribers WHERE active = 1 ORDER BY subscriber_id",
        )?;
        let ids = stmt
          .query_map([], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<SubscriberId>>>()?;
        Ok(ids)
      })
      .await?;
    Ok(ids)
  }

  async fn stats(&self) -> Result<DirectoryStats> {
    let rows: Vec<(bool, String, i64)> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT active, locale, COUNT(*) FROM subscribers GROUP BY active, locale",
        )?;
        let rows = stmt
          .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    let default_locale = self.config.default_locale;
    let mut stats = DirectoryStats::default();
    for (active, code, count) in rows {
      let count = u64::try_from(count).unwrap_or_default();
      if active {
        stats.active += count;
        *stats
          .by_locale
          .entry(decode_locale(&code, default_locale))
          .or_default() += count;
      } else {
        stats.inactive += count;
      }
    }
    Ok(stats)
  }
}

impl SettingsStore for SqliteStore {
  async fn load_settings(&self) -> Settings {
    let defaults = self.config.setting_defaults.clone();
    match self.persisted_settings().await {
      Ok(persisted) => defaults.overlay(persisted),
      Err(e) => {
        tracing::warn!("cannot read settings, using defaults: {e}");
        defaults
      }
    }
  }

  async fn save_settings(&self, settings: Settings) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        {
          let mut stmt = tx.prepare(
            "INSERT INTO settings (key, value) VALUES (?1, ?2)
             ON CONFLICT (key) DO UPDATE SET value = excluded.value",
          )?;
          for (key, value) in settings {
            stmt.execute(rusqlite::params![key, value])?;
          }
        }
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

impl LegacyImport for SqliteStore {
  async fn import_subscribers(&self, ids: Vec<SubscriberId>) -> Result<ImportOutcome> {
    let locale_str = encode_locale(self.config.default_locale);
    let now_str    = encode_dt(Utc::now());

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let count: i64 =
          tx.query_row("SELECT COUNT(*) FROM subscribers", [], |row| row.get(0))?;
        if count > 0 {
          return Ok(ImportOutcome::Skipped);
        }

        let mut inserted = 0;
        {
          let mut stmt = tx.prepare(
            "INSERT INTO subscribers (subscriber_id, locale, active, deactivated_at, created_at)
             VALUES (?1, ?2, 1, NULL, ?3)
             ON CONFLICT (subscriber_id) DO NOTHING",
          )?;
          for id in ids {
            inserted += stmt.execute(rusqlite::params![id, locale_str, now_str])?;
          }
        }
        tx.commit()?;
        Ok(ImportOutcome::Imported(inserted))
      })
      .await?;

    Ok(outcome)
  }

  async fn import_settings(&self, settings: Settings) -> Result<ImportOutcome> {
    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let count: i64 =
          tx.query_row("SELECT COUNT(*) FROM settings", [], |row| row.get(0))?;
        if count > 0 {
          return Ok(ImportOutcome::Skipped);
        }

        let mut inserted = 0;
        {
          let mut stmt = tx.prepare(
            "INSERT INTO settings (key, value) VALUES (?1, ?2)
             ON CONFLICT (key) DO NOTHING",
          )?;
          for (key, value) in settings {
            inserted += stmt.execute(rusqlite::params![key, value])?;
          }
        }
        tx.commit()?;
        Ok(ImportOutcome::Imported(inserted))
      })
      .await?;

    Ok(outcome)
  }
}
