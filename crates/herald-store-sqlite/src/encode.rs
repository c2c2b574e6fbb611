//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 strings; locales are their lowercase code.

use chrono::{DateTime, Utc};
use herald_core::{Locale, Subscriber};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Locale ──────────────────────────────────────────────────────────────────

pub fn encode_locale(locale: Locale) -> &'static str { locale.code() }

/// Stored codes that are no longer supported read as `default`.
pub fn decode_locale(s: &str, default: Locale) -> Locale {
  Locale::parse(s).unwrap_or_else(|| {
    tracing::warn!(code = s, "unsupported stored locale, using {default}");
    default
  })
}

// ─── Row types ───────────────────────────────────────────────────────────────

pub const SUBSCRIBER_COLUMNS: &str =
  "subscriber_id, locale, active, deactivated_at, created_at";

/// Raw values read directly from a `subscribers` row.
pub struct RawSubscriber {
  pub subscriber_id:  i64,
  pub locale:         String,
  pub active:         bool,
  pub deactivated_at: Option<String>,
  pub created_at:     String,
}

impl RawSubscriber {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      subscriber_id:  row.get(0)?,
      locale:         row.get(1)?,
      active:         row.get(2)?,
      deactivated_at: row.get(3)?,
      created_at:     row.get(4)?,
    })
  }

  pub fn into_subscriber(self, default_locale: Locale) -> Result<Subscriber> {
    if self.active == self.deactivated_at.is_some() {
      return Err(Error::InconsistentActivation(self.subscriber_id));
    }
    Ok(Subscriber {
      id:             self.subscriber_id,
      locale:         decode_locale(&self.locale, default_locale),
      active:         self.active,
      deactivated_at: self.deactivated_at.as_deref().map(decode_dt).transpose()?,
      created_at:     decode_dt(&self.created_at)?,
    })
  }
}
