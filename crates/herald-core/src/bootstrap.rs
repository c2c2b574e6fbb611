//! One-time migration of the legacy flat-file data into the store.
//!
//! Runs on every process start. Each table is imported only while it is
//! empty, and rows are inserted without overwriting, so repeated runs are
//! safe. The legacy sources are optional: a missing or malformed file is
//! simply "nothing to import", and individual bad entries are dropped.

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::{
  Settings,
  store::{ImportOutcome, LegacyImport},
  subscriber::SubscriberId,
};

/// Locations of the legacy JSON files.
#[derive(Debug, Clone, Default)]
pub struct LegacySources {
  /// A JSON array of recipient ids (`subscribers.json`).
  pub subscribers_path: Option<PathBuf>,
  /// A JSON object of settings (`config.json`).
  pub settings_path:    Option<PathBuf>,
}

/// Legacy data after parsing and cleaning.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LegacyData {
  pub subscribers: Vec<SubscriberId>,
  pub settings:    Settings,
}

impl LegacyData {
  pub fn read(sources: &LegacySources) -> Self {
    let subscribers = sources
      .subscribers_path
      .as_deref()
      .and_then(read_json)
      .map(|v| subscriber_ids(&v))
      .unwrap_or_default();
    let settings = sources
      .settings_path
      .as_deref()
      .and_then(read_json)
      .map(|v| settings_map(&v))
      .unwrap_or_default();
    Self { subscribers, settings }
  }
}

/// Outcome of a bootstrap run, per table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootstrapReport {
  pub subscribers: ImportOutcome,
  pub settings:    ImportOutcome,
}

/// Import `data` into `store`. The two tables are gated independently.
pub async fn run<S: LegacyImport>(
  store: &S,
  data: LegacyData,
) -> Result<BootstrapReport, S::Error> {
  let subscribers = store.import_subscribers(data.subscribers).await?;
  let settings = store.import_settings(data.settings).await?;

  let report = BootstrapReport { subscribers, settings };
  tracing::info!(
    subscribers = ?report.subscribers,
    settings = ?report.settings,
    "bootstrap import finished"
  );
  Ok(report)
}

fn read_json(path: &Path) -> Option<Value> {
  let raw = match std::fs::read_to_string(path) {
    Ok(raw) => raw,
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
    Err(e) => {
      tracing::warn!(path = %path.display(), "cannot read legacy file: {e}");
      return None;
    }
  };
  serde_json::from_str(&raw)
    .inspect_err(|e| {
      tracing::warn!(path = %path.display(), "ignoring malformed legacy file: {e}")
    })
    .ok()
}

/// Parse a legacy subscriber list.
pub fn parse_subscriber_list(input: &str) -> Vec<SubscriberId> {
  serde_json::from_str(input)
    .map(|v| subscriber_ids(&v))
    .unwrap_or_default()
}

/// Parse a legacy settings object.
pub fn parse_settings_map(input: &str) -> Settings {
  serde_json::from_str(input)
    .map(|v| settings_map(&v))
    .unwrap_or_default()
}

/// Integers and decimal strings are accepted; anything else is dropped.
/// Duplicates are kept, the insert ignores them.
fn subscriber_ids(value: &Value) -> Vec<SubscriberId> {
  let Some(items) = value.as_array() else {
    return Vec::new();
  };
  items
    .iter()
    .filter_map(|item| match item {
      Value::Number(n) => n.as_i64(),
      Value::String(s) => s.trim().parse().ok(),
      _ => None,
    })
    .collect()
}

/// Strings are kept verbatim, numbers and booleans by their JSON text.
/// `null`, arrays and objects are dropped.
fn settings_map(value: &Value) -> Settings {
  let Some(object) = value.as_object() else {
    return Settings::new();
  };
  object
    .iter()
    .filter_map(|(key, value)| {
      let value = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => return None,
      };
      Some((key.clone(), value))
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use std::io::Write as _;

  use super::*;

  #[test]
  fn subscriber_list_drops_malformed_entries() {
    let ids = parse_subscriber_list(r#"[10, 20, 20, "bad", "30", 1.5, null, -7]"#);
    assert_eq!(ids, vec![10, 20, 20, 30, -7]);
  }

  #[test]
  fn subscriber_list_not_an_array_is_empty() {
    assert!(parse_subscriber_list(r#"{"ids": [1]}"#).is_empty());
    assert!(parse_subscriber_list("not json").is_empty());
  }

  #[test]
  fn settings_values_are_coerced_to_strings() {
    let s = parse_settings_map(
      r#"{"affiliate_link": "https://a", "retries": 3, "beta": true, "gone": null, "nested": {}}"#,
    );
    assert_eq!(s.get("affiliate_link"), Some("https://a"));
    assert_eq!(s.get("retries"), Some("3"));
    assert_eq!(s.get("beta"), Some("true"));
    assert_eq!(s.get("gone"), None);
    assert_eq!(s.get("nested"), None);
  }

  #[test]
  fn settings_not_an_object_is_empty() {
    assert!(parse_settings_map("[1, 2]").is_empty());
  }

  #[test]
  fn missing_sources_read_as_empty() {
    let dir = tempfile::tempdir().unwrap();
    let data = LegacyData::read(&LegacySources {
      subscribers_path: Some(dir.path().join("subscribers.json")),
      settings_path:    Some(dir.path().join("config.json")),
    });
    assert_eq!(data, LegacyData::default());

    assert_eq!(LegacyData::read(&LegacySources::default()), LegacyData::default());
  }

  #[test]
  fn read_parses_both_files() {
    let dir = tempfile::tempdir().unwrap();
    let subs = dir.path().join("subscribers.json");
    let conf = dir.path().join("config.json");
    std::fs::File::create(&subs)
      .unwrap()
      .write_all(b"[1, 2, \"x\"]")
      .unwrap();
    std::fs::File::create(&conf)
      .unwrap()
      .write_all(br#"{"contact_link": "https://t.me/x"}"#)
      .unwrap();

    let data = LegacyData::read(&LegacySources {
      subscribers_path: Some(subs),
      settings_path:    Some(conf),
    });
    assert_eq!(data.subscribers, vec![1, 2]);
    assert_eq!(data.settings.get("contact_link"), Some("https://t.me/x"));
  }
}
