//! Integration tests for `SqliteStore` against an in-memory database.

use std::{collections::HashMap, future::Future, sync::Arc, time::Duration};

use herald_core::{
  Locale, Settings,
  bootstrap::{self, LegacyData, parse_subscriber_list},
  broadcast::{BroadcastReport, Broadcaster, Delivery, DeliveryOutcome},
  store::{
    ImportOutcome, LegacyImport, SettingsStore, StoreConfig, SubscriberDirectory,
  },
  subscriber::SubscriberId,
};

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

// ─── Subscriber directory ────────────────────────────────────────────────────

#[tokio::test]
async fn get_or_create_inserts_once_with_default_locale() {
  let s = store().await;
  assert!(!s.exists(42).await.unwrap());

  assert_eq!(s.get_or_create(42).await.unwrap(), Locale::En);
  assert!(s.exists(42).await.unwrap());

  let first = s.get(42).await.unwrap().unwrap();
  assert!(first.active);
  assert_eq!(first.deactivated_at, None);

  assert_eq!(s.get_or_create(42).await.unwrap(), Locale::En);
  let second = s.get(42).await.unwrap().unwrap();
  assert_eq!(first, second);
  assert_eq!(s.active_ids().await.unwrap(), vec![42]);
}

#[tokio::test]
async fn get_or_create_reactivates_and_keeps_locale() {
  let s = store().await;
  s.set_locale(7, Locale::Fr).await.unwrap();
  assert!(s.set_active(7, false).await.unwrap());

  assert_eq!(s.get_or_create(7).await.unwrap(), Locale::Fr);

  let sub = s.get(7).await.unwrap().unwrap();
  assert!(sub.active);
  assert_eq!(sub.deactivated_at, None);
  assert_eq!(sub.locale, Locale::Fr);
}

#[tokio::test]
async fn get_locale_unknown_id_uses_configured_default() {
  let s = SqliteStore::open_in_memory_with(StoreConfig {
    default_locale: Locale::De,
    ..Default::default()
  })
  .await
  .unwrap();

  assert_eq!(s.get_locale(1).await.unwrap(), Locale::De);
  assert!(!s.exists(1).await.unwrap());
  assert_eq!(s.get_or_create(1).await.unwrap(), Locale::De);
}

#[tokio::test]
async fn get_missing_returns_none() {
  let s = store().await;
  assert!(s.get(999).await.unwrap().is_none());
}

#[tokio::test]
async fn set_locale_reports_creation_only_once() {
  let s = store().await;
  assert!(s.set_locale(5, Locale::Pl).await.unwrap());
  assert!(!s.set_locale(5, Locale::Es).await.unwrap());
  assert_eq!(s.get_locale(5).await.unwrap(), Locale::Es);
}

#[tokio::test]
async fn set_locale_forces_active() {
  let s = store().await;
  s.get_or_create(8).await.unwrap();
  s.set_active(8, false).await.unwrap();
  assert!(!s.get(8).await.unwrap().unwrap().active);

  assert!(!s.set_locale(8, Locale::It).await.unwrap());

  let sub = s.get(8).await.unwrap().unwrap();
  assert!(sub.active);
  assert_eq!(sub.deactivated_at, None);
  assert_eq!(sub.locale, Locale::It);
}

#[tokio::test]
async fn concurrent_set_locale_creates_exactly_once() {
  let s = store().await;

  let handles: Vec<_> = (0..16)
    .map(|i| {
      let s = s.clone();
      let locale = Locale::ALL[i % Locale::ALL.len()];
      tokio::spawn(async move { s.set_locale(77, locale).await.unwrap() })
    })
    .collect();

  let mut created = 0;
  for h in handles {
    if h.await.unwrap() {
      created += 1;
    }
  }
  assert_eq!(created, 1);
  assert_eq!(s.stats().await.unwrap().total(), 1);
}

#[tokio::test]
async fn set_active_round_trip() {
  let s = store().await;
  for id in [1, 2, 3] {
    s.get_or_create(id).await.unwrap();
  }

  assert!(s.set_active(2, false).await.unwrap());
  let sub = s.get(2).await.unwrap().unwrap();
  assert!(!sub.active);
  assert!(sub.deactivated_at.is_some());
  assert_eq!(s.active_ids().await.unwrap(), vec![1, 3]);

  assert!(s.set_active(2, true).await.unwrap());
  let sub = s.get(2).await.unwrap().unwrap();
  assert!(sub.active);
  assert_eq!(sub.deactivated_at, None);
  assert_eq!(s.active_ids().await.unwrap(), vec![1, 2, 3]);
}

#[tokio::test]
async fn set_active_is_idempotent() {
  let s = store().await;
  s.get_or_create(4).await.unwrap();

  assert!(!s.set_active(4, true).await.unwrap());
  assert!(s.set_active(4, false).await.unwrap());
  let first = s.get(4).await.unwrap().unwrap().deactivated_at;

  tokio::time::sleep(Duration::from_millis(5)).await;
  assert!(!s.set_active(4, false).await.unwrap());
  assert_eq!(s.get(4).await.unwrap().unwrap().deactivated_at, first);
}

#[tokio::test]
async fn set_active_unknown_id_creates_nothing() {
  let s = store().await;
  assert!(!s.set_active(404, false).await.unwrap());
  assert!(!s.set_active(404, true).await.unwrap());
  assert!(!s.exists(404).await.unwrap());
}

#[tokio::test]
async fn stats_count_by_state_and_locale() {
  let s = store().await;
  s.get_or_create(1).await.unwrap();
  s.set_locale(2, Locale::Pl).await.unwrap();
  s.set_locale(3, Locale::Pl).await.unwrap();
  s.set_locale(4, Locale::Sr).await.unwrap();
  s.set_active(4, false).await.unwrap();

  let stats = s.stats().await.unwrap();
  assert_eq!(stats.active, 3);
  assert_eq!(stats.inactive, 1);
  assert_eq!(stats.by_locale.get(&Locale::En), Some(&1));
  assert_eq!(stats.by_locale.get(&Locale::Pl), Some(&2));
  assert_eq!(stats.by_locale.get(&Locale::Sr), None);
}

// ─── Settings ────────────────────────────────────────────────────────────────

fn store_config(defaults: &[(&str, &str)]) -> StoreConfig {
  StoreConfig {
    setting_defaults: defaults.iter().copied().collect(),
    ..Default::default()
  }
}

#[tokio::test]
async fn load_settings_empty_table_returns_defaults() {
  let s = store().await;
  assert_eq!(s.load_settings().await, Settings::defaults());
}

#[tokio::test]
async fn load_settings_overlays_persisted_on_defaults() {
  let s = SqliteStore::open_in_memory_with(store_config(&[("a", "1")]))
    .await
    .unwrap();
  s.save_settings(Settings::from_iter([("b", "2")])).await.unwrap();

  assert_eq!(s.load_settings().await, Settings::from_iter([("a", "1"), ("b", "2")]));
}

#[tokio::test]
async fn save_settings_last_writer_wins() {
  let s = SqliteStore::open_in_memory_with(store_config(&[("a", "1")]))
    .await
    .unwrap();
  s.save_settings(Settings::from_iter([("a", "x"), ("c", "")])).await.unwrap();
  s.save_settings(Settings::from_iter([("a", "y")])).await.unwrap();

  let loaded = s.load_settings().await;
  assert_eq!(loaded.get("a"), Some("y"));
  assert_eq!(loaded.get("c"), Some(""));
}

#[tokio::test]
async fn load_settings_unreadable_table_falls_back_to_defaults() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("herald.db");
  let s = SqliteStore::open(&path).await.unwrap();
  s.save_settings(Settings::from_iter([("contact_link", "https://override")]))
    .await
    .unwrap();

  // A BLOB that is not valid UTF-8 cannot be read back as text.
  let raw = rusqlite::Connection::open(&path).unwrap();
  raw
    .execute("INSERT INTO settings (key, value) VALUES ('broken', x'ff')", [])
    .unwrap();
  drop(raw);

  assert_eq!(s.load_settings().await, Settings::defaults());
}

// ─── Bootstrap ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn bootstrap_imports_legacy_ids_once() {
  let s = store().await;
  let data = LegacyData {
    subscribers: parse_subscriber_list(r#"[10, 20, 20, "bad"]"#),
    settings:    Settings::new(),
  };

  let report = bootstrap::run(&s, data.clone()).await.unwrap();
  assert_eq!(report.subscribers, ImportOutcome::Imported(2));
  assert_eq!(s.active_ids().await.unwrap(), vec![10, 20]);

  let again = bootstrap::run(
    &s,
    LegacyData { subscribers: vec![30], ..data },
  )
  .await
  .unwrap();
  assert_eq!(again.subscribers, ImportOutcome::Skipped);
  assert_eq!(s.active_ids().await.unwrap(), vec![10, 20]);
}

#[tokio::test]
async fn bootstrap_gates_tables_independently() {
  let s = store().await;
  s.get_or_create(1).await.unwrap();

  let report = bootstrap::run(&s, LegacyData {
    subscribers: vec![2, 3],
    settings:    Settings::from_iter([("affiliate_link", "https://legacy")]),
  })
  .await
  .unwrap();

  assert_eq!(report.subscribers, ImportOutcome::Skipped);
  assert_eq!(report.settings, ImportOutcome::Imported(1));
  assert_eq!(s.active_ids().await.unwrap(), vec![1]);
  assert_eq!(s.load_settings().await.get("affiliate_link"), Some("https://legacy"));
}

#[tokio::test]
async fn bootstrap_never_overwrites_settings() {
  let s = store().await;
  s.save_settings(Settings::from_iter([("contact_link", "https://new")]))
    .await
    .unwrap();

  let outcome = s
    .import_settings(Settings::from_iter([("contact_link", "https://old")]))
    .await
    .unwrap();

  assert_eq!(outcome, ImportOutcome::Skipped);
  assert_eq!(s.load_settings().await.get("contact_link"), Some("https://new"));
}

#[tokio::test]
async fn bootstrap_with_nothing_to_import() {
  let s = store().await;
  let report = bootstrap::run(&s, LegacyData::default()).await.unwrap();
  assert_eq!(report.subscribers, ImportOutcome::Imported(0));
  assert_eq!(report.settings, ImportOutcome::Imported(0));
  assert_eq!(s.load_settings().await, Settings::defaults());
}

// ─── Broadcast ───────────────────────────────────────────────────────────────

/// Delivery double: per-recipient scripted outcomes, `Delivered` otherwise.
#[derive(Default)]
struct Scripted {
  outcomes: HashMap<SubscriberId, DeliveryOutcome>,
  hang:     Vec<SubscriberId>,
  calls:    std::sync::Mutex<Vec<SubscriberId>>,
}

impl Delivery for Scripted {
  fn send<'a>(
    &'a self,
    recipient: SubscriberId,
    _text: &'a str,
  ) -> impl Future<Output = DeliveryOutcome> + Send + 'a {
    async move {
      self.calls.lock().unwrap().push(recipient);
      if self.hang.contains(&recipient) {
        tokio::time::sleep(Duration::from_secs(3600)).await;
      }
      self
        .outcomes
        .get(&recipient)
        .cloned()
        .unwrap_or(DeliveryOutcome::Delivered)
    }
  }
}

#[tokio::test]
async fn broadcast_classifies_outcomes() {
  let s = Arc::new(store().await);
  for id in [1, 2, 3] {
    s.get_or_create(id).await.unwrap();
  }
  let delivery = Arc::new(Scripted {
    outcomes: HashMap::from([
      (2, DeliveryOutcome::Permanent("blocked".into())),
      (3, DeliveryOutcome::Transient("rate limited".into())),
    ]),
    ..Default::default()
  });

  let report = Broadcaster::new(Arc::clone(&s), Arc::clone(&delivery))
    .broadcast("hello")
    .await
    .unwrap();

  assert_eq!((report.sent, report.failed), (1, 2));
  assert_eq!(report.recipients, 3);
  assert_eq!(report.deactivated, 1);
  assert_eq!(s.active_ids().await.unwrap(), vec![1, 3]);
  assert!(!s.get(2).await.unwrap().unwrap().active);
}

#[tokio::test]
async fn broadcast_skips_inactive_and_sends_once_each() {
  let s = Arc::new(store().await);
  for id in 1..=20 {
    s.get_or_create(id).await.unwrap();
  }
  s.set_active(5, false).await.unwrap();
  let delivery = Arc::new(Scripted::default());

  let report = Broadcaster::new(Arc::clone(&s), Arc::clone(&delivery))
    .with_concurrency(3)
    .broadcast("hi")
    .await
    .unwrap();

  assert_eq!((report.sent, report.failed), (19, 0));
  let mut calls = delivery.calls.lock().unwrap().clone();
  calls.sort_unstable();
  let expected: Vec<_> = (1..=20).filter(|&id| id != 5).collect();
  assert_eq!(calls, expected);
}

#[tokio::test]
async fn broadcast_timeout_is_transient() {
  let s = Arc::new(store().await);
  s.get_or_create(1).await.unwrap();
  s.get_or_create(2).await.unwrap();
  let delivery = Arc::new(Scripted { hang: vec![1], ..Default::default() });

  let report = Broadcaster::new(Arc::clone(&s), delivery)
    .with_send_timeout(Duration::from_millis(50))
    .broadcast("hi")
    .await
    .unwrap();

  assert_eq!((report.sent, report.failed, report.deactivated), (1, 1, 0));
  assert_eq!(s.active_ids().await.unwrap(), vec![1, 2]);
}

#[tokio::test]
async fn broadcast_to_empty_directory() {
  let s = Arc::new(store().await);
  let report = Broadcaster::new(s, Arc::new(Scripted::default()))
    .broadcast("hi")
    .await
    .unwrap();
  assert_eq!(report, BroadcastReport::default());
}
