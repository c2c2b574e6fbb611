//! Admin-only handlers. Every request must carry [`crate::ADMIN_HEADER`].
//!
//! | Method  | Path | Notes |
//! |---------|------|-------|
//! | `GET`   | `/stats` | active/inactive counts, active per locale |
//! | `GET`   | `/settings` | defaults merged with persisted values |
//! | `PATCH` | `/settings` | body: `{"affiliate_link":"https://…"}` |
//! | `POST`  | `/broadcast` | body: `{"text":"…"}`; runs in the background |

use std::collections::BTreeMap;

use axum::{
  Json,
  extract::State,
  http::{HeaderMap, StatusCode},
};
use herald_core::{
  Settings, SubscriberId,
  broadcast::{BroadcastReport, Broadcaster, Delivery, DeliveryOutcome, notify_admins},
  settings::{AFFILIATE_LINK, CONTACT_LINK},
  subscriber::DirectoryStats,
};
use serde::{Deserialize, Serialize};

use crate::{AppState, Backend, error::ApiError};

/// `GET /stats`
pub async fn stats<S, D>(
  State(state): State<AppState<S, D>>,
  headers: HeaderMap,
) -> Result<Json<DirectoryStats>, ApiError>
where
  S: Backend,
  D: Delivery + 'static,
{
  state.require_admin(&headers)?;
  let stats = state.store.stats().await.map_err(ApiError::store)?;
  Ok(Json(stats))
}

/// `GET /settings`
pub async fn settings<S, D>(
  State(state): State<AppState<S, D>>,
  headers: HeaderMap,
) -> Result<Json<Settings>, ApiError>
where
  S: Backend,
  D: Delivery + 'static,
{
  state.require_admin(&headers)?;
  Ok(Json(state.store.load_settings().await))
}

/// `PATCH /settings` — upserts the given keys and returns the merged map.
pub async fn update_settings<S, D>(
  State(state): State<AppState<S, D>>,
  headers: HeaderMap,
  Json(body): Json<BTreeMap<String, String>>,
) -> Result<Json<Settings>, ApiError>
where
  S: Backend,
  D: Delivery + 'static,
{
  let admin = state.require_admin(&headers)?;

  let mut update = Settings::new();
  for (key, value) in body {
    let value = value.trim().to_owned();
    if value.is_empty() && [AFFILIATE_LINK, CONTACT_LINK].contains(&key.as_str()) {
      return Err(ApiError::BadRequest(format!("{key} must not be empty")));
    }
    update.insert(key, value);
  }
  if update.is_empty() {
    return Err(ApiError::BadRequest("no settings given".to_string()));
  }

  let keys: Vec<&str> = update.iter().map(|(k, _)| k).collect();
  tracing::info!(admin, ?keys, "updating settings");
  state.store.save_settings(update).await.map_err(ApiError::store)?;
  Ok(Json(state.store.load_settings().await))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BroadcastBody {
  pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BroadcastAccepted {
  pub recipients: usize,
}

/// `POST /broadcast`
///
/// Takes the active-subscriber snapshot, then sends in a background task.
/// When done, the report goes to the requesting admin and, best-effort, to
/// every other admin. An empty snapshot is answered to the requester only.
pub async fn broadcast<S, D>(
  State(state): State<AppState<S, D>>,
  headers: HeaderMap,
  Json(body): Json<BroadcastBody>,
) -> Result<(StatusCode, Json<BroadcastAccepted>), ApiError>
where
  S: Backend,
  D: Delivery + 'static,
{
  let requester = state.require_admin(&headers)?;
  let text = body.text.trim().to_owned();
  if text.is_empty() {
    return Err(ApiError::BadRequest("broadcast text must not be empty".to_string()));
  }

  let snapshot = state.store.active_ids().await.map_err(ApiError::store)?;
  let recipients = snapshot.len();
  tracing::info!(admin = requester, recipients, "broadcast accepted");

  tokio::spawn(async move {
    let report = Broadcaster::new(state.store.clone(), state.delivery.clone())
      .with_concurrency(state.config.broadcast_concurrency)
      .deliver(snapshot, &text)
      .await;
    report_to_admins(&state, requester, report).await;
  });

  Ok((StatusCode::ACCEPTED, Json(BroadcastAccepted { recipients })))
}

async fn report_to_admins<S, D>(
  state: &AppState<S, D>,
  requester: SubscriberId,
  report: BroadcastReport,
) where
  S: Backend,
  D: Delivery + 'static,
{
  let locale = state.store.get_locale(requester).await.unwrap_or_else(|e| {
    tracing::warn!("cannot read requester locale: {e}");
    state.translator.default_locale()
  });

  let text = if report.recipients == 0 {
    state.translator.resolve(locale.code(), "broadcast_none").to_owned()
  } else {
    state.translator.render(
      locale.code(),
      "broadcast_done",
      &[("sent", &report.sent), ("failed", &report.failed)],
    )
  };

  if let DeliveryOutcome::Permanent(reason) | DeliveryOutcome::Transient(reason) =
    state.delivery.send(requester, &text).await
  {
    tracing::warn!(admin = requester, %reason, "could not report broadcast result");
  }
  if report.recipients == 0 {
    return;
  }
  notify_admins(state.delivery.as_ref(), &state.config.admin_ids, Some(requester), &text).await;
}
