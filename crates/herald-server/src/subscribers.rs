//! Handlers for inbound subscriber events.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `POST`   | `/subscribers/{id}/contact` | first contact or any later one |
//! | `PUT`    | `/subscribers/{id}/locale`  | body: `{"locale":"pl"}` |
//! | `DELETE` | `/subscribers/{id}`         | opt-out; 404 if unknown |
//! | `GET`    | `/subscribers/{id}`         | 404 if unknown |
//! | `GET`    | `/locales`                  | languages offered to subscribers |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
};
use herald_core::{Locale, Subscriber, SubscriberId, broadcast::Delivery};
use serde::{Deserialize, Serialize};

use crate::{AppState, Backend, error::ApiError};

#[derive(Debug, Serialize, Deserialize)]
pub struct LocaleBody {
  pub locale: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ContactResponse {
  pub locale: Locale,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChooseLocaleResponse {
  pub locale:  Locale,
  pub was_new: bool,
  /// Confirmation text in the newly chosen language.
  pub message: String,
}

/// One entry of the language picker.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LocaleEntry {
  pub code: String,
  pub name: String,
  pub flag: String,
}

/// `GET /locales`
pub async fn locales() -> Json<Vec<LocaleEntry>> {
  Json(
    Locale::ALL
      .iter()
      .map(|l| LocaleEntry {
        code: l.code().to_owned(),
        name: l.display_name().to_owned(),
        flag: l.flag().to_owned(),
      })
      .collect(),
  )
}

/// `POST /subscribers/{id}/contact`
pub async fn contact<S, D>(
  State(state): State<AppState<S, D>>,
  Path(id): Path<SubscriberId>,
) -> Result<Json<ContactResponse>, ApiError>
where
  S: Backend,
  D: Delivery + 'static,
{
  let locale = state.store.get_or_create(id).await.map_err(ApiError::store)?;
  Ok(Json(ContactResponse { locale }))
}

/// `PUT /subscribers/{id}/locale`
pub async fn choose_locale<S, D>(
  State(state): State<AppState<S, D>>,
  Path(id): Path<SubscriberId>,
  Json(body): Json<LocaleBody>,
) -> Result<Json<ChooseLocaleResponse>, ApiError>
where
  S: Backend,
  D: Delivery + 'static,
{
  let locale: Locale = body
    .locale
    .parse()
    .map_err(|e: herald_core::Error| ApiError::BadRequest(e.to_string()))?;

  let was_new = state
    .store
    .set_locale(id, locale)
    .await
    .map_err(ApiError::store)?;
  if was_new {
    tracing::info!(subscriber = id, %locale, "new subscriber");
  }
  let message = state.translator.render(
    locale.code(),
    "lng_updated",
    &[("language", &locale.display_name())],
  );
  Ok(Json(ChooseLocaleResponse { locale, was_new, message }))
}

/// `DELETE /subscribers/{id}`
pub async fn opt_out<S, D>(
  State(state): State<AppState<S, D>>,
  Path(id): Path<SubscriberId>,
) -> Result<StatusCode, ApiError>
where
  S: Backend,
  D: Delivery + 'static,
{
  if !state.store.exists(id).await.map_err(ApiError::store)? {
    return Err(ApiError::NotFound(format!("subscriber {id}")));
  }
  state.store.set_active(id, false).await.map_err(ApiError::store)?;
  Ok(StatusCode::NO_CONTENT)
}

/// `GET /subscribers/{id}`
pub async fn get_one<S, D>(
  State(state): State<AppState<S, D>>,
  Path(id): Path<SubscriberId>,
) -> Result<Json<Subscriber>, ApiError>
where
  S: Backend,
  D: Delivery + 'static,
{
  state
    .store
    .get(id)
    .await
    .map_err(ApiError::store)?
    .map(Json)
    .ok_or_else(|| ApiError::NotFound(format!("subscriber {id}")))
}
