//! Delivery over the Telegram Bot API (`sendMessage`).

use std::{future::Future, time::Duration};

use herald_core::{
  SubscriberId,
  broadcast::{Delivery, DeliveryOutcome},
};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;

/// Descriptions of a 400 response that mean the chat is gone for good.
const PERMANENT_DESCRIPTIONS: [&str; 2] = ["chat not found", "user is deactivated"];

/// Sends plain-text messages through a bot.
///
/// Cheap to clone — the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct TelegramDelivery {
  client:   Client,
  endpoint: String,
}

impl TelegramDelivery {
  pub fn new(api_url: &str, token: &str) -> reqwest::Result<Self> {
    let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
    let endpoint = format!("{}/bot{token}/sendMessage", api_url.trim_end_matches('/'));
    Ok(Self { client, endpoint })
  }
}

/// The subset of the Bot API envelope we inspect.
#[derive(Debug, Default, Deserialize)]
struct ApiResponse {
  #[serde(default)]
  ok:          bool,
  description: Option<String>,
}

/// Map an HTTP status and Bot API description to a delivery outcome.
pub fn classify(status: StatusCode, ok: bool, description: Option<&str>) -> DeliveryOutcome {
  let reason = || {
    description
      .map(str::to_owned)
      .unwrap_or_else(|| status.to_string())
  };

  if status.is_success() && ok {
    return DeliveryOutcome::Delivered;
  }
  if status == StatusCode::FORBIDDEN {
    return DeliveryOutcome::Permanent(reason());
  }
  if status == StatusCode::BAD_REQUEST
    && let Some(text) = description
  {
    let text = text.to_ascii_lowercase();
    if PERMANENT_DESCRIPTIONS.iter().any(|p| text.contains(p)) {
      return DeliveryOutcome::Permanent(reason());
    }
  }
  DeliveryOutcome::Transient(reason())
}

impl Delivery for TelegramDelivery {
  fn send<'a>(
    &'a self,
    recipient: SubscriberId,
    text: &'a str,
  ) -> impl Future<Output = DeliveryOutcome> + Send + 'a {
    async move {
      let resp = match self
        .client
        .post(&self.endpoint)
        .json(&json!({ "chat_id": recipient, "text": text }))
        .send()
        .await
      {
        Ok(resp) => resp,
        // The URL carries the bot token; keep it out of the reason.
        Err(e) => return DeliveryOutcome::Transient(e.without_url().to_string()),
      };

      let status = resp.status();
      let body: ApiResponse = resp.json().await.unwrap_or_default();
      classify(status, body.ok, body.description.as_deref())
    }
  }
}
