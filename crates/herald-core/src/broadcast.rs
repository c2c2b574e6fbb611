//! Fan-out of one message to every active subscriber.
//!
//! The engine takes a snapshot of the active ids, sends to each recipient
//! once (no retries), and classifies every outcome. A permanent failure
//! deactivates the recipient in the directory; transient failures are only
//! counted. One recipient's failure, timeout or panic never aborts the rest.

use std::{future::Future, sync::Arc, time::Duration};

use serde::Serialize;
use tokio::{sync::Semaphore, task::JoinSet};

use crate::{store::SubscriberDirectory, subscriber::SubscriberId};

pub const DEFAULT_CONCURRENCY: usize = 8;
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(30);

// ─── Delivery channel ────────────────────────────────────────────────────────

/// Result of a single delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
  Delivered,
  /// The recipient blocked or removed the channel; later sends will fail
  /// too until they make contact again.
  Permanent(String),
  /// Anything else: rate limits, timeouts, server errors.
  Transient(String),
}

/// A fallible one-recipient transport.
pub trait Delivery: Send + Sync {
  fn send<'a>(
    &'a self,
    recipient: SubscriberId,
    text: &'a str,
  ) -> impl Future<Output = DeliveryOutcome> + Send + 'a;
}

// ─── Report ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BroadcastReport {
  /// Size of the active-subscriber snapshot.
  pub recipients:  usize,
  pub sent:        usize,
  pub failed:      usize,
  /// Recipients switched to inactive by a permanent failure.
  pub deactivated: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecipientResult {
  Sent,
  Failed { deactivated: bool },
}

impl BroadcastReport {
  fn record(&mut self, result: RecipientResult) {
    match result {
      RecipientResult::Sent => self.sent += 1,
      RecipientResult::Failed { deactivated } => {
        self.failed += 1;
        if deactivated {
          self.deactivated += 1;
        }
      }
    }
  }
}

// ─── Engine ──────────────────────────────────────────────────────────────────

/// Sends to recipients in parallel, at most `concurrency` at a time.
pub struct Broadcaster<S, D> {
  directory:    Arc<S>,
  delivery:     Arc<D>,
  concurrency:  usize,
  send_timeout: Duration,
}

impl<S, D> Broadcaster<S, D>
where
  S: SubscriberDirectory + 'static,
  D: Delivery + 'static,
{
  pub fn new(directory: Arc<S>, delivery: Arc<D>) -> Self {
    Self {
      directory,
      delivery,
      concurrency: DEFAULT_CONCURRENCY,
      send_timeout: DEFAULT_SEND_TIMEOUT,
    }
  }

  pub fn with_concurrency(mut self, concurrency: usize) -> Self {
    self.concurrency = concurrency.max(1);
    self
  }

  pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
    self.send_timeout = timeout;
    self
  }

  /// Broadcast `text` to the current active subscribers.
  ///
  /// Only a failure to read the snapshot is returned as an error.
  pub async fn broadcast(&self, text: &str) -> Result<BroadcastReport, S::Error> {
    let recipients = self.directory.active_ids().await?;
    Ok(self.deliver(recipients, text).await)
  }

  /// Send `text` to an already-taken snapshot of recipients.
  pub async fn deliver(
    &self,
    recipients: Vec<SubscriberId>,
    text: &str,
  ) -> BroadcastReport {
    let mut report = BroadcastReport { recipients: recipients.len(), ..Default::default() };
    let text: Arc<str> = Arc::from(text);
    let limit = Arc::new(Semaphore::new(self.concurrency));
    let mut tasks = JoinSet::new();

    for id in recipients {
      // The semaphore is never closed.
      let Ok(permit) = Arc::clone(&limit).acquire_owned().await else {
        break;
      };
      let directory = Arc::clone(&self.directory);
      let delivery = Arc::clone(&self.delivery);
      let text = Arc::clone(&text);
      let send_timeout = self.send_timeout;

      tasks.spawn(async move {
        let _permit = permit;
        let outcome = tokio::time::timeout(send_timeout, delivery.send(id, &text))
          .await
          .unwrap_or_else(|_| DeliveryOutcome::Transient("timed out".to_owned()));
        settle(directory.as_ref(), id, outcome).await
      });

      while let Some(joined) = tasks.try_join_next() {
        report.record(joined_result(joined));
      }
    }

    while let Some(joined) = tasks.join_next().await {
      report.record(joined_result(joined));
    }

    tracing::info!(
      recipients = report.recipients,
      sent = report.sent,
      failed = report.failed,
      deactivated = report.deactivated,
      "broadcast finished"
    );
    report
  }
}

fn joined_result(
  joined: Result<RecipientResult, tokio::task::JoinError>,
) -> RecipientResult {
  joined.unwrap_or_else(|e| {
    tracing::warn!("delivery task failed: {e}");
    RecipientResult::Failed { deactivated: false }
  })
}

/// Classify one outcome and apply the directory side effect.
async fn settle<S: SubscriberDirectory>(
  directory: &S,
  id: SubscriberId,
  outcome: DeliveryOutcome,
) -> RecipientResult {
  match outcome {
    DeliveryOutcome::Delivered => RecipientResult::Sent,
    DeliveryOutcome::Transient(reason) => {
      tracing::debug!(recipient = id, %reason, "transient delivery failure");
      RecipientResult::Failed { deactivated: false }
    }
    DeliveryOutcome::Permanent(reason) => {
      tracing::debug!(recipient = id, %reason, "permanent delivery failure");
      match directory.set_active(id, false).await {
        Ok(changed) => RecipientResult::Failed { deactivated: changed },
        Err(e) => {
          tracing::warn!(recipient = id, "could not deactivate subscriber: {e}");
          RecipientResult::Failed { deactivated: false }
        }
      }
    }
  }
}

/// Deliver `text` to every admin except `requester`. Failures are logged and
/// skipped. Returns the number of admins reached.
pub async fn notify_admins<D: Delivery>(
  delivery: &D,
  admins: &[SubscriberId],
  requester: Option<SubscriberId>,
  text: &str,
) -> usize {
  let mut reached = 0;
  for &admin in admins.iter().filter(|&&a| Some(a) != requester) {
    match delivery.send(admin, text).await {
      DeliveryOutcome::Delivered => reached += 1,
      DeliveryOutcome::Permanent(reason) | DeliveryOutcome::Transient(reason) => {
        tracing::warn!(admin, %reason, "admin notification failed");
      }
    }
  }
  reached
}
