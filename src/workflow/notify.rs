//! Rejection notifications
//!
//! The engine calls [`Notifier::on_reject`] after a rejection has been
//! committed. Notifiers must not block or fail the caller; anything slow or
//! fallible happens on a spawned task and is only logged.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Payload handed to notifiers when a letter is rejected
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectionNotice {
    pub letter_id: i64,
    pub sender_id: i64,
    pub reason: String,
    pub rejected_at: DateTime<Utc>,
}

/// Hook invoked on rejection; fire-and-forget
pub trait Notifier: Send + Sync {
    fn on_reject(&self, notice: RejectionNotice);
}

/// Notifier that does nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn on_reject(&self, _notice: RejectionNotice) {}
}

/// HTTP client posting rejection notices to a webhook
#[derive(Clone)]
pub struct WebhookClient {
    client: Client,
    url: String,
}

impl WebhookClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Post one notice, failing on transport errors and non-2xx responses
    pub async fn deliver(&self, notice: &RejectionNotice) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(notice)
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Webhook request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::Internal(format!(
                "Webhook rejected notice: {} - {}",
                status, text
            )));
        }

        Ok(())
    }
}

/// Default notifier: logs, keeps a bounded inbox, optionally forwards to a webhook
pub struct NotificationHub {
    inbox: Mutex<VecDeque<RejectionNotice>>,
    capacity: usize,
    webhook: Option<WebhookClient>,
}

impl NotificationHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            inbox: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            webhook: None,
        }
    }

    pub fn with_webhook(mut self, webhook: WebhookClient) -> Self {
        self.webhook = Some(webhook);
        self
    }

    /// Most recent notices first, optionally only those for one sender
    pub fn recent(&self, sender_id: Option<i64>) -> Vec<RejectionNotice> {
        let inbox = match self.inbox.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        inbox
            .iter()
            .rev()
            .filter(|n| sender_id.map_or(true, |id| n.sender_id == id))
            .cloned()
            .collect()
    }

    fn remember(&self, notice: RejectionNotice) {
        if self.capacity == 0 {
            return;
        }
        let mut inbox = match self.inbox.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        while inbox.len() >= self.capacity {
            inbox.pop_front();
        }
        inbox.push_back(notice);
    }

    fn forward(&self, notice: RejectionNotice) {
        let Some(webhook) = self.webhook.clone() else {
            return;
        };
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(
                letter_id = notice.letter_id,
                "No async runtime; skipping webhook delivery"
            );
            return;
        };
        handle.spawn(async move {
            if let Err(e) = webhook.deliver(&notice).await {
                tracing::warn!(
                    letter_id = notice.letter_id,
                    url = webhook.url(),
                    "Rejection webhook failed: {}",
                    e
                );
            }
        });
    }
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new(100)
    }
}

impl Notifier for NotificationHub {
    fn on_reject(&self, notice: RejectionNotice) {
        tracing::info!(
            letter_id = notice.letter_id,
            sender_id = notice.sender_id,
            "Letter rejected; notifying sender. Reason: {}",
            notice.reason
        );
        self.remember(notice.clone());
        self.forward(notice);
    }
}
