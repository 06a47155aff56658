//! RabbitMQ management API queue backend.
//!
//! `GET /api/queues/{vhost}/{queue}` is a read-only lookup: it never
//! declares, consumes, or acknowledges anything, so it is safe to call
//! once a second against a production broker.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use http::StatusCode;
use serde::Deserialize;
use tracing::debug;

use qscale_core::config::RabbitMqConfig;
use qscale_core::{BackendError, BackendFuture, BackendResult, QueueBackend, QueueSample};

use crate::http::{HttpClient, encode_path_segment};

/// Subset of the management API queue object.
///
/// Both counts are absent until the broker's first stats emission, and
/// always absent when the metrics collector is disabled.
#[derive(Debug, Deserialize)]
struct QueueInfo {
    /// Ready messages, the same count a passive declare reports.
    messages_ready: Option<u64>,
    consumers: Option<u64>,
}

/// Queue inspection through the RabbitMQ management plugin.
pub struct RabbitMqManagement {
    http: HttpClient,
    base_url: String,
    vhost: String,
    authorization: String,
}

impl RabbitMqManagement {
    pub fn new(http: HttpClient, config: &RabbitMqConfig) -> Self {
        let credentials = format!("{}:{}", config.username, config.password);
        Self {
            http,
            base_url: config.management_url.trim_end_matches('/').to_string(),
            vhost: config.vhost.clone(),
            authorization: format!("Basic {}", STANDARD.encode(credentials)),
        }
    }

    fn queue_url(&self, queue_name: &str) -> String {
        format!(
            "{}/api/queues/{}/{}",
            self.base_url,
            encode_path_segment(&self.vhost),
            encode_path_segment(queue_name)
        )
    }

    /// Current ready-message count and consumer count for one queue.
    pub async fn queue_stats(&self, queue_name: &str) -> BackendResult<QueueSample> {
        let url = self.queue_url(queue_name);
        let response = self.http.get(&url, &self.authorization).await?;

        if response.status == StatusCode::NOT_FOUND {
            return Err(BackendError::NotFound(format!(
                "queue {queue_name} in vhost {}",
                self.vhost
            )));
        }

        let info: QueueInfo = response.error_for_status()?.json()?;
        let (Some(size), Some(consumers)) = (info.messages_ready, info.consumers) else {
            return Err(BackendError::Decode(format!(
                "queue {queue_name}: queue stats not yet available"
            )));
        };
        debug!(queue = %queue_name, size, consumers, "queue inspected");

        Ok(QueueSample::new(queue_name, size, consumers))
    }
}

impl QueueBackend for RabbitMqManagement {
    fn inspect_passive<'a>(&'a self, queue_name: &'a str) -> BackendFuture<'a, QueueSample> {
        Box::pin(self.queue_stats(queue_name))
    }
}
