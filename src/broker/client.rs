use super::protocol::{
    task_queue_key, worker_status_key, worker_status_pattern, DocumentTask, PartialIndexResult,
    WorkerHeartbeat, RESULTS_CHANNEL, WORKER_STATUS_PREFIX,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// The minimal substrate the system needs from its broker. Implementations
/// must be safe to share across tasks.
#[async_trait]
pub trait Broker: Send + Sync {
    async fn ping(&self) -> Result<()>;

    /// Appends to a list; total ordering within one list. Returns the list
    /// length after the push.
    async fn push_list(&self, key: &str, payload: &str) -> Result<u64>;

    /// Pops the head of a list, blocking up to `timeout`. `None` on timeout.
    async fn blocking_pop(&self, key: &str, timeout: Duration) -> Result<Option<String>>;

    async fn list_len(&self, key: &str) -> Result<u64>;

    async fn publish(&self, channel: &str, payload: &str) -> Result<()>;

    /// Subscribes to a channel. The returned receiver yields raw payloads and
    /// closes when the underlying subscription is lost; the caller decides
    /// whether to re-subscribe.
    async fn subscribe(&self, channel: &str) -> Result<mpsc::Receiver<String>>;

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    /// Refreshes the TTL of an existing key without rewriting its value.
    /// Returns false when the key does not exist.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool>;

    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Enumerates keys matching `pattern`. The system only ever uses
    /// `prefix*` patterns; implementations may support just that shape.
    async fn keys_matching(&self, pattern: &str) -> Result<Vec<String>>;

    /// Remaining TTL in seconds; `None` when the key is missing or has no
    /// expiry.
    async fn ttl(&self, key: &str) -> Result<Option<i64>>;
}

/// Typed wrapper over the substrate. This is the only place broker payloads
/// are serialized or deserialized.
#[derive(Clone)]
pub struct BrokerClient {
    inner: Arc<dyn Broker>,
}

impl BrokerClient {
    pub fn new(inner: Arc<dyn Broker>) -> Self {
        Self { inner }
    }

    pub async fn ping(&self) -> Result<()> {
        self.inner.ping().await
    }

    /// Pushes a document task onto one worker's queue. Returns the queue
    /// length after the push.
    pub async fn enqueue_task(&self, worker_id: &str, task: &DocumentTask) -> Result<u64> {
        let payload = serde_json::to_string(task)?;
        self.inner
            .push_list(&task_queue_key(worker_id), &payload)
            .await
    }

    /// Pops the next raw task payload from a worker's queue. `None` means the
    /// timeout elapsed with the queue empty. Decoding is a separate step so
    /// that callers can tell broker failures from malformed payloads.
    pub async fn dequeue_raw(&self, worker_id: &str, timeout: Duration) -> Result<Option<String>> {
        self.inner
            .blocking_pop(&task_queue_key(worker_id), timeout)
            .await
    }

    pub fn decode_task(raw: &str) -> Result<DocumentTask> {
        serde_json::from_str(raw).context("malformed document task payload")
    }

    pub async fn queue_length(&self, worker_id: &str) -> Result<u64> {
        self.inner.list_len(&task_queue_key(worker_id)).await
    }

    pub async fn publish_partial(&self, result: &PartialIndexResult) -> Result<()> {
        let payload = serde_json::to_string(result)?;
        self.inner.publish(RESULTS_CHANNEL, &payload).await
    }

    pub async fn subscribe_partials(&self) -> Result<mpsc::Receiver<String>> {
        self.inner.subscribe(RESULTS_CHANNEL).await
    }

    pub fn decode_partial(raw: &str) -> Result<PartialIndexResult> {
        serde_json::from_str(raw).context("malformed partial index result")
    }

    pub async fn write_heartbeat(
        &self,
        worker_id: &str,
        heartbeat: &WorkerHeartbeat,
        ttl: Duration,
    ) -> Result<()> {
        let payload = serde_json::to_string(heartbeat)?;
        self.inner
            .set_with_ttl(&worker_status_key(worker_id), &payload, ttl)
            .await
    }

    /// Extends the heartbeat TTL without rewriting the value.
    pub async fn refresh_heartbeat(&self, worker_id: &str, ttl: Duration) -> Result<bool> {
        self.inner.expire(&worker_status_key(worker_id), ttl).await
    }

    /// Reads one worker's heartbeat. Missing and malformed records both read
    /// as `None`; callers treat either as "not live".
    pub async fn read_heartbeat(&self, worker_id: &str) -> Result<Option<WorkerHeartbeat>> {
        let Some(raw) = self.inner.get(&worker_status_key(worker_id)).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(heartbeat) => Ok(Some(heartbeat)),
            Err(e) => {
                tracing::warn!("Malformed heartbeat for worker {}: {}", worker_id, e);
                Ok(None)
            }
        }
    }

    pub async fn heartbeat_ttl(&self, worker_id: &str) -> Result<Option<i64>> {
        self.inner.ttl(&worker_status_key(worker_id)).await
    }

    /// Worker ids with a live heartbeat key, in lexicographic order.
    pub async fn live_worker_ids(&self) -> Result<Vec<String>> {
        let keys = self.inner.keys_matching(&worker_status_pattern()).await?;
        let prefix = format!("{}:", WORKER_STATUS_PREFIX);
        let mut ids: Vec<String> = keys
            .iter()
            .filter_map(|key| key.strip_prefix(&prefix).map(str::to_string))
            .collect();
        ids.sort();
        Ok(ids)
    }
}
