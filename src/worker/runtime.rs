use crate::broker::protocol::{DocumentTask, PartialIndexResult};
use crate::broker::BrokerClient;
use crate::config::DEQUEUE_TIMEOUT;
use crate::normalizer::{normalize, Language};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::watch;

const BROKER_RETRY_DELAY: Duration = Duration::from_secs(1);

/// The task-consuming half of a worker process.
pub struct WorkerRuntime {
    worker_id: String,
    language: Language,
    broker: BrokerClient,
    dequeue_timeout: Duration,
}

impl WorkerRuntime {
    pub fn new(broker: BrokerClient, worker_id: String, language: Language) -> Self {
        Self {
            worker_id,
            language,
            broker,
            dequeue_timeout: DEQUEUE_TIMEOUT,
        }
    }

    /// Overrides the blocking-dequeue timeout. Tests shorten it to keep
    /// shutdown fast.
    pub fn with_dequeue_timeout(mut self, timeout: Duration) -> Self {
        self.dequeue_timeout = timeout;
        self
    }

    /// The main task loop. Runs until the shutdown signal flips; shutdown
    /// latency is bounded by the dequeue timeout.
    pub async fn run(self, shutdown: watch::Receiver<bool>) {
        tracing::info!(
            "Worker {} waiting for tasks (language: {})",
            self.worker_id,
            self.language.as_str()
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            match self
                .broker
                .dequeue_raw(&self.worker_id, self.dequeue_timeout)
                .await
            {
                Ok(Some(raw)) => match BrokerClient::decode_task(&raw) {
                    Ok(task) => self.process_task(task).await,
                    Err(e) => {
                        tracing::error!("Dropping undecodable task payload: {:#}", e);
                    }
                },
                Ok(None) => {
                    tracing::trace!("No task in the last {:?}, still waiting", self.dequeue_timeout);
                }
                Err(e) => {
                    tracing::warn!(
                        "Task dequeue failed: {:#}; retrying in {:?}",
                        e,
                        BROKER_RETRY_DELAY
                    );
                    tokio::time::sleep(BROKER_RETRY_DELAY).await;
                }
            }
        }

        tracing::info!("Worker {} task loop stopped", self.worker_id);
    }

    /// Processes one document: normalize, count, publish. A document that
    /// normalizes to zero tokens still publishes an empty partial so the
    /// coordinator can clear its pending entry. Publish failures are logged
    /// and the result discarded (at-most-once delivery).
    pub async fn process_task(&self, task: DocumentTask) {
        tracing::info!(
            "Processing doc {} ({} bytes)",
            task.doc_id,
            task.content.len()
        );

        let tokens = normalize(&task.content, self.language);
        let result = if tokens.is_empty() {
            tracing::info!("Doc {} produced no tokens after normalization", task.doc_id);
            PartialIndexResult::empty(&self.worker_id, &task.doc_id)
        } else {
            PartialIndexResult {
                worker_id: self.worker_id.clone(),
                doc_id: task.doc_id.clone(),
                partial: term_frequencies(&tokens, &task.doc_id),
            }
        };

        match self.broker.publish_partial(&result).await {
            Ok(()) => {
                tracing::info!(
                    "Published partial index for doc {} ({} terms)",
                    task.doc_id,
                    result.partial.len()
                );
            }
            Err(e) => {
                tracing::error!(
                    "Failed to publish partial index for doc {}: {:#}",
                    task.doc_id,
                    e
                );
            }
        }
    }
}

/// Builds the per-document term-frequency map in the wire shape
/// `{term: {doc_id: count}}`. O(n) over the token list.
pub fn term_frequencies(
    tokens: &[String],
    doc_id: &str,
) -> HashMap<String, HashMap<String, u64>> {
    let mut counts: HashMap<&str, u64> = HashMap::new();
    for token in tokens {
        *counts.entry(token.as_str()).or_insert(0) += 1;
    }

    counts
        .into_iter()
        .map(|(term, freq)| {
            (
                term.to_string(),
                HashMap::from([(doc_id.to_string(), freq)]),
            )
        })
        .collect()
}
