use super::index::GlobalIndex;
use crate::broker::protocol::RESULTS_CHANNEL;
use crate::broker::BrokerClient;
use dashmap::DashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

const INITIAL_RESUBSCRIBE_DELAY: Duration = Duration::from_millis(500);
const MAX_RESUBSCRIBE_DELAY: Duration = Duration::from_secs(10);

/// The fan-in half of the indexing pipeline: one subscription on the partial
/// results channel, folding every message into the global index.
///
/// Data-level errors never fail the loop; malformed records are logged and
/// dropped. Losing the subscription triggers a re-subscribe with capped
/// exponential backoff.
pub struct Merger {
    broker: BrokerClient,
    index: Arc<GlobalIndex>,
    pending: Arc<DashSet<String>>,
}

impl Merger {
    pub fn new(
        broker: BrokerClient,
        index: Arc<GlobalIndex>,
        pending: Arc<DashSet<String>>,
    ) -> Self {
        Self {
            broker,
            index,
            pending,
        }
    }

    /// Runs until the shutdown signal flips. The in-flight merge (if any)
    /// completes before the loop returns.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut delay = INITIAL_RESUBSCRIBE_DELAY;

        loop {
            if *shutdown.borrow() {
                break;
            }

            let mut messages = match self.broker.subscribe_partials().await {
                Ok(rx) => {
                    tracing::info!("Merger subscribed to '{}'", RESULTS_CHANNEL);
                    delay = INITIAL_RESUBSCRIBE_DELAY;
                    rx
                }
                Err(e) => {
                    tracing::warn!(
                        "Merger could not subscribe: {:#}; retrying in {:?}",
                        e,
                        delay
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        changed = shutdown.changed() => {
                            if changed.is_err() || *shutdown.borrow() {
                                break;
                            }
                        }
                    }
                    delay = (delay * 2).min(MAX_RESUBSCRIBE_DELAY);
                    continue;
                }
            };

            loop {
                tokio::select! {
                    msg = messages.recv() => match msg {
                        Some(raw) => self.handle_message(&raw).await,
                        None => {
                            tracing::warn!("Results subscription closed; resubscribing");
                            break;
                        }
                    },
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            tracing::info!("Merger shutting down");
                            return;
                        }
                    }
                }
            }
        }

        tracing::info!("Merger stopped");
    }

    /// Decodes and merges one published partial result, then clears its
    /// document from the pending set.
    pub async fn handle_message(&self, raw: &str) {
        let result = match BrokerClient::decode_partial(raw) {
            Ok(result) => result,
            Err(e) => {
                tracing::error!("Dropping undecodable partial result: {:#}", e);
                return;
            }
        };

        tracing::info!(
            "Received partial index from worker {} for doc {}",
            result.worker_id,
            result.doc_id
        );
        self.index.merge_partial(&result.doc_id, &result.partial);

        if self.pending.remove(&result.doc_id).is_some() {
            tracing::info!(
                "Doc {} complete; {} docs still pending",
                result.doc_id,
                self.pending.len()
            );
        } else {
            tracing::warn!(
                "Received results for doc {} which was not in the pending set",
                result.doc_id
            );
        }
    }
}
