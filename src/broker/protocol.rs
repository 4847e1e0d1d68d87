use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// Key and channel names. These are part of the cross-process protocol and
// must not change between versions.
pub const TASK_QUEUE_PREFIX: &str = "doc_processing_tasks";
pub const WORKER_STATUS_PREFIX: &str = "worker_status";
pub const RESULTS_CHANNEL: &str = "idx_partial_results";

pub fn task_queue_key(worker_id: &str) -> String {
    format!("{}:{}", TASK_QUEUE_PREFIX, worker_id)
}

pub fn worker_status_key(worker_id: &str) -> String {
    format!("{}:{}", WORKER_STATUS_PREFIX, worker_id)
}

pub fn worker_status_pattern() -> String {
    format!("{}:*", WORKER_STATUS_PREFIX)
}

/// A unit of work routed to exactly one worker's queue.
///
/// Created at the indexing trigger, consumed once, never mutated. There is no
/// acknowledgment protocol; a worker crash between dequeue and publish drops
/// the document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentTask {
    /// Unique within an indexing campaign; the document filename is used.
    pub doc_id: String,
    /// Full UTF-8 text of the document.
    pub content: String,
}

/// A worker's answer for one document, published on the results channel.
///
/// `partial` maps stemmed term -> {doc_id -> frequency}. Every inner map
/// contains exactly one key, equal to `doc_id`; the doubly-keyed shape is
/// kept on the wire for compatibility and flattened at merge time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartialIndexResult {
    pub worker_id: String,
    pub doc_id: String,
    pub partial: HashMap<String, HashMap<String, u64>>,
}

impl PartialIndexResult {
    pub fn empty(worker_id: &str, doc_id: &str) -> Self {
        Self {
            worker_id: worker_id.to_string(),
            doc_id: doc_id.to_string(),
            partial: HashMap::new(),
        }
    }
}

/// A worker's load sample, stored at `worker_status:{worker_id}` with a TTL
/// of three heartbeat intervals. Key presence is the liveness signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerHeartbeat {
    pub cpu_percent: f32,
    pub ram_percent: f32,
}
