use crate::broker::protocol::DocumentTask;
use crate::broker::BrokerClient;
use dashmap::DashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

// Composite load score weights. One queued task outweighs a 10-point CPU
// difference, which keeps the queue-depth term dominant and prevents pile-up
// on a single worker.
const QUEUE_WEIGHT: f64 = 10.0;
const CPU_WEIGHT: f64 = 0.5;
const RAM_WEIGHT: f64 = 0.3;

#[derive(Debug)]
pub enum DispatchError {
    /// The scan path does not exist or is not a directory.
    PathNotDirectory(PathBuf),
    /// No live worker heartbeat was found; the task is not queued anywhere.
    NoWorkersAvailable,
    /// The broker call itself failed.
    Broker(anyhow::Error),
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::PathNotDirectory(path) => {
                write!(f, "not a directory: {}", path.display())
            }
            DispatchError::NoWorkersAvailable => write!(f, "no live workers available"),
            DispatchError::Broker(e) => write!(f, "broker unavailable: {}", e),
        }
    }
}

impl std::error::Error for DispatchError {}

/// Outcome of one indexing trigger.
#[derive(Debug, Default)]
pub struct IndexingReport {
    pub files_found: usize,
    pub successful_dispatches: Vec<String>,
    /// `(file name, reason)` per file that was skipped or failed.
    pub failed_files: Vec<(String, String)>,
}

/// Routes document tasks to the least-loaded live worker.
pub struct Dispatcher {
    broker: BrokerClient,
    pending: Arc<DashSet<String>>,
}

impl Dispatcher {
    pub fn new(broker: BrokerClient, pending: Arc<DashSet<String>>) -> Self {
        Self { broker, pending }
    }

    /// Picks the live worker with the lowest composite load score
    /// `queue_length * 10 + cpu * 0.5 + ram * 0.3`. Ties break toward the
    /// lexicographically smallest worker id.
    pub async fn select_worker(&self) -> Result<String, DispatchError> {
        let worker_ids = self
            .broker
            .live_worker_ids()
            .await
            .map_err(DispatchError::Broker)?;

        let mut best: Option<(f64, String)> = None;
        for worker_id in worker_ids {
            // The heartbeat can expire between the key scan and this read;
            // such a worker is simply not a candidate.
            let Some(heartbeat) = self
                .broker
                .read_heartbeat(&worker_id)
                .await
                .map_err(DispatchError::Broker)?
            else {
                continue;
            };
            let queue_length = self
                .broker
                .queue_length(&worker_id)
                .await
                .map_err(DispatchError::Broker)?;

            let score = queue_length as f64 * QUEUE_WEIGHT
                + heartbeat.cpu_percent as f64 * CPU_WEIGHT
                + heartbeat.ram_percent as f64 * RAM_WEIGHT;
            tracing::debug!(
                "Candidate {}: queue={}, cpu={:.2}, ram={:.2}, score={:.2}",
                worker_id,
                queue_length,
                heartbeat.cpu_percent,
                heartbeat.ram_percent,
                score
            );

            // Candidates arrive in id order, so strict less-than keeps the
            // smallest id on a tie.
            let better = best
                .as_ref()
                .map_or(true, |(best_score, _)| score < *best_score);
            if better {
                best = Some((score, worker_id));
            }
        }

        match best {
            Some((score, worker_id)) => {
                tracing::debug!("Selected worker {} (score {:.2})", worker_id, score);
                Ok(worker_id)
            }
            None => Err(DispatchError::NoWorkersAvailable),
        }
    }

    /// Selects a worker and pushes the task onto its queue. Selection is per
    /// task; there is no sticky assignment.
    pub async fn dispatch(&self, task: &DocumentTask) -> Result<String, DispatchError> {
        let worker_id = self.select_worker().await?;
        let queue_length = self
            .broker
            .enqueue_task(&worker_id, task)
            .await
            .map_err(DispatchError::Broker)?;
        tracing::info!(
            "Dispatched doc {} to {} (queue length now {})",
            task.doc_id,
            worker_id,
            queue_length
        );
        Ok(worker_id)
    }

    /// The indexing trigger: scans `dir` (non-recursively) for `.txt` files
    /// and dispatches one task per non-empty file. Files are processed
    /// sequentially; a failure on one file never aborts the rest.
    ///
    /// Each dispatched doc id enters the pending set and stays there until
    /// its partial result is merged. When the push itself fails the entry is
    /// rolled back immediately.
    pub async fn scan_and_dispatch(&self, dir: &Path) -> Result<IndexingReport, DispatchError> {
        if !dir.is_dir() {
            return Err(DispatchError::PathNotDirectory(dir.to_path_buf()));
        }

        // Probe liveness up front so an empty cluster fails the whole
        // operation instead of producing a report full of failures.
        let live = self
            .broker
            .live_worker_ids()
            .await
            .map_err(DispatchError::Broker)?;
        if live.is_empty() {
            return Err(DispatchError::NoWorkersAvailable);
        }

        let entries = std::fs::read_dir(dir)
            .map_err(|_| DispatchError::PathNotDirectory(dir.to_path_buf()))?;

        // Sort by file name so reports (and tests) are deterministic.
        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
            .map(|entry| entry.path())
            .filter(|path| path.extension().and_then(|ext| ext.to_str()) == Some("txt"))
            .collect();
        files.sort();

        let mut report = IndexingReport {
            files_found: files.len(),
            ..Default::default()
        };

        for path in files {
            let doc_id = match path.file_name() {
                Some(name) => name.to_string_lossy().into_owned(),
                None => continue,
            };

            let content = match std::fs::read_to_string(&path) {
                Ok(content) => content,
                Err(e) => {
                    tracing::error!("Error reading local file {}: {}", doc_id, e);
                    report
                        .failed_files
                        .push((doc_id, format!("Error reading file: {}", e)));
                    continue;
                }
            };

            if content.trim().is_empty() {
                tracing::warn!("Document {} is empty or whitespace only; skipping", doc_id);
                report.failed_files.push((
                    doc_id,
                    "Skipped: file is empty or whitespace only".to_string(),
                ));
                continue;
            }

            self.pending.insert(doc_id.clone());
            let task = DocumentTask {
                doc_id: doc_id.clone(),
                content,
            };
            match self.dispatch(&task).await {
                Ok(_) => report.successful_dispatches.push(doc_id),
                Err(e) => {
                    self.pending.remove(&doc_id);
                    tracing::warn!("Failed to dispatch task for {}: {}", doc_id, e);
                    report
                        .failed_files
                        .push((doc_id, format!("Dispatch failed: {}", e)));
                }
            }
        }

        Ok(report)
    }
}
