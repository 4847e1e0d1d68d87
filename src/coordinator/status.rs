use super::types::WorkerStatusEntry;
use crate::broker::BrokerClient;
use anyhow::Result;

/// Composes the cluster status view: every live worker joined with its
/// heartbeat sample, remaining heartbeat TTL, and queue depth, in
/// lexicographic worker-id order. Workers whose record disappears or fails
/// to parse mid-scan are silently omitted.
pub async fn list_workers(broker: &BrokerClient) -> Result<Vec<WorkerStatusEntry>> {
    let worker_ids = broker.live_worker_ids().await?;

    let mut workers = Vec::with_capacity(worker_ids.len());
    for worker_id in worker_ids {
        let Some(heartbeat) = broker.read_heartbeat(&worker_id).await? else {
            continue;
        };
        let status_ttl_seconds = broker.heartbeat_ttl(&worker_id).await?;
        let queue_length = broker.queue_length(&worker_id).await?;

        workers.push(WorkerStatusEntry {
            worker_id,
            cpu_percent: heartbeat.cpu_percent,
            ram_percent: heartbeat.ram_percent,
            status_ttl_seconds,
            queue_length,
        });
    }

    Ok(workers)
}
