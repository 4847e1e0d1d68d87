use crate::broker::protocol::WorkerHeartbeat;
use crate::broker::BrokerClient;
use crate::config::{HEARTBEAT_INTERVAL, HEARTBEAT_TTL};
use anyhow::{anyhow, Result};
use sysinfo::{Pid, System};
use tokio::sync::watch;

/// The liveness half of a worker process.
///
/// Every heartbeat interval it samples process CPU and system RAM and keeps
/// the `worker_status:{id}` key alive. The value is only rewritten when the
/// sample changed; the TTL is refreshed on every beat regardless.
pub struct HeartbeatReporter {
    broker: BrokerClient,
    worker_id: String,
    sys: System,
    pid: Pid,
    last_reported: Option<WorkerHeartbeat>,
}

impl HeartbeatReporter {
    pub fn new(broker: BrokerClient, worker_id: String) -> Result<Self> {
        let pid = sysinfo::get_current_pid()
            .map_err(|e| anyhow!("cannot determine own pid: {}", e))?;
        Ok(Self {
            broker,
            worker_id,
            sys: System::new(),
            pid,
            last_reported: None,
        })
    }

    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!("Heartbeat loop started for {}", self.worker_id);
        let mut ticker = tokio::time::interval(HEARTBEAT_INTERVAL);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.beat().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Heartbeat loop stopped for {}", self.worker_id);
    }

    /// CPU percent is for this process; the sampler needs a previous refresh
    /// to compute a delta, so the first beat reports 0. RAM percent is
    /// system-wide used/total.
    fn sample(&mut self) -> WorkerHeartbeat {
        self.sys.refresh_memory();
        self.sys.refresh_process(self.pid);

        let cpu_percent = self
            .sys
            .process(self.pid)
            .map(|process| process.cpu_usage())
            .unwrap_or(0.0);

        let total = self.sys.total_memory();
        let ram_percent = if total > 0 {
            (self.sys.used_memory() as f32 / total as f32) * 100.0
        } else {
            0.0
        };

        WorkerHeartbeat {
            cpu_percent,
            ram_percent,
        }
    }

    async fn beat(&mut self) {
        let sample = self.sample();
        let unchanged = self.last_reported.as_ref().is_some_and(|prev| {
            (prev.cpu_percent - sample.cpu_percent).abs() <= 0.01
                && (prev.ram_percent - sample.ram_percent).abs() <= 0.01
        });

        if unchanged {
            match self
                .broker
                .refresh_heartbeat(&self.worker_id, HEARTBEAT_TTL)
                .await
            {
                Ok(true) => return,
                Ok(false) => {
                    // Key expired under us (e.g. a long broker outage);
                    // fall through and rewrite it.
                }
                Err(e) => {
                    tracing::warn!("Could not refresh heartbeat TTL for {}: {:#}", self.worker_id, e);
                    return;
                }
            }
        }

        match self
            .broker
            .write_heartbeat(&self.worker_id, &sample, HEARTBEAT_TTL)
            .await
        {
            Ok(()) => {
                tracing::debug!(
                    "Reported status for {}: CPU {:.2}%, RAM {:.2}%",
                    self.worker_id,
                    sample.cpu_percent,
                    sample.ram_percent
                );
                self.last_reported = Some(sample);
            }
            Err(e) => {
                tracing::warn!("Could not report status for {}: {:#}", self.worker_id, e);
            }
        }
    }
}
