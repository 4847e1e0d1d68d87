//! Process Configuration
//!
//! Environment-driven configuration for the two process roles. Defaults match
//! a local single-machine deployment; every knob can be overridden through
//! environment variables.

use crate::normalizer::Language;
use std::path::PathBuf;
use std::time::Duration;

/// How often a worker samples and reports its load.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(2);

/// Heartbeat key TTL. Three missed beats and the worker disappears from the
/// cluster view.
pub const HEARTBEAT_TTL: Duration = Duration::from_secs(6);

/// Blocking-dequeue timeout for the worker task loop. Kept short so shutdown
/// stays responsive.
pub const DEQUEUE_TIMEOUT: Duration = Duration::from_secs(1);

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn redis_url_from_env() -> String {
    let host = env_or("REDIS_HOST", "localhost");
    let port = env_or("REDIS_PORT", "6379");
    format!("redis://{}:{}/", host, port)
}

fn language_from_env(var: &str) -> Language {
    let name = env_or(var, "english");
    match Language::parse(&name) {
        Some(language) => language,
        None => {
            tracing::warn!(
                "Unsupported language '{}' in {}; falling back to english",
                name,
                var
            );
            Language::English
        }
    }
}

/// Installs the global tracing subscriber. `LOG_LEVEL` takes standard
/// severity names (`error`, `warn`, `info`, `debug`, `trace`).
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_env("LOG_LEVEL")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub redis_url: String,
    pub language: Language,
    /// Default directory scanned by the indexing trigger.
    pub uploads_path: PathBuf,
    /// Snapshot path for index save/load.
    pub index_path: PathBuf,
    pub port: u16,
}

impl CoordinatorConfig {
    pub fn from_env() -> Self {
        Self {
            redis_url: redis_url_from_env(),
            language: language_from_env("COORDINATOR_PROCESSING_LANGUAGE"),
            uploads_path: PathBuf::from(env_or("LOCAL_UPLOADS_PATH", "./uploads")),
            index_path: PathBuf::from(env_or(
                "INDEX_FILE_STORAGE_PATH",
                "./data/index.json.gz",
            )),
            port: env_or("COORDINATOR_PORT", "8000").parse().unwrap_or(8000),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub redis_url: String,
    pub language: Language,
    /// Stable identity for the process lifetime: `{prefix}-{hostname}-{pid}`.
    pub worker_id: String,
}

impl WorkerConfig {
    pub fn from_env() -> Self {
        let prefix = env_or("WORKER_ID_PREFIX", "worker");
        let hostname =
            sysinfo::System::host_name().unwrap_or_else(|| "local-host".to_string());
        let worker_id = format!("{}-{}-{}", prefix, hostname, std::process::id());

        Self {
            redis_url: redis_url_from_env(),
            language: language_from_env("PROCESSING_LANGUAGE"),
            worker_id,
        }
    }
}
