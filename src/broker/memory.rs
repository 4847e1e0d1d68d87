use super::client::Broker;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

const POP_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Single-process broker with the same observable semantics as the Redis
/// implementation: FIFO lists, fan-out pub/sub, and keys that really expire.
/// Every distributed scenario in the test suite runs against this.
pub struct MemoryBroker {
    queues: Mutex<HashMap<String, VecDeque<String>>>,
    keys: Mutex<HashMap<String, KeyEntry>>,
    subscribers: Mutex<HashMap<String, Vec<mpsc::Sender<String>>>>,
}

struct KeyEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl KeyEntry {
    fn expired(&self) -> bool {
        self.expires_at.is_some_and(|deadline| Instant::now() >= deadline)
    }
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self {
            queues: Mutex::new(HashMap::new()),
            keys: Mutex::new(HashMap::new()),
            subscribers: Mutex::new(HashMap::new()),
        }
    }

    fn pop_front(&self, key: &str) -> Option<String> {
        let mut queues = self.queues.lock().expect("queue lock");
        queues.get_mut(key).and_then(VecDeque::pop_front)
    }
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn push_list(&self, key: &str, payload: &str) -> Result<u64> {
        let mut queues = self.queues.lock().expect("queue lock");
        let queue = queues.entry(key.to_string()).or_default();
        queue.push_back(payload.to_string());
        Ok(queue.len() as u64)
    }

    async fn blocking_pop(&self, key: &str, timeout: Duration) -> Result<Option<String>> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(payload) = self.pop_front(key) {
                return Ok(Some(payload));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(POP_POLL_INTERVAL).await;
        }
    }

    async fn list_len(&self, key: &str) -> Result<u64> {
        let queues = self.queues.lock().expect("queue lock");
        Ok(queues.get(key).map_or(0, |queue| queue.len() as u64))
    }

    async fn publish(&self, channel: &str, payload: &str) -> Result<()> {
        let senders: Vec<mpsc::Sender<String>> = {
            let mut subscribers = self.subscribers.lock().expect("subscriber lock");
            if let Some(list) = subscribers.get_mut(channel) {
                list.retain(|tx| !tx.is_closed());
                list.clone()
            } else {
                Vec::new()
            }
        };

        for tx in senders {
            let _ = tx.send(payload.to_string()).await;
        }
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<mpsc::Receiver<String>> {
        let (tx, rx) = mpsc::channel(256);
        let mut subscribers = self.subscribers.lock().expect("subscriber lock");
        subscribers.entry(channel.to_string()).or_default().push(tx);
        Ok(rx)
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut keys = self.keys.lock().expect("key lock");
        keys.insert(
            key.to_string(),
            KeyEntry {
                value: value.to_string(),
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        let mut keys = self.keys.lock().expect("key lock");
        match keys.get_mut(key) {
            Some(entry) if !entry.expired() => {
                entry.expires_at = Some(Instant::now() + ttl);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut keys = self.keys.lock().expect("key lock");
        match keys.get(key) {
            Some(entry) if entry.expired() => {
                keys.remove(key);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.value.clone())),
            None => Ok(None),
        }
    }

    async fn keys_matching(&self, pattern: &str) -> Result<Vec<String>> {
        let prefix = pattern.strip_suffix('*').unwrap_or(pattern);
        let mut keys = self.keys.lock().expect("key lock");
        keys.retain(|_, entry| !entry.expired());
        Ok(keys
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn ttl(&self, key: &str) -> Result<Option<i64>> {
        let keys = self.keys.lock().expect("key lock");
        match keys.get(key) {
            Some(entry) if !entry.expired() => Ok(entry.expires_at.map(|deadline| {
                deadline
                    .saturating_duration_since(Instant::now())
                    .as_secs_f64()
                    .ceil() as i64
            })),
            _ => Ok(None),
        }
    }
}
