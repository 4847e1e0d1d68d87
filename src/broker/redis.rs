use super::client::{Broker, BrokerClient};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use deadpool_redis::redis::{self, AsyncCommands};
use deadpool_redis::{Config, Pool, Runtime};
use futures_util::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Production broker backed by a Redis-compatible store.
///
/// Commands run on pooled connections; each subscription gets a dedicated
/// pub/sub connection whose messages are forwarded into an mpsc channel.
pub struct RedisBroker {
    pool: Pool,
    client: redis::Client,
}

impl RedisBroker {
    pub fn connect(url: &str) -> Result<Self> {
        let pool = Config::from_url(url)
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| anyhow!("failed to create redis pool: {}", e))?;
        let client = redis::Client::open(url)?;
        Ok(Self { pool, client })
    }

    async fn conn(&self) -> Result<deadpool_redis::Connection> {
        self.pool
            .get()
            .await
            .map_err(|e| anyhow!("broker connection unavailable: {}", e))
    }
}

#[async_trait]
impl Broker for RedisBroker {
    async fn ping(&self) -> Result<()> {
        let mut conn = self.conn().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    async fn push_list(&self, key: &str, payload: &str) -> Result<u64> {
        let mut conn = self.conn().await?;
        let len: u64 = conn.rpush(key, payload).await?;
        Ok(len)
    }

    async fn blocking_pop(&self, key: &str, timeout: Duration) -> Result<Option<String>> {
        let mut conn = self.conn().await?;
        let reply: Option<(String, String)> = conn.blpop(key, timeout.as_secs_f64()).await?;
        Ok(reply.map(|(_queue, payload)| payload))
    }

    async fn list_len(&self, key: &str) -> Result<u64> {
        let mut conn = self.conn().await?;
        let len: u64 = conn.llen(key).await?;
        Ok(len)
    }

    async fn publish(&self, channel: &str, payload: &str) -> Result<()> {
        let mut conn = self.conn().await?;
        let _subscribers: i64 = conn.publish(channel, payload).await?;
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<mpsc::Receiver<String>> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(channel).await?;

        let (tx, rx) = mpsc::channel(256);
        let channel = channel.to_string();
        tokio::spawn(async move {
            let mut stream = pubsub.on_message();
            while let Some(msg) = stream.next().await {
                let payload: String = match msg.get_payload() {
                    Ok(payload) => payload,
                    Err(e) => {
                        tracing::warn!("Non-string payload on '{}': {}", channel, e);
                        continue;
                    }
                };
                if tx.send(payload).await.is_err() {
                    // Receiver dropped; tear the subscription down.
                    break;
                }
            }
            tracing::debug!("Subscription to '{}' closed", channel);
        });

        Ok(rx)
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.conn().await?;
        let _: () = conn.set_ex(key, value, ttl.as_secs()).await?;
        Ok(())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        let mut conn = self.conn().await?;
        let refreshed: bool = conn.expire(key, ttl.as_secs() as i64).await?;
        Ok(refreshed)
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn().await?;
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn keys_matching(&self, pattern: &str) -> Result<Vec<String>> {
        let mut conn = self.conn().await?;
        let keys: Vec<String> = conn.keys(pattern).await?;
        Ok(keys)
    }

    async fn ttl(&self, key: &str) -> Result<Option<i64>> {
        let mut conn = self.conn().await?;
        // Redis returns -2 for a missing key and -1 for a key with no expiry.
        let remaining: i64 = conn.ttl(key).await?;
        Ok(if remaining >= 0 { Some(remaining) } else { None })
    }
}

/// Connects to the broker and pings it until it answers, with capped
/// exponential backoff. Used by both binaries at boot; neither serves
/// anything until the broker is reachable.
pub async fn connect_with_backoff(url: &str) -> Result<BrokerClient> {
    let broker = BrokerClient::new(Arc::new(RedisBroker::connect(url)?));
    let mut delay = Duration::from_millis(150);

    loop {
        match broker.ping().await {
            Ok(()) => {
                tracing::info!("Connected to broker at {}", url);
                return Ok(broker);
            }
            Err(e) => {
                tracing::warn!("Broker not reachable: {:#}; retrying in {:?}", e, delay);
                let jitter = Duration::from_millis(rand::random::<u64>() % 50);
                tokio::time::sleep(delay + jitter).await;
                delay = (delay * 2).min(Duration::from_secs(5));
            }
        }
    }
}
