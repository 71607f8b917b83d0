//! Polling subscriptions to contract events.
//!
//! One poller runs per (address, event) pair. It starts at the chain head seen
//! when the subscription is made, so earlier events are never delivered.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

use super::{
    Address, H256,
    abi::Event,
    rpc::{Log, RpcClient},
};
use crate::pkg::internal::failure::Outcome;

#[async_trait::async_trait]
pub trait LogSource: Send + Sync + 'static {
    async fn head(&self) -> Outcome<u64>;

    async fn logs(&self, address: Address, topic: H256, from: u64, to: u64) -> Outcome<Vec<Log>>;
}

#[async_trait::async_trait]
impl LogSource for RpcClient {
    async fn head(&self) -> Outcome<u64> {
        self.block_number().await
    }

    async fn logs(&self, address: Address, topic: H256, from: u64, to: u64) -> Outcome<Vec<Log>> {
        self.get_logs(address, topic, from, to).await
    }
}

type Key = (Address, &'static str);
type Registry = Arc<Mutex<HashMap<Key, Weak<Poller>>>>;

struct Poller {
    key: Key,
    registry: Registry,
    task: JoinHandle<()>,
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.task.abort();
        let mut active = self.registry.lock();
        // a replacement may already be registered under the same key
        if active.get(&self.key).is_some_and(|w| w.strong_count() == 0) {
            active.remove(&self.key);
        }
        tracing::debug!("unsubscribed from {} at {}", self.key.1, self.key.0);
    }
}

/// Keeps a poller alive. The poller stops once every clone is dropped.
#[derive(Clone)]
pub struct Subscription {
    poller: Arc<Poller>,
}

impl Subscription {
    pub fn address(&self) -> Address {
        self.poller.key.0
    }

    pub fn event_name(&self) -> &'static str {
        self.poller.key.1
    }
}

pub struct EventListener {
    source: Arc<dyn LogSource>,
    interval: Duration,
    registry: Registry,
}

impl EventListener {
    pub fn new(source: Arc<dyn LogSource>, interval: Duration) -> Self {
        EventListener {
            source,
            interval,
            registry: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Number of pollers currently running.
    pub fn active(&self) -> usize {
        self.registry
            .lock()
            .values()
            .filter(|w| w.strong_count() > 0)
            .count()
    }

    /// Registers `callback` for every batch of `event` logs emitted by `address`.
    ///
    /// While a subscription for the same pair is alive this returns a handle to
    /// it and `callback` is discarded.
    pub fn subscribe<F>(&self, address: Address, event: &'static Event, callback: F) -> Subscription
    where
        F: Fn(Vec<Log>) + Send + Sync + 'static,
    {
        let key = (address, event.name);
        let mut active = self.registry.lock();
        if let Some(poller) = active.get(&key).and_then(Weak::upgrade) {
            tracing::debug!("already subscribed to {} at {}", event.name, address);
            return Subscription { poller };
        }
        let task = tokio::spawn(poll(
            self.source.clone(),
            address,
            event,
            self.interval,
            callback,
        ));
        let poller = Arc::new(Poller {
            key,
            registry: self.registry.clone(),
            task,
        });
        active.insert(key, Arc::downgrade(&poller));
        tracing::info!("subscribed to {} at {}", event.name, address);
        Subscription { poller }
    }
}

async fn poll<F>(
    source: Arc<dyn LogSource>,
    address: Address,
    event: &'static Event,
    interval: Duration,
    callback: F,
) where
    F: Fn(Vec<Log>) + Send + Sync + 'static,
{
    let topic = event.topic();
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut cursor: Option<u64> = None;
    loop {
        ticker.tick().await;
        let head = match source.head().await {
            Ok(head) => head,
            Err(e) => {
                tracing::warn!("{} poll could not read head: {}", event.name, e);
                continue;
            }
        };
        let from = match cursor {
            Some(from) => from,
            None => {
                cursor = Some(head + 1);
                continue;
            }
        };
        if head < from {
            continue;
        }
        match source.logs(address, topic, from, head).await {
            Ok(logs) => {
                cursor = Some(head + 1);
                if !logs.is_empty() {
                    tracing::debug!("{} {} log(s) in blocks {}..={}", logs.len(), event.name, from, head);
                    callback(logs);
                }
            }
            Err(e) => tracing::warn!("{} poll failed for {}..={}: {}", event.name, from, head, e),
        }
    }
}

/// Callback that only records each decoded occurrence of `event`.
pub fn log_occurrences(event: &'static Event) -> impl Fn(Vec<Log>) + Send + Sync + 'static {
    move |logs| {
        for log in logs {
            match event.decode(&log.topics, &log.data.0) {
                Ok(tokens) => tracing::info!(
                    "{} observed in {:?}: {:?}",
                    event.name,
                    log.transaction_hash,
                    tokens
                ),
                Err(e) => tracing::warn!("undecodable {} log: {}", event.name, e),
            }
        }
    }
}
