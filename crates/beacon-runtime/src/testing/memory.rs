use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures_util::stream;
use tokio::sync::broadcast;

use beacon_core::protocol::Channel;
use beacon_core::{BeaconError, Clock, Result, SystemClock};

use crate::store::{ChannelMessage, CoordinationStore, MessageStream, StoreFuture};

const BUS_CAPACITY: usize = 1024;

/// In-process coordination store.
///
/// Keeps values with expiry, ordered sets, attribute bags and a pub/sub bus
/// in memory. Expiry is evaluated against the supplied [`Clock`]. Every
/// published message is also recorded so tests can assert on traffic, and
/// deletes and publishes are kept in one ordered history.
pub struct MemoryStore {
    clock: Arc<dyn Clock>,
    data: Mutex<Data>,
    bus: Mutex<broadcast::Sender<ChannelMessage>>,
    available: AtomicBool,
}

#[derive(Default)]
struct Data {
    values: HashMap<String, Value>,
    sets: HashMap<String, HashMap<String, f64>>,
    bags: HashMap<String, HashMap<String, String>>,
    published: Vec<ChannelMessage>,
    history: Vec<String>,
}

struct Value {
    value: String,
    expires_at_ms: Option<i64>,
}

impl MemoryStore {
    /// Store driven by the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Store driven by an explicit clock.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        let (bus, _) = broadcast::channel(BUS_CAPACITY);
        Self {
            clock,
            data: Mutex::new(Data::default()),
            bus: Mutex::new(bus),
            available: AtomicBool::new(true),
        }
    }

    /// Make every subsequent operation fail (or succeed again).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// End every open subscription, as if the connection dropped.
    pub fn drop_subscriptions(&self) {
        let (bus, _) = broadcast::channel(BUS_CAPACITY);
        *lock(&self.bus) = bus;
    }

    /// Number of open subscriptions.
    pub fn subscriber_count(&self) -> usize {
        lock(&self.bus).receiver_count()
    }

    /// Payloads published on `channel`, oldest first.
    pub fn published(&self, channel: Channel) -> Vec<String> {
        lock(&self.data)
            .published
            .iter()
            .filter(|m| m.channel == channel.as_str())
            .map(|m| m.payload.clone())
            .collect()
    }

    /// Deletes and publishes in the order they happened, as
    /// `del <key>` and `pub <channel> <payload>`.
    pub fn history(&self) -> Vec<String> {
        lock(&self.data).history.clone()
    }

    /// Forget recorded publications.
    pub fn clear_published(&self) {
        lock(&self.data).published.clear();
    }

    /// Members of an ordered set, highest score first.
    pub fn set_members(&self, set_key: &str) -> Vec<String> {
        sorted_members(lock(&self.data).sets.get(set_key))
    }

    /// Unexpired plain value stored under `key`.
    pub fn value(&self, key: &str) -> Option<String> {
        let now = self.clock.now_millis();
        lock(&self.data)
            .values
            .get(key)
            .filter(|v| v.is_live(now))
            .map(|v| v.value.clone())
    }

    /// Whether `key` holds a value, set or bag.
    pub fn contains_key(&self, key: &str) -> bool {
        let now = self.clock.now_millis();
        let data = lock(&self.data);
        data.values.get(key).is_some_and(|v| v.is_live(now))
            || data.sets.contains_key(key)
            || data.bags.contains_key(key)
    }

    fn ensure_available(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(BeaconError::Store("store unavailable".to_string()))
        }
    }

    fn run<T>(&self, op: impl FnOnce(&mut Data, i64) -> T) -> Result<T> {
        self.ensure_available()?;
        let now = self.clock.now_millis();
        let mut data = lock(&self.data);
        Ok(op(&mut data, now))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Value {
    fn is_live(&self, now_ms: i64) -> bool {
        self.expires_at_ms.map_or(true, |at| at > now_ms)
    }
}

impl CoordinationStore for MemoryStore {
    fn set_with_expiry<'a>(
        &'a self,
        key: &'a str,
        value: &'a str,
        ttl: Duration,
    ) -> StoreFuture<'a, ()> {
        let result = self.run(|data, now| {
            data.values.insert(
                key.to_string(),
                Value {
                    value: value.to_string(),
                    expires_at_ms: Some(now + ttl.as_millis() as i64),
                },
            );
        });
        Box::pin(async move { result })
    }

    fn time_to_live<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<Duration>> {
        let result = self.run(|data, now| {
            data.values
                .get(key)
                .and_then(|v| v.expires_at_ms)
                .filter(|at| *at > now)
                .map(|at| Duration::from_millis((at - now) as u64))
        });
        Box::pin(async move { result })
    }

    fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()> {
        let result = self.run(|data, _| {
            data.history.push(format!("del {key}"));
            data.values.remove(key);
            data.sets.remove(key);
            data.bags.remove(key);
        });
        Box::pin(async move { result })
    }

    fn add_to_set<'a>(
        &'a self,
        set_key: &'a str,
        member: &'a str,
        score: f64,
    ) -> StoreFuture<'a, ()> {
        let result = self.run(|data, _| {
            data.sets
                .entry(set_key.to_string())
                .or_default()
                .insert(member.to_string(), score);
        });
        Box::pin(async move { result })
    }

    fn remove_from_set<'a>(&'a self, set_key: &'a str, member: &'a str) -> StoreFuture<'a, ()> {
        let result = self.run(|data, _| {
            if let Some(set) = data.sets.get_mut(set_key) {
                set.remove(member);
                if set.is_empty() {
                    data.sets.remove(set_key);
                }
            }
        });
        Box::pin(async move { result })
    }

    fn list_set<'a>(&'a self, set_key: &'a str) -> StoreFuture<'a, Vec<String>> {
        let result = self.run(|data, _| sorted_members(data.sets.get(set_key)));
        Box::pin(async move { result })
    }

    fn set_attribute<'a>(
        &'a self,
        bag_key: &'a str,
        field: &'a str,
        value: &'a str,
    ) -> StoreFuture<'a, ()> {
        let result = self.run(|data, _| {
            data.bags
                .entry(bag_key.to_string())
                .or_default()
                .insert(field.to_string(), value.to_string());
        });
        Box::pin(async move { result })
    }

    fn get_attribute<'a>(
        &'a self,
        bag_key: &'a str,
        field: &'a str,
    ) -> StoreFuture<'a, Option<String>> {
        let result = self.run(|data, _| {
            data.bags
                .get(bag_key)
                .and_then(|bag| bag.get(field))
                .cloned()
        });
        Box::pin(async move { result })
    }

    fn publish<'a>(&'a self, channel: &'a str, message: &'a str) -> StoreFuture<'a, ()> {
        let result = self.run(|data, _| {
            let msg = ChannelMessage::new(channel, message);
            data.history.push(format!("pub {channel} {message}"));
            data.published.push(msg.clone());
            msg
        });
        let result = result.map(|msg| {
            // No subscribers is not an error for pub/sub.
            let _ = lock(&self.bus).send(msg);
        });
        Box::pin(async move { result })
    }

    fn subscribe<'a>(&'a self, channels: &'a [&'a str]) -> StoreFuture<'a, MessageStream> {
        let result = self.ensure_available().map(|_| {
            let rx = lock(&self.bus).subscribe();
            let channels: Vec<String> = channels.iter().map(|c| c.to_string()).collect();
            let stream = stream::unfold((rx, channels), |(mut rx, channels)| async move {
                loop {
                    match rx.recv().await {
                        Ok(msg) if channels.contains(&msg.channel) => {
                            return Some((msg, (rx, channels)));
                        }
                        Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(broadcast::error::RecvError::Closed) => return None,
                    }
                }
            });
            Box::pin(stream) as MessageStream
        });
        Box::pin(async move { result })
    }
}

fn sorted_members(set: Option<&HashMap<String, f64>>) -> Vec<String> {
    let mut members: Vec<(&String, f64)> = set
        .map(|s| s.iter().map(|(m, score)| (m, *score)).collect())
        .unwrap_or_default();
    members.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| b.0.cmp(a.0)));
    members.into_iter().map(|(m, _)| m.clone()).collect()
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
