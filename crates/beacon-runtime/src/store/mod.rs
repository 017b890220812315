//! The coordination store contract.
//!
//! Nodes never talk to each other directly; every interaction goes through
//! an implementation of [`CoordinationStore`]. Production nodes use
//! [`RedisStore`]; tests use `testing::MemoryStore`.

mod redis_store;

pub use redis_store::RedisStore;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures_util::Stream;

use beacon_core::Result;

/// Boxed future returned by store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Stream of messages delivered by a subscription. Ends when the
/// underlying connection is lost.
pub type MessageStream = Pin<Box<dyn Stream<Item = ChannelMessage> + Send>>;

/// Store handle shared by every task of a node.
pub type SharedStore = Arc<dyn CoordinationStore>;

/// A message received on a subscribed channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelMessage {
    pub channel: String,
    pub payload: String,
}

impl ChannelMessage {
    pub fn new(channel: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            payload: payload.into(),
        }
    }
}

/// Primitive operations of the external key/value + pub/sub store.
///
/// Every operation may block on I/O or fail; callers treat failures as
/// transient and retry on their own schedule.
pub trait CoordinationStore: Send + Sync + 'static {
    /// Write `value` under `key`, expiring after `ttl`.
    fn set_with_expiry<'a>(
        &'a self,
        key: &'a str,
        value: &'a str,
        ttl: Duration,
    ) -> StoreFuture<'a, ()>;

    /// Remaining time to live of `key`. `None` when the key is missing or
    /// has expired.
    fn time_to_live<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<Duration>>;

    /// Delete a key of any kind (plain value or attribute bag).
    fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()>;

    /// Add `member` to an ordered set with the given ordering `score`.
    fn add_to_set<'a>(&'a self, set_key: &'a str, member: &'a str, score: f64)
        -> StoreFuture<'a, ()>;

    /// Remove `member` from an ordered set.
    fn remove_from_set<'a>(&'a self, set_key: &'a str, member: &'a str) -> StoreFuture<'a, ()>;

    /// All members of an ordered set, highest score first.
    fn list_set<'a>(&'a self, set_key: &'a str) -> StoreFuture<'a, Vec<String>>;

    /// Set a single field of an attribute bag.
    fn set_attribute<'a>(
        &'a self,
        bag_key: &'a str,
        field: &'a str,
        value: &'a str,
    ) -> StoreFuture<'a, ()>;

    /// Set several fields of an attribute bag.
    fn set_attributes<'a>(
        &'a self,
        bag_key: &'a str,
        fields: &'a [(&'a str, String)],
    ) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            for (field, value) in fields {
                self.set_attribute(bag_key, field, value).await?;
            }
            Ok(())
        })
    }

    /// Read a single field of an attribute bag.
    fn get_attribute<'a>(
        &'a self,
        bag_key: &'a str,
        field: &'a str,
    ) -> StoreFuture<'a, Option<String>>;

    /// Delete a whole attribute bag.
    fn delete_bag<'a>(&'a self, bag_key: &'a str) -> StoreFuture<'a, ()> {
        self.delete(bag_key)
    }

    /// Publish `message` on `channel`.
    fn publish<'a>(&'a self, channel: &'a str, message: &'a str) -> StoreFuture<'a, ()>;

    /// Open one subscription covering all `channels`.
    fn subscribe<'a>(&'a self, channels: &'a [&'a str]) -> StoreFuture<'a, MessageStream>;
}
