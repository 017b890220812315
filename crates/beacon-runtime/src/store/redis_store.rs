use std::time::Duration;

use futures_util::StreamExt;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, RedisResult};
use tokio::sync::Mutex;

use beacon_core::config::StoreConfig;
use beacon_core::{BeaconError, Result};

use super::{ChannelMessage, CoordinationStore, MessageStream, StoreFuture};

/// Redis-backed coordination store.
///
/// Command traffic shares one multiplexed connection that is opened lazily
/// and dropped after an I/O failure, so the next call reconnects. Each
/// subscription gets its own dedicated pub/sub connection.
pub struct RedisStore {
    client: redis::Client,
    conn: Mutex<Option<MultiplexedConnection>>,
}

impl RedisStore {
    /// Create a store for `url`. No connection is made until first use.
    pub fn open(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(store_error)?;
        Ok(Self::with_client(client))
    }

    /// Create a store from connection settings.
    ///
    /// An explicit `url` wins. Otherwise host, port and password are handed
    /// to the client as structured fields, so passwords containing URL
    /// delimiters such as `@`, `/` or `#` are used verbatim.
    pub fn from_config(config: &StoreConfig) -> Result<Self> {
        if let Some(url) = &config.url {
            return Self::open(url);
        }

        let info = redis::ConnectionInfo {
            addr: redis::ConnectionAddr::Tcp(config.host.clone(), config.port),
            redis: redis::RedisConnectionInfo {
                password: config.auth_password().map(str::to_string),
                ..Default::default()
            },
        };
        let client = redis::Client::open(info).map_err(store_error)?;
        Ok(Self::with_client(client))
    }

    fn with_client(client: redis::Client) -> Self {
        Self {
            client,
            conn: Mutex::new(None),
        }
    }

    async fn connection(&self) -> Result<MultiplexedConnection> {
        let mut guard = self.conn.lock().await;
        if let Some(conn) = guard.as_ref() {
            return Ok(conn.clone());
        }

        let conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(store_error)?;
        tracing::debug!("Opened store connection");
        *guard = Some(conn.clone());
        Ok(conn)
    }

    /// Convert a command result, forgetting the connection if it broke.
    async fn check<T>(&self, result: RedisResult<T>) -> Result<T> {
        match result {
            Ok(value) => Ok(value),
            Err(e) => {
                if e.is_io_error() || e.is_connection_dropped() || e.is_connection_refusal() {
                    *self.conn.lock().await = None;
                }
                Err(store_error(e))
            }
        }
    }
}

impl CoordinationStore for RedisStore {
    fn set_with_expiry<'a>(
        &'a self,
        key: &'a str,
        value: &'a str,
        ttl: Duration,
    ) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let mut conn = self.connection().await?;
            let seconds = ttl.as_secs().max(1);
            let result = conn.set_ex::<_, _, ()>(key, value, seconds).await;
            self.check(result).await
        })
    }

    fn time_to_live<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<Duration>> {
        Box::pin(async move {
            let mut conn = self.connection().await?;
            // PTTL: -2 missing, -1 no expiry, otherwise remaining milliseconds.
            let result = conn.pttl::<_, i64>(key).await;
            let millis = self.check(result).await?;
            Ok((millis > 0).then(|| Duration::from_millis(millis as u64)))
        })
    }

    fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let mut conn = self.connection().await?;
            let result = conn.del::<_, ()>(key).await;
            self.check(result).await
        })
    }

    fn add_to_set<'a>(
        &'a self,
        set_key: &'a str,
        member: &'a str,
        score: f64,
    ) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let mut conn = self.connection().await?;
            let result = conn.zadd::<_, _, _, ()>(set_key, member, score).await;
            self.check(result).await
        })
    }

    fn remove_from_set<'a>(&'a self, set_key: &'a str, member: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let mut conn = self.connection().await?;
            let result = conn.zrem::<_, _, ()>(set_key, member).await;
            self.check(result).await
        })
    }

    fn list_set<'a>(&'a self, set_key: &'a str) -> StoreFuture<'a, Vec<String>> {
        Box::pin(async move {
            let mut conn = self.connection().await?;
            let result = conn.zrevrange::<_, Vec<String>>(set_key, 0, -1).await;
            self.check(result).await
        })
    }

    fn set_attribute<'a>(
        &'a self,
        bag_key: &'a str,
        field: &'a str,
        value: &'a str,
    ) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let mut conn = self.connection().await?;
            let result = conn.hset::<_, _, _, ()>(bag_key, field, value).await;
            self.check(result).await
        })
    }

    fn set_attributes<'a>(
        &'a self,
        bag_key: &'a str,
        fields: &'a [(&'a str, String)],
    ) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let mut conn = self.connection().await?;
            let result = conn.hset_multiple::<_, _, _, ()>(bag_key, fields).await;
            self.check(result).await
        })
    }

    fn get_attribute<'a>(
        &'a self,
        bag_key: &'a str,
        field: &'a str,
    ) -> StoreFuture<'a, Option<String>> {
        Box::pin(async move {
            let mut conn = self.connection().await?;
            let result = conn.hget::<_, _, Option<String>>(bag_key, field).await;
            self.check(result).await
        })
    }

    fn publish<'a>(&'a self, channel: &'a str, message: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let mut conn = self.connection().await?;
            let result = conn.publish::<_, _, ()>(channel, message).await;
            self.check(result).await
        })
    }

    fn subscribe<'a>(&'a self, channels: &'a [&'a str]) -> StoreFuture<'a, MessageStream> {
        Box::pin(async move {
            let mut pubsub = self.client.get_async_pubsub().await.map_err(store_error)?;
            for channel in channels {
                pubsub.subscribe(*channel).await.map_err(store_error)?;
            }
            tracing::debug!(?channels, "Subscribed to store channels");

            let stream = pubsub.into_on_message().filter_map(|msg| async move {
                match msg.get_payload::<String>() {
                    Ok(payload) => Some(ChannelMessage::new(msg.get_channel_name(), payload)),
                    Err(e) => {
                        tracing::warn!("Failed to decode pub/sub payload: {}", e);
                        None
                    }
                }
            });

            Ok(Box::pin(stream) as MessageStream)
        })
    }
}

fn store_error(e: redis::RedisError) -> BeaconError {
    BeaconError::Store(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_accepts_redis_url() {
        assert!(RedisStore::open("redis://127.0.0.1:6379/").is_ok());
    }

    #[test]
    fn test_open_rejects_garbage_url() {
        let err = RedisStore::open("not a url").err().unwrap();
        assert!(err.is_store());
    }

    #[test]
    fn test_from_config_accepts_password_with_url_delimiters() {
        let config = StoreConfig {
            host: "cache".to_string(),
            port: 6380,
            password: Some("p@ss/w#rd".to_string()),
            url: None,
        };
        let store = RedisStore::from_config(&config).unwrap();
        let info = store.client.get_connection_info();
        assert_eq!(info.redis.password.as_deref(), Some("p@ss/w#rd"));
        assert!(
            matches!(&info.addr, redis::ConnectionAddr::Tcp(host, 6380) if host == "cache")
        );
    }

    #[test]
    fn test_from_config_prefers_explicit_url() {
        let config = StoreConfig {
            host: "ignored".to_string(),
            url: Some("redis://other:1234/2".to_string()),
            ..Default::default()
        };
        let store = RedisStore::from_config(&config).unwrap();
        let info = store.client.get_connection_info();
        assert_eq!(info.redis.db, 2);
        assert!(
            matches!(&info.addr, redis::ConnectionAddr::Tcp(host, 1234) if host == "other")
        );
    }
}
