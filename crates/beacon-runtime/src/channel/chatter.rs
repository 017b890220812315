use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use beacon_core::cluster::NodeState;
use beacon_core::protocol::{chatter_line, Channel};
use beacon_core::{Clock, Result};

use crate::cluster::sleep_or_shutdown;
use crate::store::SharedStore;

/// Periodically announces this node on the broadcast channel.
pub struct ChatterPublisher {
    store: SharedStore,
    state: Arc<NodeState>,
    clock: Arc<dyn Clock>,
    interval: Duration,
    retry_backoff: Duration,
}

impl ChatterPublisher {
    pub fn new(
        store: SharedStore,
        state: Arc<NodeState>,
        clock: Arc<dyn Clock>,
        interval: Duration,
        retry_backoff: Duration,
    ) -> Self {
        Self {
            store,
            state,
            clock,
            interval,
            retry_backoff,
        }
    }

    /// Publish one chatter line and return it.
    pub async fn publish_once(&self) -> Result<String> {
        let at = DateTime::<Utc>::from_timestamp_millis(self.clock.now_millis())
            .unwrap_or_else(Utc::now);
        let line = chatter_line(self.state.name(), self.state.role(), self.state.pid(), at);
        self.store
            .publish(Channel::Broadcast.as_str(), &line)
            .await?;
        Ok(line)
    }

    /// Run the chatter loop until shutdown.
    pub async fn run(&self) {
        let mut shutdown_rx = self.state.shutdown_receiver();

        loop {
            if self.state.is_shutting_down() {
                break;
            }

            let pause = match self.publish_once().await {
                Ok(_) => self.interval,
                Err(e) => {
                    tracing::warn!(component = "chatter", "Failed to publish chatter: {}", e);
                    self.retry_backoff
                }
            };

            if sleep_or_shutdown(&mut shutdown_rx, pause).await {
                break;
            }
        }

        tracing::debug!("Chatter publisher shutting down");
    }
}
