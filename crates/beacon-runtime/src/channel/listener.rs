use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::broadcast;

use beacon_core::cluster::{NodeState, Pid, NO_LEADER};
use beacon_core::protocol::{Channel, ControlCommand, PresenceSnapshot};

use crate::cluster::{log_role, sleep_or_shutdown};
use crate::store::{ChannelMessage, SharedStore};

/// Channel listener configuration.
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    /// Pause before resubscribing after the subscription is lost.
    pub retry_backoff: Duration,
    /// Buffer size for event broadcast.
    pub buffer_size: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            retry_backoff: Duration::from_secs(2),
            buffer_size: 1024,
        }
    }
}

/// Something observed on the cluster channels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterEvent {
    /// Free text on the broadcast channel.
    Chatter(String),
    /// A leader announcement.
    Leader { leader: Pid, changed: bool },
    /// A kill command addressed to this node.
    Killed { issuer: Option<Pid> },
    /// A decoded presence snapshot.
    Presence(PresenceSnapshot),
    /// A presence payload that failed to decode.
    MalformedPresence(String),
}

/// Single subscription to the broadcast, control and presence channels.
///
/// Applies leader announcements and kill commands to the node state and
/// forwards everything worth showing as [`ClusterEvent`]s.
pub struct ChannelListener {
    store: SharedStore,
    state: Arc<NodeState>,
    config: ListenerConfig,
    event_tx: broadcast::Sender<ClusterEvent>,
}

impl ChannelListener {
    /// Create a new channel listener.
    pub fn new(store: SharedStore, state: Arc<NodeState>, config: ListenerConfig) -> Self {
        let (event_tx, _) = broadcast::channel(config.buffer_size);
        Self {
            store,
            state,
            config,
            event_tx,
        }
    }

    /// Subscribe to cluster events.
    pub fn subscribe(&self) -> broadcast::Receiver<ClusterEvent> {
        self.event_tx.subscribe()
    }

    /// Apply one received message. Returns the resulting event, if any.
    pub fn handle_message(&self, message: &ChannelMessage) -> Option<ClusterEvent> {
        let event = match Channel::from_name(&message.channel) {
            Some(Channel::Broadcast) => {
                tracing::info!(channel = %message.channel, "{}", message.payload);
                Some(ClusterEvent::Chatter(message.payload.clone()))
            }
            Some(Channel::Control) => self.handle_control(&message.payload),
            Some(Channel::Presence) => Some(match PresenceSnapshot::decode(&message.payload) {
                Ok(snapshot) => ClusterEvent::Presence(snapshot),
                Err(e) => {
                    tracing::warn!(component = "listener", "Malformed presence: {}", e);
                    ClusterEvent::MalformedPresence(message.payload.clone())
                }
            }),
            None => {
                tracing::debug!(channel = %message.channel, "Message on unknown channel");
                None
            }
        };

        if let Some(event) = &event {
            let _ = self.event_tx.send(event.clone());
        }
        event
    }

    fn handle_control(&self, payload: &str) -> Option<ClusterEvent> {
        match ControlCommand::parse(payload) {
            ControlCommand::Leader(leader) if leader < 0 && leader != NO_LEADER => {
                tracing::warn!(channel = "control", leader, "Ignoring invalid leader pid");
                None
            }
            ControlCommand::Leader(leader) => {
                let was_leader = self.state.is_leader();
                let changed = self.state.set_leader(leader);
                if was_leader != self.state.is_leader() {
                    log_role(&self.state);
                }
                Some(ClusterEvent::Leader { leader, changed })
            }
            ControlCommand::Kill { issuer, target, .. } if target == self.state.pid() => {
                tracing::warn!(
                    pid = target,
                    issuer = ?issuer,
                    "Received kill command, shutting down"
                );
                self.state.request_shutdown();
                Some(ClusterEvent::Killed { issuer })
            }
            ControlCommand::Kill { target, .. } => {
                tracing::debug!(target, "Kill for another node");
                None
            }
            ControlCommand::Other(text) => {
                tracing::info!(channel = "control", "{}", text);
                None
            }
        }
    }

    /// Run the listener loop until shutdown, resubscribing after the
    /// subscription fails or ends.
    pub async fn run(&self) {
        let mut shutdown_rx = self.state.shutdown_receiver();
        let channels: Vec<&str> = Channel::ALL.iter().map(|c| c.as_str()).collect();

        loop {
            if self.state.is_shutting_down() {
                break;
            }

            match self.store.subscribe(&channels).await {
                Ok(mut messages) => {
                    tracing::info!(channels = ?channels, "Subscribed to cluster channels");
                    loop {
                        tokio::select! {
                            message = messages.next() => match message {
                                Some(message) => {
                                    self.handle_message(&message);
                                }
                                None => {
                                    tracing::warn!(component = "listener", "Subscription ended");
                                    break;
                                }
                            },
                            _ = shutdown_rx.changed() => {
                                if *shutdown_rx.borrow() {
                                    break;
                                }
                            }
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(component = "listener", "Failed to subscribe: {}", e);
                }
            }

            if sleep_or_shutdown(&mut shutdown_rx, self.config.retry_backoff).await {
                break;
            }
        }

        tracing::info!("Channel listener shutting down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use beacon_core::cluster::NodeIdentity;
    use beacon_core::protocol::PresenceEntry;

    use crate::store::CoordinationStore;
    use crate::testing::{MemoryStore, DEFAULT_TEST_TIMEOUT};

    fn listener(pid: Pid) -> (Arc<MemoryStore>, Arc<NodeState>, ChannelListener) {
        let store = Arc::new(MemoryStore::new());
        let state = Arc::new(NodeState::new(NodeIdentity::new(pid, format!("name{pid}"))));
        let listener = ChannelListener::new(
            store.clone(),
            state.clone(),
            ListenerConfig {
                retry_backoff: Duration::from_millis(20),
                buffer_size: 16,
            },
        );
        (store, state, listener)
    }

    fn control(payload: &str) -> ChannelMessage {
        ChannelMessage::new("control", payload)
    }

    #[test]
    fn test_listener_config_default() {
        let config = ListenerConfig::default();
        assert_eq!(config.retry_backoff, Duration::from_secs(2));
        assert_eq!(config.buffer_size, 1024);
    }

    #[test]
    fn test_leader_announcement_updates_role() {
        let (_, state, listener) = listener(30);

        let event = listener.handle_message(&control("leader 30"));
        assert_eq!(event, Some(ClusterEvent::Leader { leader: 30, changed: true }));
        assert!(state.is_leader());

        // Repeated announcement is idempotent.
        let event = listener.handle_message(&control("leader 30"));
        assert_eq!(event, Some(ClusterEvent::Leader { leader: 30, changed: false }));
        assert!(state.is_leader());

        listener.handle_message(&control("control:leader 20"));
        assert_eq!(state.leader_pid(), 20);
        assert!(!state.is_leader());
    }

    #[test]
    fn test_negative_leader_pid_is_ignored() {
        let (_, state, listener) = listener(30);
        state.set_leader(20);

        assert_eq!(listener.handle_message(&control("leader -7")), None);
        assert_eq!(state.leader_pid(), 20);

        let event = listener.handle_message(&control("leader -1"));
        assert_eq!(event, Some(ClusterEvent::Leader { leader: NO_LEADER, changed: true }));
        assert_eq!(state.leader_pid(), NO_LEADER);
    }

    #[test]
    fn test_kill_for_self_requests_shutdown() {
        let (_, state, listener) = listener(10);

        let event = listener.handle_message(&control("20 kill 10 (name10)"));
        assert_eq!(event, Some(ClusterEvent::Killed { issuer: Some(20) }));
        assert!(state.is_shutting_down());
    }

    #[test]
    fn test_kill_for_other_node_is_ignored() {
        let (_, state, listener) = listener(10);
        assert_eq!(listener.handle_message(&control("20 kill 11 (x)")), None);
        assert!(!state.is_shutting_down());
    }

    #[test]
    fn test_unknown_control_changes_nothing() {
        let (_, state, listener) = listener(10);
        state.set_leader(20);

        assert_eq!(listener.handle_message(&control("hello there")), None);
        assert_eq!(listener.handle_message(&control("leader abc")), None);
        assert_eq!(state.leader_pid(), 20);
        assert!(!state.is_shutting_down());
    }

    #[test]
    fn test_presence_decoded_or_passed_through() {
        let (_, _, listener) = listener(10);

        let event = listener.handle_message(&ChannelMessage::new(
            "presence",
            "presence: 30|10:alpha:1,20:beta:0",
        ));
        assert_eq!(
            event,
            Some(ClusterEvent::Presence(PresenceSnapshot::new(
                30,
                vec![
                    PresenceEntry::new(10, "alpha", true),
                    PresenceEntry::new(20, "beta", false),
                ]
            )))
        );

        let event = listener.handle_message(&ChannelMessage::new("presence", "garbage"));
        assert_eq!(event, Some(ClusterEvent::MalformedPresence("garbage".into())));
    }

    #[test]
    fn test_events_are_broadcast() {
        let (_, _, listener) = listener(10);
        let mut events = listener.subscribe();

        listener.handle_message(&ChannelMessage::new("broadcast", "hi | WORKER | pid=1"));
        assert_eq!(
            events.try_recv().unwrap(),
            ClusterEvent::Chatter("hi | WORKER | pid=1".into())
        );
    }

    async fn wait_subscribed(store: &MemoryStore) {
        tokio::time::timeout(DEFAULT_TEST_TIMEOUT, async {
            while store.subscriber_count() == 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_run_receives_and_resubscribes() {
        let (store, state, listener) = listener(10);
        let listener = Arc::new(listener);
        let mut events = listener.subscribe();

        let task = tokio::spawn({
            let listener = listener.clone();
            async move { listener.run().await }
        });

        wait_subscribed(&store).await;
        store.publish("control", "leader 10").await.unwrap();
        let event = tokio::time::timeout(DEFAULT_TEST_TIMEOUT, events.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event, ClusterEvent::Leader { leader: 10, changed: true });

        // Connection loss: the listener comes back on its own.
        store.drop_subscriptions();
        wait_subscribed(&store).await;
        store.publish("control", "20 kill 10 (name10)").await.unwrap();

        tokio::time::timeout(DEFAULT_TEST_TIMEOUT, task)
            .await
            .unwrap()
            .unwrap();
        assert!(state.is_shutting_down());
    }
}
