use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use beacon_core::cluster::{NodeState, Pid};
use beacon_core::protocol::{Channel, ControlCommand};
use beacon_core::Result;

use crate::cluster::{LeaderGuard, MembershipRegistry};
use crate::store::SharedStore;

const USAGE: &str = "use: kill <pid>";

/// Result of one operator line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleOutcome {
    /// A control message went out.
    Sent(String),
    /// The line was refused; carries the diagnostic shown to the operator.
    Rejected(String),
    /// Blank input.
    Ignored,
}

/// Reads operator commands. Only the leader may issue them.
pub struct OperatorConsole {
    store: SharedStore,
    state: Arc<NodeState>,
    registry: MembershipRegistry,
}

impl OperatorConsole {
    pub fn new(store: SharedStore, state: Arc<NodeState>, registry: MembershipRegistry) -> Self {
        Self {
            store,
            state,
            registry,
        }
    }

    /// Handle one line of operator input.
    pub async fn handle_line(&self, line: &str) -> Result<ConsoleOutcome> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(ConsoleOutcome::Ignored);
        }

        let Some(guard) = LeaderGuard::try_new(&self.state) else {
            return Ok(ConsoleOutcome::Rejected(format!(
                "not the leader (leaderPid={}), command ignored",
                self.state.leader_pid()
            )));
        };

        let parts: Vec<&str> = line.split_whitespace().collect();
        let target = match parts.as_slice() {
            [command, pid] if command.eq_ignore_ascii_case("kill") => match pid.parse::<Pid>() {
                Ok(pid) => pid,
                Err(_) => {
                    return Ok(ConsoleOutcome::Rejected(format!("invalid pid: {}", pid)));
                }
            },
            _ => return Ok(ConsoleOutcome::Rejected(USAGE.to_string())),
        };

        let name = self.registry.name_of(target).await;
        let command = ControlCommand::kill(guard.pid(), target, name).encode();
        self.store
            .publish(Channel::Control.as_str(), &command)
            .await?;

        tracing::info!(target, "Issued kill command");
        Ok(ConsoleOutcome::Sent(command))
    }

    /// Read lines from `input` until it ends or the node shuts down,
    /// writing diagnostics to `output`.
    pub async fn run<R, W>(&self, input: R, mut output: W)
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut shutdown_rx = self.state.shutdown_receiver();
        let mut lines = input.lines();

        loop {
            if self.state.is_shutting_down() {
                break;
            }

            let line = tokio::select! {
                line = lines.next_line() => line,
                _ = shutdown_rx.changed() => break,
            };

            let line = match line {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(component = "console", "Failed to read input: {}", e);
                    break;
                }
            };

            let reply = match self.handle_line(&line).await {
                Ok(ConsoleOutcome::Sent(command)) => format!("sent: {}\n", command),
                Ok(ConsoleOutcome::Rejected(diagnostic)) => format!("{}\n", diagnostic),
                Ok(ConsoleOutcome::Ignored) => continue,
                Err(e) => {
                    tracing::warn!(component = "console", "Failed to send command: {}", e);
                    format!("command not sent: {}\n", e)
                }
            };

            if let Err(e) = output.write_all(reply.as_bytes()).await {
                tracing::warn!(component = "console", "Failed to write reply: {}", e);
            }
            let _ = output.flush().await;
        }

        tracing::debug!("Operator console closed");
    }
}
