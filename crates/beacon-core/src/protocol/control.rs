use crate::cluster::Pid;

/// Prefix emitted by older nodes in front of control commands.
const LEGACY_PREFIX: &str = "control:";

/// A message on the control channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    /// `leader <pid>`: leadership announcement (`-1` = no leader).
    Leader(Pid),
    /// `kill <target>` or `<issuer> kill <target> (<name>)`.
    Kill {
        issuer: Option<Pid>,
        target: Pid,
        name: Option<String>,
    },
    /// Anything else. Logged and otherwise ignored.
    Other(String),
}

impl ControlCommand {
    /// Kill command as issued from an operator console.
    pub fn kill(issuer: Pid, target: Pid, name: impl Into<String>) -> Self {
        Self::Kill {
            issuer: Some(issuer),
            target,
            name: Some(name.into()),
        }
    }

    /// Decode a control payload. Never fails; unknown input becomes `Other`.
    pub fn parse(message: &str) -> Self {
        let trimmed = message.trim();
        let body = trimmed
            .strip_prefix(LEGACY_PREFIX)
            .map(str::trim_start)
            .unwrap_or(trimmed);

        let tokens: Vec<&str> = body.split_whitespace().collect();
        let parsed = match tokens.as_slice() {
            ["leader", pid] => pid.parse().ok().map(Self::Leader),
            ["kill", target, rest @ ..] => target.parse().ok().map(|target| Self::Kill {
                issuer: None,
                target,
                name: parse_name(rest),
            }),
            [issuer, "kill", target, rest @ ..] => {
                match (issuer.parse::<Pid>(), target.parse::<Pid>()) {
                    (Ok(issuer), Ok(target)) => Some(Self::Kill {
                        issuer: Some(issuer),
                        target,
                        name: parse_name(rest),
                    }),
                    _ => None,
                }
            }
            _ => None,
        };

        parsed.unwrap_or_else(|| Self::Other(message.to_string()))
    }

    /// Encode in the canonical grammar.
    pub fn encode(&self) -> String {
        match self {
            Self::Leader(pid) => format!("leader {}", pid),
            Self::Kill {
                issuer,
                target,
                name,
            } => {
                let mut out = String::new();
                if let Some(issuer) = issuer {
                    out.push_str(&format!("{} ", issuer));
                }
                out.push_str(&format!("kill {}", target));
                if let Some(name) = name {
                    out.push_str(&format!(" ({})", name));
                }
                out
            }
            Self::Other(text) => text.clone(),
        }
    }

    /// Whether this is a kill command addressed to `pid`.
    pub fn is_kill_for(&self, pid: Pid) -> bool {
        matches!(self, Self::Kill { target, .. } if *target == pid)
    }
}

impl std::fmt::Display for ControlCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.encode())
    }
}

fn parse_name(rest: &[&str]) -> Option<String> {
    if rest.is_empty() {
        return None;
    }
    let joined = rest.join(" ");
    let name = joined
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .unwrap_or(&joined);
    Some(name.to_string())
}
