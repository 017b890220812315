use std::path::PathBuf;

use anyhow::Result;
use clap::error::ErrorKind;
use clap::Parser;
use console::style;

use beacon::Node;
use beacon_core::config::BeaconConfig;

/// Config file picked up from the working directory when `--config` is not given.
const DEFAULT_CONFIG_FILE: &str = "beacon.toml";

/// Flags that take a value.
const VALUE_FLAGS: &[&str] = &["--host", "--port", "--pass", "--name", "--config", "-c"];

/// Flags that stand alone.
const SWITCHES: &[&str] = &["--verbose", "-v", "--help", "-h", "--version", "-V"];

/// BEACON - cluster membership and leader election over Redis
#[derive(Parser, Debug, Default)]
#[command(name = "beacon")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Redis host (overrides config).
    #[arg(long, allow_hyphen_values = true)]
    pub host: Option<String>,

    /// Redis port (overrides config).
    #[arg(long, allow_hyphen_values = true)]
    pub port: Option<u16>,

    /// Redis password (overrides config).
    #[arg(long, allow_hyphen_values = true)]
    pub pass: Option<String>,

    /// Node display name (overrides config).
    #[arg(long, allow_hyphen_values = true)]
    pub name: Option<String>,

    /// Configuration file path.
    #[arg(short, long, allow_hyphen_values = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Parse the process arguments, ignoring anything unrecognised.
    pub fn from_env() -> Self {
        Self::parse_args(std::env::args())
    }

    /// Parse `args`, falling back to defaults when a value is malformed.
    ///
    /// `--help` and `--version` still print and exit.
    pub fn parse_args<I>(args: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        match Self::try_parse_from(known_args(args)) {
            Ok(cli) => cli,
            Err(e) => match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => e.exit(),
                _ => {
                    eprintln!(
                        "{} ignoring command line: {}",
                        style("warning:").yellow().bold(),
                        e.kind()
                    );
                    Self::default()
                }
            },
        }
    }

    /// Apply command-line overrides on top of `config`.
    pub fn apply(&self, config: &mut BeaconConfig) {
        if let Some(host) = &self.host {
            config.store.host = host.clone();
        }
        if let Some(port) = self.port {
            config.store.port = port;
        }
        if let Some(pass) = &self.pass {
            config.store.password = Some(pass.clone());
        }
        if let Some(name) = &self.name {
            config.node.name = name.clone();
        }
    }

    /// Load the config file (if any) and apply overrides.
    pub fn load_config(&self) -> Result<BeaconConfig> {
        let path = match &self.config {
            Some(path) => Some(path.clone()),
            None => Some(PathBuf::from(DEFAULT_CONFIG_FILE)).filter(|p| p.exists()),
        };

        let mut config = match path {
            Some(path) => {
                tracing::info!("Loading configuration from {}", path.display());
                BeaconConfig::from_file(&path)?
            }
            None => BeaconConfig::default(),
        };

        self.apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    /// Run the node.
    pub async fn execute(self) -> Result<()> {
        let log_level = if self.verbose { "debug" } else { "info" };
        tracing_subscriber::fmt()
            .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.to_string()))
            .init();

        let config = self.load_config()?;
        let node = Node::builder().config(config).build()?;

        let name = node.state().name().to_string();

        print_banner(&node);

        node.run().await?;

        println!("[{:<10}|SHUT] done", name);
        Ok(())
    }
}

fn print_banner(node: &Node) {
    let state = node.state();
    let store = &node.config().store;

    println!();
    println!(
        "  {} v{}",
        style("BEACON").bold().cyan(),
        env!("CARGO_PKG_VERSION")
    );
    println!(
        "  Start '{}' pid={} -> redis {} (auth={})",
        style(state.name()).bold(),
        style(state.pid()).bold(),
        style(store.display_addr()).cyan(),
        if store.has_auth() { "yes" } else { "no" }
    );
    println!();
}

/// Keep only recognised flags (and the values that follow value flags).
///
/// Unknown flags and value flags with nothing after them are dropped, so a
/// stray argument never stops the node from starting.
pub fn known_args<I>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    let mut kept: Vec<String> = args.next().into_iter().collect();

    let rest: Vec<String> = args.collect();
    let mut i = 0;
    while i < rest.len() {
        let arg = rest[i].as_str();
        let flag = arg.split_once('=').map_or(arg, |(flag, _)| flag);

        if VALUE_FLAGS.contains(&flag) {
            if flag != arg {
                kept.push(arg.to_string());
                i += 1;
                continue;
            }
            if let Some(value) = rest.get(i + 1) {
                kept.push(arg.to_string());
                kept.push(value.clone());
            }
            i += 2;
            continue;
        }

        if SWITCHES.contains(&arg) {
            kept.push(arg.to_string());
        }
        i += 1;
    }

    kept
}
