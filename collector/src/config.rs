use std::{
    collections::HashSet, net::Ipv4Addr, num::NonZeroUsize, path::PathBuf, str::FromStr,
    time::Duration,
};

use clap::Parser;
use serde::Deserialize;
use services::{
    oracle_collector,
    types::{Mode, ProtocolType},
};
use url::Url;

use crate::errors::{Error, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: App,
    pub chains: Vec<Chain>,
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.chains.is_empty() {
            return Err(Error::Configuration("no chains configured".to_string()));
        }

        let mut seen = HashSet::new();
        for chain in &self.chains {
            if !seen.insert(chain.chain_name.to_ascii_lowercase()) {
                return Err(Error::Configuration(format!(
                    "chain '{}' is configured more than once",
                    chain.chain_name
                )));
            }

            if chain.apis.is_empty() {
                return Err(Error::Configuration(format!(
                    "chain '{}' has no API endpoints",
                    chain.chain_name
                )));
            }
        }

        self.app.mode()?;

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModeKind {
    /// One registry labeled by chain, for fleet-wide monitoring.
    Network,
    /// Sidecar of a single validator, labeled by its moniker.
    Validator,
}

#[derive(Debug, Clone, Deserialize)]
pub struct App {
    /// Port used by the started server
    pub port: u16,
    /// IPv4 address on which the server will listen for connections
    pub host: Ipv4Addr,
    pub mode: ModeKind,
    /// Required in validator mode
    #[serde(default)]
    pub moniker: Option<String>,
    /// Pause between two poll cycles of the same chain
    #[serde(
        default = "default_poll_interval",
        deserialize_with = "human_readable_duration"
    )]
    pub poll_interval: Duration,
    /// Upper bound of a single REST request
    #[serde(
        default = "default_request_timeout",
        deserialize_with = "human_readable_duration"
    )]
    pub request_timeout: Duration,
    /// Log successful cycles at info level
    #[serde(default)]
    pub verbose: bool,
    #[serde(default = "default_failures_before_reselect")]
    pub failures_before_reselect: NonZeroUsize,
    #[serde(default = "default_unhealthy_after_n_errors")]
    pub unhealthy_after_n_errors: usize,
}

impl App {
    pub fn mode(&self) -> Result<Mode> {
        match (self.mode, &self.moniker) {
            (ModeKind::Network, _) => Ok(Mode::Network),
            (ModeKind::Validator, Some(moniker)) if !moniker.trim().is_empty() => {
                Ok(Mode::Validator {
                    moniker: moniker.trim().to_string(),
                })
            }
            (ModeKind::Validator, _) => Err(Error::Configuration(
                "validator mode requires a moniker".to_string(),
            )),
        }
    }

    pub fn collector_config(&self) -> oracle_collector::Config {
        oracle_collector::Config {
            poll_interval: self.poll_interval,
            failures_before_reselect: self.failures_before_reselect,
            unhealthy_after_n_errors: self.unhealthy_after_n_errors,
        }
    }
}

fn default_poll_interval() -> Duration {
    oracle_collector::Config::default().poll_interval
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_failures_before_reselect() -> NonZeroUsize {
    oracle_collector::Config::default().failures_before_reselect
}

fn default_unhealthy_after_n_errors() -> usize {
    oracle_collector::Config::default().unhealthy_after_n_errors
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chain {
    pub chain_id: String,
    /// Selects the oracle routes, e.g. `umee`, `nibiru` or `sei`.
    pub chain_name: String,
    #[serde(default)]
    pub display_name: String,
    pub protocol_type: ProtocolType,
    /// Validator whose miss counter is tracked.
    pub validator_operator_address: String,
    /// REST API base URLs, tried in order.
    #[serde(deserialize_with = "parse_urls")]
    pub apis: Vec<Url>,
}

fn parse_urls<'de, D>(deserializer: D) -> std::result::Result<Vec<Url>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let url_strs: Vec<String> = Deserialize::deserialize(deserializer)?;
    url_strs
        .iter()
        .map(|url_str| {
            Url::from_str(url_str).map_err(|e| {
                let msg = format!("Failed to parse URL '{url_str}': {e};");
                serde::de::Error::custom(msg)
            })
        })
        .collect()
}

fn human_readable_duration<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let duration_str: String = Deserialize::deserialize(deserializer)?;
    humantime::parse_duration(&duration_str).map_err(|e| {
        let msg = format!("Failed to parse duration '{duration_str}': {e};");
        serde::de::Error::custom(msg)
    })
}

#[derive(Parser)]
#[command(
    name = "oracle-collector",
    version,
    about,
    propagate_version = true,
    arg_required_else_help(true)
)]
struct Cli {
    #[arg(value_name = "FILE", help = "Path to the configuration file")]
    config_path: PathBuf,
}

pub fn parse() -> Result<Config> {
    let cli = Cli::parse();

    let config = load(config::File::from(cli.config_path))?;
    config.validate()?;

    Ok(config)
}

fn load<S>(file: S) -> Result<Config>
where
    S: config::Source + Send + Sync + 'static,
{
    let config = config::Config::builder()
        .add_source(file)
        .add_source(config::Environment::with_prefix("COLLECTOR").separator("__"))
        .build()?;

    Ok(config.try_deserialize()?)
}
