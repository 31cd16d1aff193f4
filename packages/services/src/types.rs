use std::{collections::HashMap, fmt::Display, str::FromStr};

pub use nonempty::{NonEmpty, nonempty};
use serde::{Deserialize, Serialize};
pub use url::Url;

use crate::{Error, Result};

pub const CHAIN_LABEL: &str = "chain";
pub const MONIKER_LABEL: &str = "moniker";

/// Family of REST APIs a chain speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolType {
    Cosmos,
}

impl Display for ProtocolType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cosmos => write!(f, "cosmos"),
        }
    }
}

impl FromStr for ProtocolType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "cosmos" => Ok(Self::Cosmos),
            other => Err(Error::Configuration(format!(
                "unknown protocol type '{other}'"
            ))),
        }
    }
}

/// How the collector is deployed, which decides the shape of metric labels.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Many chains share one registry, labeled by chain.
    Network,
    /// A sidecar next to a single validator, labeled by its moniker.
    Validator { moniker: String },
}

impl Mode {
    pub fn const_labels(&self, target: &ChainTarget) -> HashMap<String, String> {
        let mut labels = HashMap::from([(CHAIN_LABEL.to_owned(), target.chain_name.clone())]);
        if let Self::Validator { moniker } = self {
            labels.insert(MONIKER_LABEL.to_owned(), moniker.clone());
        }
        labels
    }
}

impl Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Network => write!(f, "network"),
            Self::Validator { moniker } => write!(f, "validator({moniker})"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainConfig {
    pub display_name: String,
}

/// Candidate API base URLs in the order they should be tried.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Endpoints {
    pub apis: Vec<Url>,
}

impl Endpoints {
    pub fn new(apis: impl IntoIterator<Item = Url>) -> Self {
        Self {
            apis: apis.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainTarget {
    pub chain_id: String,
    pub chain_name: String,
    pub display_name: String,
    pub protocol_type: ProtocolType,
    pub endpoints: NonEmpty<Url>,
    pub validator_operator_address: String,
}

/// Normalized oracle state from one successful poll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OracleSnapshot {
    pub miss_counter: u64,
    pub slash_window: u64,
    pub vote_period: u64,
    pub min_valid_per_window: u64,
    pub vote_window: u64,
    pub block_height: u64,
}
