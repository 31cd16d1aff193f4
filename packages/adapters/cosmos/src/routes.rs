use services::{
    Error, Result,
    types::{ChainTarget, ProtocolType, Url},
};

pub(crate) const SYNCING_PATH: &str = "/cosmos/base/tendermint/v1beta1/syncing";
pub(crate) const LATEST_BLOCK_PATH: &str = "/cosmos/base/tendermint/v1beta1/blocks/latest";

// newer SDKs answer with `sdk_block`, older ones only with `block`
pub(crate) const HEIGHT_POINTERS: [&str; 2] = ["/sdk_block/header/height", "/block/header/height"];

pub(crate) const VOTE_PERIOD_POINTER: &str = "/params/vote_period";
pub(crate) const SLASH_WINDOW_POINTER: &str = "/params/slash_window";
pub(crate) const MIN_VALID_PER_WINDOW_POINTER: &str = "/params/min_valid_per_window";

/// Oracle module flavours with known REST routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OracleModule {
    Umee,
    Nibiru,
    Sei,
}

impl OracleModule {
    pub fn for_target(target: &ChainTarget) -> Result<Self> {
        match (
            target.protocol_type,
            target.chain_name.to_ascii_lowercase().as_str(),
        ) {
            (ProtocolType::Cosmos, "umee") => Ok(Self::Umee),
            (ProtocolType::Cosmos, "nibiru") => Ok(Self::Nibiru),
            (ProtocolType::Cosmos, "sei") => Ok(Self::Sei),
            (protocol, chain) => Err(Error::Configuration(format!(
                "no oracle module known for {protocol} chain '{chain}'"
            ))),
        }
    }

    pub fn params_path(&self) -> &'static str {
        match self {
            Self::Umee => "/umee/oracle/v1/params",
            Self::Nibiru => "/nibiru/oracle/v1beta1/params",
            Self::Sei => "/sei-protocol/sei-chain/oracle/params",
        }
    }

    pub fn miss_counter_path(&self, validator_operator_address: &str) -> String {
        match self {
            Self::Umee => format!("/umee/oracle/v1/validators/{validator_operator_address}/miss"),
            Self::Nibiru => {
                format!("/nibiru/oracle/v1beta1/validators/{validator_operator_address}/miss")
            }
            Self::Sei => format!(
                "/sei-protocol/sei-chain/oracle/validators/{validator_operator_address}/vote_penalty_counter"
            ),
        }
    }

    pub fn miss_counter_pointer(&self) -> &'static str {
        match self {
            Self::Umee | Self::Nibiru => "/miss_counter",
            Self::Sei => "/vote_penalty_counter/miss_count",
        }
    }
}

/// Appends `path` to `base`, keeping any path prefix the base already has.
pub(crate) fn endpoint_url(base: &Url, path: &str) -> Result<Url> {
    let joined = format!("{}{path}", base.as_str().trim_end_matches('/'));
    joined
        .parse()
        .map_err(|e| Error::Configuration(format!("invalid endpoint url '{joined}': {e}")))
}
