use tracing::Span;

use crate::{
    Error, Result,
    oracle_metrics::MetricsFactory,
    types::{ChainConfig, ChainTarget, Endpoints, Mode, NonEmpty, ProtocolType},
};

/// Everything a duty needs to start collecting for one chain.
pub struct Packager {
    pub mode: Mode,
    pub factory: MetricsFactory,
    /// Every log line of the chain's loop is emitted inside this span.
    pub span: Span,
    /// Log successful cycles at `info` instead of `debug`.
    pub verbose: bool,
    pub subsystem: String,
    pub target: ChainTarget,
}

impl Packager {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        mode: Mode,
        factory: MetricsFactory,
        span: Span,
        verbose: bool,
        chain_id: impl Into<String>,
        chain_name: impl Into<String>,
        subsystem: impl Into<String>,
        protocol_type: ProtocolType,
        chain_config: ChainConfig,
        endpoints: Endpoints,
        validator_operator_address: impl Into<String>,
    ) -> Result<Self> {
        let chain_name = chain_name.into();
        if chain_name.is_empty() {
            return Err(Error::Configuration("chain name must not be empty".to_owned()));
        }

        let endpoints = NonEmpty::from_vec(endpoints.apis).ok_or_else(|| {
            Error::Configuration(format!("chain '{chain_name}' has no API endpoints"))
        })?;

        if let Mode::Validator { moniker } = &mode {
            if moniker.is_empty() {
                return Err(Error::Configuration(format!(
                    "chain '{chain_name}' runs in validator mode without a moniker"
                )));
            }
        }

        let validator_operator_address = validator_operator_address.into();
        if validator_operator_address.is_empty() {
            return Err(Error::Configuration(format!(
                "chain '{chain_name}' has no validator operator address"
            )));
        }

        let display_name = if chain_config.display_name.is_empty() {
            chain_name.clone()
        } else {
            chain_config.display_name
        };

        Ok(Self {
            mode,
            factory,
            span,
            verbose,
            subsystem: subsystem.into(),
            target: ChainTarget {
                chain_id: chain_id.into(),
                chain_name,
                display_name,
                protocol_type,
                endpoints,
                validator_operator_address,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::oracle_metrics::SUBSYSTEM;

    fn build(mode: Mode, endpoints: Endpoints, display_name: &str) -> Result<Packager> {
        Packager::new(
            mode,
            MetricsFactory::default(),
            Span::none(),
            true,
            "umee-1",
            "umee",
            SUBSYSTEM,
            ProtocolType::Cosmos,
            ChainConfig {
                display_name: display_name.to_owned(),
            },
            endpoints,
            "umeevaloper1xyz",
        )
    }

    fn one_endpoint() -> Endpoints {
        Endpoints::new(["http://localhost:1317".parse().unwrap()])
    }

    #[test]
    fn zero_endpoints_is_a_configuration_error() {
        let result = build(Mode::Network, Endpoints::default(), "Umee");

        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn validator_mode_requires_a_moniker() {
        let mode = Mode::Validator {
            moniker: String::new(),
        };

        let result = build(mode, one_endpoint(), "Umee");

        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn builds_chain_target_keeping_endpoint_order() {
        let endpoints = Endpoints::new([
            "http://b:1317".parse().unwrap(),
            "http://a:1317".parse().unwrap(),
        ]);

        let packager = build(Mode::Network, endpoints, "").unwrap();

        let hosts: Vec<_> = packager
            .target
            .endpoints
            .iter()
            .map(|url| url.host_str().unwrap().to_owned())
            .collect();
        assert_eq!(hosts, vec!["b".to_owned(), "a".to_owned()]);
        assert_eq!(packager.target.display_name, "umee");
    }
}
