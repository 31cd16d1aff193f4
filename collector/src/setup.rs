use cosmos::HttpClient;
use metrics::{RegistersMetrics, prometheus::Registry};
use services::{
    HealthReporter, Packager,
    oracle_collector::{self, CollectorHandle},
    oracle_metrics::{MetricsFactory, SUBSYSTEM},
    types::{ChainConfig, Endpoints},
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::{
    config::{Chain, Config},
    errors::{Error, Result, WithContext},
};

pub fn create_cosmos_adapter(config: &Config, registry: &Registry) -> Result<HttpClient> {
    let cosmos_adapter = HttpClient::new(config.app.request_timeout)?;
    cosmos_adapter.register_metrics(registry)?;

    Ok(cosmos_adapter)
}

/// Starts one collector per configured chain, all sharing `factory`.
pub fn spawn_collectors(
    config: &Config,
    factory: &MetricsFactory,
    api: HttpClient,
    cancel_token: CancellationToken,
) -> Result<(Vec<JoinHandle<()>>, HealthReporter)> {
    let mode = config.app.mode()?;
    let mut handles = vec![];
    let mut health_reporter = HealthReporter::new();

    for chain in &config.chains {
        let packager = create_packager(config, chain, factory)
            .with_context(|| format!("invalid chain '{}'", chain.chain_name))?;

        let CollectorHandle {
            chain_name,
            join_handle,
            health_checker,
        } = oracle_collector::start(
            packager,
            api.clone(),
            config.app.collector_config(),
            cancel_token.clone(),
        )
        .map_err(Error::from)
        .with_context(|| format!("failed to start collector for '{}'", chain.chain_name))?;

        info!("collecting oracle metrics for {chain_name} in {mode} mode");
        handles.push(join_handle);
        health_reporter.track(chain_name, health_checker);
    }

    Ok((handles, health_reporter))
}

fn create_packager(config: &Config, chain: &Chain, factory: &MetricsFactory) -> Result<Packager> {
    let span = tracing::info_span!(
        "oracle_collector",
        chain = %chain.chain_name,
        chain_id = %chain.chain_id,
    );

    let packager = Packager::new(
        config.app.mode()?,
        factory.clone(),
        span,
        config.app.verbose,
        chain.chain_id.clone(),
        chain.chain_name.clone(),
        SUBSYSTEM,
        chain.protocol_type,
        ChainConfig {
            display_name: chain.display_name.clone(),
        },
        Endpoints::new(chain.apis.iter().cloned()),
        chain.validator_operator_address.clone(),
    )?;

    Ok(packager)
}

pub fn setup_logger() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_level(true)
        .with_line_number(true)
        .json()
        .init();
}

pub async fn shut_down(
    cancel_token: CancellationToken,
    collector_handles: Vec<JoinHandle<()>>,
) -> Result<()> {
    cancel_token.cancel();

    for handle in collector_handles {
        handle.await?;
    }

    Ok(())
}
