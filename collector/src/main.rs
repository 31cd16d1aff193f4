#![deny(unused_crate_dependencies)]
mod api;
mod config;
mod errors;
mod setup;

use api::launch_api_server;
use errors::Result;
use metrics::prometheus::Registry;
use services::oracle_metrics::MetricsFactory;
use setup::{create_cosmos_adapter, setup_logger, shut_down, spawn_collectors};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<()> {
    setup_logger();

    let config = config::parse()?;

    let cancel_token = CancellationToken::new();

    let metrics_registry = Registry::default();

    let cosmos_adapter = create_cosmos_adapter(&config, &metrics_registry)?;

    let (collector_handles, health_reporter) = spawn_collectors(
        &config,
        &MetricsFactory::new(metrics_registry.clone()),
        cosmos_adapter,
        cancel_token.clone(),
    )?;

    launch_api_server(&config, metrics_registry, health_reporter).await?;

    shut_down(cancel_token, collector_handles).await
}
