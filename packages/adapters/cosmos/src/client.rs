use std::time::Duration;

use metrics::{RegistersMetrics, prometheus::core::Collector};
use serde_json::Value;
use services::{
    Error, Result,
    oracle_collector::port::{LivenessProbe, OracleApi},
    types::{ChainTarget, OracleSnapshot, Url},
};
use tracing::trace;

use crate::{
    decode,
    metrics::Metrics,
    routes::{
        HEIGHT_POINTERS, LATEST_BLOCK_PATH, MIN_VALID_PER_WINDOW_POINTER, OracleModule,
        SLASH_WINDOW_POINTER, SYNCING_PATH, VOTE_PERIOD_POINTER, endpoint_url,
    },
};

/// Talks to the REST (LCD) api of Cosmos SDK chains.
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    metrics: Metrics,
}

impl HttpClient {
    pub fn new(request_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| Error::Configuration(format!("failed to build http client: {e}")))?;

        Ok(Self {
            client,
            metrics: Metrics::default(),
        })
    }

    async fn get(&self, base: &Url, path: &str) -> Result<(Url, Vec<u8>)> {
        let url = endpoint_url(base, path)?;
        trace!("GET {url}");

        let response = match self.client.get(url.clone()).send().await {
            Ok(response) => response,
            Err(err) => {
                self.handle_network_error(base);
                return Err(Error::Unreachable(format!("{url}: {err}")));
            }
        };

        let status = response.status();
        if !status.is_success() {
            self.handle_network_error(base);
            return Err(Error::Unreachable(format!("{url}: status {status}")));
        }

        let body = response.bytes().await.map_err(|err| {
            self.handle_network_error(base);
            Error::Unreachable(format!("{url}: {err}"))
        })?;

        Ok((url, body.to_vec()))
    }

    async fn get_json(&self, base: &Url, path: &str) -> Result<Value> {
        let (url, body) = self.get(base, path).await?;

        serde_json::from_slice(&body).map_err(|e| Error::Decode(format!("{url}: {e}")))
    }

    fn handle_network_error(&self, endpoint: &Url) {
        self.metrics
            .oracle_api_network_errors
            .with_label_values(&[endpoint.as_str()])
            .inc();
    }
}

impl LivenessProbe for HttpClient {
    async fn probe(&self, endpoint: &Url) -> Result<()> {
        self.get(endpoint, SYNCING_PATH).await.map(|_| ())
    }
}

impl OracleApi for HttpClient {
    fn supports(&self, target: &ChainTarget) -> Result<()> {
        OracleModule::for_target(target).map(|_| ())
    }

    async fn fetch(&self, endpoint: &Url, target: &ChainTarget) -> Result<OracleSnapshot> {
        let module = OracleModule::for_target(target)?;
        let miss_counter_path = module.miss_counter_path(&target.validator_operator_address);

        let (params, miss, block) = futures::try_join!(
            self.get_json(endpoint, module.params_path()),
            self.get_json(endpoint, &miss_counter_path),
            self.get_json(endpoint, LATEST_BLOCK_PATH),
        )?;

        let slash_window = decode::integer(&params, SLASH_WINDOW_POINTER)?;
        let vote_period = decode::integer(&params, VOTE_PERIOD_POINTER)?;
        if vote_period == 0 {
            return Err(Error::PartialData(format!(
                "{} reports a vote period of 0",
                target.chain_name
            )));
        }
        let vote_window = slash_window / vote_period;

        Ok(OracleSnapshot {
            miss_counter: decode::integer(&miss, module.miss_counter_pointer())?,
            slash_window,
            vote_period,
            min_valid_per_window: decode::min_valid_per_window(
                &params,
                MIN_VALID_PER_WINDOW_POINTER,
                vote_window,
            )?,
            vote_window,
            block_height: decode::first_integer(&block, &HEIGHT_POINTERS)?,
        })
    }
}

impl RegistersMetrics for HttpClient {
    fn metrics(&self) -> Vec<Box<dyn Collector>> {
        self.metrics.metrics()
    }
}
