#![deny(unused_crate_dependencies)]

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use metrics::prometheus::{Encoder, Registry, TextEncoder};
use services::{
    Error, Packager, Result,
    endpoint_selector::port::LivenessProbe,
    oracle_collector::port::OracleApi,
    oracle_metrics::{MetricsFactory, SUBSYSTEM},
    types::{ChainConfig, ChainTarget, Endpoints, Mode, OracleSnapshot, ProtocolType, Url},
};
use tracing::info_span;

pub fn url(host: &str) -> Url {
    format!("http://{host}:1317")
        .parse()
        .expect("test host to form a valid url")
}

pub fn snapshot(block_height: u64) -> OracleSnapshot {
    OracleSnapshot {
        miss_counter: 4,
        slash_window: 201_600,
        vote_period: 5,
        min_valid_per_window: 2_016,
        vote_window: 40_320,
        block_height,
    }
}

pub fn packager(
    mode: Mode,
    factory: &MetricsFactory,
    chain_name: &str,
    endpoints: impl IntoIterator<Item = Url>,
) -> Packager {
    Packager::new(
        mode,
        factory.clone(),
        info_span!("oracle", chain = chain_name),
        true,
        format!("{chain_name}-1"),
        chain_name,
        SUBSYSTEM,
        ProtocolType::Cosmos,
        ChainConfig {
            display_name: chain_name.to_owned(),
        },
        Endpoints::new(endpoints),
        format!("{chain_name}valoper1test"),
    )
    .expect("test packager to be valid")
}

/// Text exposition of everything in the registry, as a scrape would see it.
pub fn exposition(registry: &Registry) -> String {
    let mut buf = vec![];
    TextEncoder::new()
        .encode(&registry.gather(), &mut buf)
        .expect("metrics to encode");
    String::from_utf8(buf).expect("exposition to be utf8")
}

#[derive(Debug, Clone)]
pub enum EndpointBehaviour {
    Down,
    Serving(OracleSnapshot),
    /// Answers the liveness probe but every fetch fails.
    Failing(Error),
}

/// In-memory stand-in for the REST APIs of a set of nodes.
#[derive(Debug, Clone, Default)]
pub struct FakeChainApi {
    endpoints: Arc<Mutex<HashMap<Url, EndpointBehaviour>>>,
    probed: Arc<Mutex<Vec<Url>>>,
    fetched: Arc<Mutex<Vec<Url>>>,
}

impl FakeChainApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve(&self, endpoint: &Url, snapshot: OracleSnapshot) {
        self.set(endpoint, EndpointBehaviour::Serving(snapshot));
    }

    pub fn take_down(&self, endpoint: &Url) {
        self.set(endpoint, EndpointBehaviour::Down);
    }

    pub fn fail_fetches(&self, endpoint: &Url, error: Error) {
        self.set(endpoint, EndpointBehaviour::Failing(error));
    }

    pub fn probed(&self) -> Vec<Url> {
        self.probed.lock().expect("lock not poisoned").clone()
    }

    pub fn fetched(&self) -> Vec<Url> {
        self.fetched.lock().expect("lock not poisoned").clone()
    }

    fn set(&self, endpoint: &Url, behaviour: EndpointBehaviour) {
        self.endpoints
            .lock()
            .expect("lock not poisoned")
            .insert(endpoint.clone(), behaviour);
    }

    fn behaviour(&self, endpoint: &Url) -> EndpointBehaviour {
        self.endpoints
            .lock()
            .expect("lock not poisoned")
            .get(endpoint)
            .cloned()
            .unwrap_or(EndpointBehaviour::Down)
    }
}

impl LivenessProbe for FakeChainApi {
    async fn probe(&self, endpoint: &Url) -> Result<()> {
        self.probed
            .lock()
            .expect("lock not poisoned")
            .push(endpoint.clone());

        match self.behaviour(endpoint) {
            EndpointBehaviour::Down => Err(Error::Unreachable(endpoint.to_string())),
            EndpointBehaviour::Serving(_) | EndpointBehaviour::Failing(_) => Ok(()),
        }
    }
}

impl OracleApi for FakeChainApi {
    fn supports(&self, _target: &ChainTarget) -> Result<()> {
        Ok(())
    }

    async fn fetch(&self, endpoint: &Url, _target: &ChainTarget) -> Result<OracleSnapshot> {
        self.fetched
            .lock()
            .expect("lock not poisoned")
            .push(endpoint.clone());

        match self.behaviour(endpoint) {
            EndpointBehaviour::Down => Err(Error::Unreachable(endpoint.to_string())),
            EndpointBehaviour::Serving(snapshot) => Ok(snapshot),
            EndpointBehaviour::Failing(error) => Err(error),
        }
    }
}
