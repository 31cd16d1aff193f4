use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use metrics::{
    RegistersMetrics,
    prometheus::{self, IntCounterVec, IntGaugeVec, Opts, Registry, core::Collector},
};

use crate::{
    Error, Result,
    types::{ChainTarget, Mode, OracleSnapshot},
};

pub const NAMESPACE: &str = "validator_monitor";
pub const SUBSYSTEM: &str = "oracle";

pub const MISS_COUNTER_METRIC_NAME: &str = "miss_counter";
pub const SLASH_WINDOW_METRIC_NAME: &str = "slash_window";
pub const VOTE_PERIOD_METRIC_NAME: &str = "vote_period";
pub const MIN_VALID_PER_WINDOW_METRIC_NAME: &str = "min_valid_per_window";
pub const VOTE_WINDOW_METRIC_NAME: &str = "vote_window";
pub const BLOCK_HEIGHT_METRIC_NAME: &str = "block_height";
pub const FETCH_ERRORS_METRIC_NAME: &str = "fetch_errors";

pub const METRIC_NAMES: [&str; 6] = [
    MISS_COUNTER_METRIC_NAME,
    SLASH_WINDOW_METRIC_NAME,
    VOTE_PERIOD_METRIC_NAME,
    MIN_VALID_PER_WINDOW_METRIC_NAME,
    VOTE_WINDOW_METRIC_NAME,
    BLOCK_HEIGHT_METRIC_NAME,
];

/// `validator_monitor_<subsystem>_<name>`, the name a scrape will show.
pub fn fully_qualified_name(subsystem: &str, name: &str) -> String {
    format!("{NAMESPACE}_{subsystem}_{name}")
}

/// The six oracle gauges of one chain.
///
/// Each gauge is a vector without variable labels: the instrument is
/// registered up front, but its single series only exists once
/// [`MetricSet::update`] has run, so a chain that was never polled
/// successfully exposes nothing.
#[derive(Clone)]
pub struct MetricSet {
    pub miss_counter: IntGaugeVec,
    pub slash_window: IntGaugeVec,
    pub vote_period: IntGaugeVec,
    pub min_valid_per_window: IntGaugeVec,
    pub vote_window: IntGaugeVec,
    pub block_height: IntGaugeVec,
}

impl MetricSet {
    pub fn new(subsystem: &str, const_labels: HashMap<String, String>) -> Self {
        let gauge = |name: &str, help: &str| {
            IntGaugeVec::new(
                Opts::new(name, help)
                    .namespace(NAMESPACE)
                    .subsystem(subsystem)
                    .const_labels(const_labels.clone()),
                &[],
            )
            .expect("oracle gauge to be correctly configured")
        };

        Self {
            miss_counter: gauge(
                MISS_COUNTER_METRIC_NAME,
                "Oracle votes the validator missed in the current slash window.",
            ),
            slash_window: gauge(
                SLASH_WINDOW_METRIC_NAME,
                "Length of the oracle slash window in blocks.",
            ),
            vote_period: gauge(
                VOTE_PERIOD_METRIC_NAME,
                "Length of one oracle vote period in blocks.",
            ),
            min_valid_per_window: gauge(
                MIN_VALID_PER_WINDOW_METRIC_NAME,
                "Valid votes required per vote window to avoid slashing.",
            ),
            vote_window: gauge(
                VOTE_WINDOW_METRIC_NAME,
                "Number of vote periods in one slash window.",
            ),
            block_height: gauge(
                BLOCK_HEIGHT_METRIC_NAME,
                "Latest block height seen by the oracle collector.",
            ),
        }
    }

    /// Sets every gauge from the snapshot. The only path that changes values.
    ///
    /// Gauges are set one after another, so a scrape racing this call may
    /// see some values from this snapshot and the rest from the previous
    /// one. Each value on its own always comes from a successful poll.
    pub fn update(&self, snapshot: &OracleSnapshot) {
        let set = |gauge: &IntGaugeVec, value: u64| {
            gauge
                .with_label_values(&[])
                .set(i64::try_from(value).unwrap_or(i64::MAX))
        };

        set(&self.miss_counter, snapshot.miss_counter);
        set(&self.slash_window, snapshot.slash_window);
        set(&self.vote_period, snapshot.vote_period);
        set(&self.min_valid_per_window, snapshot.min_valid_per_window);
        set(&self.vote_window, snapshot.vote_window);
        set(&self.block_height, snapshot.block_height);
    }
}

impl RegistersMetrics for MetricSet {
    fn metrics(&self) -> Vec<Box<dyn Collector>> {
        vec![
            Box::new(self.miss_counter.clone()),
            Box::new(self.slash_window.clone()),
            Box::new(self.vote_period.clone()),
            Box::new(self.min_valid_per_window.clone()),
            Box::new(self.vote_window.clone()),
            Box::new(self.block_height.clone()),
        ]
    }
}

/// Health of the collector itself, next to the oracle gauges.
#[derive(Clone)]
pub struct CollectorMetrics {
    pub fetch_errors: IntCounterVec,
}

impl CollectorMetrics {
    pub fn new(subsystem: &str, const_labels: HashMap<String, String>) -> Self {
        let fetch_errors = IntCounterVec::new(
            Opts::new(
                FETCH_ERRORS_METRIC_NAME,
                "Number of poll cycles skipped because the oracle state could not be fetched.",
            )
            .namespace(NAMESPACE)
            .subsystem(subsystem)
            .const_labels(const_labels),
            &["kind"],
        )
        .expect("fetch_errors metric to be correctly configured");

        Self { fetch_errors }
    }

    pub fn note_error(&self, error: &Error) {
        self.fetch_errors.with_label_values(&[error.kind()]).inc();
    }
}

impl RegistersMetrics for CollectorMetrics {
    fn metrics(&self) -> Vec<Box<dyn Collector>> {
        vec![Box::new(self.fetch_errors.clone())]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct BindKey {
    mode: Mode,
    subsystem: String,
    chain_name: String,
}

/// Registry handle shared by every chain of a process.
///
/// Binding is idempotent per factory: asking twice for the same chain, mode
/// and subsystem hands back the gauges created the first time. Instruments
/// that reached the registry some other way are rejected as a duplicate.
#[derive(Clone, Default)]
pub struct MetricsFactory {
    registry: Registry,
    bound: Arc<Mutex<HashMap<BindKey, MetricSet>>>,
}

impl MetricsFactory {
    pub fn new(registry: Registry) -> Self {
        Self {
            registry,
            bound: Arc::default(),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn bind(&self, mode: &Mode, subsystem: &str, target: &ChainTarget) -> Result<MetricSet> {
        let key = BindKey {
            mode: mode.clone(),
            subsystem: subsystem.to_owned(),
            chain_name: target.chain_name.clone(),
        };

        let mut bound = self
            .bound
            .lock()
            .map_err(|_| Error::Other("metric bindings lock poisoned".to_owned()))?;

        if let Some(metric_set) = bound.get(&key) {
            return Ok(metric_set.clone());
        }

        let metric_set = MetricSet::new(subsystem, mode.const_labels(target));
        self.register(&metric_set, mode, target)?;
        bound.insert(key, metric_set.clone());

        Ok(metric_set)
    }

    pub fn register(
        &self,
        metrics: &impl RegistersMetrics,
        mode: &Mode,
        target: &ChainTarget,
    ) -> Result<()> {
        metrics
            .register_metrics(&self.registry)
            .map_err(|err| match err {
                prometheus::Error::AlreadyReg => Error::DuplicateRegistration(format!(
                    "chain '{}' in {mode} mode",
                    target.chain_name
                )),
                other => Error::Configuration(format!(
                    "cannot register metrics for chain '{}' in {mode} mode: {other}",
                    target.chain_name
                )),
            })
    }
}
