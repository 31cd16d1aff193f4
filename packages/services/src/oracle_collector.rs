use std::{num::NonZeroUsize, time::Duration};

use metrics::HealthChecker;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{
    Packager, Result, endpoint_selector::port::LivenessProbe, oracle_metrics::CollectorMetrics,
    polling::schedule_polling,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Time between the end of one cycle and the start of the next, shared by
    /// every chain.
    pub poll_interval: Duration,
    /// Failed fetches in a row before the selected endpoint is dropped.
    pub failures_before_reselect: NonZeroUsize,
    /// Failed cycles in a row before the chain is reported unhealthy.
    pub unhealthy_after_n_errors: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            failures_before_reselect: NonZeroUsize::new(3).expect("3 is not zero"),
            unhealthy_after_n_errors: 3,
        }
    }
}

pub mod service {
    use metrics::{ConnectionHealthTracker, HealthChecker};
    use tracing::{debug, info};

    use super::{
        Config,
        port::{LivenessProbe, OracleApi},
    };
    use crate::{
        Result, Runner,
        endpoint_selector::service::EndpointSelector,
        oracle_metrics::{CollectorMetrics, MetricSet},
        types::{ChainTarget, OracleSnapshot},
    };

    /// One poll cycle per [`Runner::run`]: select an endpoint, fetch the
    /// oracle state, update the gauges.
    pub struct OracleCollector<Api> {
        api: Api,
        target: ChainTarget,
        selector: EndpointSelector,
        metric_set: MetricSet,
        metrics: CollectorMetrics,
        health_tracker: ConnectionHealthTracker,
        verbose: bool,
    }

    impl<Api> OracleCollector<Api>
    where
        Api: OracleApi + LivenessProbe + Send + Sync,
    {
        pub fn new(
            api: Api,
            target: ChainTarget,
            metric_set: MetricSet,
            metrics: CollectorMetrics,
            config: Config,
            verbose: bool,
        ) -> Self {
            let selector =
                EndpointSelector::new(target.endpoints.clone(), config.failures_before_reselect);

            Self {
                api,
                target,
                selector,
                metric_set,
                metrics,
                health_tracker: ConnectionHealthTracker::new(config.unhealthy_after_n_errors),
                verbose,
            }
        }

        #[must_use]
        pub fn connection_health_checker(&self) -> HealthChecker {
            self.health_tracker.tracker()
        }

        /// Gauges are only touched once a full snapshot has been decoded.
        pub async fn poll_once(&mut self) -> Result<OracleSnapshot> {
            match self.fetch_snapshot().await {
                Ok(snapshot) => {
                    self.metric_set.update(&snapshot);
                    self.health_tracker.note_success();
                    if self.verbose {
                        info!(?snapshot, "collected oracle state");
                    } else {
                        debug!(?snapshot, "collected oracle state");
                    }
                    Ok(snapshot)
                }
                Err(err) => {
                    self.metrics.note_error(&err);
                    self.health_tracker.note_failure();
                    Err(err)
                }
            }
        }

        async fn fetch_snapshot(&mut self) -> Result<OracleSnapshot> {
            let endpoint = self.selector.select(&self.api).await?;

            match self.api.fetch(&endpoint, &self.target).await {
                Ok(snapshot) => {
                    self.selector.note_success();
                    Ok(snapshot)
                }
                Err(err) => {
                    self.selector.note_failure();
                    Err(err)
                }
            }
        }
    }

    impl<Api> Runner for OracleCollector<Api>
    where
        Api: OracleApi + LivenessProbe + Send + Sync,
    {
        async fn run(&mut self) -> Result<()> {
            self.poll_once().await.map(|_| ())
        }
    }
}

pub mod port {
    pub use crate::endpoint_selector::port::LivenessProbe;
    use crate::{
        Result,
        types::{ChainTarget, OracleSnapshot, Url},
    };

    #[allow(async_fn_in_trait)]
    #[trait_variant::make(Send)]
    #[cfg_attr(feature = "test-helpers", mockall::automock)]
    pub trait OracleApi {
        /// Rejects chains whose oracle module this api cannot query.
        fn supports(&self, target: &ChainTarget) -> Result<()>;

        async fn fetch(&self, endpoint: &Url, target: &ChainTarget) -> Result<OracleSnapshot>;
    }
}

/// A running collector loop.
pub struct CollectorHandle {
    pub chain_name: String,
    pub join_handle: JoinHandle<()>,
    pub health_checker: HealthChecker,
}

/// Binds the chain's metrics and spawns its polling loop.
///
/// Only setup problems (unsupported chain, duplicate metrics) are returned;
/// everything that goes wrong inside a cycle is logged and retried.
pub fn start<Api>(
    packager: Packager,
    api: Api,
    config: Config,
    cancel_token: CancellationToken,
) -> Result<CollectorHandle>
where
    Api: port::OracleApi + LivenessProbe + Send + Sync + 'static,
{
    let Packager {
        mode,
        factory,
        span,
        verbose,
        subsystem,
        target,
    } = packager;

    api.supports(&target)?;

    let metric_set = factory.bind(&mode, &subsystem, &target)?;
    let collector_metrics = CollectorMetrics::new(&subsystem, mode.const_labels(&target));
    factory.register(&collector_metrics, &mode, &target)?;

    let chain_name = target.chain_name.clone();
    let collector =
        service::OracleCollector::new(api, target, metric_set, collector_metrics, config, verbose);
    let health_checker = collector.connection_health_checker();

    let join_handle = schedule_polling(
        config.poll_interval,
        collector,
        format!("{chain_name} {subsystem} collector"),
        span,
        cancel_token,
    );

    Ok(CollectorHandle {
        chain_name,
        join_handle,
        health_checker,
    })
}

#[cfg(test)]
mod tests {
    use metrics::prometheus::Registry;
    use mockall::predicate::always;
    use pretty_assertions::assert_eq;

    use super::{
        Config,
        port::{MockOracleApi, OracleApi},
        service::OracleCollector,
    };
    use crate::{
        Error, Result,
        endpoint_selector::port::{LivenessProbe, MockLivenessProbe},
        oracle_metrics::{CollectorMetrics, MetricsFactory, SUBSYSTEM},
        types::{ChainTarget, Mode, OracleSnapshot, ProtocolType, Url, nonempty},
    };

    struct FullApiMock {
        probe: MockLivenessProbe,
        api: MockOracleApi,
    }

    impl LivenessProbe for FullApiMock {
        async fn probe(&self, endpoint: &Url) -> Result<()> {
            self.probe.probe(endpoint).await
        }
    }

    impl OracleApi for FullApiMock {
        fn supports(&self, target: &ChainTarget) -> Result<()> {
            self.api.supports(target)
        }

        async fn fetch(&self, endpoint: &Url, target: &ChainTarget) -> Result<OracleSnapshot> {
            self.api.fetch(endpoint, target).await
        }
    }

    fn target() -> ChainTarget {
        ChainTarget {
            chain_id: "umee-1".to_owned(),
            chain_name: "umee".to_owned(),
            display_name: "Umee".to_owned(),
            protocol_type: ProtocolType::Cosmos,
            endpoints: nonempty!["http://localhost:1317".parse().unwrap()],
            validator_operator_address: "umeevaloper1xyz".to_owned(),
        }
    }

    fn snapshot() -> OracleSnapshot {
        OracleSnapshot {
            miss_counter: 3,
            slash_window: 201_600,
            vote_period: 5,
            min_valid_per_window: 2_016,
            vote_window: 40_320,
            block_height: 100,
        }
    }

    fn alive_probe() -> MockLivenessProbe {
        let mut probe = MockLivenessProbe::new();
        probe
            .expect_probe()
            .returning(|_| Box::pin(async { Ok(()) }));
        probe
    }

    fn collector(api: FullApiMock) -> (OracleCollector<FullApiMock>, MetricsFactory) {
        let factory = MetricsFactory::new(Registry::new());
        let metric_set = factory.bind(&Mode::Network, SUBSYSTEM, &target()).unwrap();
        let metrics = CollectorMetrics::new(SUBSYSTEM, Mode::Network.const_labels(&target()));

        let collector = OracleCollector::new(
            api,
            target(),
            metric_set.clone(),
            metrics,
            Config::default(),
            false,
        );
        (collector, factory)
    }

    #[tokio::test]
    async fn successful_cycle_updates_metrics() {
        // given
        let mut api = MockOracleApi::new();
        api.expect_fetch()
            .with(always(), always())
            .once()
            .returning(|_, _| Box::pin(async { Ok(snapshot()) }));
        let (mut sut, factory) = collector(FullApiMock {
            probe: alive_probe(),
            api,
        });
        let metric_set = factory.bind(&Mode::Network, SUBSYSTEM, &target()).unwrap();

        // when
        let result = sut.poll_once().await;

        // then
        assert_eq!(result, Ok(snapshot()));
        assert_eq!(metric_set.miss_counter.with_label_values(&[]).get(), 3);
        assert_eq!(metric_set.block_height.with_label_values(&[]).get(), 100);
        assert!(sut.connection_health_checker().healthy());
    }

    #[tokio::test]
    async fn failed_fetch_keeps_previous_values() {
        // given
        let mut api = MockOracleApi::new();
        let mut calls = 0;
        api.expect_fetch().returning(move |_, _| {
            calls += 1;
            let result = if calls == 1 {
                Ok(snapshot())
            } else {
                Err(Error::PartialData("negative miss counter".to_owned()))
            };
            Box::pin(async move { result })
        });
        let (mut sut, factory) = collector(FullApiMock {
            probe: alive_probe(),
            api,
        });
        let metric_set = factory.bind(&Mode::Network, SUBSYSTEM, &target()).unwrap();
        sut.poll_once().await.unwrap();

        // when
        let result = sut.poll_once().await;

        // then
        assert!(matches!(result, Err(Error::PartialData(_))));
        assert_eq!(metric_set.miss_counter.with_label_values(&[]).get(), 3);
        assert_eq!(metric_set.vote_window.with_label_values(&[]).get(), 40_320);
    }

    #[tokio::test]
    async fn no_healthy_endpoint_skips_the_fetch() {
        // given
        let mut probe = MockLivenessProbe::new();
        probe.expect_probe().returning(|endpoint| {
            let endpoint = endpoint.to_string();
            Box::pin(async move { Err(Error::Unreachable(endpoint)) })
        });
        let mut api = MockOracleApi::new();
        api.expect_fetch().never();
        let (mut sut, _factory) = collector(FullApiMock { probe, api });

        // when
        let result = sut.poll_once().await;

        // then
        assert_eq!(result, Err(Error::NoHealthyEndpoint { candidates: 1 }));
    }

    #[tokio::test]
    async fn repeated_failures_make_the_chain_unhealthy() {
        // given
        let mut api = MockOracleApi::new();
        api.expect_fetch().returning(|_, _| {
            Box::pin(async { Err(Error::Unreachable("connection reset".to_owned())) })
        });
        let (mut sut, _factory) = collector(FullApiMock {
            probe: alive_probe(),
            api,
        });
        let health = sut.connection_health_checker();

        // when
        for _ in 0..Config::default().unhealthy_after_n_errors {
            let _ = sut.poll_once().await;
        }

        // then
        assert!(!health.healthy());
    }
}
