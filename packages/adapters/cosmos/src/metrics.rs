use metrics::{
    RegistersMetrics,
    prometheus::{IntCounterVec, Opts, core::Collector},
};

#[derive(Clone)]
pub struct Metrics {
    pub oracle_api_network_errors: IntCounterVec,
}

impl RegistersMetrics for Metrics {
    fn metrics(&self) -> Vec<Box<dyn Collector>> {
        vec![Box::new(self.oracle_api_network_errors.clone())]
    }
}

impl Default for Metrics {
    fn default() -> Self {
        let oracle_api_network_errors = IntCounterVec::new(
            Opts::new(
                "oracle_api_network_errors",
                "Number of network errors encountered while querying chain REST APIs.",
            ),
            &["endpoint"],
        )
        .expect("oracle_api_network_errors metric to be correctly configured");

        Self {
            oracle_api_network_errors,
        }
    }
}
