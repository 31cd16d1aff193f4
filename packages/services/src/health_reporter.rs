use std::collections::BTreeMap;

use metrics::HealthChecker;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthReport {
    chains: BTreeMap<String, bool>,
}

impl HealthReport {
    pub fn healthy(&self) -> bool {
        self.chains.values().all(|healthy| *healthy)
    }
}

#[derive(Default)]
pub struct HealthReporter {
    chains: BTreeMap<String, HealthChecker>,
}

impl HealthReporter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&mut self, chain_name: impl Into<String>, health_check: HealthChecker) {
        self.chains.insert(chain_name.into(), health_check);
    }

    #[must_use]
    pub fn report(&self) -> HealthReport {
        HealthReport {
            chains: self
                .chains
                .iter()
                .map(|(chain, check)| (chain.clone(), check.healthy()))
                .collect(),
        }
    }
}
