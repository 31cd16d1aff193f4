mod connection_health_tracker;
pub use connection_health_tracker::*;
pub use prometheus;

pub type HealthChecker = Box<dyn HealthCheck>;
pub trait HealthCheck: Send + Sync {
    fn healthy(&self) -> bool;
}

pub use prometheus::{Registry, core::Collector};

pub trait RegistersMetrics {
    /// Registers every collector returned by [`RegistersMetrics::metrics`].
    ///
    /// Either all of them end up in the registry or none do: if one is
    /// rejected, the ones registered before it are taken out again.
    fn register_metrics(&self, registry: &Registry) -> prometheus::Result<()> {
        let mut registered = 0;
        for metric in self.metrics() {
            if let Err(err) = registry.register(metric) {
                self.metrics()
                    .into_iter()
                    .take(registered)
                    .for_each(|metric| {
                        let _ = registry.unregister(metric);
                    });
                return Err(err);
            }
            registered += 1;
        }

        Ok(())
    }

    fn metrics(&self) -> Vec<Box<dyn Collector>>;
}
