pub mod endpoint_selector;
pub mod health_reporter;
pub mod oracle_collector;
pub mod oracle_metrics;
pub mod packager;
pub mod polling;
pub mod types;

pub use health_reporter::HealthReporter;
pub use oracle_collector::{CollectorHandle, start};
pub use packager::Packager;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("none of the {candidates} candidate endpoints passed the liveness probe")]
    NoHealthyEndpoint { candidates: usize },
    #[error("endpoint unreachable: {0}")]
    Unreachable(String),
    #[error("failed to decode response: {0}")]
    Decode(String),
    #[error("response carried out of domain data: {0}")]
    PartialData(String),
    #[error("metrics already registered: {0}")]
    DuplicateRegistration(String),
    #[error("invalid configuration: {0}")]
    Configuration(String),
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Short, stable name of the error, used as a log field and a metric label.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NoHealthyEndpoint { .. } => "no_healthy_endpoint",
            Self::Unreachable(_) => "unreachable",
            Self::Decode(_) => "decode_error",
            Self::PartialData(_) => "partial_data",
            Self::DuplicateRegistration(_) => "duplicate_registration",
            Self::Configuration(_) => "configuration",
            Self::Other(_) => "other",
        }
    }

    /// Per-cycle failures are retried on the next cycle, everything else is a
    /// setup problem.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NoHealthyEndpoint { .. }
                | Self::Unreachable(_)
                | Self::Decode(_)
                | Self::PartialData(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[allow(async_fn_in_trait)]
#[trait_variant::make(Send)]
pub trait Runner: Send + Sync {
    async fn run(&mut self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case(Error::NoHealthyEndpoint { candidates: 2 }, true; "no healthy endpoint")]
    #[test_case(Error::Unreachable("timeout".into()), true; "unreachable")]
    #[test_case(Error::Decode("bad json".into()), true; "decode")]
    #[test_case(Error::PartialData("negative".into()), true; "partial data")]
    #[test_case(Error::DuplicateRegistration("umee".into()), false; "duplicate registration")]
    #[test_case(Error::Configuration("no endpoints".into()), false; "configuration")]
    fn classifies_retryable_errors(error: Error, retryable: bool) {
        assert_eq!(error.is_retryable(), retryable);
    }
}
