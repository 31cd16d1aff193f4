pub mod service {
    use std::num::NonZeroUsize;

    use tracing::{debug, info, warn};

    use super::port::LivenessProbe;
    use crate::{
        Error, Result,
        types::{NonEmpty, Url},
    };

    /// Cursor over the candidate endpoints of a single chain.
    #[derive(Debug, Clone, Default, PartialEq, Eq)]
    pub struct EndpointState {
        pub selected: Option<usize>,
        pub consecutive_failures: usize,
        /// Endpoint dropped after persistent failures, tried last on the next
        /// resolution.
        pub demoted: Option<usize>,
    }

    /// Picks the first live endpoint in declared order and sticks with it
    /// until it stops answering the liveness probe or fails too many fetches
    /// in a row.
    #[derive(Debug, Clone)]
    pub struct EndpointSelector {
        candidates: NonEmpty<Url>,
        failures_before_reselect: NonZeroUsize,
        state: EndpointState,
    }

    impl EndpointSelector {
        pub fn new(candidates: NonEmpty<Url>, failures_before_reselect: NonZeroUsize) -> Self {
            Self {
                candidates,
                failures_before_reselect,
                state: EndpointState::default(),
            }
        }

        pub fn state(&self) -> &EndpointState {
            &self.state
        }

        pub fn selected(&self) -> Option<&Url> {
            self.state
                .selected
                .and_then(|idx| self.candidates.get(idx))
        }

        pub async fn select<P>(&mut self, probe: &P) -> Result<Url>
        where
            P: LivenessProbe + Sync,
        {
            // probed already in this pass
            let mut just_failed = None;
            if let Some(endpoint) = self.selected().cloned() {
                match probe.probe(&endpoint).await {
                    Ok(()) => {
                        debug!("reusing endpoint '{endpoint}'");
                        return Ok(endpoint);
                    }
                    Err(err) => {
                        warn!("selected endpoint '{endpoint}' failed the liveness probe: {err}");
                        just_failed = self.state.selected.take();
                        self.state.consecutive_failures = 0;
                    }
                }
            }

            for idx in self
                .resolution_order()
                .filter(|idx| Some(*idx) != just_failed)
            {
                let Some(endpoint) = self.candidates.get(idx).cloned() else {
                    continue;
                };

                match probe.probe(&endpoint).await {
                    Ok(()) => {
                        info!("selected endpoint '{endpoint}'");
                        self.state = EndpointState {
                            selected: Some(idx),
                            consecutive_failures: 0,
                            demoted: None,
                        };
                        return Ok(endpoint);
                    }
                    Err(err) => {
                        debug!("endpoint '{endpoint}' failed the liveness probe: {err}");
                    }
                }
            }

            Err(Error::NoHealthyEndpoint {
                candidates: self.candidates.len(),
            })
        }

        /// A fetch against the selected endpoint failed.
        pub fn note_failure(&mut self) {
            if self.state.selected.is_none() {
                return;
            }

            self.state.consecutive_failures += 1;
            if self.state.consecutive_failures >= self.failures_before_reselect.get() {
                if let Some(endpoint) = self.selected() {
                    info!(
                        "endpoint '{endpoint}' failed {} fetches in a row, re-resolving",
                        self.state.consecutive_failures
                    );
                }
                self.state.demoted = self.state.selected.take();
                self.state.consecutive_failures = 0;
            }
        }

        pub fn note_success(&mut self) {
            self.state.consecutive_failures = 0;
        }

        fn resolution_order(&self) -> impl Iterator<Item = usize> + use<> {
            let demoted = self.state.demoted;
            (0..self.candidates.len())
                .filter(move |idx| Some(*idx) != demoted)
                .chain(demoted)
        }
    }
}

pub mod port {
    use crate::{Result, types::Url};

    #[allow(async_fn_in_trait)]
    #[trait_variant::make(Send)]
    #[cfg_attr(feature = "test-helpers", mockall::automock)]
    pub trait LivenessProbe {
        /// Cheap request telling whether the endpoint is worth fetching from.
        async fn probe(&self, endpoint: &Url) -> Result<()>;
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use mockall::predicate::eq;
    use pretty_assertions::assert_eq;

    use super::{
        port::MockLivenessProbe,
        service::{EndpointSelector, EndpointState},
    };
    use crate::{
        Error,
        types::{NonEmpty, Url, nonempty},
    };

    fn url(host: &str) -> Url {
        format!("http://{host}:1317").parse().unwrap()
    }

    fn candidates() -> NonEmpty<Url> {
        nonempty![url("a"), url("b"), url("c")]
    }

    fn probe_with(up: &'static [&'static str]) -> MockLivenessProbe {
        let mut probe = MockLivenessProbe::new();
        probe.expect_probe().returning(move |endpoint| {
            let alive = up.contains(&endpoint.host_str().unwrap_or_default());
            let endpoint = endpoint.to_string();
            Box::pin(async move {
                if alive {
                    Ok(())
                } else {
                    Err(Error::Unreachable(endpoint))
                }
            })
        });
        probe
    }

    fn selector(candidates: NonEmpty<Url>, failures_before_reselect: usize) -> EndpointSelector {
        EndpointSelector::new(
            candidates,
            NonZeroUsize::new(failures_before_reselect).unwrap(),
        )
    }

    #[tokio::test]
    async fn picks_first_live_endpoint_in_declared_order() {
        // given
        let probe = probe_with(&["b", "c"]);
        let mut sut = selector(candidates(), 3);

        // when
        let mut picks = vec![];
        for _ in 0..5 {
            picks.push(sut.select(&probe).await.unwrap());
        }

        // then
        assert!(picks.iter().all(|pick| pick == &url("b")));
    }

    #[tokio::test]
    async fn reuses_selection_without_probing_earlier_candidates() {
        // given
        let mut probe = MockLivenessProbe::new();
        probe
            .expect_probe()
            .with(eq(url("a")))
            .once()
            .returning(|_| Box::pin(async { Ok(()) }));
        let mut sut = selector(candidates(), 3);
        sut.select(&probe).await.unwrap();

        // then the second selection probes only the cached endpoint
        probe.checkpoint();
        probe
            .expect_probe()
            .with(eq(url("a")))
            .once()
            .returning(|_| Box::pin(async { Ok(()) }));

        // when
        let selected = sut.select(&probe).await.unwrap();

        // then
        assert_eq!(selected, url("a"));
    }

    #[tokio::test]
    async fn fails_when_no_candidate_is_alive() {
        // given
        let probe = probe_with(&[]);
        let mut sut = selector(candidates(), 3);

        // when
        let result = sut.select(&probe).await;

        // then
        assert_eq!(result, Err(Error::NoHealthyEndpoint { candidates: 3 }));
        assert_eq!(sut.state(), &EndpointState::default());
    }

    #[tokio::test]
    async fn falls_back_to_next_candidate_when_selection_dies() {
        // given
        let mut sut = selector(candidates(), 3);
        sut.select(&probe_with(&["a", "b"])).await.unwrap();

        // when
        let selected = sut.select(&probe_with(&["b"])).await.unwrap();

        // then
        assert_eq!(selected, url("b"));
    }

    #[tokio::test]
    async fn dead_selection_is_probed_once_per_pass() {
        // given
        let mut probe = MockLivenessProbe::new();
        probe
            .expect_probe()
            .with(eq(url("a")))
            .once()
            .returning(|_| Box::pin(async { Ok(()) }));
        let mut sut = selector(candidates(), 3);
        sut.select(&probe).await.unwrap();
        probe.checkpoint();
        probe
            .expect_probe()
            .with(eq(url("a")))
            .once()
            .returning(|endpoint| {
                let endpoint = endpoint.to_string();
                Box::pin(async move { Err(Error::Unreachable(endpoint)) })
            });
        probe
            .expect_probe()
            .with(eq(url("b")))
            .once()
            .returning(|_| Box::pin(async { Ok(()) }));

        // when
        let selected = sut.select(&probe).await.unwrap();

        // then
        assert_eq!(selected, url("b"));
    }

    #[tokio::test]
    async fn persistent_fetch_failures_demote_the_selection() {
        // given
        let probe = probe_with(&["a", "b"]);
        let mut sut = selector(candidates(), 2);
        sut.select(&probe).await.unwrap();

        // when
        sut.note_failure();
        sut.note_failure();

        // then
        assert_eq!(sut.selected(), None);
        assert_eq!(sut.select(&probe).await.unwrap(), url("b"));
    }

    #[tokio::test]
    async fn demoted_endpoint_is_used_when_nothing_else_answers() {
        // given
        let mut sut = selector(candidates(), 1);
        sut.select(&probe_with(&["a"])).await.unwrap();
        sut.note_failure();

        // when
        let selected = sut.select(&probe_with(&["a"])).await.unwrap();

        // then
        assert_eq!(selected, url("a"));
    }

    #[tokio::test]
    async fn success_resets_failure_count() {
        // given
        let probe = probe_with(&["a", "b"]);
        let mut sut = selector(candidates(), 2);
        sut.select(&probe).await.unwrap();

        // when
        sut.note_failure();
        sut.note_success();
        sut.note_failure();

        // then
        assert_eq!(sut.selected(), Some(&url("a")));
        assert_eq!(sut.state().consecutive_failures, 1);
    }
}
