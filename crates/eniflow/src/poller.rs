//! Fixed-interval polling until a target state is observed
//!
//! Every "wait for the provider to catch up" step of the reconciler is a
//! [`Probe`] handed to [`Poller::poll`]. The poller owns the clock; probes
//! only report what they saw.

use crate::error::{EniError, Result};
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::{Instant, sleep};

/// Stand-in deadline for timeouts too large to add to the clock
const FAR_FUTURE: Duration = Duration::from_secs(30 * 365 * 24 * 60 * 60);

/// Outcome of a single probe
#[derive(Debug)]
pub enum PollResult<T> {
    /// Target not reached yet; carries what was observed instead
    Continue(String),
    /// Target reached
    Done(T),
    /// Target can no longer be reached
    Failed(EniError),
}

/// One observation of provider state
#[async_trait]
pub trait Probe: Send {
    type Output: Send;

    async fn probe(&mut self) -> PollResult<Self::Output>;
}

/// Bounded-time polling primitive
#[derive(Debug, Clone, Copy)]
pub struct Poller {
    interval: Duration,
}

impl Poller {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Probe until `Done` or `Failed`, sleeping a fixed interval in between.
    ///
    /// The first probe runs immediately and a last probe runs at the
    /// deadline; if that one still says `Continue`, the result is
    /// [`EniError::Timeout`] carrying its observation.
    pub async fn poll<P: Probe>(
        &self,
        entity: &str,
        target: &str,
        timeout: Duration,
        probe: &mut P,
    ) -> Result<P::Output> {
        let started = Instant::now();
        let deadline = started
            .checked_add(timeout)
            .unwrap_or_else(|| started + FAR_FUTURE);
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let observed = match probe.probe().await {
                PollResult::Done(output) => {
                    tracing::debug!(
                        "{} reached '{}' after {} probe(s) in {:?}",
                        entity,
                        target,
                        attempt,
                        started.elapsed()
                    );
                    return Ok(output);
                }
                PollResult::Failed(err) => return Err(err),
                PollResult::Continue(observed) => observed,
            };

            let now = Instant::now();
            if now >= deadline {
                tracing::warn!(
                    "Gave up waiting for {} to {} after {} probe(s): {}",
                    entity,
                    target,
                    attempt,
                    observed
                );
                return Err(EniError::Timeout {
                    entity: entity.to_string(),
                    target: target.to_string(),
                    waited: now - started,
                    last_observed: observed,
                });
            }

            tracing::debug!(
                attempt,
                "Waiting for {} to {}: {}",
                entity,
                target,
                observed
            );
            sleep(self.interval.min(deadline - now)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Replays a fixed script of results, then keeps saying Continue
    struct Scripted {
        script: Vec<PollResult<&'static str>>,
        calls: u32,
    }

    impl Scripted {
        fn new(mut script: Vec<PollResult<&'static str>>) -> Self {
            script.reverse();
            Self { script, calls: 0 }
        }
    }

    #[async_trait]
    impl Probe for Scripted {
        type Output = &'static str;

        async fn probe(&mut self) -> PollResult<&'static str> {
            self.calls += 1;
            self.script
                .pop()
                .unwrap_or_else(|| PollResult::Continue("still waiting".to_string()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_done_after_continues() {
        let poller = Poller::new(Duration::from_secs(5));
        let mut probe = Scripted::new(vec![
            PollResult::Continue("Creating".to_string()),
            PollResult::Continue("Creating".to_string()),
            PollResult::Done("Available"),
        ]);

        let started = Instant::now();
        let result = poller
            .poll("eni-001", "become Available", Duration::from_secs(60), &mut probe)
            .await
            .unwrap();

        assert_eq!(result, "Available");
        assert_eq!(probe.calls, 3);
        assert!(started.elapsed() >= Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_stops_immediately() {
        let poller = Poller::new(Duration::from_secs(5));
        let mut probe = Scripted::new(vec![PollResult::Failed(EniError::InvalidConfig(
            "boom".to_string(),
        ))]);

        let err = poller
            .poll("eni-001", "disappear", Duration::from_secs(60), &mut probe)
            .await
            .unwrap_err();

        assert!(matches!(err, EniError::InvalidConfig(_)));
        assert_eq!(probe.calls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbounded_timeout_does_not_overflow() {
        let poller = Poller::new(Duration::from_secs(5));
        let mut probe = Scripted::new(vec![
            PollResult::Continue("Creating".to_string()),
            PollResult::Done("Available"),
        ]);

        let result = poller
            .poll("eni-001", "become Available", Duration::MAX, &mut probe)
            .await
            .unwrap();

        assert_eq!(result, "Available");
        assert_eq!(probe.calls, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_reports_last_observation() {
        let poller = Poller::new(Duration::from_secs(5));
        let mut probe = Scripted::new(vec![]);

        let started = Instant::now();
        let err = poller
            .poll("eni-001", "attach to i-001", Duration::from_secs(12), &mut probe)
            .await
            .unwrap_err();

        match err {
            EniError::Timeout {
                entity,
                waited,
                last_observed,
                ..
            } => {
                assert_eq!(entity, "eni-001");
                assert!(waited >= Duration::from_secs(12));
                assert_eq!(last_observed, "still waiting");
            }
            other => panic!("expected timeout, got {:?}", other),
        }
        // t=0, 5, 10 and a final probe at the 12s deadline
        assert_eq!(probe.calls, 4);
        assert!(started.elapsed() < Duration::from_secs(13));
    }
}
