//! Bounded-duration predicate polling.
//!
//! A [`Poller`] re-evaluates an async predicate on a fixed interval until it
//! reports completion, fails, or the maximum duration elapses. Cancellation
//! reaches a polling loop only through the predicate: a predicate that
//! observes its round is no longer live returns an error, which ends the
//! loop and is handed back to the caller unchanged.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::{Instant, MissedTickBehavior, interval_at, sleep_until};

/// Smallest interval accepted by the underlying ticker.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Reasons a poll did not end with the predicate reporting completion.
#[derive(Debug, Error)]
pub enum PollError<E> {
    #[error("polling timed out after {0:?}")]
    Timeout(Duration),
    #[error("{0}")]
    Predicate(E),
}

/// Repeated predicate evaluation bounded by a maximum duration.
///
/// Pollers hold no shared state; nesting one inside a predicate of another
/// is fine and each keeps its own timer.
#[derive(Debug, Clone, Copy)]
pub struct Poller {
    max_duration: Duration,
    interval: Duration,
    immediate: bool,
}

impl Poller {
    pub fn new(max_duration: Duration, interval: Duration) -> Self {
        Self {
            max_duration,
            interval: interval.max(MIN_INTERVAL),
            immediate: false,
        }
    }

    /// Also evaluate the predicate once before the first interval tick.
    pub fn immediate(mut self, immediate: bool) -> Self {
        self.immediate = immediate;
        self
    }

    pub fn max_duration(&self) -> Duration {
        self.max_duration
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Drive the predicate until `Ok(true)`, an error, or the deadline.
    ///
    /// The deadline is only observed between invocations; a predicate that is
    /// already running is allowed to finish.
    pub async fn run<F, Fut, E>(&self, mut predicate: F) -> Result<(), PollError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<bool, E>>,
    {
        let start = Instant::now();
        // too far out to represent means unbounded
        let deadline = start.checked_add(self.max_duration);

        if self.immediate && predicate().await.map_err(PollError::Predicate)? {
            return Ok(());
        }

        let mut ticker = interval_at(start + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let elapsed = start.elapsed();
            if elapsed >= self.max_duration {
                return Err(PollError::Timeout(elapsed));
            }

            match deadline {
                Some(deadline) => tokio::select! {
                    biased;
                    _ = ticker.tick() => {}
                    _ = sleep_until(deadline) => return Err(PollError::Timeout(start.elapsed())),
                },
                None => {
                    ticker.tick().await;
                }
            }

            if predicate().await.map_err(PollError::Predicate)? {
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, PartialEq)]
    struct Stop(&'static str);

    impl std::fmt::Display for Stop {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str(self.0)
        }
    }

    fn counter() -> Arc<AtomicUsize> {
        Arc::new(AtomicUsize::new(0))
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_with_bounded_invocations() {
        let calls = counter();
        let poller = Poller::new(Duration::from_millis(1000), Duration::from_millis(300))
            .immediate(true);
        let start = Instant::now();

        let result = poller
            .run(|| {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, Stop>(false)
                }
            })
            .await;

        assert!(matches!(result, Err(PollError::Timeout(_))));
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(1000));
        assert!(elapsed < Duration::from_millis(1300));
        // ceil(1000 / 300) + 1
        assert!(calls.load(Ordering::SeqCst) <= 5);
    }

    #[tokio::test(start_paused = true)]
    async fn completes_on_first_success() {
        let calls = counter();
        let poller = Poller::new(Duration::from_secs(10), Duration::from_millis(100));
        let start = Instant::now();

        let result = poller
            .run(|| {
                let calls = calls.clone();
                async move { Ok::<_, Stop>(calls.fetch_add(1, Ordering::SeqCst) + 1 == 3) }
            })
            .await;

        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(300));
        assert!(elapsed < Duration::from_millis(400));
    }

    #[tokio::test(start_paused = true)]
    async fn predicate_error_is_propagated() {
        let poller = Poller::new(Duration::from_secs(10), Duration::from_millis(100));

        let result = poller
            .run(|| async { Err::<bool, _>(Stop("round aborted")) })
            .await;

        match result {
            Err(PollError::Predicate(err)) => assert_eq!(err, Stop("round aborted")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn immediate_success_skips_the_ticker() {
        let poller =
            Poller::new(Duration::from_secs(1), Duration::from_millis(500)).immediate(true);
        let start = Instant::now();

        let result = poller.run(|| async { Ok::<_, Stop>(true) }).await;

        assert!(result.is_ok());
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn unbounded_duration_polls_until_success() {
        let calls = counter();
        let poller = Poller::new(Duration::MAX, Duration::from_millis(1)).immediate(true);

        let first = poller.run(|| async { Ok::<_, Stop>(true) }).await;
        assert!(first.is_ok());

        let result = poller
            .run(|| {
                let calls = calls.clone();
                async move { Ok::<_, Stop>(calls.fetch_add(1, Ordering::SeqCst) == 4) }
            })
            .await;
        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn pollers_nest_with_independent_timers() {
        let outer = Poller::new(Duration::from_secs(5), Duration::from_millis(200));
        let inner_runs = counter();

        let result = outer
            .run(|| {
                let inner_runs = inner_runs.clone();
                async move {
                    let inner = Poller::new(Duration::from_millis(250), Duration::from_millis(100));
                    let timed_out = matches!(
                        inner.run(|| async { Ok::<_, Stop>(false) }).await,
                        Err(PollError::Timeout(_))
                    );
                    Ok::<_, Stop>(timed_out && inner_runs.fetch_add(1, Ordering::SeqCst) == 1)
                }
            })
            .await;

        assert!(result.is_ok());
        assert_eq!(inner_runs.load(Ordering::SeqCst), 2);
    }
}
