//! Hybrid sleep used by timed holds and waits.
//!
//! The scheduler's timer resolution is too coarse for key releases that must
//! land within a few milliseconds of their target. The bulk of a wait is
//! spent in a regular `tokio` sleep and only the tail below
//! `spin_threshold` is spun, yielding to the runtime on every iteration so
//! monitors and sub-tasks keep making progress.

use std::time::Duration;

use tokio::time::{Instant, sleep};

/// Sleep for `duration`, spinning through the final `spin_threshold`.
///
/// A zero threshold degrades to a plain `tokio` sleep.
pub async fn precise_sleep(duration: Duration, spin_threshold: Duration) {
    let start = Instant::now();

    if duration > spin_threshold {
        sleep(duration - spin_threshold).await;
    }

    while start.elapsed() < duration {
        std::hint::spin_loop();
        tokio::task::yield_now().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn spins_through_the_tail() {
        let start = std::time::Instant::now();
        precise_sleep(Duration::from_millis(40), Duration::from_millis(25)).await;
        assert!(start.elapsed() >= Duration::from_millis(40));
    }

    #[tokio::test]
    async fn short_waits_are_spun_entirely() {
        let start = std::time::Instant::now();
        precise_sleep(Duration::from_millis(5), Duration::from_millis(500)).await;
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(5));
        assert!(elapsed < Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_threshold_is_a_plain_sleep() {
        let start = Instant::now();
        precise_sleep(Duration::from_millis(750), Duration::ZERO).await;
        assert!(start.elapsed() >= Duration::from_millis(750));
    }
}
