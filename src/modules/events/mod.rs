//! Round lifecycle events.
//!
//! The executor publishes an event at each round boundary; handlers turn
//! them into logs, metrics, or custom reactions.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

use super::metrics::RoundMetrics;
use crate::executor::RoundOutcome;

#[derive(Debug, Clone)]
pub struct RoundStartedEvent {
    pub strategy: String,
    pub round: u32,
    pub total: u32,
    pub timestamp: DateTime<Utc>,
}

/// The deadline passed; the strategy has been asked to abort but the round
/// has not unwound yet.
#[derive(Debug, Clone)]
pub struct RoundTimedOutEvent {
    pub strategy: String,
    pub round: u32,
    pub elapsed: Duration,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct RoundFinishedEvent {
    pub strategy: String,
    pub round: u32,
    pub outcome: RoundOutcome,
    pub elapsed: Duration,
    /// Running tally including this round.
    pub successes: u32,
    pub failures: u32,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct RunHaltedEvent {
    pub strategy: String,
    pub completed: u32,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub enum RoundEvent {
    Started(RoundStartedEvent),
    TimedOut(RoundTimedOutEvent),
    Finished(RoundFinishedEvent),
    Halted(RunHaltedEvent),
}

/// Trait implemented by event handlers.
pub trait EventHandler: Send + Sync {
    fn handle(&self, event: &RoundEvent);
}

/// Dispatcher that broadcasts events to registered handlers.
#[derive(Default, Clone)]
pub struct EventDispatcher {
    handlers: Vec<Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    pub fn register_handler(&mut self, handler: Arc<dyn EventHandler>) {
        self.handlers.push(handler);
    }

    pub fn dispatch(&self, event: RoundEvent) {
        for handler in &self.handlers {
            handler.handle(&event);
        }
    }
}

/// Logs events using the `log` crate.
#[derive(Debug)]
pub struct LoggingHandler;

impl EventHandler for LoggingHandler {
    fn handle(&self, event: &RoundEvent) {
        match event {
            RoundEvent::Started(started) => {
                log::info!(
                    "[executor] starting round {}/{} of {}",
                    started.round,
                    started.total,
                    started.strategy
                );
            }
            RoundEvent::TimedOut(timeout) => {
                log::warn!(
                    "[executor] round {} ran {:.2} min and hit the deadline, aborting",
                    timeout.round,
                    timeout.elapsed.as_secs_f64() / 60.0
                );
            }
            RoundEvent::Finished(finished) => {
                log::info!(
                    "[executor] round {} {} in {:.1}s",
                    finished.round,
                    finished.outcome,
                    finished.elapsed.as_secs_f64()
                );
                log::info!(
                    "[executor] {} round(s) done, {} succeeded, {} failed",
                    finished.successes + finished.failures,
                    finished.successes,
                    finished.failures
                );
            }
            RoundEvent::Halted(halted) => {
                log::info!(
                    "[executor] run of {} halted after {} round(s)",
                    halted.strategy,
                    halted.completed
                );
            }
        }
    }
}

/// Metrics handler that feeds the round metrics collector.
#[derive(Clone, Debug)]
pub struct MetricsHandler {
    metrics: RoundMetrics,
}

impl MetricsHandler {
    pub fn new(metrics: RoundMetrics) -> Self {
        Self { metrics }
    }
}

impl EventHandler for MetricsHandler {
    fn handle(&self, event: &RoundEvent) {
        if let RoundEvent::Finished(finished) = event {
            self.metrics
                .record_round(&finished.strategy, finished.outcome, finished.elapsed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingHandler(std::sync::Mutex<usize>);

    impl EventHandler for CountingHandler {
        fn handle(&self, _event: &RoundEvent) {
            *self.0.lock().unwrap() += 1;
        }
    }

    fn finished(outcome: RoundOutcome, millis: u64) -> RoundEvent {
        RoundEvent::Finished(RoundFinishedEvent {
            strategy: "sheep-normal".into(),
            round: 1,
            outcome,
            elapsed: Duration::from_millis(millis),
            successes: 1,
            failures: 0,
            timestamp: Utc::now(),
        })
    }

    #[test]
    fn dispatches_to_handlers() {
        let mut dispatcher = EventDispatcher::new();
        let counter = Arc::new(CountingHandler(std::sync::Mutex::new(0)));
        dispatcher.register_handler(counter.clone());
        dispatcher.register_handler(Arc::new(LoggingHandler));
        dispatcher.dispatch(RoundEvent::Halted(RunHaltedEvent {
            strategy: "sheep-normal".into(),
            completed: 2,
            timestamp: Utc::now(),
        }));
        assert_eq!(*counter.0.lock().unwrap(), 1);
    }

    #[test]
    fn metrics_handler_records_finished_rounds_only() {
        let metrics = RoundMetrics::new();
        let handler = MetricsHandler::new(metrics.clone());
        handler.handle(&finished(RoundOutcome::Success, 1200));
        handler.handle(&RoundEvent::TimedOut(RoundTimedOutEvent {
            strategy: "sheep-normal".into(),
            round: 2,
            elapsed: Duration::from_secs(900),
            timestamp: Utc::now(),
        }));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.rounds, 1);
        assert_eq!(snapshot.successes, 1);
    }
}
