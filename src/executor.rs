//! Round driver.
//!
//! Runs a strategy for a fixed number of rounds. Each round gets a fresh
//! [`StrategyContext`], runs as its own task, and races a deadline and the
//! run signal. Cancellation is cooperative: on timeout or stop the strategy
//! is aborted and the executor waits for the round task to unwind before
//! moving on.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use thiserror::Error;
use tokio::task::JoinError;
use tokio::time::{Instant, sleep};

use crate::config::{ConfigError, ExecutionConfig};
use crate::control::{RunSignal, RunState};
use crate::external::GameSession;
use crate::modules::events::{
    EventDispatcher, EventHandler, LoggingHandler, RoundEvent, RoundFinishedEvent,
    RoundStartedEvent, RoundTimedOutEvent, RunHaltedEvent,
};
use crate::strategy::{AbortSignal, Strategy, StrategyContext, StrategyError};

/// Errors that prevent a run from starting.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("run signal is {0}, expected running")]
    NotRunning(RunState),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Init(#[from] StrategyError),
}

/// Why a round ended. Only `Success` counts as a success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoundOutcome {
    Success,
    Failure,
    Timeout,
    Interrupted,
}

impl RoundOutcome {
    pub fn is_success(self) -> bool {
        self == RoundOutcome::Success
    }
}

impl fmt::Display for RoundOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            RoundOutcome::Success => "succeeded",
            RoundOutcome::Failure => "failed",
            RoundOutcome::Timeout => "timed out",
            RoundOutcome::Interrupted => "was interrupted",
        };
        f.write_str(text)
    }
}

/// Rounds attempted, succeeded and failed during one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionResult {
    pub times: u32,
    pub success: u32,
    pub fail: u32,
}

impl ExecutionResult {
    fn record(&mut self, outcome: RoundOutcome) {
        if outcome.is_success() {
            self.success += 1;
        } else {
            self.fail += 1;
        }
        self.times += 1;
    }
}

pub struct Executor {
    config: ExecutionConfig,
    events: EventDispatcher,
    result: ExecutionResult,
}

impl Executor {
    /// Executor reporting through a [`LoggingHandler`].
    pub fn new(config: ExecutionConfig) -> Self {
        let mut events = EventDispatcher::new();
        events.register_handler(Arc::new(LoggingHandler));
        Self::with_events(config, events)
    }

    pub fn with_events(config: ExecutionConfig, events: EventDispatcher) -> Self {
        Self {
            config,
            events,
            result: ExecutionResult::default(),
        }
    }

    pub fn register_handler(&mut self, handler: Arc<dyn EventHandler>) {
        self.events.register_handler(handler);
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    /// Tally so far; keeps growing across calls to [`Executor::run`].
    pub fn result(&self) -> ExecutionResult {
        self.result
    }

    /// Run `strategy` for the configured number of rounds.
    ///
    /// Returns early, with the rounds completed so far, if `signal` is
    /// stopped. A stop that lands mid-round aborts that round first. The
    /// interval is only slept between rounds, never after the last one.
    pub async fn run(
        &mut self,
        strategy: Arc<dyn Strategy>,
        session: Arc<dyn GameSession>,
        signal: &RunSignal,
        data: Option<Value>,
    ) -> Result<ExecutionResult, ExecutorError> {
        if !signal.is_running() {
            log::error!("[executor] no running controller, refusing to start");
            return Err(ExecutorError::NotRunning(signal.state()));
        }
        self.config.validate()?;
        strategy.init().await?;

        let key = strategy.key();
        let total = self.config.times;
        for index in 0..total {
            if !signal.is_running() {
                self.halt(&key);
                return Ok(self.result);
            }

            let round = self.result.times + 1;
            self.events.dispatch(RoundEvent::Started(RoundStartedEvent {
                strategy: key.clone(),
                round,
                total,
                timestamp: Utc::now(),
            }));

            let started = Instant::now();
            let ctx = Arc::new(StrategyContext::new(session.clone(), round));
            let outcome = self
                .run_round(&strategy, ctx, signal, data.clone(), &key, started)
                .await;
            session.release_all_keys();

            self.result.record(outcome);
            self.events.dispatch(RoundEvent::Finished(RoundFinishedEvent {
                strategy: key.clone(),
                round,
                outcome,
                elapsed: started.elapsed(),
                successes: self.result.success,
                failures: self.result.fail,
                timestamp: Utc::now(),
            }));

            if outcome == RoundOutcome::Interrupted {
                self.halt(&key);
                return Ok(self.result);
            }

            let last = index + 1 == total;
            if !last && !self.config.interval.is_zero() {
                tokio::select! {
                    _ = sleep(self.config.interval) => {}
                    _ = signal.stopped() => {
                        self.halt(&key);
                        return Ok(self.result);
                    }
                }
            }
        }
        Ok(self.result)
    }

    async fn run_round(
        &self,
        strategy: &Arc<dyn Strategy>,
        ctx: Arc<StrategyContext>,
        signal: &RunSignal,
        data: Option<Value>,
        key: &str,
        started: Instant,
    ) -> RoundOutcome {
        let round = ctx.round();
        strategy.begin_round(&ctx);
        let mut handle = tokio::spawn({
            let strategy = strategy.clone();
            async move { strategy.execute(ctx, data).await }
        });

        tokio::select! {
            biased;
            joined = &mut handle => completed(key, joined),
            _ = sleep(self.config.round_timeout) => {
                self.events.dispatch(RoundEvent::TimedOut(RoundTimedOutEvent {
                    strategy: key.to_string(),
                    round,
                    elapsed: started.elapsed(),
                    timestamp: Utc::now(),
                }));
                strategy.abort(AbortSignal::Timeout);
                completed(key, handle.await);
                RoundOutcome::Timeout
            }
            _ = signal.stopped() => {
                strategy.abort(AbortSignal::Other);
                completed(key, handle.await);
                RoundOutcome::Interrupted
            }
        }
    }

    fn halt(&self, key: &str) {
        self.events.dispatch(RoundEvent::Halted(RunHaltedEvent {
            strategy: key.to_string(),
            completed: self.result.times,
            timestamp: Utc::now(),
        }));
    }
}

/// Outcome of a round task that returned on its own. A panicked round
/// counts as a failure.
fn completed(key: &str, joined: Result<bool, JoinError>) -> RoundOutcome {
    match joined {
        Ok(true) => RoundOutcome::Success,
        Ok(false) => RoundOutcome::Failure,
        Err(err) => {
            log::error!("[executor] round task of {key} ended abnormally: {err}");
            RoundOutcome::Failure
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tally_is_binary() {
        let mut result = ExecutionResult::default();
        for outcome in [
            RoundOutcome::Success,
            RoundOutcome::Failure,
            RoundOutcome::Timeout,
            RoundOutcome::Interrupted,
            RoundOutcome::Success,
        ] {
            result.record(outcome);
        }
        assert_eq!(
            result,
            ExecutionResult {
                times: 5,
                success: 2,
                fail: 3
            }
        );
    }
}
