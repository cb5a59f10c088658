//! Strategies: stateful scripts the executor runs once per round.
//!
//! [`Strategy`] is the contract the executor drives. Most strategies are a
//! [`ScriptedStrategy`] wrapping a [`Playbook`], which supplies the content
//! (phases, monitor probe, recovery) while the engine owns the state
//! machine, run loop and monitor task.

pub mod context;
pub mod registry;
pub mod scripted;
pub mod status;

pub use context::{Attributes, START_TIME_ATTR, StrategyContext};
pub use registry::{Registry, SelectError, Selector};
pub use scripted::{Phase, Playbook, ScriptedStrategy};
pub use status::{StatusCell, StrategyStatus};

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::external::{DetectionError, SessionError};

/// Why a strategy is being aborted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortSignal {
    /// The round deadline elapsed.
    Timeout,
    /// The run was withdrawn by its controller.
    Other,
}

impl fmt::Display for AbortSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortSignal::Timeout => f.write_str("timeout"),
            AbortSignal::Other => f.write_str("other"),
        }
    }
}

/// Errors raised while preparing a strategy.
#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("strategy initialisation failed: {0}")]
    Init(String),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Detection(#[from] DetectionError),
}

/// A pluggable round body.
///
/// `execute` is invoked once per round on the same instance, so anything
/// that must not leak between rounds lives in the [`StrategyContext`]. The
/// status is the one instance-level exception and is reset by
/// [`Strategy::begin_round`].
#[async_trait]
pub trait Strategy: Send + Sync {
    fn name(&self) -> &str;

    fn mode(&self) -> &str;

    /// Registry key, `"{name}-{mode}"`.
    fn key(&self) -> String {
        format!("{}-{}", self.name(), self.mode())
    }

    /// One-time preparation of collaborators. Repeated calls are no-ops.
    async fn init(&self) -> Result<(), StrategyError>;

    /// Arm the strategy for the round owning the context.
    ///
    /// The executor calls this before spawning `execute`, so an abort issued
    /// any time after it returns is seen by that round. `execute` must arm
    /// the round itself when handed a context this was not called with.
    fn begin_round(&self, _ctx: &Arc<StrategyContext>) {}

    /// Run one round to completion. Returns whether the round succeeded.
    async fn execute(&self, ctx: Arc<StrategyContext>, data: Option<Value>) -> bool;

    /// Ask the running round to stop at its next checkpoint.
    fn abort(&self, signal: AbortSignal);

    fn status(&self) -> StrategyStatus;
}
