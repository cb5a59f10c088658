//! # autoplay-rs
//!
//! An unattended, round-based action engine for scripted game automation.
//!
//! A [`Strategy`] is run for a fixed number of rounds by an [`Executor`].
//! Each round races a deadline, can be withdrawn through a [`RunSignal`],
//! and may be ended early by a monitor watching an on-screen indicator.
//! Cancellation is cooperative throughout: loops and task functions check
//! the round's status at their checkpoints and unwind on their own.
//!
//! ## Features
//!
//! - Timed key holds with a sleep-then-spin tail for release precision
//! - Composite operations racing a background task against a hold window
//! - Bounded polling with success, error and timeout exits
//! - First-writer-wins status transitions shared by run loop and monitor
//! - Pluggable session, input and detection back-ends
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use autoplay_rs::{
//!     ActionKit, EngineTiming, ExecutionConfig, Executor, GameSession, InputDriver, Phase,
//!     Playbook, RunSignal, ScriptedStrategy, StrategyContext,
//! };
//!
//! struct Patrol {
//!     kit: ActionKit,
//! }
//!
//! #[async_trait::async_trait]
//! impl Playbook for Patrol {
//!     fn name(&self) -> &str { "patrol" }
//!     fn mode(&self) -> &str { "normal" }
//!
//!     fn phases(&self, _ctx: &Arc<StrategyContext>, _data: Option<&serde_json::Value>) -> Vec<Phase> {
//!         vec![Phase::new("walk", vec![
//!             self.kit.hold(&["w"], Duration::from_secs(3)),
//!             self.kit.tap_once("e"),
//!         ])]
//!     }
//! }
//!
//! async fn run(session: Arc<dyn GameSession>, input: Arc<dyn InputDriver>) -> Result<(), Box<dyn std::error::Error>> {
//!     let kit = ActionKit::new(input, EngineTiming::default());
//!     let strategy = Arc::new(ScriptedStrategy::new(Patrol { kit }));
//!     let config = ExecutionConfig::builder().times(10).round_timeout(Duration::from_secs(600)).build()?;
//!
//!     let signal = RunSignal::running();
//!     let result = Executor::new(config).run(strategy, session, &signal, None).await?;
//!     println!("{} succeeded, {} failed", result.success, result.fail);
//!     Ok(())
//! }
//! ```

mod executor;

pub mod config;
pub mod control;
pub mod external;
pub mod modules;
pub mod operations;
pub mod strategy;
pub mod timing;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use crate::executor::{ExecutionResult, Executor, ExecutorError, RoundOutcome};

pub use crate::config::{ConfigError, EngineTiming, ExecutionConfig, ExecutionConfigBuilder};

pub use crate::control::{RunSignal, RunState};

pub use crate::external::{
    Candidate, ColorIndicator, ColorRangeDetector, ColorRangeQuery, Detection, DetectionError,
    Frame, GameSession, HsvColor, IndicatorProbe, InputDriver, ModelBackend, ModelDetector,
    ModelQuery, MouseButton, Region, ScrollDirection, SessionError, non_max_suppression,
};

pub use crate::modules::{
    EventDispatcher, EventHandler, LoggingHandler, MetricsHandler, MetricsSnapshot, RoundEvent,
    RoundMetrics, StrategyStats,
};

pub use crate::operations::{
    ActionKit, CameraAxis, Operation, Pace, Side, TaskError, TaskFn, camera_angle_to,
    camera_offset, task,
};

pub use crate::strategy::{
    AbortSignal, Phase, Playbook, Registry, ScriptedStrategy, SelectError, Selector, Strategy,
    StrategyContext, StrategyError, StrategyStatus,
};

pub use crate::timing::{PollError, Poller, precise_sleep};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
