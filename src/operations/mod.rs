//! Operation model.
//!
//! An [`Operation`] is one step of a strategy's script: it receives the
//! round's [`StrategyContext`] and reports success or failure. Operations are
//! produced by an [`ActionKit`] (timed holds, taps, pointer moves, camera
//! turns, composite hold-and-task constructs) or wrap an arbitrary
//! [`TaskFn`].
//!
//! Task functions always receive the context so they can observe
//! cancellation through [`StrategyContext::ensure_live`]; nothing in this
//! module preempts a running task.

mod composite;
mod kit;
mod movement;

pub use kit::{ActionKit, CameraAxis, camera_angle_to, camera_offset};
pub use movement::{Pace, Side};

use std::borrow::Cow;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::external::{DetectionError, SessionError};
use crate::strategy::{StrategyContext, StrategyStatus};
use crate::timing::PollError;

pub type OperationFuture = Pin<Box<dyn Future<Output = bool> + Send>>;
pub type TaskFuture = Pin<Box<dyn Future<Output = Result<bool, TaskError>> + Send>>;

/// Callable task consumed by `run_task` and the composite operations.
pub type TaskFn = Arc<dyn Fn(Arc<StrategyContext>) -> TaskFuture + Send + Sync>;

/// Wrap an async closure into a [`TaskFn`].
pub fn task<F, Fut>(f: F) -> TaskFn
where
    F: Fn(Arc<StrategyContext>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<bool, TaskError>> + Send + 'static,
{
    Arc::new(move |ctx| Box::pin(f(ctx)))
}

/// Failures a task function can report. Operations collapse every variant
/// into a plain `false`.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("round is no longer live ({0})")]
    Cancelled(StrategyStatus),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Detection(#[from] DetectionError),
    #[error("{0}")]
    Failed(String),
}

impl TaskError {
    pub fn failed(reason: impl Into<String>) -> Self {
        TaskError::Failed(reason.into())
    }

    pub fn is_cancellation(&self) -> bool {
        matches!(self, TaskError::Cancelled(_))
    }
}

impl From<PollError<TaskError>> for TaskError {
    fn from(err: PollError<TaskError>) -> Self {
        match err {
            PollError::Timeout(elapsed) => TaskError::Timeout(elapsed),
            PollError::Predicate(inner) => inner,
        }
    }
}

/// A labelled, reusable unit of work.
#[derive(Clone)]
pub struct Operation {
    label: Cow<'static, str>,
    body: Arc<dyn Fn(Arc<StrategyContext>) -> OperationFuture + Send + Sync>,
}

impl Operation {
    pub fn new<F, Fut>(label: impl Into<Cow<'static, str>>, body: F) -> Self
    where
        F: Fn(Arc<StrategyContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        Self {
            label: label.into(),
            body: Arc::new(move |ctx| Box::pin(body(ctx))),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub async fn invoke(&self, ctx: Arc<StrategyContext>) -> bool {
        (self.body)(ctx).await
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/// Run `task` once, treating only `Ok(true)` as success.
pub(crate) async fn run_task_once(label: &str, task: &TaskFn, ctx: Arc<StrategyContext>) -> bool {
    match task(ctx).await {
        Ok(done) => done,
        Err(err) => {
            log::debug!("[operation] {label} failed: {err}");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{StaticSession, context};

    #[tokio::test]
    async fn task_errors_collapse_to_failure() {
        let ctx = context(StaticSession::shared());
        let failing = task(|_| async { Err(TaskError::failed("detector offline")) });
        let unfinished = task(|_| async { Ok(false) });
        let finished = task(|_| async { Ok(true) });

        assert!(!run_task_once("failing", &failing, ctx.clone()).await);
        assert!(!run_task_once("unfinished", &unfinished, ctx.clone()).await);
        assert!(run_task_once("finished", &finished, ctx).await);
    }

    #[test]
    fn poll_errors_flatten_into_task_errors() {
        let timeout: TaskError = PollError::Timeout(Duration::from_secs(2)).into();
        assert!(matches!(timeout, TaskError::Timeout(d) if d == Duration::from_secs(2)));

        let cancelled: TaskError =
            PollError::Predicate(TaskError::Cancelled(StrategyStatus::StoppedAborted)).into();
        assert!(cancelled.is_cancellation());
    }
}
