//! Composite operations: a key hold raced against a background task.
//!
//! Both constructs scope their sub-task to the operation. Keys are held by a
//! [`KeyHold`] guard, so they are released on every exit path, including
//! the operation future being dropped mid-hold.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use super::kit::{ActionKit, KeyHold, owned_keys};
use super::{Operation, TaskError, TaskFn};
use crate::strategy::StrategyContext;
use crate::timing::{PollError, Poller, precise_sleep};

impl ActionKit {
    /// Hold `keys` for `duration`; once the configured delay has passed
    /// inside the window, fire `task` exactly once.
    ///
    /// If the window closes first the pending invocation is cancelled. A task
    /// that already fired is joined after the keys are released. The task's
    /// outcome is not reported: the operation always succeeds.
    pub fn hold_and_run_once(&self, keys: &[&str], duration: Duration, task: TaskFn) -> Operation {
        let kit = self.clone();
        let keys = owned_keys(keys);
        let label = format!("hold {} and run once", keys.join("+"));
        Operation::new(label, move |ctx| {
            let kit = kit.clone();
            let keys = keys.clone();
            let task = task.clone();
            async move {
                let hold = KeyHold::press(kit.input.clone(), &keys);
                let token = CancellationToken::new();
                let window = token.clone().drop_guard();
                let pending = tokio::spawn(fire_once(token, kit.timing.once_delay, task, ctx));

                precise_sleep(duration, kit.timing.spin_threshold).await;
                drop(window);
                drop(hold);

                match pending.await {
                    Ok(Some(Ok(done))) => log::debug!("[operation] once-task finished: {done}"),
                    Ok(Some(Err(err))) => log::debug!("[operation] once-task failed: {err}"),
                    Ok(None) => log::debug!("[operation] once-task skipped, window closed first"),
                    Err(err) => log::warn!("[operation] once-task panicked: {err}"),
                }
                true
            }
        })
    }

    /// Hold `keys` while polling `task` every `interval`, for at most
    /// `duration`.
    ///
    /// The poller decides when the window ends. Succeeds only if `task`
    /// returned `Ok(true)` in time; a timeout or task error is a failure.
    pub fn hold_and_poll_until(
        &self,
        keys: &[&str],
        duration: Duration,
        interval: Duration,
        task: TaskFn,
    ) -> Operation {
        let kit = self.clone();
        let keys = owned_keys(keys);
        let label = format!("hold {} and poll", keys.join("+"));
        Operation::new(label, move |ctx| {
            let kit = kit.clone();
            let keys = keys.clone();
            let task = task.clone();
            async move {
                let hold = KeyHold::press(kit.input.clone(), &keys);
                let outcome = Poller::new(duration, interval)
                    .run(|| task(ctx.clone()))
                    .await;
                drop(hold);

                match outcome {
                    Ok(()) => true,
                    Err(PollError::Timeout(elapsed)) => {
                        log::debug!("[operation] poll window closed after {elapsed:?}");
                        false
                    }
                    Err(PollError::Predicate(err)) => {
                        log::debug!("[operation] poll task failed: {err}");
                        false
                    }
                }
            }
        })
    }
}

async fn fire_once(
    window: CancellationToken,
    delay: Duration,
    task: TaskFn,
    ctx: Arc<StrategyContext>,
) -> Option<Result<bool, TaskError>> {
    tokio::select! {
        biased;
        _ = window.cancelled() => None,
        _ = sleep(delay) => Some(task(ctx).await),
    }
}
