//! Cancellable movement cycles.
//!
//! Each tick changes which movement keys are down. A cycle runs until its
//! stop token fires, which is a success, or until the round stops being
//! live or the window runs out, which are failures. Keys still down are
//! released on every exit path.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::kit::{ActionKit, CameraAxis};
use super::{Operation, TaskError};
use crate::external::InputDriver;
use crate::timing::{PollError, Poller};

/// Which way a sideways run drifts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    fn steps(self) -> &'static [&'static [&'static str]] {
        match self {
            Side::Left => LEFT_STEPS,
            Side::Right => RIGHT_STEPS,
        }
    }

    /// Camera correction turning back towards the wall after each step.
    fn correction(self) -> i32 {
        match self {
            Side::Left => SIDE_TURN_DEGREES,
            Side::Right => -SIDE_TURN_DEGREES,
        }
    }
}

/// Movement pace, expressed as the modifier held with the movement keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pace {
    Walk,
    Jog,
    Sprint,
}

impl Pace {
    fn modifier(self) -> Option<&'static str> {
        match self {
            Pace::Walk => Some("ctrl"),
            Pace::Jog => None,
            Pace::Sprint => Some("shift"),
        }
    }
}

const SIDE_TURN_DEGREES: i32 = 24;

const LEFT_STEPS: &[&[&str]] = &[&["a", "w"], &["w"], &["w"]];
const RIGHT_STEPS: &[&[&str]] = &[&["d", "w"], &["w"], &["w"]];

/// One lap around a circle as (release, press) pairs.
const CIRCLE: [(Option<&str>, Option<&str>); 8] = [
    (Some("a"), Some("s")),
    (None, Some("d")),
    (Some("s"), None),
    (None, Some("w")),
    (Some("d"), None),
    (None, Some("a")),
    (Some("w"), None),
    (None, Some("s")),
];

/// Keys currently down, released in reverse press order on drop.
struct HeldKeys {
    input: Arc<dyn InputDriver>,
    keys: Vec<String>,
}

impl HeldKeys {
    fn new(input: Arc<dyn InputDriver>) -> Self {
        Self {
            input,
            keys: Vec::new(),
        }
    }

    fn press(&mut self, key: &str) {
        if !self.keys.iter().any(|held| held == key) {
            self.input.key_down(key);
            self.keys.push(key.to_string());
        }
    }

    fn release(&mut self, key: &str) {
        if let Some(pos) = self.keys.iter().position(|held| held == key) {
            self.keys.remove(pos);
            self.input.key_up(key);
        }
    }
}

impl Drop for HeldKeys {
    fn drop(&mut self) {
        for key in self.keys.iter().rev() {
            self.input.key_up(key);
        }
    }
}

fn lock(held: &Mutex<HeldKeys>) -> MutexGuard<'_, HeldKeys> {
    held.lock().unwrap_or_else(PoisonError::into_inner)
}

fn settle(what: &str, outcome: Result<(), PollError<TaskError>>) -> bool {
    match outcome {
        Ok(()) => true,
        Err(PollError::Timeout(elapsed)) => {
            log::debug!("[operation] {what} not stopped within {elapsed:?}");
            false
        }
        Err(PollError::Predicate(err)) => {
            log::debug!("[operation] {what} ended: {err}");
            false
        }
    }
}

impl ActionKit {
    /// Walk in a circle, one key transition every `interval`, until `stop`
    /// fires. Fails if `duration` passes first.
    pub fn move_circle(
        &self,
        duration: Duration,
        interval: Duration,
        stop: CancellationToken,
    ) -> Operation {
        let input = self.input.clone();
        Operation::new(format!("circle for {duration:?}"), move |ctx| {
            let input = input.clone();
            let stop = stop.clone();
            async move {
                let held = Mutex::new(HeldKeys::new(input));
                let laps = AtomicUsize::new(0);
                let (held_ref, laps, stop, ctx) = (&held, &laps, &stop, &ctx);

                let outcome = Poller::new(duration, interval)
                    .immediate(true)
                    .run(move || async move {
                        if stop.is_cancelled() {
                            return Ok(true);
                        }
                        ctx.ensure_live()?;
                        let lap = laps.fetch_add(1, Ordering::Relaxed);
                        let (release, press) = CIRCLE[lap % CIRCLE.len()];
                        let mut keys = lock(held_ref);
                        if let Some(key) = release {
                            keys.release(key);
                        }
                        if let Some(key) = press {
                            keys.press(key);
                        }
                        Ok::<_, TaskError>(false)
                    })
                    .await;
                drop(held);
                settle("circle", outcome)
            }
        })
    }

    /// Run forward while drifting to `side` until `stop` fires.
    ///
    /// Every tick after the first turns the camera back by a fixed angle from
    /// the pointer position at start, then moves on to the next step.
    pub fn move_side(
        &self,
        side: Side,
        interval: Duration,
        pace: Pace,
        stop: CancellationToken,
    ) -> Operation {
        let kit = self.clone();
        Operation::new(format!("move {side:?} at {pace:?}"), move |ctx| {
            let kit = kit.clone();
            let stop = stop.clone();
            async move {
                let origin = kit.input.cursor_position();
                let held = Mutex::new(HeldKeys::new(kit.input.clone()));
                let ticks = AtomicUsize::new(0);
                let steps = side.steps();
                let (kit, held_ref, ticks, stop, ctx) = (&kit, &held, &ticks, &stop, &ctx);

                let outcome = Poller::new(Duration::MAX, interval)
                    .immediate(true)
                    .run(move || async move {
                        if stop.is_cancelled() {
                            return Ok(true);
                        }
                        ctx.ensure_live()?;
                        let tick = ticks.fetch_add(1, Ordering::Relaxed);
                        if tick > 0 {
                            kit.rotate_camera(
                                CameraAxis::Horizontal,
                                origin,
                                side.correction(),
                                kit.timing.pixels_per_degree_x,
                            )
                            .await;
                        }

                        let previous = steps[tick.saturating_sub(1) % steps.len()];
                        let current = steps[tick % steps.len()];
                        let mut keys = lock(held_ref);
                        if let Some(modifier) = pace.modifier() {
                            keys.release(modifier);
                        }
                        for key in previous {
                            keys.release(key);
                        }
                        for key in current {
                            keys.press(key);
                        }
                        if let Some(modifier) = pace.modifier() {
                            keys.press(modifier);
                        }
                        Ok::<_, TaskError>(false)
                    })
                    .await;
                drop(held);
                settle("sideways run", outcome)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::time::{Instant, sleep};

    use crate::external::MouseButton;
    use crate::strategy::StrategyStatus;
    use crate::test_support::{
        InputEvent, RecordingInput, StaticSession, bind_fresh_status, context, fast_timing,
    };

    fn kit(input: &Arc<RecordingInput>) -> ActionKit {
        ActionKit::new(input.clone(), fast_timing())
    }

    fn down(key: &str) -> InputEvent {
        InputEvent::KeyDown(key.into())
    }

    fn up(key: &str) -> InputEvent {
        InputEvent::KeyUp(key.into())
    }

    #[tokio::test(start_paused = true)]
    async fn circle_cycles_keys_until_stopped() {
        let input = RecordingInput::shared();
        let stop = CancellationToken::new();
        let op = kit(&input).move_circle(
            Duration::from_secs(10),
            Duration::from_millis(100),
            stop.clone(),
        );

        let stopper = async {
            sleep(Duration::from_millis(450)).await;
            stop.cancel();
        };
        let (ok, ()) = tokio::join!(op.invoke(context(StaticSession::shared())), stopper);

        assert!(ok);
        assert_eq!(
            input.events(),
            vec![down("s"), down("d"), up("s"), down("w"), up("d"), up("w")]
        );
        assert!(input.held_keys().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn circle_fails_when_never_stopped() {
        let input = RecordingInput::shared();
        let op = kit(&input).move_circle(
            Duration::from_millis(250),
            Duration::from_millis(100),
            CancellationToken::new(),
        );

        let start = Instant::now();
        assert!(!op.invoke(context(StaticSession::shared())).await);
        assert!(start.elapsed() < Duration::from_millis(300));
        assert!(input.held_keys().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn sideways_run_steps_and_corrects_the_camera() {
        let input = RecordingInput::shared();
        let stop = CancellationToken::new();
        let op = kit(&input).move_side(
            Side::Right,
            Duration::from_secs(1),
            Pace::Sprint,
            stop.clone(),
        );

        let stopper = async {
            sleep(Duration::from_millis(1500)).await;
            stop.cancel();
        };
        let (ok, ()) = tokio::join!(op.invoke(context(StaticSession::shared())), stopper);

        assert!(ok);
        assert_eq!(
            input.events(),
            vec![
                down("d"),
                down("w"),
                down("shift"),
                down("alt"),
                InputEvent::MouseToggle(MouseButton::Left, true),
                InputEvent::MouseMove(-77, 0),
                InputEvent::MouseToggle(MouseButton::Left, false),
                up("alt"),
                up("shift"),
                up("d"),
                up("w"),
                down("w"),
                down("shift"),
                up("shift"),
                up("w"),
            ]
        );
        assert!(input.held_keys().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn sideways_run_ends_with_the_round() {
        let input = RecordingInput::shared();
        let ctx = context(StaticSession::shared());
        let status = bind_fresh_status(&ctx);
        let op = kit(&input).move_side(
            Side::Left,
            Duration::from_millis(100),
            Pace::Walk,
            CancellationToken::new(),
        );

        let abort = async {
            sleep(Duration::from_millis(320)).await;
            status.stop(StrategyStatus::StoppedAborted);
        };
        let start = Instant::now();
        let (ok, ()) = tokio::join!(op.invoke(ctx), abort);

        assert!(!ok);
        assert!(start.elapsed() < Duration::from_millis(500));
        assert!(input.held_keys().is_empty());
    }
}
