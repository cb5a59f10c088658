//! Primitive operations.

use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;

use super::{Operation, TaskFn, run_task_once};
use crate::config::EngineTiming;
use crate::external::{InputDriver, MouseButton, Region, ScrollDirection};
use crate::timing::precise_sleep;

/// Which way a camera drag moves the pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraAxis {
    Horizontal,
    Vertical,
}

/// Pointer offset for turning the camera by `degrees`.
///
/// `pixels_per_degree` is calibrated per game and camera distance.
pub fn camera_offset(degrees: i32, pixels_per_degree: f32) -> i32 {
    (degrees as f32 * pixels_per_degree) as i32
}

/// Camera turn, in degrees, that brings `region` to the horizontal centre
/// of the screen.
///
/// Inverse of [`camera_offset`]: `pixels_per_degree` is the on-screen
/// travel of a detected object per degree of rotation.
pub fn camera_angle_to(region: Region, center: (i32, i32), pixels_per_degree: f32) -> i32 {
    let (target_x, _) = region.center();
    ((target_x - center.0) as f32 / pixels_per_degree) as i32
}

/// Keys pressed for the lifetime of the guard, released in reverse order on
/// drop.
pub(super) struct KeyHold {
    input: Arc<dyn InputDriver>,
    keys: Vec<String>,
}

impl KeyHold {
    pub(super) fn press(input: Arc<dyn InputDriver>, keys: &[String]) -> Self {
        for key in keys {
            input.key_down(key);
        }
        Self {
            input,
            keys: keys.to_vec(),
        }
    }
}

impl Drop for KeyHold {
    fn drop(&mut self) {
        for key in self.keys.iter().rev() {
            self.input.key_up(key);
        }
    }
}

/// Factory for script operations bound to one input back-end.
#[derive(Clone)]
pub struct ActionKit {
    pub(super) input: Arc<dyn InputDriver>,
    pub(super) timing: Arc<EngineTiming>,
}

impl ActionKit {
    pub fn new(input: Arc<dyn InputDriver>, timing: EngineTiming) -> Self {
        Self {
            input,
            timing: Arc::new(timing),
        }
    }

    pub fn input(&self) -> &Arc<dyn InputDriver> {
        &self.input
    }

    pub fn timing(&self) -> &EngineTiming {
        &self.timing
    }

    /// Press `keys`, hold them for `duration`, release in reverse order.
    pub async fn press_and_hold(&self, keys: &[String], duration: Duration) {
        let _hold = KeyHold::press(self.input.clone(), keys);
        precise_sleep(duration, self.timing.spin_threshold).await;
    }

    /// Drag the camera: hold the modifier, grab with the left button, move
    /// the pointer by the calibrated offset from `origin`, let go.
    pub async fn rotate_camera(
        &self,
        axis: CameraAxis,
        origin: (i32, i32),
        degrees: i32,
        pixels_per_degree: f32,
    ) {
        let modifier = self.timing.camera_modifier.as_str();
        self.input.key_down(modifier);
        self.input.mouse_toggle(MouseButton::Left, true);

        // the game ignores pointer movement issued in the same frame as the grab
        sleep(self.timing.camera_settle).await;

        let offset = camera_offset(degrees, pixels_per_degree);
        let (x, y) = origin;
        match axis {
            CameraAxis::Horizontal => self.input.mouse_move(x + offset, y),
            CameraAxis::Vertical => self.input.mouse_move(x, y + offset),
        }

        self.input.mouse_toggle(MouseButton::Left, false);
        self.input.key_up(modifier);
    }

    pub fn hold(&self, keys: &[&str], duration: Duration) -> Operation {
        let kit = self.clone();
        let keys = owned_keys(keys);
        Operation::new(format!("hold {} for {duration:?}", keys.join("+")), move |_ctx| {
            let kit = kit.clone();
            let keys = keys.clone();
            async move {
                kit.press_and_hold(&keys, duration).await;
                true
            }
        })
    }

    pub fn tap_once(&self, key: &str) -> Operation {
        self.tap(key, 1, Duration::ZERO)
    }

    /// Tap `key` `times` times with `interval` between taps.
    pub fn tap(&self, key: &str, times: u32, interval: Duration) -> Operation {
        let input = self.input.clone();
        let settle = self.timing.tap_settle;
        let key = key.to_string();
        Operation::new(format!("tap {key} x{times}"), move |_ctx| {
            let input = input.clone();
            let key = key.clone();
            async move {
                for i in 0..times {
                    input.key_tap(&key);
                    if i + 1 != times && !interval.is_zero() {
                        sleep(interval).await;
                    }
                }
                sleep(settle).await;
                true
            }
        })
    }

    pub fn wait(&self, duration: Duration) -> Operation {
        let spin = self.timing.spin_threshold;
        Operation::new(format!("wait {duration:?}"), move |_ctx| async move {
            precise_sleep(duration, spin).await;
            true
        })
    }

    pub fn scroll(&self, amount: i32, direction: ScrollDirection) -> Operation {
        let input = self.input.clone();
        Operation::new(format!("scroll {direction:?} {amount}"), move |_ctx| {
            input.scroll(amount, direction);
            async { true }
        })
    }

    pub fn mouse_click(&self) -> Operation {
        let input = self.input.clone();
        Operation::new("click", move |_ctx| {
            input.mouse_click(MouseButton::Left);
            async { true }
        })
    }

    pub fn mouse_move(&self, x: i32, y: i32) -> Operation {
        let input = self.input.clone();
        Operation::new(format!("move to ({x}, {y})"), move |_ctx| {
            input.mouse_move(x, y);
            async { true }
        })
    }

    pub fn mouse_move_click(&self, x: i32, y: i32) -> Operation {
        let input = self.input.clone();
        Operation::new(format!("click at ({x}, {y})"), move |_ctx| {
            input.mouse_move(x, y);
            input.mouse_click(MouseButton::Left);
            async { true }
        })
    }

    /// Turn the camera horizontally with the configured calibration.
    pub fn turn_camera_x(&self, origin: (i32, i32), degrees: i32) -> Operation {
        let ppd = self.timing.pixels_per_degree_x;
        self.turn_camera(CameraAxis::Horizontal, origin, degrees, ppd)
    }

    /// Pitch the camera with the configured calibration.
    pub fn turn_camera_y(&self, origin: (i32, i32), degrees: i32) -> Operation {
        let ppd = self.timing.pixels_per_degree_y;
        self.turn_camera(CameraAxis::Vertical, origin, degrees, ppd)
    }

    pub fn turn_camera(
        &self,
        axis: CameraAxis,
        origin: (i32, i32),
        degrees: i32,
        pixels_per_degree: f32,
    ) -> Operation {
        let kit = self.clone();
        Operation::new(format!("turn camera {axis:?} {degrees}°"), move |_ctx| {
            let kit = kit.clone();
            async move {
                kit.rotate_camera(axis, origin, degrees, pixels_per_degree)
                    .await;
                true
            }
        })
    }

    /// Run `task` once; success iff it returns `Ok(true)`.
    pub fn run_task(&self, label: impl Into<Cow<'static, str>>, task: TaskFn) -> Operation {
        let label: Cow<'static, str> = label.into();
        let name = label.clone();
        Operation::new(label, move |ctx| {
            let task = task.clone();
            let name = name.clone();
            async move { run_task_once(&name, &task, ctx).await }
        })
    }

    pub fn log(&self, scope: impl Into<String>, message: impl Into<String>) -> Operation {
        let scope = scope.into();
        let message = message.into();
        Operation::new("log", move |_ctx| {
            log::info!("[{scope}] {message}");
            async { true }
        })
    }

    /// Arm the terminal-condition monitor from this point of the script.
    pub fn enable_monitor(&self) -> Operation {
        Operation::new("enable monitor", |ctx| async move {
            ctx.enable_monitor();
            true
        })
    }

    /// Suspend the monitor, e.g. before a cut-scene hides the indicator.
    pub fn disable_monitor(&self) -> Operation {
        Operation::new("disable monitor", |ctx| async move {
            ctx.disable_monitor();
            true
        })
    }
}

pub(super) fn owned_keys(keys: &[&str]) -> Vec<String> {
    keys.iter().map(|key| key.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{InputEvent, RecordingInput, StaticSession, context, fast_timing};

    fn kit(input: &Arc<RecordingInput>) -> ActionKit {
        ActionKit::new(input.clone(), fast_timing())
    }

    #[tokio::test(start_paused = true)]
    async fn hold_releases_in_reverse_order() {
        let input = RecordingInput::shared();
        let ctx = context(StaticSession::shared());

        let op = kit(&input).hold(&["w", "shift"], Duration::from_millis(300));
        let start = tokio::time::Instant::now();
        assert!(op.invoke(ctx).await);

        assert!(start.elapsed() >= Duration::from_millis(300));
        assert_eq!(
            input.events(),
            vec![
                InputEvent::KeyDown("w".into()),
                InputEvent::KeyDown("shift".into()),
                InputEvent::KeyUp("shift".into()),
                InputEvent::KeyUp("w".into()),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn tap_repeats_with_interval() {
        let input = RecordingInput::shared();
        let ctx = context(StaticSession::shared());

        let op = kit(&input).tap("space", 3, Duration::from_millis(100));
        let start = tokio::time::Instant::now();
        assert!(op.invoke(ctx).await);

        // two gaps plus the settle pause
        assert!(start.elapsed() >= Duration::from_millis(200) + fast_timing().tap_settle);
        assert_eq!(input.count(|event| *event == InputEvent::KeyTap("space".into())), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn camera_turn_moves_by_calibrated_offset() {
        let input = RecordingInput::shared();
        let ctx = context(StaticSession::shared());

        let op = kit(&input).turn_camera(CameraAxis::Horizontal, (640, 400), -45, 3.24);
        assert!(op.invoke(ctx).await);

        assert_eq!(
            input.events(),
            vec![
                InputEvent::KeyDown("alt".into()),
                InputEvent::MouseToggle(MouseButton::Left, true),
                InputEvent::MouseMove(640 - 145, 400),
                InputEvent::MouseToggle(MouseButton::Left, false),
                InputEvent::KeyUp("alt".into()),
            ]
        );
    }

    #[test]
    fn angle_to_region_measures_offset_from_center() {
        let screen = (640, 360);
        assert_eq!(camera_angle_to(Region::new(900, 300, 100, 40), screen, 14.2), 21);
        assert_eq!(camera_angle_to(Region::new(450, 300, 100, 40), screen, 14.2), -9);
        assert_eq!(camera_angle_to(Region::new(620, 0, 40, 40), screen, 14.2), 0);
    }

    #[tokio::test]
    async fn monitor_switches_toggle_context_flag() {
        let input = RecordingInput::shared();
        let ctx = context(StaticSession::shared());
        let kit = kit(&input);

        assert!(kit.enable_monitor().invoke(ctx.clone()).await);
        assert!(ctx.monitor_enabled());
        assert!(kit.disable_monitor().invoke(ctx.clone()).await);
        assert!(!ctx.monitor_enabled());
    }
}
