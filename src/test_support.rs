//! Test doubles for the engine's collaborators.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::EngineTiming;
use crate::external::{
    DetectionError, Frame, GameSession, IndicatorProbe, InputDriver, MouseButton, Region,
    ScrollDirection, SessionError,
};
use crate::strategy::{Phase, Playbook, StatusCell, StrategyContext};

/// One call made against a [`RecordingInput`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    KeyDown(String),
    KeyUp(String),
    KeyTap(String),
    MouseMove(i32, i32),
    MouseClick(MouseButton),
    MouseToggle(MouseButton, bool),
    Scroll(i32, ScrollDirection),
}

/// Input driver that records every call and tracks which keys are down.
#[derive(Debug, Default)]
pub struct RecordingInput {
    events: Mutex<Vec<InputEvent>>,
    held: Mutex<Vec<String>>,
    cursor: Mutex<(i32, i32)>,
}

impl RecordingInput {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn push(&self, event: InputEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }

    pub fn events(&self) -> Vec<InputEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn count(&self, predicate: impl Fn(&InputEvent) -> bool) -> usize {
        self.events().iter().filter(|event| predicate(event)).count()
    }

    /// Keys pressed and not yet released, in press order.
    pub fn held_keys(&self) -> Vec<String> {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl InputDriver for RecordingInput {
    fn key_down(&self, key: &str) {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(key.to_string());
        self.push(InputEvent::KeyDown(key.to_string()));
    }

    fn key_up(&self, key: &str) {
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(pos) = held.iter().rposition(|k| k == key) {
            held.remove(pos);
        }
        drop(held);
        self.push(InputEvent::KeyUp(key.to_string()));
    }

    fn key_tap(&self, key: &str) {
        self.push(InputEvent::KeyTap(key.to_string()));
    }

    fn mouse_move(&self, x: i32, y: i32) {
        *self.cursor.lock().unwrap_or_else(PoisonError::into_inner) = (x, y);
        self.push(InputEvent::MouseMove(x, y));
    }

    fn mouse_click(&self, button: MouseButton) {
        self.push(InputEvent::MouseClick(button));
    }

    fn mouse_toggle(&self, button: MouseButton, down: bool) {
        self.push(InputEvent::MouseToggle(button, down));
    }

    fn scroll(&self, amount: i32, direction: ScrollDirection) {
        self.push(InputEvent::Scroll(amount, direction));
    }

    fn cursor_position(&self) -> (i32, i32) {
        *self.cursor.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Session that serves a blank frame and counts key resets.
#[derive(Debug, Default)]
pub struct StaticSession {
    releases: AtomicUsize,
}

impl StaticSession {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// How many times the executor reset the keyboard.
    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

impl GameSession for StaticSession {
    fn title(&self) -> &str {
        "static"
    }

    fn capture(&self, region: Option<Region>) -> Result<Frame, SessionError> {
        let (width, height) = region.map_or((1280, 720), |r| (r.width, r.height));
        Ok(Frame::filled(width, height, [0, 0, 0]))
    }

    fn is_active(&self) -> bool {
        true
    }

    fn release_all_keys(&self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

/// Fresh round-1 context over `session`.
pub fn context(session: Arc<dyn GameSession>) -> Arc<StrategyContext> {
    Arc::new(StrategyContext::new(session, 1))
}

/// Bind a new `Available` status to `ctx` and hand it back for the test to
/// drive.
pub fn bind_fresh_status(ctx: &StrategyContext) -> Arc<StatusCell> {
    let status = Arc::new(StatusCell::new());
    ctx.bind_status(status.clone());
    status
}

/// Default timing without the spin tail, which never finishes under paused
/// time.
pub fn fast_timing() -> EngineTiming {
    EngineTiming::default().with_spin_threshold(Duration::ZERO)
}

/// Indicator probe whose answer the test controls.
#[derive(Debug)]
pub struct ScriptedProbe {
    present: AtomicBool,
    failure: Mutex<Option<String>>,
    checks: AtomicUsize,
}

impl ScriptedProbe {
    pub fn shared(present: bool) -> Arc<Self> {
        Arc::new(Self {
            present: AtomicBool::new(present),
            failure: Mutex::new(None),
            checks: AtomicUsize::new(0),
        })
    }

    pub fn set_present(&self, present: bool) {
        self.present.store(present, Ordering::SeqCst);
    }

    /// Make every following check fail with `reason`.
    pub fn fail_with(&self, reason: &str) {
        *self.failure.lock().unwrap_or_else(PoisonError::into_inner) = Some(reason.to_string());
    }

    pub fn checks(&self) -> usize {
        self.checks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IndicatorProbe for ScriptedProbe {
    fn name(&self) -> &str {
        "scripted indicator"
    }

    async fn present(&self, _session: &dyn GameSession) -> Result<bool, DetectionError> {
        self.checks.fetch_add(1, Ordering::SeqCst);
        let failure = self
            .failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match failure {
            Some(reason) => Err(DetectionError::Backend(reason)),
            None => Ok(self.present.load(Ordering::SeqCst)),
        }
    }
}

/// Playbook with no steps, for registry and selection tests.
pub struct NoopPlaybook {
    name: String,
    mode: String,
}

impl NoopPlaybook {
    pub fn new(name: &str, mode: &str) -> Self {
        Self {
            name: name.to_string(),
            mode: mode.to_string(),
        }
    }
}

#[async_trait]
impl Playbook for NoopPlaybook {
    fn name(&self) -> &str {
        &self.name
    }

    fn mode(&self) -> &str {
        &self.mode
    }

    fn phases(&self, _ctx: &Arc<StrategyContext>, _data: Option<&Value>) -> Vec<Phase> {
        Vec::new()
    }
}
