//! Run control shared between the executor and whatever drives it (a
//! hotkey listener, a signal handler, a test).

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RunState {
    Created = 0,
    Ready = 1,
    Running = 2,
    Stopping = 3,
}

impl RunState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => RunState::Created,
            1 => RunState::Ready,
            2 => RunState::Running,
            _ => RunState::Stopping,
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Created => "created",
            RunState::Ready => "ready",
            RunState::Running => "running",
            RunState::Stopping => "stopping",
        };
        f.write_str(name)
    }
}

/// Liveness signal for a run.
///
/// Moves forward only: `Created -> Ready -> Running -> Stopping`. Each
/// transition is a compare-and-swap and reports whether it happened.
#[derive(Debug)]
pub struct RunSignal {
    state: AtomicU8,
    stop: CancellationToken,
}

impl RunSignal {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(RunState::Created as u8),
            stop: CancellationToken::new(),
        }
    }

    /// A signal that is already running, for unattended callers.
    pub fn running() -> Self {
        let signal = Self::new();
        signal.arm();
        signal.start();
        signal
    }

    fn transition(&self, from: RunState, to: RunState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn state(&self) -> RunState {
        RunState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// The controller is installed and waiting for the start command.
    pub fn arm(&self) -> bool {
        self.transition(RunState::Created, RunState::Ready)
    }

    pub fn start(&self) -> bool {
        let started = self.transition(RunState::Ready, RunState::Running);
        if started {
            log::info!("[control] run started");
        }
        started
    }

    /// Withdraw the run. Wakes everything waiting on [`RunSignal::stopped`].
    pub fn stop(&self) -> bool {
        let stopped = self.transition(RunState::Running, RunState::Stopping);
        if stopped {
            log::info!("[control] stop requested");
            self.stop.cancel();
        }
        stopped
    }

    pub fn is_running(&self) -> bool {
        self.state() == RunState::Running
    }

    /// Resolves once the run has been withdrawn.
    pub async fn stopped(&self) {
        self.stop.cancelled().await;
    }
}

impl Default for RunSignal {
    fn default() -> Self {
        Self::new()
    }
}
