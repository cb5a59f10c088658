//! Strategy enable/disable classification.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Why a strategy is, or is not, making progress.
///
/// A round starts in `Available` and moves exactly once into one of the
/// stopped codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StrategyStatus {
    Available = 1,
    StoppedSuccess = 0,
    StoppedFailure = 2,
    StoppedAborted = 3,
    StoppedTerminalCondition = 4,
}

impl StrategyStatus {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => StrategyStatus::StoppedSuccess,
            1 => StrategyStatus::Available,
            2 => StrategyStatus::StoppedFailure,
            3 => StrategyStatus::StoppedAborted,
            _ => StrategyStatus::StoppedTerminalCondition,
        }
    }

    pub fn is_available(self) -> bool {
        self == StrategyStatus::Available
    }

    /// Abnormal stops that leave the game in a state needing recovery.
    pub fn needs_recovery(self) -> bool {
        matches!(
            self,
            StrategyStatus::StoppedFailure | StrategyStatus::StoppedTerminalCondition
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StrategyStatus::Available => "available",
            StrategyStatus::StoppedSuccess => "stopped:success",
            StrategyStatus::StoppedFailure => "stopped:failure",
            StrategyStatus::StoppedAborted => "stopped:aborted",
            StrategyStatus::StoppedTerminalCondition => "stopped:terminal-condition",
        }
    }
}

impl fmt::Display for StrategyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Atomic holder of a [`StrategyStatus`] shared by the run loop, the
/// monitor, and task functions.
///
/// Stop transitions are first-writer-wins: only a move out of `Available`
/// succeeds, later stop requests are ignored.
#[derive(Debug)]
pub struct StatusCell(AtomicU8);

impl StatusCell {
    pub fn new() -> Self {
        Self(AtomicU8::new(StrategyStatus::Available as u8))
    }

    pub fn load(&self) -> StrategyStatus {
        StrategyStatus::from_u8(self.0.load(Ordering::Acquire))
    }

    pub fn is_available(&self) -> bool {
        self.load().is_available()
    }

    /// Make the strategy available again, whatever it was.
    pub fn reset(&self) {
        self.0
            .store(StrategyStatus::Available as u8, Ordering::Release);
    }

    /// Move from `Available` to `reason`. Returns whether this call won.
    pub fn stop(&self, reason: StrategyStatus) -> bool {
        debug_assert!(!reason.is_available(), "stop requires a stopped code");
        self.0
            .compare_exchange(
                StrategyStatus::Available as u8,
                reason as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }
}

impl Default for StatusCell {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_stop_wins() {
        let cell = StatusCell::new();
        assert!(cell.stop(StrategyStatus::StoppedTerminalCondition));
        assert!(!cell.stop(StrategyStatus::StoppedAborted));
        assert_eq!(cell.load(), StrategyStatus::StoppedTerminalCondition);

        cell.reset();
        assert!(cell.is_available());
        assert!(cell.stop(StrategyStatus::StoppedAborted));
        assert_eq!(cell.load(), StrategyStatus::StoppedAborted);
    }

    #[test]
    fn only_failure_and_terminal_need_recovery() {
        assert!(StrategyStatus::StoppedFailure.needs_recovery());
        assert!(StrategyStatus::StoppedTerminalCondition.needs_recovery());
        assert!(!StrategyStatus::StoppedAborted.needs_recovery());
        assert!(!StrategyStatus::StoppedSuccess.needs_recovery());
    }
}
