//! Per-round shared state.
//!
//! A fresh [`StrategyContext`] is built by the executor for every round and
//! shared by the operation stream, the monitor task, and composite
//! sub-tasks. The attribute store sits behind a mutex, so concurrent tasks
//! never race on a key; flags are atomics.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::status::{StatusCell, StrategyStatus};
use crate::external::GameSession;
use crate::operations::TaskError;

/// Attribute under which `execute` records the round start.
pub const START_TIME_ATTR: &str = "start_time";

pub type Attributes = HashMap<String, Value>;

pub struct StrategyContext {
    session: Arc<dyn GameSession>,
    round: u32,
    attrs: Mutex<Attributes>,
    monitor_enabled: AtomicBool,
    step: AtomicUsize,
    status: OnceLock<Arc<StatusCell>>,
}

impl StrategyContext {
    pub fn new(session: Arc<dyn GameSession>, round: u32) -> Self {
        Self {
            session,
            round,
            attrs: Mutex::new(HashMap::new()),
            monitor_enabled: AtomicBool::new(false),
            step: AtomicUsize::new(0),
            status: OnceLock::new(),
        }
    }

    pub fn session(&self) -> &Arc<dyn GameSession> {
        &self.session
    }

    /// 1-based round number assigned by the executor.
    pub fn round(&self) -> u32 {
        self.round
    }

    fn attrs(&self) -> MutexGuard<'_, Attributes> {
        self.attrs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_attr(&self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.attrs().insert(key.into(), value.into())
    }

    pub fn attr(&self, key: &str) -> Option<Value> {
        self.attrs().get(key).cloned()
    }

    /// Read an attribute and deserialize it; `None` if absent or mistyped.
    pub fn attr_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.attr(key)?;
        serde_json::from_value(value).ok()
    }

    pub fn remove_attr(&self, key: &str) -> Option<Value> {
        self.attrs().remove(key)
    }

    /// Read-modify-write several attributes under one lock.
    pub fn with_attrs<R>(&self, f: impl FnOnce(&mut Attributes) -> R) -> R {
        f(&mut self.attrs())
    }

    pub fn stamp_start(&self) -> DateTime<Utc> {
        let now = Utc::now();
        self.set_attr(START_TIME_ATTR, now.to_rfc3339());
        now
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.attr_as(START_TIME_ATTR)
    }

    pub fn enable_monitor(&self) {
        self.monitor_enabled.store(true, Ordering::Release);
    }

    pub fn disable_monitor(&self) {
        self.monitor_enabled.store(false, Ordering::Release);
    }

    pub fn monitor_enabled(&self) -> bool {
        self.monitor_enabled.load(Ordering::Acquire)
    }

    /// Index of the operation currently running.
    pub fn step(&self) -> usize {
        self.step.load(Ordering::Acquire)
    }

    pub(crate) fn set_step(&self, step: usize) {
        self.step.store(step, Ordering::Release);
    }

    /// Attach the status of the strategy running this round.
    pub(crate) fn bind_status(&self, status: Arc<StatusCell>) {
        if self.status.set(status).is_err() {
            log::debug!("[context] round {} already bound to a strategy", self.round);
        }
    }

    pub(crate) fn is_bound_to(&self, status: &Arc<StatusCell>) -> bool {
        self.status
            .get()
            .is_some_and(|bound| Arc::ptr_eq(bound, status))
    }

    /// Current strategy status; `None` before a strategy picked up the round.
    pub fn status(&self) -> Option<StrategyStatus> {
        self.status.get().map(|cell| cell.load())
    }

    pub fn is_live(&self) -> bool {
        self.status().is_none_or(StrategyStatus::is_available)
    }

    /// Cancellation checkpoint for task functions.
    pub fn ensure_live(&self) -> Result<(), TaskError> {
        match self.status() {
            Some(status) if !status.is_available() => Err(TaskError::Cancelled(status)),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{StaticSession, context};

    #[test]
    fn attributes_round_trip_through_json_values() {
        let ctx = context(StaticSession::shared());
        ctx.set_attr("key_direction", 1);
        ctx.set_attr("boss_class", "key-left");

        assert_eq!(ctx.attr_as::<i32>("key_direction"), Some(1));
        assert_eq!(ctx.attr_as::<String>("boss_class").as_deref(), Some("key-left"));
        assert_eq!(ctx.attr_as::<i32>("boss_class"), None);

        let total = ctx.with_attrs(|attrs| {
            let next = attrs.get("kills").and_then(Value::as_u64).unwrap_or(0) + 1;
            attrs.insert("kills".into(), next.into());
            next
        });
        assert_eq!(total, 1);
    }

    #[test]
    fn start_stamp_is_readable() {
        let ctx = context(StaticSession::shared());
        assert!(ctx.start_time().is_none());
        let stamped = ctx.stamp_start();
        assert_eq!(ctx.start_time(), Some(stamped));
    }

    #[test]
    fn liveness_follows_bound_status() {
        let ctx = context(StaticSession::shared());
        assert!(ctx.ensure_live().is_ok());

        let cell = Arc::new(StatusCell::new());
        ctx.bind_status(cell.clone());
        assert!(ctx.is_live());

        cell.stop(StrategyStatus::StoppedAborted);
        assert!(!ctx.is_live());
        assert!(matches!(
            ctx.ensure_live(),
            Err(TaskError::Cancelled(StrategyStatus::StoppedAborted))
        ));
    }
}
