//! Playbook-driven strategy: state machine, run loop and monitor task.

use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::OnceCell;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use super::{AbortSignal, StatusCell, Strategy, StrategyContext, StrategyError, StrategyStatus};
use crate::config::EngineTiming;
use crate::external::IndicatorProbe;
use crate::operations::Operation;

/// A named segment of a round's script.
#[derive(Debug, Clone)]
pub struct Phase {
    name: Cow<'static, str>,
    operations: Vec<Operation>,
}

impl Phase {
    pub fn new(name: impl Into<Cow<'static, str>>, operations: Vec<Operation>) -> Self {
        Self {
            name: name.into(),
            operations,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

/// Content of a scripted strategy.
///
/// `phases` is called once per round and may capture per-round hand-off
/// records in the operations it returns; the engine never looks inside
/// them. Recovery operations run after the round has already stopped, so
/// they must not gate on [`StrategyContext::ensure_live`].
#[async_trait]
pub trait Playbook: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn mode(&self) -> &str;

    /// One-time setup of detectors and other collaborators.
    async fn prepare(&self) -> Result<(), StrategyError> {
        Ok(())
    }

    fn phases(&self, ctx: &Arc<StrategyContext>, data: Option<&Value>) -> Vec<Phase>;

    /// Indicator whose disappearance ends the round while the monitor is on.
    fn monitor(&self) -> Option<Arc<dyn IndicatorProbe>> {
        None
    }

    /// Cleanup for a round that stopped with `status`. Only consulted for
    /// statuses that need recovery.
    fn recovery(&self, _status: StrategyStatus) -> Vec<Operation> {
        Vec::new()
    }
}

/// Runs a [`Playbook`] under the engine's round semantics.
pub struct ScriptedStrategy<P> {
    playbook: P,
    status: Arc<StatusCell>,
    monitor_interval: Duration,
    prepared: OnceCell<()>,
}

impl<P: Playbook> ScriptedStrategy<P> {
    pub fn new(playbook: P) -> Self {
        Self {
            playbook,
            status: Arc::new(StatusCell::new()),
            monitor_interval: EngineTiming::default().monitor_interval,
            prepared: OnceCell::new(),
        }
    }

    /// Use the monitor period from `timing`.
    pub fn with_timing(self, timing: &EngineTiming) -> Self {
        self.with_monitor_interval(timing.monitor_interval)
    }

    pub fn with_monitor_interval(mut self, interval: Duration) -> Self {
        self.monitor_interval = interval.max(Duration::from_millis(1));
        self
    }

    pub fn playbook(&self) -> &P {
        &self.playbook
    }

    async fn run(&self, tag: &str, ctx: &Arc<StrategyContext>, operations: &[Operation]) -> bool {
        for (step, op) in operations.iter().enumerate() {
            if !self.status.is_available() {
                log::info!(
                    "[{tag}] round {} stopped before step {step} ({}): {}",
                    ctx.round(),
                    op.label(),
                    self.status.load()
                );
                return false;
            }
            ctx.set_step(step);
            log::debug!("[{tag}] step {step}: {}", op.label());

            if !op.invoke(ctx.clone()).await {
                if self.status.stop(StrategyStatus::StoppedFailure) {
                    log::warn!("[{tag}] step {step} failed: {}", op.label());
                }
                return false;
            }
        }
        self.status.stop(StrategyStatus::StoppedSuccess)
    }

    async fn recover(&self, tag: &str, ctx: &Arc<StrategyContext>, status: StrategyStatus) {
        let steps = self.playbook.recovery(status);
        if steps.is_empty() {
            return;
        }
        log::info!("[{tag}] round ended {status}, running {} recovery step(s)", steps.len());
        for op in steps {
            if !op.invoke(ctx.clone()).await {
                log::warn!("[{tag}] recovery step failed: {}", op.label());
                return;
            }
        }
        log::info!("[{tag}] recovery finished");
    }
}

#[async_trait]
impl<P: Playbook> Strategy for ScriptedStrategy<P> {
    fn name(&self) -> &str {
        self.playbook.name()
    }

    fn mode(&self) -> &str {
        self.playbook.mode()
    }

    async fn init(&self) -> Result<(), StrategyError> {
        self.prepared
            .get_or_try_init(|| self.playbook.prepare())
            .await?;
        Ok(())
    }

    fn begin_round(&self, ctx: &Arc<StrategyContext>) {
        self.status.reset();
        ctx.bind_status(self.status.clone());
    }

    async fn execute(&self, ctx: Arc<StrategyContext>, data: Option<Value>) -> bool {
        let tag = self.key();
        // an abort landing between arming and this point must survive
        if !ctx.is_bound_to(&self.status) {
            self.begin_round(&ctx);
        }
        let started = ctx.stamp_start();
        log::info!("[{tag}] round {} started at {}", ctx.round(), started.to_rfc3339());

        let monitor_done = CancellationToken::new();
        let monitor = self.playbook.monitor().map(|probe| {
            tokio::spawn(watch(
                Monitor {
                    tag: tag.clone(),
                    probe,
                    ctx: ctx.clone(),
                    status: self.status.clone(),
                    interval: self.monitor_interval,
                },
                monitor_done.clone(),
            ))
        });

        let operations: Vec<Operation> = self
            .playbook
            .phases(&ctx, data.as_ref())
            .into_iter()
            .flat_map(|phase| {
                log::debug!("[{tag}] phase {} with {} step(s)", phase.name(), phase.len());
                phase.operations
            })
            .collect();

        let succeeded = self.run(&tag, &ctx, &operations).await;

        monitor_done.cancel();
        if let Some(handle) = monitor
            && let Err(err) = handle.await
        {
            log::warn!("[{tag}] monitor task ended abnormally: {err}");
        }

        let status = self.status.load();
        if status.needs_recovery() {
            self.recover(&tag, &ctx, status).await;
        }
        log::info!("[{tag}] round {} finished: {status}", ctx.round());
        succeeded
    }

    fn abort(&self, signal: AbortSignal) {
        if self.status.stop(StrategyStatus::StoppedAborted) {
            log::info!("[{}] aborted ({signal})", self.key());
        }
    }

    fn status(&self) -> StrategyStatus {
        self.status.load()
    }
}

struct Monitor {
    tag: String,
    probe: Arc<dyn IndicatorProbe>,
    ctx: Arc<StrategyContext>,
    status: Arc<StatusCell>,
    interval: Duration,
}

/// Terminal-condition watcher.
///
/// Idles until the context enables monitoring, then probes every interval.
/// Exits when monitoring is switched off after having run, when the status
/// leaves `Available`, or when the indicator vanishes while monitoring is
/// still on (which stops the strategy).
async fn watch(monitor: Monitor, done: CancellationToken) {
    let Monitor {
        tag,
        probe,
        ctx,
        status,
        interval,
    } = monitor;
    let mut running = false;

    loop {
        let enabled = ctx.monitor_enabled();
        if running && !enabled {
            log::debug!("[{tag}] monitor switched off");
            return;
        }
        if !status.is_available() {
            return;
        }

        if enabled {
            running = true;
            match probe.present(&**ctx.session()).await {
                Ok(true) => {}
                Ok(false) if ctx.monitor_enabled() => {
                    if status.stop(StrategyStatus::StoppedTerminalCondition) {
                        log::warn!(
                            "[{tag}] {} not detected, ending round {}",
                            probe.name(),
                            ctx.round()
                        );
                    }
                    return;
                }
                Ok(false) => {}
                Err(err) => log::warn!("[{tag}] {} probe failed: {err}", probe.name()),
            }
        }

        tokio::select! {
            _ = done.cancelled() => return,
            _ = sleep(interval) => {}
        }
    }
}
