//! Monitor scheduler.
//!
//! Primes the dedup registry once, then drives the cycle loop: each cycle
//! checks balances against the minimum (when one is configured), forwards
//! new events, then sleeps for the poll interval. Cancellation is observed
//! between cycles and during the sleep, never in the middle of a cycle.

use std::fmt;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::monitor::dispatch::dispatch_alerts;
use crate::monitor::forward::forward_events;
use crate::monitor::policy::FailureAction;
use crate::monitor::threshold::evaluate;
use crate::monitor::{MonitorContext, MonitorError};

/// Lifecycle of a [`Monitor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Priming,
    Cycling,
    Cancelling,
    Stopped,
}

impl fmt::Display for MonitorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MonitorState::Priming => "priming",
            MonitorState::Cycling => "cycling",
            MonitorState::Cancelling => "cancelling",
            MonitorState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// What a single successful cycle did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub breaches: usize,
    pub alerts_published: usize,
    pub events_fetched: usize,
    pub events_published: usize,
}

pub struct Monitor {
    ctx: MonitorContext,
    state: watch::Sender<MonitorState>,
}

impl Monitor {
    pub fn new(ctx: MonitorContext) -> Self {
        let (state, _) = watch::channel(MonitorState::Priming);
        Self { ctx, state }
    }

    pub fn context(&self) -> &MonitorContext {
        &self.ctx
    }

    pub fn state(&self) -> MonitorState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<MonitorState> {
        self.state.subscribe()
    }

    /// Prime, then cycle until `cancel` fires or a cycle error is fatal.
    ///
    /// Returns `Ok(())` after a cancellation and the fatal error otherwise.
    /// The state is `Stopped` when this returns, whatever the outcome.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), MonitorError> {
        self.set_state(MonitorState::Priming);
        let result = self.run_until_stopped(&cancel).await;
        self.set_state(MonitorState::Stopped);

        match &result {
            Ok(()) => tracing::info!("Monitor stopped cleanly"),
            Err(err) => tracing::error!(error = %err, "Monitor stopped on error"),
        }
        result
    }

    async fn run_until_stopped(&self, cancel: &CancellationToken) -> Result<(), MonitorError> {
        let seeded = prime(&self.ctx).await?;
        tracing::info!(seeded, "Dedup registry primed");

        self.set_state(MonitorState::Cycling);
        tracing::info!(
            interval_secs = self.ctx.settings().poll_interval.as_secs(),
            policy = %self.ctx.settings().failure_policy,
            "Monitor cycling started"
        );

        loop {
            if cancel.is_cancelled() {
                break;
            }
            if !self.cycle_with_policy(cancel).await? {
                break;
            }
            if !wait_or_cancel(self.ctx.settings().poll_interval, cancel).await {
                break;
            }
        }

        self.set_state(MonitorState::Cancelling);
        Ok(())
    }

    /// Run one cycle, applying the failure policy to any error.
    ///
    /// `Ok(false)` means cancellation interrupted a retry backoff.
    async fn cycle_with_policy(&self, cancel: &CancellationToken) -> Result<bool, MonitorError> {
        let policy = self.ctx.settings().failure_policy;
        let mut retries = 0;

        loop {
            let err = match run_cycle(&self.ctx).await {
                Ok(report) => {
                    self.ctx.metrics().cycles_total.inc();
                    tracing::info!(
                        breaches = report.breaches,
                        alerts = report.alerts_published,
                        events_fetched = report.events_fetched,
                        events_published = report.events_published,
                        "Cycle complete"
                    );
                    return Ok(true);
                }
                Err(err) => err,
            };

            self.ctx.metrics().cycle_failures_total.inc();

            match policy.on_failure(retries) {
                FailureAction::Stop => return Err(err),
                FailureAction::Skip => {
                    tracing::warn!(error = %err, "Cycle failed, continuing with next cycle");
                    return Ok(true);
                }
                FailureAction::RetryAfter(delay) => {
                    retries += 1;
                    tracing::warn!(
                        error = %err,
                        attempt = retries,
                        delay_ms = delay.as_millis() as u64,
                        "Cycle failed, retrying"
                    );
                    if !wait_or_cancel(delay, cancel).await {
                        return Ok(false);
                    }
                }
            }
        }
    }

    fn set_state(&self, next: MonitorState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            tracing::info!(from = %previous, to = %next, "Monitor state changed");
        }
    }
}

/// Sleep for `duration`; `false` if `cancel` fired first.
async fn wait_or_cancel(duration: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = time::sleep(duration) => true,
    }
}

/// Seed the registry with the current event page without publishing.
///
/// Returns the number of ids seeded.
pub async fn prime(ctx: &MonitorContext) -> Result<usize, MonitorError> {
    let events = ctx.provider().fetch_recent_events().await?;
    let seeded = ctx.registry().seed(events.iter().map(|event| event.id.as_str()));
    ctx.metrics().events_seen.set(ctx.registry().len() as f64);
    Ok(seeded)
}

/// Execute a single cycle. Extracted for testability.
pub async fn run_cycle(ctx: &MonitorContext) -> Result<CycleReport, MonitorError> {
    let mut report = CycleReport::default();

    if let Some(minimum) = ctx.settings().minimum {
        let snapshot = ctx.provider().fetch_balances().await?;
        let breaches = evaluate(&snapshot, minimum);
        report.breaches = breaches.len();
        ctx.metrics().breaches_total.inc_by(breaches.len() as f64);

        if !breaches.is_empty() {
            tracing::debug!(
                breaches = breaches.len(),
                entries = snapshot.len(),
                "Balances below minimum"
            );
        }
        report.alerts_published = dispatch_alerts(ctx, minimum, &breaches).await?;
    }

    let events = ctx.provider().fetch_recent_events().await?;
    report.events_fetched = events.len();
    report.events_published = forward_events(ctx, &events).await?;

    Ok(report)
}
