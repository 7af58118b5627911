use chrono::Utc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::types::*;
use crate::backend::FleetBackend;
use crate::dashboard::SharedDashboard;
use crate::error::{FleetError, FleetResult};
use crate::telemetry::{RawDashboardMetrics, RawFleetStatus};

#[derive(Default)]
struct LastKnownGood {
    status: Option<RawFleetStatus>,
    metrics: Option<RawDashboardMetrics>,
}

/// Clears the busy flag however the cycle ends, including when its future is
/// dropped by a stop.
struct BusyGuard(Arc<AtomicBool>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Drives periodic status and metrics polling into the shared dashboard.
#[derive(Clone)]
pub struct PollScheduler {
    backend: Arc<dyn FleetBackend>,
    dashboard: SharedDashboard,
    busy: Arc<AtomicBool>,
    cycles: Arc<AtomicU64>,
    session: Arc<Mutex<CancellationToken>>,
    handle: Arc<Mutex<Option<JoinHandle<()>>>>,
    last_good: Arc<Mutex<LastKnownGood>>,
}

impl PollScheduler {
    pub fn new(backend: Arc<dyn FleetBackend>, dashboard: SharedDashboard) -> Self {
        Self {
            backend,
            dashboard,
            busy: Arc::new(AtomicBool::new(false)),
            cycles: Arc::new(AtomicU64::new(0)),
            session: Arc::new(Mutex::new(CancellationToken::new())),
            handle: Arc::new(Mutex::new(None)),
            last_good: Arc::new(Mutex::new(LastKnownGood::default())),
        }
    }

    pub fn is_running(&self) -> bool {
        let handle = self.handle.lock().unwrap_or_else(PoisonError::into_inner);
        handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Start polling every `interval`. The first cycle runs immediately.
    /// Must be called from within a tokio runtime.
    pub fn start(&self, interval: Duration) -> FleetResult<()> {
        if interval.is_zero() {
            return Err(FleetError::Scheduler("poll interval must be greater than zero".to_string()));
        }

        let mut handle = self.handle.lock().unwrap_or_else(PoisonError::into_inner);
        if handle.as_ref().is_some_and(|h| !h.is_finished()) {
            return Err(FleetError::Scheduler("poll scheduler is already running".to_string()));
        }

        let token = self.current_token();
        let scheduler = self.clone();

        *handle = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                tokio::select! {
                    _ = token.cancelled() => break,
                    report = scheduler.run_cycle(token.clone()) => {
                        if report == CycleReport::SkippedBusy {
                            tracing::debug!("Previous poll cycle still outstanding, skipping tick");
                        }
                    }
                }
            }
            tracing::debug!("Poll loop exited");
        }));

        tracing::info!(interval_ms = interval.as_millis() as u64, "Poll scheduler started");
        Ok(())
    }

    /// Cancel the current epoch. Once this returns no cycle that was in flight
    /// can touch the dashboard; later `start` or `refresh_now` calls run under
    /// a fresh epoch.
    pub async fn stop(&self) {
        let _dashboard = self.dashboard.write().await;

        {
            let mut session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
            session.cancel();
            *session = CancellationToken::new();
        }
        let was_running = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some();

        if was_running {
            tracing::info!("Poll scheduler stopped");
        }
    }

    /// Run one cycle now, outside the regular schedule. Subject to the same
    /// skip-if-busy rule as scheduled cycles.
    pub async fn refresh_now(&self) -> CycleReport {
        let token = self.current_token();
        self.run_cycle(token).await
    }

    fn current_token(&self) -> CancellationToken {
        self.session.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    async fn run_cycle(&self, token: CancellationToken) -> CycleReport {
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return CycleReport::SkippedBusy;
        }
        let _busy = BusyGuard(self.busy.clone());

        let cycle = self.cycles.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(cycle, "Polling fleet");

        let (status, metrics) = futures::join!(self.backend.fetch_status(), self.backend.fetch_metrics());
        let observed_at = Utc::now();

        let mut dashboard = self.dashboard.write().await;
        if token.is_cancelled() {
            tracing::debug!(cycle, "Discarding poll cycle from a stopped scheduler");
            return CycleReport::Discarded { cycle };
        }

        let poll = {
            let mut last_good = self.last_good.lock().unwrap_or_else(PoisonError::into_inner);
            PollCycle {
                cycle,
                observed_at,
                status: settle(status, &mut last_good.status),
                metrics: settle(metrics, &mut last_good.metrics),
            }
        };

        let applied = dashboard.on_poll(&poll);
        drop(dashboard);

        let outcome = poll.outcome();
        match &outcome {
            CycleOutcome::Ok => tracing::debug!(
                cycle,
                sample_pushed = applied.sample_pushed,
                "Poll cycle applied"
            ),
            CycleOutcome::PartialFailure(err) => {
                tracing::warn!(cycle, error = %err, "Poll cycle returned partial data")
            }
            CycleOutcome::Failure { status, metrics } => tracing::warn!(
                cycle,
                status_error = %status,
                metrics_error = %metrics,
                "Poll cycle failed"
            ),
        }

        CycleReport::Applied { cycle, outcome }
    }
}

fn settle<T: Clone>(reply: FleetResult<T>, last_good: &mut Option<T>) -> Fetched<T> {
    match reply {
        Ok(value) => {
            *last_good = Some(value.clone());
            Fetched::Fresh(value)
        }
        Err(error) => Fetched::Stale {
            last_good: last_good.clone(),
            error,
        },
    }
}
