#[cfg(test)]
pub mod mocks {
    use crate::backend::{CoordinationRequest, CoordinationStatus, FleetBackend};
    use crate::error::{FleetError, FleetResult};
    use crate::telemetry::{RawDashboardMetrics, RawFleetStatus};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Scripted backend for scheduler and coordination tests.
    ///
    /// Each endpoint pops its next scripted reply; when the script runs dry
    /// the last reply is repeated. Optional delays simulate slow endpoints.
    #[derive(Default)]
    pub struct ScriptedBackend {
        pub status: Mutex<VecDeque<FleetResult<RawFleetStatus>>>,
        pub metrics: Mutex<VecDeque<FleetResult<RawDashboardMetrics>>>,
        pub coordinate: Mutex<VecDeque<FleetResult<serde_json::Value>>>,
        pub balance: Mutex<VecDeque<FleetResult<()>>>,
        pub status_delay: Mutex<Option<Duration>>,
        pub metrics_delay: Mutex<Option<Duration>>,
        pub coordinate_delay: Mutex<Option<Duration>>,
        pub status_calls: AtomicUsize,
        pub metrics_calls: AtomicUsize,
        pub coordinate_calls: AtomicUsize,
        pub balance_calls: AtomicUsize,
        pub last_request: Mutex<Option<CoordinationRequest>>,
    }

    fn next<T: Clone>(queue: &Mutex<VecDeque<FleetResult<T>>>, what: &str) -> FleetResult<T> {
        let mut queue = queue.lock().unwrap();
        if queue.len() > 1 {
            queue.pop_front().unwrap()
        } else {
            queue
                .front()
                .cloned()
                .unwrap_or_else(|| Err(FleetError::Network(format!("no scripted {} reply", what))))
        }
    }

    impl ScriptedBackend {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn push_status(&self, reply: FleetResult<RawFleetStatus>) -> &Self {
            self.status.lock().unwrap().push_back(reply);
            self
        }

        pub fn push_metrics(&self, reply: FleetResult<RawDashboardMetrics>) -> &Self {
            self.metrics.lock().unwrap().push_back(reply);
            self
        }

        pub fn push_coordinate(&self, reply: FleetResult<serde_json::Value>) -> &Self {
            self.coordinate.lock().unwrap().push_back(reply);
            self
        }

        pub fn push_balance(&self, reply: FleetResult<()>) -> &Self {
            self.balance.lock().unwrap().push_back(reply);
            self
        }

        pub fn set_status_delay(&self, delay: Duration) {
            *self.status_delay.lock().unwrap() = Some(delay);
        }

        pub fn set_metrics_delay(&self, delay: Duration) {
            *self.metrics_delay.lock().unwrap() = Some(delay);
        }

        pub fn set_coordinate_delay(&self, delay: Duration) {
            *self.coordinate_delay.lock().unwrap() = Some(delay);
        }

        pub fn status_calls(&self) -> usize {
            self.status_calls.load(Ordering::SeqCst)
        }

        pub fn metrics_calls(&self) -> usize {
            self.metrics_calls.load(Ordering::SeqCst)
        }

        pub fn coordinate_calls(&self) -> usize {
            self.coordinate_calls.load(Ordering::SeqCst)
        }

        pub fn balance_calls(&self) -> usize {
            self.balance_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl FleetBackend for ScriptedBackend {
        async fn fetch_status(&self) -> FleetResult<RawFleetStatus> {
            self.status_calls.fetch_add(1, Ordering::SeqCst);
            let delay = *self.status_delay.lock().unwrap();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            next(&self.status, "status")
        }

        async fn fetch_metrics(&self) -> FleetResult<RawDashboardMetrics> {
            self.metrics_calls.fetch_add(1, Ordering::SeqCst);
            let delay = *self.metrics_delay.lock().unwrap();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            next(&self.metrics, "metrics")
        }

        async fn coordinate(&self, request: &CoordinationRequest) -> FleetResult<serde_json::Value> {
            self.coordinate_calls.fetch_add(1, Ordering::SeqCst);
            *self.last_request.lock().unwrap() = Some(request.clone());
            let delay = *self.coordinate_delay.lock().unwrap();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            next(&self.coordinate, "coordinate")
        }

        async fn balance_load(&self) -> FleetResult<()> {
            self.balance_calls.fetch_add(1, Ordering::SeqCst);
            next(&self.balance, "balance")
        }

        async fn coordination_status(&self, coordination_id: &str) -> FleetResult<CoordinationStatus> {
            Err(FleetError::backend(Some(404), format!("unknown coordination {}", coordination_id)))
        }
    }
}
