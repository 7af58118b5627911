use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;

use super::types::*;
use super::FleetBackend;
use crate::config::BackendConfig;
use crate::error::{FleetError, FleetResult};
use crate::telemetry::{RawDashboardMetrics, RawFleetStatus};

/// reqwest-backed client for the fleet REST API.
pub struct HttpFleetBackend {
    client: Client,
    config: BackendConfig,
}

impl HttpFleetBackend {
    pub fn new(config: BackendConfig) -> FleetResult<Self> {
        let client = Client::builder()
            .user_agent(concat!("fleetdeck/", env!("CARGO_PKG_VERSION")))
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| FleetError::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// The coordination lookup URL with `coordination_id` as one encoded path
    /// segment, so `/`, `?` or `#` in an id cannot alter the path or query.
    fn coordination_status_url(&self, coordination_id: &str) -> FleetResult<Url> {
        let template = self.config.coordination_status_path.as_str();
        let (prefix, suffix) = template.split_once("{id}").unwrap_or((template, ""));

        let mut url = Url::parse(&self.url(prefix.trim_end_matches('/')))
            .map_err(|e| FleetError::Config(format!("Invalid backend URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| FleetError::Config("Backend URL cannot carry a path".to_string()))?
            .push(coordination_id)
            .extend(suffix.split('/').filter(|s| !s.is_empty()));
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Send the request and unwrap `{ success, data }`.
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> FleetResult<Option<T>> {
        let response = self.authorize(request).send().await?;
        let response = Self::check_status(response).await?;

        let envelope: ApiEnvelope<T> = response.json().await?;
        if !envelope.success {
            return Err(FleetError::backend(
                None,
                envelope.reason().unwrap_or_else(|| "Request was not successful".to_string()),
            ));
        }
        Ok(envelope.data)
    }

    async fn send_for_data<T: DeserializeOwned>(&self, request: RequestBuilder, what: &str) -> FleetResult<T> {
        self.send(request)
            .await?
            .ok_or_else(|| FleetError::backend(None, format!("{} response has no data", what)))
    }

    /// Non-2xx becomes a `Backend` error carrying the envelope's message when
    /// there is one.
    async fn check_status(response: Response) -> FleetResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiEnvelope<serde_json::Value>>(&body)
            .ok()
            .and_then(|env| env.reason())
            .unwrap_or_else(|| format!("Request failed with status: {}", status));
        Err(FleetError::backend(Some(status.as_u16()), message))
    }
}

#[async_trait]
impl FleetBackend for HttpFleetBackend {
    async fn fetch_status(&self) -> FleetResult<RawFleetStatus> {
        let request = self.client.get(self.url(&self.config.status_path));
        self.send_for_data(request, "agent-status").await
    }

    async fn fetch_metrics(&self) -> FleetResult<RawDashboardMetrics> {
        let request = self
            .client
            .get(self.url(&self.config.metrics_path))
            .query(&[("timeRange", self.config.metrics_time_range.as_query())]);
        self.send_for_data(request, "dashboard-metrics").await
    }

    async fn coordinate(&self, body: &CoordinationRequest) -> FleetResult<serde_json::Value> {
        let request = self.client.post(self.url(&self.config.coordinate_path)).json(body);
        self.send_for_data(request, "coordinate-agents").await
    }

    async fn balance_load(&self) -> FleetResult<()> {
        let request = self.client.post(self.url(&self.config.balance_load_path));
        self.send::<serde_json::Value>(request).await.map(|_| ())
    }

    async fn coordination_status(&self, coordination_id: &str) -> FleetResult<CoordinationStatus> {
        let request = self.client.get(self.coordination_status_url(coordination_id)?);
        self.send_for_data(request, "coordination").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordination::{CoordinationMode, TaskType};
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn backend_for(server: &MockServer) -> HttpFleetBackend {
        HttpFleetBackend::new(BackendConfig {
            base_url: server.uri(),
            ..BackendConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_fetch_status_unwraps_envelope() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/ai-agents/multi-agent-status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": {
                    "totalAgents": 2,
                    "activeAgents": 1,
                    "processingTasks": 1,
                    "queuedTasks": 0,
                    "agentStates": {
                        "a1": { "name": "Carbon Analyzer", "status": "active", "lastActivity": "2026-03-01T11:00:00Z" }
                    }
                }
            })))
            .mount(&mock_server)
            .await;

        let status = backend_for(&mock_server).fetch_status().await.unwrap();
        assert_eq!(status.total_agents, Some(2));
        assert_eq!(status.agent_states["a1"].name.as_deref(), Some("Carbon Analyzer"));
    }

    #[tokio::test]
    async fn test_fetch_metrics_sends_time_range() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/ai-agents/dashboard-metrics"))
            .and(query_param("timeRange", "24h"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": { "timeRange": "24h", "summary": { "completedTasks": 4, "failedTasks": 1 } }
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let metrics = backend_for(&mock_server).fetch_metrics().await.unwrap();
        assert_eq!(metrics.summary.unwrap().completed_tasks, Some(4));
    }

    #[tokio::test]
    async fn test_bearer_token_is_sent() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/ai-agents/balance-load"))
            .and(header("Authorization", "Bearer secret-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "message": "Agent load balancing completed"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let backend = HttpFleetBackend::new(BackendConfig {
            base_url: mock_server.uri(),
            api_token: Some("secret-token".to_string()),
            ..BackendConfig::default()
        })
        .unwrap();

        assert!(backend.balance_load().await.is_ok());
    }

    #[tokio::test]
    async fn test_non_success_status_is_backend_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/ai-agents/balance-load"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({
                "success": false,
                "message": "Internal server error",
                "error": "queue unavailable"
            })))
            .mount(&mock_server)
            .await;

        let err = backend_for(&mock_server).balance_load().await.unwrap_err();
        assert_eq!(
            err,
            FleetError::backend(Some(500), "Internal server error: queue unavailable")
        );
    }

    #[tokio::test]
    async fn test_success_false_is_backend_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/ai-agents/multi-agent-status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": false,
                "message": "Agent registry not ready"
            })))
            .mount(&mock_server)
            .await;

        let err = backend_for(&mock_server).fetch_status().await.unwrap_err();
        assert!(matches!(err, FleetError::Backend { status: None, .. }));
    }

    #[tokio::test]
    async fn test_coordinate_posts_job_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/ai-agents/coordinate-agents"))
            .and(body_json(json!({
                "agentIds": ["a1", "a2"],
                "taskType": "carbon_analysis",
                "coordinationMode": "consensus",
                "input": { "msmeId": "m-7" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "message": "Agent coordination completed",
                "data": {
                    "coordinationId": "coord_1",
                    "mode": "consensus",
                    "results": { "mode": "consensus", "totalTasks": 2, "successful": 2, "consensus": { "confidence": 0.82 } }
                }
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let request = CoordinationRequest {
            agent_ids: vec!["a1".to_string(), "a2".to_string()],
            task_type: TaskType::CarbonAnalysis,
            coordination_mode: CoordinationMode::Consensus,
            input: json!({ "msmeId": "m-7" }),
        };
        let data = backend_for(&mock_server).coordinate(&request).await.unwrap();
        assert_eq!(data["coordinationId"], "coord_1");
        assert_eq!(data["results"]["consensus"]["confidence"], 0.82);
    }

    #[tokio::test]
    async fn test_coordination_status_lookup() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/ai-agents/coordination/coord_9"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": {
                    "coordinationId": "coord_9",
                    "totalTasks": 2,
                    "completedTasks": 1,
                    "failedTasks": 1,
                    "tasks": [
                        { "taskId": "t1", "agentName": "Data Processor", "status": "completed", "duration": 1200 },
                        { "taskId": "t2", "agentName": "Trend Analyzer", "status": "failed", "error": "timeout" }
                    ]
                }
            })))
            .mount(&mock_server)
            .await;

        let status = backend_for(&mock_server).coordination_status("coord_9").await.unwrap();
        assert_eq!(status.completed_tasks, 1);
        assert_eq!(status.tasks[1].error.as_deref(), Some("timeout"));
    }

    #[test]
    fn test_coordination_id_is_one_encoded_segment() {
        let backend = HttpFleetBackend::new(BackendConfig::default()).unwrap();

        let url = backend.coordination_status_url("coord/9?x#y").unwrap();
        assert_eq!(url.path(), "/api/ai-agents/coordination/coord%2F9%3Fx%23y");
        assert_eq!(url.query(), None);
        assert_eq!(url.fragment(), None);

        let url = backend.coordination_status_url("coord_9").unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:5000/api/ai-agents/coordination/coord_9");
    }

    #[tokio::test]
    async fn test_coordination_status_does_not_leak_into_query() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/ai-agents/coordination"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": { "coordinationId": "wrong" }
            })))
            .expect(0)
            .mount(&mock_server)
            .await;

        let err = backend_for(&mock_server).coordination_status("?all=1").await.unwrap_err();
        assert!(matches!(err, FleetError::Backend { status: Some(404), .. }));
    }

    #[tokio::test]
    async fn test_timeout_is_network_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/ai-agents/multi-agent-status"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "success": true, "data": {} }))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&mock_server)
            .await;

        let backend = HttpFleetBackend::new(BackendConfig {
            base_url: mock_server.uri(),
            request_timeout_ms: 50,
            ..BackendConfig::default()
        })
        .unwrap();

        let err = backend.fetch_status().await.unwrap_err();
        assert!(matches!(err, FleetError::Network(_)));
    }

    #[tokio::test]
    async fn test_handle_connection_error() {
        // Use a port that's guaranteed not to be listening
        let backend = HttpFleetBackend::new(BackendConfig {
            base_url: "http://127.0.0.1:59999".to_string(),
            ..BackendConfig::default()
        })
        .unwrap();

        let err = backend.fetch_metrics().await.unwrap_err();
        assert!(matches!(err, FleetError::Network(_)));
    }
}
