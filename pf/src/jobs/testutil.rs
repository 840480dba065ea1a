//! Shared fixtures for orchestrator tests

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tempfile::TempDir;

use planstore::{BlobStore, Database, PlanStore, SettingsStore};

use crate::config::{ProviderConfig, QualityConfig, SnapshotSource};
use crate::domain::{BatchJob, Job};
use crate::export::JsonExporter;
use crate::gate::{CallGate, GateConfig};
use crate::gateway::client::mock::{MockFactory, MockReasoningClient};
use crate::gateway::{GatewayError, InvokeRequest, ReasoningClient, RetryPolicy};

use super::{JobBoard, PipelineContext};

/// A fully wired pipeline context over temp storage and a mock client
pub(crate) struct TestHarness {
    pub ctx: PipelineContext,
    _temp: TempDir,
}

impl TestHarness {
    pub fn with_handler(
        handler: impl Fn(&InvokeRequest) -> Result<Value, GatewayError> + Send + Sync + 'static,
    ) -> Self {
        Self::with_client(Arc::new(MockReasoningClient::with_handler(handler)))
    }

    pub fn with_client(client: Arc<dyn ReasoningClient>) -> Self {
        let temp = TempDir::new().expect("tempdir");
        let db = Arc::new(Database::open_in_memory().expect("database"));
        let settings = Arc::new(SettingsStore::new(Arc::clone(&db)));
        settings.set_api_key("gemini", "test-key", None).expect("api key");

        // Point at an env var that is never set, so the key always resolves
        // through the settings store.
        let provider = ProviderConfig {
            api_key_env: "PLANFORGE_TEST_KEY_UNSET".to_string(),
            ..Default::default()
        };

        let ctx = PipelineContext {
            factory: Arc::new(MockFactory::new(client)),
            snapshots: Arc::new(SnapshotSource::new(provider, settings)),
            gate: Arc::new(CallGate::new(GateConfig::default())),
            board: JobBoard::new(),
            plans: PlanStore::new(db),
            blobs: Arc::new(BlobStore::open(temp.path().join("blobs")).expect("blob store")),
            exporter: Some(Arc::new(JsonExporter)),
            retry: RetryPolicy {
                max_retries: 3,
                initial_backoff: Duration::from_millis(1),
            },
            quality: QualityConfig::default(),
            job_timeout: Duration::from_secs(10),
        };
        Self { ctx, _temp: temp }
    }

    /// A client that takes `delay` per call, for timeout tests
    pub fn slow_client(delay: Duration) -> Self {
        Self::with_client(Arc::new(SlowClient { delay }))
    }

    pub fn upload(&self, bytes: &[u8], filename: &str) -> String {
        self.ctx.blobs.put(bytes, filename, "uploads").expect("upload")
    }

    pub fn plans(&self) -> &PlanStore {
        &self.ctx.plans
    }

    pub async fn wait_for_job(&self, id: &str) -> Job {
        for _ in 0..500 {
            if let Some(job) = self.ctx.board.job(id)
                && job.status.is_terminal()
            {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {} did not reach a terminal state", id);
    }

    pub async fn wait_for_batch(&self, id: &str) -> BatchJob {
        for _ in 0..500 {
            if let Some(batch) = self.ctx.board.batch(id)
                && batch.status.is_terminal()
            {
                return batch;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("batch {} did not reach a terminal state", id);
    }
}

struct SlowClient {
    delay: Duration,
}

#[async_trait::async_trait]
impl ReasoningClient for SlowClient {
    async fn invoke(&self, _request: InvokeRequest) -> Result<Value, GatewayError> {
        tokio::time::sleep(self.delay).await;
        Ok(json!({ "rooms": [] }))
    }
}

/// Analysis payload: rooms named as given, all with the same area
pub(crate) fn rooms_payload(names: &[&str], area: Option<f64>) -> Value {
    let rooms: Vec<Value> = names
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            json!({
                "id": format!("r{}", idx + 1),
                "name": name,
                "type": "office",
                "area_m2": area,
            })
        })
        .collect();
    json!({ "rooms": rooms })
}

/// Generation handler body: echo the request's merged rooms back as entries,
/// the way a well-behaved model would.
pub(crate) fn entries_from_rooms_payload(request: &InvokeRequest) -> Result<Value, GatewayError> {
    let text = request.text.as_deref().unwrap_or_default();
    let payload: Value =
        serde_json::from_str(text).map_err(|e| GatewayError::InvalidRequest(e.to_string()))?;
    let entries: Vec<Value> = payload["rooms"]
        .as_array()
        .cloned()
        .unwrap_or_default()
        .into_iter()
        .map(|room| {
            json!({
                "room_name": room["name"],
                "area_m2": room["area_m2"],
                "floor": room["floor"],
                "description": "Standard renhold",
                "frequency": { "MAN": true, "TORS": true },
            })
        })
        .collect();
    Ok(json!({ "entries": entries, "total_area_m2": 0.0 }))
}
