//! Integration tests for PlanForge
//!
//! These drive the public API end-to-end: upload documents to the blob
//! store, start jobs through the orchestrators, poll the job board the way a
//! client would, and read results back from the plan store. The reasoning
//! provider is a scripted mock.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tempfile::TempDir;

use planstore::{BlobStore, Database, PlanStore, SettingsStore};

use planforge::config::{ProviderConfig, QualityConfig, SYSTEM_PROMPT_SETTING, SnapshotSource};
use planforge::gateway::client::mock::{MockFactory, MockReasoningClient};
use planforge::{
    BatchJob, BatchRunner, CallGate, Capability, FileOutcome, FloorPlanOptions, GateConfig,
    GatewayError, InvokeRequest, Job, JobBoard, JobStatus, JsonExporter, PipelineContext, Plan,
    PlanJobRunner, RetryPolicy,
};

struct Fixture {
    ctx: PipelineContext,
    settings: Arc<SettingsStore>,
    _temp: TempDir,
}

fn fixture(client: Arc<MockReasoningClient>) -> Fixture {
    let temp = TempDir::new().expect("tempdir");
    let db = Arc::new(Database::open_in_memory().expect("database"));
    let settings = Arc::new(SettingsStore::new(Arc::clone(&db)));
    settings.set_api_key("gemini", "test-key", None).expect("api key");

    let provider = ProviderConfig {
        api_key_env: "PLANFORGE_INTEGRATION_KEY_UNSET".to_string(),
        ..Default::default()
    };

    let ctx = PipelineContext {
        factory: Arc::new(MockFactory::new(client)),
        snapshots: Arc::new(SnapshotSource::new(provider, Arc::clone(&settings))),
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

    Fixture {
        ctx,
        settings,
        _temp: temp,
    }
}

/// A well-behaved model: extracts one room per document, echoes merged rooms
/// back as plan entries.
fn well_behaved_handler(request: &InvokeRequest) -> Result<Value, GatewayError> {
    match request.capability {
        Capability::AnalyzeFloorplan => Ok(json!({
            "rooms": [
                { "id": "r1", "name": "Kontor", "type": "office", "area_m2": 15.0 },
                { "id": "r2", "name": "Gang", "type": "corridor", "area_m2": 8.0 },
            ]
        })),
        Capability::AnalyzeTemplate => Ok(json!({
            "name": "Testmal",
            "sections": ["Daglig"],
            "categories": ["Kontor"],
            "columns": ["room_name", "frequency"],
        })),
        Capability::GeneratePlan => {
            let payload: Value =
                serde_json::from_str(request.text.as_deref().unwrap_or_default()).unwrap();
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
                        "frequency": { "MAN": true, "ONS": true, "FRE": true },
                    })
                })
                .collect();
            Ok(json!({ "entries": entries, "total_area_m2": 0 }))
        }
        Capability::ConvertToStandard => Ok(json!({
            "entries": [{ "room_name": "Resepsjon", "area_m2": 25 }],
            "template_name": "Ekstern mal",
        })),
    }
}

async fn wait_for_job(board: &JobBoard, id: &str) -> Job {
    for _ in 0..500 {
        if let Some(job) = board.job(id) {
            if job.status.is_terminal() {
                return job;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {} never reached a terminal state", id);
}

async fn wait_for_batch(board: &JobBoard, id: &str) -> BatchJob {
    for _ in 0..500 {
        if let Some(batch) = board.batch(id) {
            if batch.status.is_terminal() {
                return batch;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("batch {} never reached a terminal state", id);
}

// =============================================================================
// Single-job pipeline
// =============================================================================

#[tokio::test]
async fn test_generate_job_end_to_end() {
    let client = Arc::new(MockReasoningClient::with_handler(well_behaved_handler));
    let fixture = fixture(Arc::clone(&client));
    let runner = PlanJobRunner::new(fixture.ctx.clone());

    let file_id = fixture
        .ctx
        .blobs
        .put(b"drawing bytes", "floorplan.png", "uploads")
        .unwrap();
    let job = runner.start_generate(vec![file_id], FloorPlanOptions::default(), None);
    assert_eq!(job.status, JobStatus::Pending);

    let job = wait_for_job(&fixture.ctx.board, &job.id).await;
    assert_eq!(job.status, JobStatus::Success);
    assert_eq!(job.processed_files, job.total_files);

    // The stored plan is complete and consistent.
    let stored = fixture.ctx.plans.get(job.plan_id.as_deref().unwrap()).unwrap();
    let plan: Plan = serde_json::from_str(&stored.plan_json).unwrap();
    assert_eq!(plan.entries.len(), 2);
    assert!(plan.template_name.is_none());
    assert_eq!(plan.total_area_m2, 23.0);
    for entry in &plan.entries {
        assert_eq!(entry.frequency.len(), 7);
    }

    // The export artifact exists in the blob store.
    let export_id = job.export_id.unwrap();
    let export_bytes = fixture.ctx.blobs.get(&export_id).unwrap();
    let exported: Value = serde_json::from_slice(&export_bytes).unwrap();
    assert_eq!(exported["id"], json!(plan.id));

    // The listing surface shows the plan without its entries.
    let summaries = fixture.ctx.plans.list(10).unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].source, "generator");
    assert_eq!(
        summaries[0].metadata.as_ref().unwrap()["file_count"],
        json!(1)
    );
}

#[tokio::test]
async fn test_no_plan_row_for_failed_jobs() {
    let client = Arc::new(MockReasoningClient::with_handler(|request| {
        match request.capability {
            Capability::AnalyzeFloorplan => Ok(json!({
                "rooms": [{ "name": "Kontor" }]
            })),
            // Generation falls over with a permanent fault.
            Capability::GeneratePlan => Err(GatewayError::Api {
                status: 400,
                message: "bad request".to_string(),
            }),
            _ => panic!("unexpected capability"),
        }
    }));
    let fixture = fixture(client);
    let runner = PlanJobRunner::new(fixture.ctx.clone());

    let file_id = fixture.ctx.blobs.put(b"x", "plan.png", "uploads").unwrap();
    let job = runner.start_generate(vec![file_id], FloorPlanOptions::default(), None);
    let job = wait_for_job(&fixture.ctx.board, &job.id).await;

    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.plan_id.is_none());
    // All-or-nothing: no plan exists whose owning job is not successful.
    assert!(fixture.ctx.plans.list(10).unwrap().is_empty());
}

#[tokio::test]
async fn test_prompt_override_reaches_the_provider() {
    let client = Arc::new(MockReasoningClient::with_handler(well_behaved_handler));
    let fixture = fixture(Arc::clone(&client));
    fixture
        .settings
        .set_setting(SYSTEM_PROMPT_SETTING, "OVERRIDE PROMPT MARKER")
        .unwrap();

    let runner = PlanJobRunner::new(fixture.ctx.clone());
    let file_id = fixture.ctx.blobs.put(b"x", "plan.png", "uploads").unwrap();
    let job = runner.start_generate(vec![file_id], FloorPlanOptions::default(), None);
    let job = wait_for_job(&fixture.ctx.board, &job.id).await;
    assert_eq!(job.status, JobStatus::Success);

    for call in client.calls() {
        assert!(call.instructions.starts_with("OVERRIDE PROMPT MARKER"));
    }
}

#[tokio::test]
async fn test_convert_job_end_to_end() {
    let client = Arc::new(MockReasoningClient::with_handler(well_behaved_handler));
    let fixture = fixture(client);
    let runner = PlanJobRunner::new(fixture.ctx.clone());

    let file_id = fixture
        .ctx
        .blobs
        .put(b"old plan", "gammel_plan.pdf", "external")
        .unwrap();
    let job = runner.start_convert(file_id);
    let job = wait_for_job(&fixture.ctx.board, &job.id).await;

    assert_eq!(job.status, JobStatus::Success);
    let stored = fixture.ctx.plans.get(job.plan_id.as_deref().unwrap()).unwrap();
    assert_eq!(stored.summary.source, "converter");
    let plan: Plan = serde_json::from_str(&stored.plan_json).unwrap();
    assert_eq!(plan.template_name.as_deref(), Some("Ekstern mal"));
    assert_eq!(plan.total_area_m2, 25.0);
}

// =============================================================================
// Batch pipeline
// =============================================================================

#[tokio::test]
async fn test_batch_partial_failure_end_to_end() {
    let client = Arc::new(MockReasoningClient::with_handler(|request| {
        match request.capability {
            Capability::AnalyzeFloorplan => {
                if request.documents[0].file_id.contains("poison") {
                    Err(GatewayError::ContentPolicy("rejected".to_string()))
                } else {
                    Ok(json!({ "rooms": [{ "name": "Kontor", "area_m2": 10 }] }))
                }
            }
            Capability::GeneratePlan => well_behaved_handler(request),
            _ => panic!("unexpected capability"),
        }
    }));
    let fixture = fixture(client);
    let runner = BatchRunner::new(fixture.ctx.clone(), 3);

    let mut file_ids = Vec::new();
    for idx in 0..5 {
        let name = if idx == 2 { "poison.png" } else { "plan.png" };
        file_ids.push(fixture.ctx.blobs.put(b"bytes", name, "uploads").unwrap());
    }

    let batch = runner.start(file_ids, FloorPlanOptions::default(), None);
    let batch = wait_for_batch(&fixture.ctx.board, &batch.id).await;

    // A member failure is compatible with overall batch success.
    assert_eq!(batch.status, JobStatus::Success);
    assert_eq!(batch.processed_files, 5);
    assert_eq!(batch.terminal_sub_results(), 5);
    assert_eq!(batch.success_count, 4);
    assert_eq!(batch.failure_count, 1);

    let failed = batch.sub_results[2].as_ref().unwrap();
    assert_eq!(failed.outcome, FileOutcome::Failed);
    assert!(failed.plan_id.is_none());

    // Four distinct plans persisted, all tagged as batch output.
    let summaries = fixture.ctx.plans.list(10).unwrap();
    assert_eq!(summaries.len(), 4);
    assert!(summaries.iter().all(|s| s.source == "batch"));
}

#[tokio::test]
async fn test_batch_respects_submission_order() {
    let client = Arc::new(MockReasoningClient::with_handler(well_behaved_handler));
    let fixture = fixture(client);
    let runner = BatchRunner::new(fixture.ctx.clone(), 4);

    let mut file_ids = Vec::new();
    for _ in 0..8 {
        file_ids.push(fixture.ctx.blobs.put(b"bytes", "plan.png", "uploads").unwrap());
    }

    let batch = runner.start(file_ids.clone(), FloorPlanOptions::default(), None);
    let batch = wait_for_batch(&fixture.ctx.board, &batch.id).await;

    assert_eq!(batch.status, JobStatus::Success);
    // Slot order matches submission order even with concurrent workers.
    for (index, slot) in batch.sub_results.iter().enumerate() {
        assert_eq!(slot.as_ref().unwrap().file_id, file_ids[index]);
    }
}
