//! Batch orchestrator
//!
//! Fans the single-document pipeline out over many files with a bounded
//! worker pool. Member failures are recorded at their submission index and
//! never abort siblings; the batch itself only fails on orchestration-level
//! faults such as storage loss.

use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;
use futures::stream;
use serde_json::json;
use tracing::{info, warn};

use planstore::NewPlan;

use crate::config::{ConfigSnapshot, QualityConfig};
use crate::domain::{
    BatchJob, FailureDetail, FailureKind, FileOutcome, FloorPlanOptions, JobStatus, Plan,
    PlanEntry, PlanSource, QualityFlag, SubResult, TemplateSchema,
};
use crate::gateway::{Capability, InvokeRequest, ReasoningClient};
use crate::normalize;
use crate::prompts;

use super::{
    PipelineContext, PipelineError, analyze_template, encode_plan, gated_invoke, load_document,
};

/// Orchestrates batch jobs over many independent files
pub struct BatchRunner {
    ctx: PipelineContext,
    workers: usize,
}

impl BatchRunner {
    pub fn new(ctx: PipelineContext, workers: usize) -> Self {
        Self {
            ctx,
            workers: workers.max(1),
        }
    }

    /// Start a batch over the given files. Returns the pending batch job
    /// immediately; sub-pipelines run in the background under the worker
    /// pool and clients poll [`Self::status`].
    pub fn start(
        &self,
        file_ids: Vec<String>,
        options: FloorPlanOptions,
        template_id: Option<String>,
    ) -> BatchJob {
        let batch = BatchJob::new(file_ids.len());
        self.ctx.board.insert_batch(batch.clone());
        info!(batch_id = %batch.id, files = file_ids.len(), "Starting batch job");

        let ctx = self.ctx.clone();
        let workers = self.workers;
        let batch_id = batch.id.clone();
        tokio::spawn(async move {
            run_batch(ctx, workers, batch_id, file_ids, options, template_id).await;
        });
        batch
    }

    /// Snapshot of a batch job for polling clients
    pub fn status(&self, batch_id: &str) -> Option<BatchJob> {
        self.ctx.board.batch(batch_id)
    }
}

async fn run_batch(
    ctx: PipelineContext,
    workers: usize,
    batch_id: String,
    file_ids: Vec<String>,
    options: FloorPlanOptions,
    template_id: Option<String>,
) {
    ctx.board.update_batch(&batch_id, |batch| {
        batch.status = JobStatus::Running;
        batch.message = Some(format!("Processing {} files", batch.total_files));
    });

    // One snapshot and one template analysis for the whole batch; the
    // template, if any, applies uniformly to every file.
    let setup = setup_batch(&ctx, &template_id).await;
    let (snapshot, client, template) = match setup {
        Ok(parts) => parts,
        Err(err) => {
            fail_batch(&ctx, &batch_id, &file_ids, err);
            return;
        }
    };
    let schema = template.clone().unwrap_or_else(TemplateSchema::standard);
    let template_name = template.map(|t| t.name);

    stream::iter(file_ids.into_iter().enumerate().map(|(index, file_id)| {
        let client = Arc::clone(&client);
        let ctx = &ctx;
        let snapshot = &snapshot;
        let schema = &schema;
        let options = &options;
        let batch_id = &batch_id;
        let template_name = template_name.clone();
        async move {
            let result = single_file(ctx, &client, snapshot, schema, template_name, &file_id, options).await;
            let sub = match result {
                Ok((plan_id, flags)) => SubResult {
                    file_id: file_id.clone(),
                    outcome: FileOutcome::Success,
                    plan_id: Some(plan_id),
                    detail: None,
                    flags,
                },
                Err(err) => {
                    warn!(%batch_id, %file_id, error = %err, "Batch member failed");
                    SubResult {
                        file_id: file_id.clone(),
                        outcome: FileOutcome::Failed,
                        plan_id: None,
                        detail: Some(err.failure_detail()),
                        flags: Vec::new(),
                    }
                }
            };
            // Written by submission index, so ordering survives out-of-order
            // completion.
            ctx.board.update_batch(batch_id, |batch| {
                batch.processed_files += 1;
                match sub.outcome {
                    FileOutcome::Success => batch.success_count += 1,
                    FileOutcome::Failed => batch.failure_count += 1,
                }
                batch.sub_results[index] = Some(sub);
                batch.message = Some(format!(
                    "{}/{} files processed",
                    batch.processed_files, batch.total_files
                ));
            });
        }
    }))
    .buffer_unordered(workers)
    .collect::<Vec<()>>()
    .await;

    // Presence of completion is batch success; only storage-class faults
    // make the batch itself fail.
    let storage_fault = ctx
        .board
        .batch(&batch_id)
        .map(|batch| {
            batch
                .sub_results
                .iter()
                .flatten()
                .any(|sub| sub.detail.as_ref().is_some_and(|d| d.kind == FailureKind::Storage))
        })
        .unwrap_or(false);

    ctx.board.update_batch(&batch_id, |batch| {
        if storage_fault {
            batch.status = JobStatus::Failed;
            batch.message = Some("Storage unavailable while running batch".to_string());
            batch.detail = Some(FailureDetail {
                kind: FailureKind::Storage,
                message: "One or more files could not be persisted".to_string(),
                retryable: false,
            });
        } else {
            batch.status = JobStatus::Success;
            batch.message = Some(format!(
                "{} succeeded, {} failed",
                batch.success_count, batch.failure_count
            ));
        }
    });
    info!(%batch_id, "Batch complete");
}

type BatchSetup = (ConfigSnapshot, Arc<dyn ReasoningClient>, Option<TemplateSchema>);

async fn setup_batch(
    ctx: &PipelineContext,
    template_id: &Option<String>,
) -> Result<BatchSetup, PipelineError> {
    let snapshot = ctx.snapshots.take()?;
    let client = ctx.factory.create(&snapshot)?;
    let template = match template_id {
        Some(tid) => Some(analyze_template(ctx, &client, &snapshot, tid).await?),
        None => None,
    };
    Ok((snapshot, client, template))
}

/// The batch could not run at all: complete every open slot as failed so the
/// record is terminal and consistent, then mark the batch failed.
fn fail_batch(ctx: &PipelineContext, batch_id: &str, file_ids: &[String], err: PipelineError) {
    warn!(%batch_id, error = %err, "Batch setup failed");
    let detail = err.failure_detail();
    ctx.board.update_batch(batch_id, |batch| {
        for (index, file_id) in file_ids.iter().enumerate() {
            if batch.sub_results[index].is_none() {
                batch.sub_results[index] = Some(SubResult {
                    file_id: file_id.clone(),
                    outcome: FileOutcome::Failed,
                    plan_id: None,
                    detail: Some(detail.clone()),
                    flags: Vec::new(),
                });
                batch.failure_count += 1;
            }
        }
        batch.processed_files = batch.total_files;
        batch.status = JobStatus::Failed;
        batch.message = Some(detail.message.clone());
        batch.detail = Some(detail.clone());
    });
}

/// One single-document pipeline: analyze, generate, normalize, persist
async fn single_file(
    ctx: &PipelineContext,
    client: &Arc<dyn ReasoningClient>,
    snapshot: &ConfigSnapshot,
    schema: &TemplateSchema,
    template_name: Option<String>,
    file_id: &str,
    options: &FloorPlanOptions,
) -> Result<(String, Vec<QualityFlag>), PipelineError> {
    let started = Instant::now();

    let document = load_document(&ctx.blobs, file_id)?;
    let analyze = InvokeRequest {
        capability: Capability::AnalyzeFloorplan,
        documents: vec![document],
        text: Some(prompts::analysis_details(options)),
        instructions: prompts::instruction_for(Capability::AnalyzeFloorplan, &snapshot.system_prompt),
        tuning: snapshot.tuning.clone(),
    };
    let payload = gated_invoke(ctx, client, &analyze).await?;
    let rooms = normalize::normalize_rooms(&payload)?;

    let generate = InvokeRequest {
        capability: Capability::GeneratePlan,
        documents: Vec::new(),
        text: Some(json!({ "rooms": rooms, "template": schema }).to_string()),
        instructions: prompts::instruction_for(Capability::GeneratePlan, &snapshot.system_prompt),
        tuning: snapshot.tuning.clone(),
    };
    let payload = gated_invoke(ctx, client, &generate).await?;
    let normalized = normalize::normalize_plan(&payload)?;

    let flags = quality_flags(&ctx.quality, &normalized.entries);

    let plan = Plan::new(
        normalized.entries,
        normalized.total_area_m2,
        template_name,
        PlanSource::Batch,
        json!({ "file_count": 1, "file_id": file_id, "plan_category": &options.plan_category }),
    );
    let plan_id = ctx.plans.save(&NewPlan {
        id: plan.id.clone(),
        source: plan.source.to_string(),
        request_payload: Some(json!({ "file_id": file_id, "options": options })),
        plan_json: encode_plan(&plan)?,
        export_id: None,
        metadata: Some(plan.metadata.clone()),
        generation_ms: Some(started.elapsed().as_millis() as i64),
    })?;

    Ok((plan_id, flags))
}

/// Post-hoc quality signals for one successful member
fn quality_flags(quality: &QualityConfig, entries: &[PlanEntry]) -> Vec<QualityFlag> {
    let mut flags = Vec::new();
    if entries.len() < quality.min_rooms || entries.len() > quality.max_rooms {
        flags.push(QualityFlag::RoomCountOutOfRange);
    }
    if !entries.is_empty() {
        let missing = entries.iter().filter(|e| e.area_m2.is_none()).count();
        if missing as f64 / entries.len() as f64 > quality.missing_area_threshold {
            flags.push(QualityFlag::MissingAreaData);
        }
    }
    flags
}
