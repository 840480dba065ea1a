//! Plan job orchestrator
//!
//! Owns the pending -> running -> success|failed state machine for generator
//! and converter jobs. The single-job path is all-or-nothing: a failure at
//! any step discards partial results and nothing reaches the plan store.

use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::config::ConfigSnapshot;
use crate::domain::{
    FloorPlanOptions, Job, JobStatus, Plan, PlanSource, Room, TemplateSchema, merge_rooms,
};
use crate::gateway::{Capability, InvokeRequest, ReasoningClient};
use crate::normalize;
use crate::prompts;

use planstore::NewPlan;

use super::{PipelineContext, PipelineError, analyze_template, encode_plan, gated_invoke, load_document};

/// Orchestrates single- and multi-document plan jobs
pub struct PlanJobRunner {
    ctx: PipelineContext,
}

enum JobKind {
    Generate {
        file_ids: Vec<String>,
        options: FloorPlanOptions,
        template_id: Option<String>,
    },
    Convert {
        file_id: String,
    },
}

struct JobDone {
    plan_id: String,
    export_id: Option<String>,
}

impl PlanJobRunner {
    pub fn new(ctx: PipelineContext) -> Self {
        Self { ctx }
    }

    /// Start a generation job over one or more floor-plan documents.
    /// Returns the pending job immediately; the pipeline runs in the
    /// background and clients poll [`Self::status`].
    pub fn start_generate(
        &self,
        file_ids: Vec<String>,
        options: FloorPlanOptions,
        template_id: Option<String>,
    ) -> Job {
        let job = Job::new(file_ids.len());
        self.ctx.board.insert_job(job.clone());
        info!(job_id = %job.id, files = file_ids.len(), "Starting generation job");

        let ctx = self.ctx.clone();
        let job_id = job.id.clone();
        tokio::spawn(async move {
            run_job(
                ctx,
                job_id,
                JobKind::Generate {
                    file_ids,
                    options,
                    template_id,
                },
            )
            .await;
        });
        job
    }

    /// Start a conversion job: one document, one call, same state machine
    pub fn start_convert(&self, file_id: String) -> Job {
        let job = Job::new(1);
        self.ctx.board.insert_job(job.clone());
        info!(job_id = %job.id, %file_id, "Starting conversion job");

        let ctx = self.ctx.clone();
        let job_id = job.id.clone();
        tokio::spawn(async move {
            run_job(ctx, job_id, JobKind::Convert { file_id }).await;
        });
        job
    }

    /// Snapshot of a job for polling clients
    pub fn status(&self, job_id: &str) -> Option<Job> {
        self.ctx.board.job(job_id)
    }
}

async fn run_job(ctx: PipelineContext, job_id: String, kind: JobKind) {
    ctx.board.update_job(&job_id, |job| {
        job.status = JobStatus::Running;
        job.message = Some("Analyzing documents".to_string());
    });

    let started = Instant::now();
    let outcome = match tokio::time::timeout(ctx.job_timeout, execute(&ctx, &job_id, kind, started)).await
    {
        Ok(result) => result,
        Err(_) => Err(PipelineError::Timeout(ctx.job_timeout)),
    };

    match outcome {
        Ok(done) => {
            info!(%job_id, plan_id = %done.plan_id, "Job complete");
            ctx.board.update_job(&job_id, |job| {
                job.status = JobStatus::Success;
                job.message = Some("Plan generated".to_string());
                job.plan_id = Some(done.plan_id.clone());
                job.export_id = done.export_id.clone();
                job.processed_files = job.total_files;
            });
        }
        Err(err) => {
            warn!(%job_id, error = %err, "Job failed");
            let detail = err.failure_detail();
            ctx.board.update_job(&job_id, |job| {
                job.status = JobStatus::Failed;
                job.message = Some(detail.message.clone());
                job.detail = Some(detail.clone());
            });
        }
    }
}

async fn execute(
    ctx: &PipelineContext,
    job_id: &str,
    kind: JobKind,
    started: Instant,
) -> Result<JobDone, PipelineError> {
    // One snapshot per pipeline: concurrent admin edits never affect an
    // in-flight job.
    let snapshot = ctx.snapshots.take()?;
    let client = ctx.factory.create(&snapshot)?;

    match kind {
        JobKind::Generate {
            file_ids,
            options,
            template_id,
        } => generate(ctx, job_id, &snapshot, &client, file_ids, options, template_id, started).await,
        JobKind::Convert { file_id } => convert(ctx, &snapshot, &client, file_id, started).await,
    }
}

#[allow(clippy::too_many_arguments)]
async fn generate(
    ctx: &PipelineContext,
    job_id: &str,
    snapshot: &ConfigSnapshot,
    client: &Arc<dyn ReasoningClient>,
    file_ids: Vec<String>,
    options: FloorPlanOptions,
    template_id: Option<String>,
    started: Instant,
) -> Result<JobDone, PipelineError> {
    // Per-document analysis runs concurrently; join_all hands results back
    // in submission order, so the merge is deterministic regardless of
    // completion order.
    let options_ref = &options;
    let analyses = file_ids.iter().map(|file_id| {
        let client = Arc::clone(client);
        async move {
            let document = load_document(&ctx.blobs, file_id)?;
            let request = InvokeRequest {
                capability: Capability::AnalyzeFloorplan,
                documents: vec![document],
                text: Some(prompts::analysis_details(options_ref)),
                instructions: prompts::instruction_for(
                    Capability::AnalyzeFloorplan,
                    &snapshot.system_prompt,
                ),
                tuning: snapshot.tuning.clone(),
            };
            let payload = gated_invoke(ctx, &client, &request).await?;
            let rooms = normalize::normalize_rooms(&payload)?;
            ctx.board.update_job(job_id, |job| job.processed_files += 1);
            Ok::<Vec<Room>, PipelineError>(rooms)
        }
    });

    // Template analysis conditions generation but does not block the
    // per-document work.
    let template_future = async {
        match &template_id {
            Some(tid) => Ok(Some(analyze_template(ctx, client, snapshot, tid).await?)),
            None => Ok::<Option<TemplateSchema>, PipelineError>(None),
        }
    };

    let (per_document, template) = tokio::join!(join_all(analyses), template_future);

    let mut room_lists = Vec::with_capacity(per_document.len());
    for result in per_document {
        room_lists.push(result?);
    }
    let template = template?;

    let rooms = merge_rooms(room_lists);
    let schema = template.clone().unwrap_or_else(TemplateSchema::standard);

    ctx.board.update_job(job_id, |job| {
        job.message = Some("Generating plan".to_string());
    });

    let request = InvokeRequest {
        capability: Capability::GeneratePlan,
        documents: Vec::new(),
        text: Some(json!({ "rooms": rooms, "template": schema }).to_string()),
        instructions: prompts::instruction_for(Capability::GeneratePlan, &snapshot.system_prompt),
        tuning: snapshot.tuning.clone(),
    };
    let payload = gated_invoke(ctx, client, &request).await?;
    let normalized = normalize::normalize_plan(&payload)?;

    let metadata = json!({
        "file_count": file_ids.len(),
        "template_id": &template_id,
        "plan_category": &options.plan_category,
    });
    let plan = Plan::new(
        normalized.entries,
        normalized.total_area_m2,
        template.map(|t| t.name),
        PlanSource::Generator,
        metadata,
    );
    let request_payload = json!({
        "file_ids": &file_ids,
        "options": &options,
        "template_id": &template_id,
    });
    persist(ctx, &plan, request_payload, started)
}

async fn convert(
    ctx: &PipelineContext,
    snapshot: &ConfigSnapshot,
    client: &Arc<dyn ReasoningClient>,
    file_id: String,
    started: Instant,
) -> Result<JobDone, PipelineError> {
    let document = load_document(&ctx.blobs, &file_id)?;
    let request = InvokeRequest {
        capability: Capability::ConvertToStandard,
        documents: vec![document],
        text: None,
        instructions: prompts::instruction_for(Capability::ConvertToStandard, &snapshot.system_prompt),
        tuning: snapshot.tuning.clone(),
    };
    let payload = gated_invoke(ctx, client, &request).await?;
    let normalized = normalize::normalize_plan(&payload)?;

    let plan = Plan::new(
        normalized.entries,
        normalized.total_area_m2,
        normalized.template_name,
        PlanSource::Converter,
        json!({ "file_count": 1 }),
    );
    persist(ctx, &plan, json!({ "file_id": file_id }), started)
}

/// Render the export artifact (when an exporter is wired) and write the plan
/// row. This is the only place a single-job pipeline touches the plan store.
fn persist(
    ctx: &PipelineContext,
    plan: &Plan,
    request_payload: Value,
    started: Instant,
) -> Result<JobDone, PipelineError> {
    let export_id = match &ctx.exporter {
        Some(exporter) => {
            let bytes = exporter.render(plan)?;
            let filename = format!("plan.{}", exporter.extension());
            Some(ctx.blobs.put(&bytes, &filename, "exports")?)
        }
        None => None,
    };

    let plan_id = ctx.plans.save(&NewPlan {
        id: plan.id.clone(),
        source: plan.source.to_string(),
        request_payload: Some(request_payload),
        plan_json: encode_plan(plan)?,
        export_id: export_id.clone(),
        metadata: Some(plan.metadata.clone()),
        generation_ms: Some(started.elapsed().as_millis() as i64),
    })?;

    Ok(JobDone { plan_id, export_id })
}
