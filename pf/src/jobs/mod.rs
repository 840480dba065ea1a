//! Job orchestration
//!
//! Turns client requests into gateway calls, tracks each execution through
//! the Job state machine, and persists outcomes. [`PlanJobRunner`] owns the
//! all-or-nothing single-job pipeline; [`BatchRunner`] fans the per-file
//! variant out with bounded concurrency and partial-failure tolerance.

use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use planstore::{BlobStore, PlanStore, StoreError};

use crate::config::{ConfigSnapshot, QualityConfig, SnapshotSource};
use crate::domain::TemplateSchema;
use crate::export::Exporter;
use crate::gate::CallGate;
use crate::gateway::{
    Capability, ClientFactory, DocumentRef, GatewayError, InvokeRequest, ReasoningClient,
    RetryPolicy, invoke_with_retry,
};
use crate::normalize;
use crate::prompts;

mod batch;
mod board;
mod error;
mod runner;
#[cfg(test)]
pub(crate) mod testutil;

pub use batch::BatchRunner;
pub use board::JobBoard;
pub use error::PipelineError;
pub use runner::PlanJobRunner;

/// Everything a pipeline needs, shared by both orchestrators
#[derive(Clone)]
pub struct PipelineContext {
    pub factory: Arc<dyn ClientFactory>,
    pub snapshots: Arc<SnapshotSource>,
    pub gate: Arc<CallGate>,
    pub board: JobBoard,
    pub plans: PlanStore,
    pub blobs: Arc<BlobStore>,
    pub exporter: Option<Arc<dyn Exporter>>,
    pub retry: RetryPolicy,
    pub quality: QualityConfig,
    pub job_timeout: Duration,
}

/// Read a stored document into a gateway reference
pub(crate) fn load_document(blobs: &BlobStore, file_id: &str) -> Result<DocumentRef, PipelineError> {
    let bytes = blobs.get(file_id)?;
    Ok(DocumentRef::new(file_id, file_id, bytes))
}

/// One gated gateway call: the permit covers the call and its retries, so
/// backoff time counts against the provider ceiling too.
pub(crate) async fn gated_invoke(
    ctx: &PipelineContext,
    client: &Arc<dyn ReasoningClient>,
    request: &InvokeRequest,
) -> Result<Value, GatewayError> {
    let _permit = ctx.gate.acquire().await;
    invoke_with_retry(client.as_ref(), request, &ctx.retry).await
}

/// Analyze a template document into a schema that conditions generation
pub(crate) async fn analyze_template(
    ctx: &PipelineContext,
    client: &Arc<dyn ReasoningClient>,
    snapshot: &ConfigSnapshot,
    template_id: &str,
) -> Result<TemplateSchema, PipelineError> {
    let document = load_document(&ctx.blobs, template_id)?;
    let request = InvokeRequest {
        capability: Capability::AnalyzeTemplate,
        documents: vec![document],
        text: None,
        instructions: prompts::instruction_for(Capability::AnalyzeTemplate, &snapshot.system_prompt),
        tuning: snapshot.tuning.clone(),
    };
    let payload = gated_invoke(ctx, client, &request).await?;
    Ok(normalize::normalize_template(&payload, &template_label(template_id)))
}

/// Fallback template name derived from its file id
pub(crate) fn template_label(template_id: &str) -> String {
    Path::new(template_id)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(template_id)
        .replace('_', " ")
}

/// Serialize a plan for storage, folding serialization faults into storage
/// errors.
pub(crate) fn encode_plan(plan: &crate::domain::Plan) -> Result<String, PipelineError> {
    serde_json::to_string(plan)
        .map_err(StoreError::from)
        .map_err(PipelineError::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_label_from_file_id() {
        assert_eq!(template_label("templates/vaskeplan_2024.xlsx"), "vaskeplan 2024");
        assert_eq!(template_label("templates/plain"), "plain");
    }
}
