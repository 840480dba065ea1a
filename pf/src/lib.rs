//! PlanForge - floor-plan to cleaning-plan generation service
//!
//! PlanForge turns floor-plan documents (images/PDFs) into structured
//! cleaning plans using an external multimodal reasoning provider. The hard
//! part is the asynchronous job pipeline wrapped around a slow, unreliable
//! remote call: uploads go to a blob store, one or more long-running provider
//! invocations run under a shared call gate, jobs move through a polled
//! status state machine, the provider's loose output is normalized into a
//! stable tabular schema, and every result is persisted for later retrieval.
//!
//! # Modules
//!
//! - [`gateway`] - the single choke point for provider calls: payloads,
//!   failure classification, bounded transient retry
//! - [`normalize`] - best-effort conversion of untrusted provider output
//!   into the canonical plan shape
//! - [`jobs`] - the job and batch orchestrators plus the polled job board
//! - [`gate`] - bounded-concurrency call gate shared by all pipelines
//! - [`domain`] - rooms, plans, jobs, and their invariants
//! - [`config`] - YAML configuration and per-pipeline snapshots
//! - [`export`] - the export-rendering collaborator boundary
//! - [`prompts`] - embedded instruction text per capability
//! - [`cli`] - command-line interface

pub mod cli;
pub mod config;
pub mod domain;
pub mod export;
pub mod gate;
pub mod gateway;
pub mod jobs;
pub mod normalize;
pub mod prompts;

// Re-export commonly used types
pub use config::{Config, ConfigSnapshot, ProviderConfig, SnapshotSource};
pub use domain::{
    BatchJob, FailureDetail, FailureKind, FileOutcome, FloorPlanOptions, Job, JobStatus, Plan,
    PlanEntry, PlanSource, QualityFlag, Room, SubResult, TemplateSchema, Weekday,
};
pub use export::{Exporter, JsonExporter};
pub use gate::{CallGate, GateConfig};
pub use gateway::{
    Capability, ClientFactory, DocumentRef, GatewayError, GeminiClient, GeminiFactory,
    InvokeRequest, MediaResolution, ReasoningClient, RetryPolicy, Tuning, invoke_with_retry,
};
pub use jobs::{BatchRunner, JobBoard, PipelineContext, PipelineError, PlanJobRunner};
pub use normalize::{NormalizeError, NormalizedPlan};
