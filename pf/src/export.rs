//! Plan export boundary
//!
//! Rendering export documents is a collaborator concern; the core only needs
//! bytes it can hand to the blob store and an opaque reference to record on
//! the job. A real document renderer plugs in through [`Exporter`] without
//! touching the orchestrators.

use thiserror::Error;

use crate::domain::Plan;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Export rendering failed: {0}")]
    Render(String),
}

/// Renders a plan into an exportable document
pub trait Exporter: Send + Sync {
    /// File extension for rendered documents, without the dot
    fn extension(&self) -> &'static str;

    fn render(&self, plan: &Plan) -> Result<Vec<u8>, ExportError>;
}

/// Fallback exporter: the plan document itself as pretty-printed JSON
pub struct JsonExporter;

impl Exporter for JsonExporter {
    fn extension(&self) -> &'static str {
        "json"
    }

    fn render(&self, plan: &Plan) -> Result<Vec<u8>, ExportError> {
        serde_json::to_vec_pretty(plan).map_err(|e| ExportError::Render(e.to_string()))
    }
}
