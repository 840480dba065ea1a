//! PlanStore - durable storage for PlanForge
//!
//! Three stores over one data directory:
//!
//! - [`PlanStore`] - generated plan documents in SQLite
//! - [`SettingsStore`] - admin settings and provider API keys in SQLite
//! - [`BlobStore`] - uploaded source documents and export artifacts on disk
//!
//! The crate is deliberately domain-agnostic: plans are stored as JSON
//! documents, so the schema of a plan is owned entirely by the caller.

mod blobs;
mod db;
mod error;
mod plans;
mod settings;

pub use blobs::BlobStore;
pub use db::Database;
pub use error::{Result, StoreError};
pub use plans::{NewPlan, PlanStore, StoredPlan, StoredPlanSummary};
pub use settings::{ApiKeySummary, Setting, SettingsStore};
