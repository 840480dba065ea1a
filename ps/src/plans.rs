//! Generated-plan records
//!
//! Plans are stored as opaque JSON documents alongside the request that
//! produced them. Listing returns summaries without the entry payload so a
//! history view stays cheap even with large plans.

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, params};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::db::Database;
use crate::error::{Result, StoreError};

/// A plan row ready to be written. The id is minted by the pipeline that
/// generated the plan, never by the store.
#[derive(Debug, Clone)]
pub struct NewPlan {
    pub id: String,
    pub source: String,
    pub request_payload: Option<Value>,
    pub plan_json: String,
    pub export_id: Option<String>,
    pub metadata: Option<Value>,
    pub generation_ms: Option<i64>,
}

/// Listing row: everything except the plan document itself
#[derive(Debug, Clone, Serialize)]
pub struct StoredPlanSummary {
    pub id: String,
    pub source: String,
    pub export_id: Option<String>,
    pub metadata: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub generation_ms: Option<i64>,
}

/// Full stored plan record
#[derive(Debug, Clone, Serialize)]
pub struct StoredPlan {
    pub summary: StoredPlanSummary,
    pub plan_json: String,
    pub request_payload: Option<Value>,
}

/// Durable record of every generated plan
#[derive(Clone)]
pub struct PlanStore {
    db: Arc<Database>,
}

impl PlanStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Persist one plan. Append-only: a plan id is written exactly once.
    pub fn save(&self, plan: &NewPlan) -> Result<String> {
        let now = Utc::now().to_rfc3339();
        let payload_json = encode_optional(&plan.request_payload)?;
        let metadata_json = encode_optional(&plan.metadata)?;
        self.db.with(|conn| {
            conn.execute(
                "INSERT INTO generated_plans
                 (id, source, request_payload, plan_json, export_id, metadata, created_at, generation_ms)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    plan.id,
                    plan.source,
                    payload_json,
                    plan.plan_json,
                    plan.export_id,
                    metadata_json,
                    now,
                    plan.generation_ms,
                ],
            )?;
            Ok(())
        })?;
        debug!(plan_id = %plan.id, source = %plan.source, "Saved plan");
        Ok(plan.id.clone())
    }

    /// Most recent plans first, without the entry payloads
    pub fn list(&self, limit: usize) -> Result<Vec<StoredPlanSummary>> {
        self.db.with(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, source, export_id, metadata, request_payload, created_at, generation_ms
                 FROM generated_plans
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT ?1",
            )?;
            let rows = stmt.query_map(params![limit as i64], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, Option<i64>>(6)?,
                ))
            })?;

            let mut summaries = Vec::new();
            for row in rows {
                let (id, source, export_id, metadata, payload, created_at, generation_ms) = row?;
                let payload = decode_optional(payload.as_deref())?;
                let metadata = with_file_count(decode_optional(metadata.as_deref())?, payload.as_ref());
                summaries.push(StoredPlanSummary {
                    id,
                    source,
                    export_id,
                    metadata,
                    created_at: parse_timestamp(&created_at)?,
                    generation_ms,
                });
            }
            Ok(summaries)
        })
    }

    /// Fetch one plan with its full document
    pub fn get(&self, plan_id: &str) -> Result<StoredPlan> {
        self.db.with(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, source, export_id, metadata, request_payload, created_at, generation_ms, plan_json
                     FROM generated_plans
                     WHERE id = ?1",
                    params![plan_id],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, Option<String>>(2)?,
                            row.get::<_, Option<String>>(3)?,
                            row.get::<_, Option<String>>(4)?,
                            row.get::<_, String>(5)?,
                            row.get::<_, Option<i64>>(6)?,
                            row.get::<_, String>(7)?,
                        ))
                    },
                )
                .optional()?
                .ok_or_else(|| StoreError::NotFound(format!("plan {}", plan_id)))?;

            let (id, source, export_id, metadata, payload, created_at, generation_ms, plan_json) = row;
            let request_payload = decode_optional(payload.as_deref())?;
            let metadata = with_file_count(decode_optional(metadata.as_deref())?, request_payload.as_ref());
            Ok(StoredPlan {
                summary: StoredPlanSummary {
                    id,
                    source,
                    export_id,
                    metadata,
                    created_at: parse_timestamp(&created_at)?,
                    generation_ms,
                },
                plan_json,
                request_payload,
            })
        })
    }
}

fn encode_optional(value: &Option<Value>) -> Result<Option<String>> {
    value.as_ref().map(|v| Ok(serde_json::to_string(v)?)).transpose()
}

fn decode_optional(raw: Option<&str>) -> Result<Option<Value>> {
    raw.map(|s| Ok(serde_json::from_str(s)?)).transpose()
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Malformed(format!("timestamp '{}': {}", raw, e)))
}

/// Older rows may predate the file_count metadata field; derive it from the
/// stored request payload so listings stay uniform.
fn with_file_count(metadata: Option<Value>, payload: Option<&Value>) -> Option<Value> {
    let file_count = payload
        .and_then(|p| p.get("file_ids"))
        .and_then(Value::as_array)
        .map(Vec::len)
        .filter(|count| *count > 0);

    match (metadata, file_count) {
        (Some(Value::Object(mut map)), Some(count)) => {
            map.entry("file_count").or_insert_with(|| Value::from(count));
            Some(Value::Object(map))
        }
        (None, Some(count)) => Some(serde_json::json!({ "file_count": count })),
        (metadata, _) => metadata,
    }
}
