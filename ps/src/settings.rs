//! Admin settings and provider API keys
//!
//! Both tables are plain key/value with update timestamps. Whether a setting
//! is "overridden" is simply whether a row exists; callers that have a
//! built-in default derive the flag from presence.

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, params};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use crate::db::Database;
use crate::error::{Result, StoreError};

/// One stored setting row
#[derive(Debug, Clone, Serialize)]
pub struct Setting {
    pub name: String,
    pub value: String,
    pub updated_at: DateTime<Utc>,
}

/// API key metadata safe to show in admin surfaces. The value itself never
/// leaves the store except through [`SettingsStore::get_api_key`].
#[derive(Debug, Clone, Serialize)]
pub struct ApiKeySummary {
    pub name: String,
    pub label: String,
    pub configured: bool,
    pub last_four: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Key/value store for admin-editable configuration
#[derive(Clone)]
pub struct SettingsStore {
    db: Arc<Database>,
}

impl SettingsStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert or update a named API key. Names are normalized to lowercase.
    pub fn set_api_key(&self, name: &str, value: &str, label: Option<&str>) -> Result<ApiKeySummary> {
        let normalized = normalize_name(name)?;
        if value.is_empty() {
            return Err(StoreError::InvalidId("API key value cannot be empty".to_string()));
        }
        let now = Utc::now().to_rfc3339();
        self.db.with(|conn| {
            let existing_label: Option<String> = conn
                .query_row(
                    "SELECT label FROM api_keys WHERE name = ?1",
                    params![normalized],
                    |row| row.get(0),
                )
                .optional()?;
            let effective_label = label
                .map(str::to_string)
                .or(existing_label)
                .unwrap_or_else(|| normalized.clone());
            conn.execute(
                "INSERT INTO api_keys (name, label, value, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)
                 ON CONFLICT(name) DO UPDATE
                 SET label = excluded.label,
                     value = excluded.value,
                     updated_at = excluded.updated_at",
                params![normalized, effective_label, value, now],
            )?;
            Ok(())
        })?;
        debug!(name = %normalized, "Stored API key");
        self.api_key_summary(&normalized)?
            .ok_or_else(|| StoreError::NotFound(format!("api key {}", normalized)))
    }

    /// Fetch the secret value for a key, if configured
    pub fn get_api_key(&self, name: &str) -> Result<Option<String>> {
        let normalized = normalize_name(name)?;
        self.db.with(|conn| {
            Ok(conn
                .query_row(
                    "SELECT value FROM api_keys WHERE name = ?1",
                    params![normalized],
                    |row| row.get(0),
                )
                .optional()?)
        })
    }

    pub fn delete_api_key(&self, name: &str) -> Result<()> {
        let normalized = normalize_name(name)?;
        self.db.with(|conn| {
            conn.execute("DELETE FROM api_keys WHERE name = ?1", params![normalized])?;
            Ok(())
        })
    }

    /// Masked summaries of every configured key
    pub fn list_api_keys(&self) -> Result<Vec<ApiKeySummary>> {
        self.db.with(|conn| {
            let mut stmt =
                conn.prepare("SELECT name, label, value, updated_at FROM api_keys ORDER BY name")?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?;
            let mut keys = Vec::new();
            for row in rows {
                let (name, label, value, updated_at) = row?;
                keys.push(ApiKeySummary {
                    name,
                    label,
                    configured: true,
                    last_four: Some(mask(&value)),
                    updated_at: parse_timestamp(&updated_at).ok(),
                });
            }
            Ok(keys)
        })
    }

    fn api_key_summary(&self, name: &str) -> Result<Option<ApiKeySummary>> {
        Ok(self.list_api_keys()?.into_iter().find(|k| k.name == name))
    }

    /// Fetch a setting row, if present
    pub fn get_setting(&self, name: &str) -> Result<Option<Setting>> {
        self.db.with(|conn| {
            let row = conn
                .query_row(
                    "SELECT name, value, updated_at FROM settings WHERE name = ?1",
                    params![name],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                        ))
                    },
                )
                .optional()?;
            row.map(|(name, value, updated_at)| {
                Ok(Setting {
                    name,
                    value,
                    updated_at: parse_timestamp(&updated_at)?,
                })
            })
            .transpose()
        })
    }

    /// Insert or update a setting
    pub fn set_setting(&self, name: &str, value: &str) -> Result<Setting> {
        if name.is_empty() {
            return Err(StoreError::InvalidId("Setting name cannot be empty".to_string()));
        }
        let now = Utc::now().to_rfc3339();
        self.db.with(|conn| {
            conn.execute(
                "INSERT INTO settings (name, value, updated_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(name) DO UPDATE
                 SET value = excluded.value,
                     updated_at = excluded.updated_at",
                params![name, value, now],
            )?;
            Ok(())
        })?;
        self.get_setting(name)?
            .ok_or_else(|| StoreError::NotFound(format!("setting {}", name)))
    }

    pub fn delete_setting(&self, name: &str) -> Result<()> {
        self.db.with(|conn| {
            conn.execute("DELETE FROM settings WHERE name = ?1", params![name])?;
            Ok(())
        })
    }
}

fn normalize_name(name: &str) -> Result<String> {
    let normalized = name.trim().to_lowercase();
    if normalized.is_empty() {
        return Err(StoreError::InvalidId("API key name cannot be empty".to_string()));
    }
    Ok(normalized)
}

fn mask(value: &str) -> String {
    let tail: String = value
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    tail
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Malformed(format!("timestamp '{}': {}", raw, e)))
}
