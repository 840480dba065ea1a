//! Plan normalization
//!
//! Converts the provider's loosely structured output into the canonical
//! Room/PlanEntry shape. The rule throughout: a field that cannot be
//! understood is dropped or defaulted, and the operation only fails when the
//! payload contains no identifiable room or entry list at all.

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

use crate::domain::{PlanEntry, Room, TemplateSchema, Weekday};

/// Raised only when a payload holds nothing that looks like a list
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("No recognizable room list in provider payload")]
    NoRooms,

    #[error("No recognizable entry list in provider payload")]
    NoEntries,
}

/// Plan fields recovered from a payload, before job metadata is attached
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedPlan {
    pub entries: Vec<PlanEntry>,
    pub total_area_m2: f64,
    pub template_name: Option<String>,
}

const ROOM_LIST_KEYS: &[&str] = &["rooms", "spaces"];
const ENTRY_LIST_KEYS: &[&str] = &["entries", "rows", "plan", "plan_entries"];
const AREA_KEYS: &[&str] = &["area_m2", "area", "size_m2", "square_meters"];

/// Recover a room list from floor-plan analysis output
pub fn normalize_rooms(payload: &Value) -> Result<Vec<Room>, NormalizeError> {
    let list = payload
        .as_array()
        .or_else(|| find_list(payload, ROOM_LIST_KEYS))
        .ok_or(NormalizeError::NoRooms)?;
    let rooms: Vec<Room> = list
        .iter()
        .enumerate()
        .filter_map(|(idx, raw)| room_from(raw, idx))
        .collect();
    debug!(raw = list.len(), normalized = rooms.len(), "Normalized room list");
    Ok(rooms)
}

/// Recover a plan from generation or conversion output.
///
/// Entry ids are reassigned as a dense 1..=N sequence in payload order and
/// the total area is recomputed from the entries; totals claimed by the
/// provider are ignored.
pub fn normalize_plan(payload: &Value) -> Result<NormalizedPlan, NormalizeError> {
    let list = payload
        .as_array()
        .or_else(|| find_list(payload, ENTRY_LIST_KEYS))
        .or_else(|| find_list(payload, ROOM_LIST_KEYS))
        .ok_or(NormalizeError::NoEntries)?;

    let mut entries = Vec::new();
    for raw in list {
        let id = entries.len() as u32 + 1;
        if let Some(entry) = entry_from(raw, id) {
            entries.push(entry);
        }
    }

    let total_area_m2 = entries.iter().filter_map(|e| e.area_m2).sum();
    let template_name = payload
        .get("template_name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string);

    debug!(entries = entries.len(), total_area_m2, "Normalized plan");
    Ok(NormalizedPlan {
        entries,
        total_area_m2,
        template_name,
    })
}

/// Recover a template schema. Template conditioning is advisory, so this
/// never fails: unusable payloads fall back to the standard columns.
pub fn normalize_template(payload: &Value, fallback_name: &str) -> TemplateSchema {
    let obj = payload.as_object();
    let name = obj
        .and_then(|o| string_field(o, &["name", "template_name"]))
        .unwrap_or_else(|| fallback_name.to_string());
    let mut schema = TemplateSchema {
        name,
        sections: string_list(obj, "sections"),
        categories: string_list(obj, "categories"),
        columns: string_list(obj, "columns"),
    };
    if schema.columns.is_empty() {
        schema.columns = TemplateSchema::standard().columns;
    }
    schema
}

fn find_list<'a>(payload: &'a Value, keys: &[&str]) -> Option<&'a Vec<Value>> {
    let obj = payload.as_object()?;
    keys.iter().find_map(|key| obj.get(*key).and_then(Value::as_array))
}

fn room_from(raw: &Value, idx: usize) -> Option<Room> {
    let obj = raw.as_object()?;
    Some(Room {
        id: string_field(obj, &["id", "room_id"]).unwrap_or_else(|| format!("r{}", idx + 1)),
        name: string_field(obj, &["name", "room_name", "room"])
            .unwrap_or_else(|| format!("Rom {}", idx + 1)),
        r#type: string_field(obj, &["type", "room_type", "category"])
            .unwrap_or_else(|| "unknown".to_string()),
        floor: string_field(obj, &["floor", "floor_label", "building", "level"]),
        area_m2: area_field(obj),
        notes: string_field(obj, &["notes", "comment"]),
    })
}

fn entry_from(raw: &Value, id: u32) -> Option<PlanEntry> {
    let obj = raw.as_object()?;
    Some(PlanEntry {
        id,
        room_name: string_field(obj, &["room_name", "name", "room"])
            .unwrap_or_else(|| format!("Rom {}", id)),
        area_m2: area_field(obj),
        floor: string_field(obj, &["floor", "floor_label", "building"]),
        description: string_field(obj, &["description", "tasks"]).unwrap_or_default(),
        frequency: frequency_from(obj.get("frequency")),
        notes: string_field(obj, &["notes", "comment"]),
    })
}

fn string_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        obj.get(*key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    })
}

fn string_list(obj: Option<&Map<String, Value>>, key: &str) -> Vec<String> {
    obj.and_then(|o| o.get(key))
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn area_field(obj: &Map<String, Value>) -> Option<f64> {
    AREA_KEYS
        .iter()
        .find_map(|key| obj.get(*key))
        .and_then(coerce_area)
}

/// Coerce an area value to a finite non-negative number, or None.
///
/// Strings shed unit suffixes (m2, m², kvm) and accept comma decimal
/// separators; everything else that cannot be read becomes None rather than
/// an error.
fn coerce_area(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|a| a.is_finite() && *a >= 0.0),
        Value::String(s) => {
            let lower = s.trim().to_lowercase();
            let stripped = ["m²", "m2", "kvm"]
                .iter()
                .find_map(|suffix| lower.strip_suffix(suffix))
                .unwrap_or(&lower);
            let cleaned = stripped.trim().replace(',', ".");
            cleaned.parse::<f64>().ok().filter(|a| a.is_finite() && *a >= 0.0)
        }
        _ => None,
    }
}

/// Build a complete seven-day frequency map from whatever the provider sent
fn frequency_from(raw: Option<&Value>) -> BTreeMap<Weekday, bool> {
    let mut map = Weekday::full_frequency(false);
    if let Some(Value::Object(obj)) = raw {
        for (key, value) in obj {
            if let Some(day) = Weekday::parse(key) {
                map.insert(day, truthy(value));
            }
        }
    }
    map
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => matches!(
            s.trim().to_lowercase().as_str(),
            "1" | "true" | "x" | "yes" | "on"
        ),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        _ => false,
    }
}
