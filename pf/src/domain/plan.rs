//! Plans, plan entries, and the weekday frequency domain

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Day keys used in plan frequency maps, in week order
pub const ALL_DAYS: [Weekday; 7] = [
    Weekday::Man,
    Weekday::Tirs,
    Weekday::Ons,
    Weekday::Tors,
    Weekday::Fre,
    Weekday::Lor,
    Weekday::Son,
];

/// One day of the cleaning week. Wire names are the Norwegian abbreviations
/// used throughout generated plans (MAN..SØN).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Weekday {
    #[serde(rename = "MAN")]
    Man,
    #[serde(rename = "TIRS")]
    Tirs,
    #[serde(rename = "ONS")]
    Ons,
    #[serde(rename = "TORS")]
    Tors,
    #[serde(rename = "FRE")]
    Fre,
    #[serde(rename = "LØR")]
    Lor,
    #[serde(rename = "SØN")]
    Son,
}

impl Weekday {
    /// Canonical wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Man => "MAN",
            Self::Tirs => "TIRS",
            Self::Ons => "ONS",
            Self::Tors => "TORS",
            Self::Fre => "FRE",
            Self::Lor => "LØR",
            Self::Son => "SØN",
        }
    }

    /// Tolerant parse: accepts the canonical key, full day names, and ASCII
    /// fallbacks for the two non-ASCII days.
    pub fn parse(raw: &str) -> Option<Self> {
        let key = raw.trim().trim_end_matches('.').to_uppercase();
        let starts = |prefixes: &[&str]| prefixes.iter().any(|p| key.starts_with(p));
        if starts(&["MAN"]) {
            Some(Self::Man)
        } else if starts(&["TIR"]) {
            Some(Self::Tirs)
        } else if starts(&["ONS"]) {
            Some(Self::Ons)
        } else if starts(&["TOR"]) {
            Some(Self::Tors)
        } else if starts(&["FRE"]) {
            Some(Self::Fre)
        } else if starts(&["LØR", "LOR"]) {
            Some(Self::Lor)
        } else if starts(&["SØN", "SON"]) {
            Some(Self::Son)
        } else {
            None
        }
    }

    /// A complete frequency map with every day set to the given value
    pub fn full_frequency(value: bool) -> BTreeMap<Weekday, bool> {
        ALL_DAYS.iter().map(|day| (*day, value)).collect()
    }
}

impl std::fmt::Display for Weekday {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One row of a cleaning plan, possibly merged from several rooms
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanEntry {
    /// Dense 1..=N sequence in plan order, reassigned on every generation
    pub id: u32,

    pub room_name: String,

    /// Square meters; None when not derivable from the source documents
    pub area_m2: Option<f64>,

    pub floor: Option<String>,

    /// Free-text description of the cleaning tasks for this row
    #[serde(default)]
    pub description: String,

    /// Always exactly one entry per recognized day
    #[serde(default)]
    pub frequency: BTreeMap<Weekday, bool>,

    pub notes: Option<String>,
}

/// Which pipeline produced a plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanSource {
    Generator,
    Converter,
    Batch,
}

impl std::fmt::Display for PlanSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Generator => write!(f, "generator"),
            Self::Converter => write!(f, "converter"),
            Self::Batch => write!(f, "batch"),
        }
    }
}

/// The generated cleaning-plan artifact. Immutable once created; a new
/// generation produces a new plan with a new id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub id: String,
    pub entries: Vec<PlanEntry>,

    /// Sum of the present entry areas, recomputed at normalization time
    pub total_area_m2: f64,

    /// Set when the plan was generated against a template or produced by
    /// conversion
    pub template_name: Option<String>,

    pub source: PlanSource,
    pub created_at: DateTime<Utc>,

    /// Free-form generation metadata: file count, template id, timing
    #[serde(default)]
    pub metadata: Value,
}

impl Plan {
    /// Create a plan with a freshly minted id
    pub fn new(
        entries: Vec<PlanEntry>,
        total_area_m2: f64,
        template_name: Option<String>,
        source: PlanSource,
        metadata: Value,
    ) -> Self {
        Self {
            id: Uuid::now_v7().simple().to_string(),
            entries,
            total_area_m2,
            template_name,
            source,
            created_at: Utc::now(),
            metadata,
        }
    }
}
