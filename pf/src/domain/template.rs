//! Template schemas that shape plan generation

use serde::{Deserialize, Serialize};

/// Structure inferred from an example plan document: the sections, room
/// categories, and columns new output should follow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateSchema {
    pub name: String,
    #[serde(default)]
    pub sections: Vec<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub columns: Vec<String>,
}

impl TemplateSchema {
    /// Built-in schema used when no template document is supplied
    pub fn standard() -> Self {
        Self {
            name: "PlanForge Standard".to_string(),
            sections: vec!["Daglig renhold".to_string(), "Periodisk renhold".to_string()],
            categories: vec![
                "Kontor".to_string(),
                "Korridor".to_string(),
                "Toalett".to_string(),
                "Møterom".to_string(),
                "Fellesareal".to_string(),
            ],
            columns: vec![
                "room_name".to_string(),
                "area_m2".to_string(),
                "floor".to_string(),
                "description".to_string(),
                "frequency".to_string(),
                "notes".to_string(),
            ],
        }
    }
}
