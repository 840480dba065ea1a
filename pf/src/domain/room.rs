//! Rooms extracted from floor-plan documents

use serde::{Deserialize, Serialize};

/// One physical space extracted from a floor plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    /// Unique within its source document
    pub id: String,

    pub name: String,

    /// High level room type, e.g. office, corridor, wc
    #[serde(rename = "type")]
    pub r#type: String,

    /// Floor or building label
    pub floor: Option<String>,

    /// Square meters; None when not derivable
    pub area_m2: Option<f64>,

    pub notes: Option<String>,
}

/// Per-request flags that steer how the model fills gaps during analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FloorPlanOptions {
    /// The drawing labels its rooms by name
    pub has_room_names: bool,

    /// The drawing carries area figures
    pub has_area: bool,

    /// Reference object for scale estimation when areas are absent
    pub reference_label: Option<String>,
    pub reference_width: Option<f64>,
    pub reference_unit: String,

    /// Plan category id, validated against the built-in list
    pub plan_category: Option<String>,
}

impl Default for FloorPlanOptions {
    fn default() -> Self {
        Self {
            has_room_names: true,
            has_area: true,
            reference_label: None,
            reference_width: None,
            reference_unit: "m".to_string(),
            plan_category: None,
        }
    }
}

/// Merge per-document room lists in submission order.
///
/// With more than one source document every room gets a document marker in
/// its floor label and id prefix, so identically named rooms from different
/// documents never collide in the merged list. A single-document job leaves
/// rooms untouched.
pub fn merge_rooms(per_document: Vec<Vec<Room>>) -> Vec<Room> {
    let tag_documents = per_document.len() > 1;
    let mut merged = Vec::new();
    for (doc_idx, rooms) in per_document.into_iter().enumerate() {
        let tag = format!("Dok {}", doc_idx + 1);
        for mut room in rooms {
            if tag_documents {
                room.id = format!("d{}-{}", doc_idx + 1, room.id);
                room.floor = Some(match room.floor.take() {
                    Some(floor) => format!("{} ({})", floor, tag),
                    None => tag.clone(),
                });
            }
            merged.push(room);
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room(id: &str, name: &str, floor: Option<&str>) -> Room {
        Room {
            id: id.to_string(),
            name: name.to_string(),
            r#type: "office".to_string(),
            floor: floor.map(str::to_string),
            area_m2: Some(10.0),
            notes: None,
        }
    }

    #[test]
    fn test_merge_single_document_untouched() {
        let merged = merge_rooms(vec![vec![room("r1", "Kontor", Some("2. etasje"))]]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].id, "r1");
        assert_eq!(merged[0].floor.as_deref(), Some("2. etasje"));
    }

    #[test]
    fn test_merge_tags_every_document_distinctly() {
        let merged = merge_rooms(vec![
            vec![room("r1", "Kontor", Some("1. etasje"))],
            vec![room("r1", "Kontor", Some("1. etasje"))],
            vec![room("r1", "Kontor", None)],
        ]);

        assert_eq!(merged.len(), 3);

        // Identical names and floors in the sources, but distinct tags after
        // the merge.
        let floors: Vec<_> = merged.iter().map(|r| r.floor.clone().unwrap()).collect();
        let unique: std::collections::HashSet<_> = floors.iter().collect();
        assert_eq!(unique.len(), 3);

        let ids: std::collections::HashSet<_> = merged.iter().map(|r| r.id.clone()).collect();
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn test_merge_preserves_submission_order() {
        let merged = merge_rooms(vec![
            vec![room("a", "A", None), room("b", "B", None)],
            vec![room("c", "C", None)],
        ]);
        let names: Vec<_> = merged.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_options_defaults() {
        let options = FloorPlanOptions::default();
        assert!(options.has_room_names);
        assert!(options.has_area);
        assert_eq!(options.reference_unit, "m");
        assert!(options.plan_category.is_none());
    }
}
