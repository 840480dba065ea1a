//! Embedded instruction text for provider calls
//!
//! The base system prompt can be overridden through the settings store; the
//! per-capability contract text is fixed so the normalizer always has a known
//! target shape to aim for.

use crate::domain::{FloorPlanOptions, plan_category};
use crate::gateway::Capability;

/// Built-in system prompt used when no override is stored
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an assistant that turns floor-plan documents into \
structured cleaning plans for commercial buildings. Be precise, keep room naming consistent with \
the source material, and answer with JSON only.";

/// Resolved instruction text for one capability: the (possibly overridden)
/// base prompt followed by the capability's output contract.
pub fn instruction_for(capability: Capability, base_prompt: &str) -> String {
    let contract = match capability {
        Capability::AnalyzeFloorplan => {
            "You receive a floor plan as an image or PDF. Extract a JSON object with the key \
             'rooms'. Every room must have the fields id, name, type, floor, area_m2 (may be null) \
             and notes (may be empty). Answer with JSON only."
        }
        Capability::AnalyzeTemplate => {
            "You receive an example cleaning-plan document. Describe its structure as a JSON \
             object with the keys 'name', 'sections', 'categories' and 'columns'. Answer with JSON \
             only."
        }
        Capability::GeneratePlan => {
            "You receive a list of rooms as JSON, possibly with a template schema. Return a JSON \
             object with the keys 'entries', 'total_area_m2' and 'template_name'. Every entry must \
             contain room_name, area_m2, floor, description, frequency (a map from MAN, TIRS, ONS, \
             TORS, FRE, LØR and SØN to booleans) and optional notes. Merge rooms of the same type \
             where it makes sense, but never drop a source document. Answer with JSON only."
        }
        Capability::ConvertToStandard => {
            "You receive an existing cleaning plan. Normalize it into the standard shape and \
             return a JSON object with the keys 'entries', 'total_area_m2' and 'template_name', \
             where entries follow the same fields as generated plans. Answer with JSON only."
        }
    };
    format!("{}\n{}", base_prompt.trim_end(), contract)
}

/// Detail lines for a floor-plan analysis call, steering how the model
/// should fill gaps in the drawing.
pub fn analysis_details(options: &FloorPlanOptions) -> String {
    let mut lines = vec![format!(
        "has_room_names={}, has_area={}, reference_unit={}.",
        options.has_room_names, options.has_area, options.reference_unit
    )];
    if !options.has_area {
        match (&options.reference_label, options.reference_width) {
            (Some(label), Some(width)) => lines.push(format!(
                "Use the reference measurement: {} with width {}{} to estimate square meters.",
                label, width, options.reference_unit
            )),
            (None, Some(width)) => lines.push(format!(
                "Use a reference measurement with width {}{} to estimate square meters.",
                width, options.reference_unit
            )),
            (Some(label), None) => lines.push(format!(
                "Use the reference measurement: {} to estimate square meters.",
                label
            )),
            (None, None) => lines.push(
                "No reference measurement is available; leave area_m2 null when it cannot be derived."
                    .to_string(),
            ),
        }
    }
    if let Some(category) = options.plan_category.as_deref().and_then(plan_category) {
        lines.push(format!(
            "Target plan category: {} ({}).",
            category.label_no, category.label_en
        ));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instruction_includes_base_prompt_and_contract() {
        let text = instruction_for(Capability::GeneratePlan, "Custom base prompt.");
        assert!(text.starts_with("Custom base prompt.\n"));
        assert!(text.contains("'entries'"));
        assert!(text.contains("LØR"));
    }

    #[test]
    fn test_analysis_details_degraded_mode_without_reference() {
        let options = FloorPlanOptions {
            has_area: false,
            ..Default::default()
        };
        let details = analysis_details(&options);
        assert!(details.contains("has_area=false"));
        assert!(details.contains("leave area_m2 null"));
    }

    #[test]
    fn test_analysis_details_with_reference_measurement() {
        let options = FloorPlanOptions {
            has_area: false,
            reference_label: Some("entrance door".to_string()),
            reference_width: Some(0.9),
            ..Default::default()
        };
        let details = analysis_details(&options);
        assert!(details.contains("entrance door"));
        assert!(details.contains("0.9m"));
    }

    #[test]
    fn test_analysis_details_mentions_category() {
        let options = FloorPlanOptions {
            plan_category: Some("school".to_string()),
            ..Default::default()
        };
        assert!(analysis_details(&options).contains("Skole og barnehage"));
    }
}
