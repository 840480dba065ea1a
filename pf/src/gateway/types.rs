//! Gateway request types and payload extraction

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::GatewayError;

/// The fixed set of call shapes the gateway supports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    AnalyzeFloorplan,
    AnalyzeTemplate,
    GeneratePlan,
    ConvertToStandard,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AnalyzeFloorplan => "analyze_floorplan",
            Self::AnalyzeTemplate => "analyze_template",
            Self::GeneratePlan => "generate_plan",
            Self::ConvertToStandard => "convert_to_standard",
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A source document handed to the provider
#[derive(Debug, Clone)]
pub struct DocumentRef {
    pub file_id: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl DocumentRef {
    /// Build a reference, guessing the MIME type from the filename
    pub fn new(file_id: impl Into<String>, filename: &str, bytes: Vec<u8>) -> Self {
        let mime_type = mime_guess::from_path(filename)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        Self {
            file_id: file_id.into(),
            mime_type,
            bytes,
        }
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    pub fn is_pdf(&self) -> bool {
        self.mime_type == "application/pdf"
    }
}

/// Media resolution hint for document parts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaResolution {
    Low,
    Medium,
    High,
}

impl MediaResolution {
    pub fn wire_name(&self) -> &'static str {
        match self {
            Self::Low => "MEDIA_RESOLUTION_LOW",
            Self::Medium => "MEDIA_RESOLUTION_MEDIUM",
            Self::High => "MEDIA_RESOLUTION_HIGH",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

/// Optional model tuning. Absent fields are omitted from the provider
/// payload so the provider's own defaults apply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub media_resolution: Option<MediaResolution>,
}

impl Tuning {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(t) = self.temperature
            && !(0.0..=2.0).contains(&t)
        {
            return Err(format!("temperature {} outside [0, 2]", t));
        }
        if let Some(p) = self.top_p
            && !(0.0..=1.0).contains(&p)
        {
            return Err(format!("nucleus sampling threshold {} outside [0, 1]", p));
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.temperature.is_none() && self.top_p.is_none() && self.media_resolution.is_none()
    }
}

/// Everything needed for one provider call
#[derive(Debug, Clone)]
pub struct InvokeRequest {
    pub capability: Capability,
    pub documents: Vec<DocumentRef>,

    /// Text payload: request detail lines, or prior structured output for
    /// plan generation
    pub text: Option<String>,

    /// Resolved instruction text (config override or built-in default plus
    /// the capability contract)
    pub instructions: String,

    pub tuning: Tuning,
}

impl InvokeRequest {
    /// Contract checks that hold for every capability: some input must be
    /// present and tuning must be in range.
    pub fn validate(&self) -> Result<(), GatewayError> {
        if self.documents.is_empty() && self.text.as_deref().is_none_or(str::is_empty) {
            return Err(GatewayError::InvalidRequest(format!(
                "{} requires at least one document or a text payload",
                self.capability
            )));
        }
        self.tuning.validate().map_err(GatewayError::InvalidRequest)
    }
}

/// Pull structured data out of an untrusted provider reply.
///
/// Tries a direct parse, then a fenced code block, then the widest bracketed
/// substring. When nothing parses the raw text is returned as a JSON string
/// so the normalizer can classify the payload; a garbled reply is its
/// problem, not a gateway crash.
pub fn extract_json(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Value::String(String::new());
    }
    if let Ok(value) = serde_json::from_str(trimmed) {
        return value;
    }
    if let Some(inner) = strip_fence(trimmed)
        && let Ok(value) = serde_json::from_str(inner)
    {
        return value;
    }
    for (open, close) in [('{', '}'), ('[', ']')] {
        if let (Some(start), Some(end)) = (trimmed.find(open), trimmed.rfind(close))
            && start < end
            && let Ok(value) = serde_json::from_str(&trimmed[start..=end])
        {
            return value;
        }
    }
    Value::String(raw.to_string())
}

fn strip_fence(raw: &str) -> Option<&str> {
    let rest = raw.strip_prefix("```")?;
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let end = rest.rfind("```")?;
    Some(rest[..end].trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(documents: Vec<DocumentRef>, text: Option<&str>) -> InvokeRequest {
        InvokeRequest {
            capability: Capability::AnalyzeFloorplan,
            documents,
            text: text.map(str::to_string),
            instructions: "extract rooms".to_string(),
            tuning: Tuning::default(),
        }
    }

    #[test]
    fn test_capability_wire_names() {
        assert_eq!(Capability::AnalyzeFloorplan.as_str(), "analyze_floorplan");
        assert_eq!(Capability::ConvertToStandard.as_str(), "convert_to_standard");
    }

    #[test]
    fn test_document_ref_guesses_mime() {
        assert_eq!(DocumentRef::new("f", "plan.png", vec![]).mime_type, "image/png");
        assert_eq!(DocumentRef::new("f", "plan.pdf", vec![]).mime_type, "application/pdf");
        assert_eq!(
            DocumentRef::new("f", "plan.unknown-ext", vec![]).mime_type,
            "application/octet-stream"
        );
    }

    #[test]
    fn test_validate_requires_input() {
        let err = request(vec![], None).validate().unwrap_err();
        assert!(matches!(err, GatewayError::InvalidRequest(_)));

        assert!(request(vec![], Some("")).validate().is_err());
        assert!(request(vec![], Some("rooms payload")).validate().is_ok());
        assert!(
            request(vec![DocumentRef::new("f", "a.png", vec![1])], None)
                .validate()
                .is_ok()
        );
    }

    #[test]
    fn test_validate_tuning_ranges() {
        let mut req = request(vec![], Some("payload"));
        req.tuning.temperature = Some(2.5);
        assert!(req.validate().is_err());

        req.tuning.temperature = Some(1.0);
        req.tuning.top_p = Some(-0.1);
        assert!(req.validate().is_err());

        req.tuning.top_p = Some(0.9);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_media_resolution_parse() {
        assert_eq!(MediaResolution::parse(" High "), Some(MediaResolution::High));
        assert_eq!(MediaResolution::parse("medium"), Some(MediaResolution::Medium));
        assert_eq!(MediaResolution::parse("ultra"), None);
    }

    #[test]
    fn test_extract_json_direct() {
        let value = extract_json(r#"{"rooms": []}"#);
        assert_eq!(value, json!({ "rooms": [] }));
    }

    #[test]
    fn test_extract_json_fenced() {
        let value = extract_json("```json\n{\"rooms\": [{\"id\": \"r1\"}]}\n```");
        assert_eq!(value["rooms"][0]["id"], "r1");
    }

    #[test]
    fn test_extract_json_embedded_in_prose() {
        let value = extract_json("Here is the result:\n{\"entries\": []}\nHope that helps!");
        assert_eq!(value, json!({ "entries": [] }));
    }

    #[test]
    fn test_extract_json_garbage_becomes_string() {
        let value = extract_json("I could not read the drawing.");
        assert_eq!(value, Value::String("I could not read the drawing.".to_string()));
    }

    #[test]
    fn test_extract_json_top_level_array() {
        let value = extract_json("```\n[{\"room_name\": \"A\"}]\n```");
        assert!(value.is_array());
    }
}
