//! Ingredient detection results and parsing of the vision model's reply.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{PipelineError, Result};
use crate::model_client::extract_json_object;

pub const DEFAULT_CONFIDENCE: f64 = 0.9;
pub const DEFAULT_FRESHNESS: &str = "good";
pub const UNREADABLE_WARNING: &str = "Could not parse ingredient detection response";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DetectedIngredient {
    pub name: String,
    /// In `[0, 1]`.
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub freshness: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IngredientDetection {
    pub ingredients: Vec<DetectedIngredient>,
    pub suggestions: Vec<String>,
    pub warnings: Vec<String>,
    pub image_quality: String,
    pub processing_time_ms: u64,
}

impl IngredientDetection {
    /// Empty result returned when the model reply cannot be understood.
    pub fn unreadable() -> Self {
        Self {
            ingredients: Vec::new(),
            suggestions: Vec::new(),
            warnings: vec![UNREADABLE_WARNING.to_string()],
            image_quality: "unknown".to_string(),
            processing_time_ms: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct DetectionOptions {
    /// Ask the model to estimate visible amounts.
    pub include_quantities: bool,
    /// Ask the model to judge freshness.
    pub include_freshness: bool,
    /// Drop detections below this confidence.
    pub min_confidence: Option<f64>,
}

impl Default for DetectionOptions {
    fn default() -> Self {
        Self {
            include_quantities: true,
            include_freshness: true,
            min_confidence: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDetection {
    #[serde(default)]
    ingredients: Vec<Value>,
    #[serde(default)]
    suggestions: Vec<Value>,
    #[serde(default)]
    warnings: Vec<Value>,
    #[serde(default, alias = "image_quality")]
    image_quality: Option<String>,
}

/// Parses the vision model's JSON reply.
///
/// Entries without a usable name are dropped; a bare string entry is taken as
/// the ingredient name. Missing confidence becomes [`DEFAULT_CONFIDENCE`] and
/// missing freshness becomes [`DEFAULT_FRESHNESS`].
pub fn parse_detection(raw: &str, options: &DetectionOptions) -> Result<IngredientDetection> {
    let parsed: RawDetection = serde_json::from_str(extract_json_object(raw))
        .map_err(|err| PipelineError::Parse(format!("ingredient detection: {err}")))?;

    let min_confidence = options.min_confidence.unwrap_or(0.0);
    let ingredients = parsed
        .ingredients
        .iter()
        .filter_map(ingredient_from_value)
        .filter(|ingredient| ingredient.confidence >= min_confidence)
        .collect();

    Ok(IngredientDetection {
        ingredients,
        suggestions: strings(&parsed.suggestions),
        warnings: strings(&parsed.warnings),
        image_quality: parsed
            .image_quality
            .map(|quality| quality.trim().to_lowercase())
            .filter(|quality| !quality.is_empty())
            .unwrap_or_else(|| "unknown".to_string()),
        processing_time_ms: 0,
    })
}

fn strings(values: &[Value]) -> Vec<String> {
    values
        .iter()
        .filter_map(|value| value.as_str())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
        .collect()
}

fn non_blank(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

fn ingredient_from_value(value: &Value) -> Option<DetectedIngredient> {
    if let Some(name) = value.as_str().map(str::trim).filter(|name| !name.is_empty()) {
        return Some(DetectedIngredient {
            name: name.to_string(),
            confidence: DEFAULT_CONFIDENCE,
            quantity: None,
            category: None,
            freshness: DEFAULT_FRESHNESS.to_string(),
        });
    }
    let object = value.as_object()?;
    let name = non_blank(object.get("name"))?;
    let confidence = match object.get("confidence") {
        Some(Value::Number(number)) => number.as_f64(),
        Some(Value::String(text)) => text.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|confidence| confidence.is_finite())
    .map(|confidence| confidence.clamp(0.0, 1.0))
    .unwrap_or(DEFAULT_CONFIDENCE);
    let quantity = match object.get("quantity") {
        Some(Value::Number(number)) => Some(number.to_string()),
        other => non_blank(other),
    };

    Some(DetectedIngredient {
        name,
        confidence,
        quantity,
        category: non_blank(object.get("category")),
        freshness: non_blank(object.get("freshness"))
            .map(|freshness| freshness.to_lowercase())
            .unwrap_or_else(|| DEFAULT_FRESHNESS.to_string()),
    })
}
