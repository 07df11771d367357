use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use super::{Nutrition, Recipe, RecipeDetails, RecipeIngredient, RecipeSource, RecipeStep};
use crate::error::{PipelineError, Result};
use crate::model_client::extract_json_object;

fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(text)) => Some(text.trim().to_string()).filter(|text| !text.is_empty()),
        Some(Value::Number(number)) => Some(number.to_string()),
        _ => None,
    })
}

/// Accepts `15`, `15.0`, or `"15 minutes"`.
fn lenient_u32<'de, D>(deserializer: D) -> std::result::Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(number)) => number
            .as_u64()
            .or_else(|| number.as_f64().filter(|n| *n >= 0.0).map(|n| n.round() as u64))
            .and_then(|n| u32::try_from(n).ok()),
        Some(Value::String(text)) => {
            let digits: String = text
                .trim()
                .chars()
                .take_while(|c| c.is_ascii_digit())
                .collect();
            digits.parse().ok()
        }
        _ => None,
    })
}

fn lenient_f64<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(number)) => number.as_f64(),
        Some(Value::String(text)) => text
            .trim()
            .trim_end_matches(|c: char| c.is_alphabetic() || c.is_whitespace())
            .parse()
            .ok(),
        _ => None,
    })
}

fn string_list<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(str::to_string)
            .collect(),
        Some(Value::String(text)) if !text.trim().is_empty() => vec![text.trim().to_string()],
        _ => Vec::new(),
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawIngredientLine {
    #[serde(default, deserialize_with = "lenient_string", alias = "item")]
    name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", alias = "quantity")]
    amount: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    unit: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", alias = "note")]
    notes: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawIngredient {
    Name(String),
    Line(RawIngredientLine),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStepDetail {
    #[serde(default, deserialize_with = "lenient_string", alias = "text", alias = "step")]
    instruction: Option<String>,
    #[serde(default, deserialize_with = "lenient_u32", alias = "time", alias = "durationMin")]
    duration_minutes: Option<u32>,
    #[serde(default, deserialize_with = "lenient_string")]
    temperature: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawStep {
    Text(String),
    Detail(RawStepDetail),
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawDetails {
    #[serde(deserialize_with = "lenient_u32")]
    servings: Option<u32>,
    #[serde(deserialize_with = "lenient_u32", alias = "prepTime")]
    prep_minutes: Option<u32>,
    #[serde(deserialize_with = "lenient_u32", alias = "cookTime")]
    cook_minutes: Option<u32>,
    #[serde(deserialize_with = "lenient_u32", alias = "totalTime")]
    total_minutes: Option<u32>,
    #[serde(deserialize_with = "lenient_string")]
    difficulty: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    cuisine: Option<String>,
    #[serde(deserialize_with = "lenient_string", alias = "cost")]
    cost_tier: Option<String>,
    #[serde(deserialize_with = "string_list")]
    equipment: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawNutrition {
    #[serde(deserialize_with = "lenient_f64")]
    calories: Option<f64>,
    #[serde(deserialize_with = "lenient_f64", alias = "protein")]
    protein_g: Option<f64>,
    #[serde(deserialize_with = "lenient_f64", alias = "carbs")]
    carbs_g: Option<f64>,
    #[serde(deserialize_with = "lenient_f64", alias = "fat")]
    fat_g: Option<f64>,
    #[serde(deserialize_with = "lenient_f64", alias = "fiber")]
    fiber_g: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRecipeDocument {
    #[serde(default, deserialize_with = "lenient_string", alias = "name")]
    title: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    summary: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    description: Option<String>,
    #[serde(default)]
    ingredients: Vec<RawIngredient>,
    #[serde(default, alias = "instructions")]
    steps: Vec<RawStep>,
    #[serde(default)]
    details: RawDetails,
    #[serde(default)]
    nutrition: Option<RawNutrition>,
    #[serde(default, deserialize_with = "string_list")]
    tips: Vec<String>,
    #[serde(default, deserialize_with = "string_list")]
    variations: Vec<String>,
    #[serde(default, deserialize_with = "string_list")]
    tags: Vec<String>,
}

/// A model-produced recipe that passed validation but has no identity yet.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecipe {
    pub title: String,
    pub summary: String,
    pub description: String,
    pub ingredients: Vec<RecipeIngredient>,
    pub steps: Vec<RecipeStep>,
    pub details: RecipeDetails,
    pub nutrition: Option<Nutrition>,
    pub tips: Vec<String>,
    pub variations: Vec<String>,
    pub tags: Vec<String>,
}

/// Validates the text model's reply: a title, at least one ingredient and at
/// least one step are required; everything else is best effort.
pub fn parse_recipe(raw: &str) -> Result<RawRecipe> {
    let document: RawRecipeDocument = serde_json::from_str(extract_json_object(raw))
        .map_err(|err| PipelineError::Parse(format!("recipe: {err}")))?;

    let title = document
        .title
        .ok_or_else(|| PipelineError::Parse("recipe has no title".to_string()))?;

    let ingredients: Vec<RecipeIngredient> = document
        .ingredients
        .into_iter()
        .filter_map(|ingredient| match ingredient {
            RawIngredient::Name(name) => Some(RecipeIngredient {
                name: name.trim().to_string(),
                amount: None,
                unit: None,
                notes: None,
                is_promoted: false,
            }),
            RawIngredient::Line(line) => line.name.map(|name| RecipeIngredient {
                name,
                amount: line.amount,
                unit: line.unit,
                notes: line.notes,
                is_promoted: false,
            }),
        })
        .filter(|ingredient| !ingredient.name.is_empty())
        .collect();
    if ingredients.is_empty() {
        return Err(PipelineError::Parse("recipe has no ingredients".to_string()));
    }

    let steps: Vec<RecipeStep> = document
        .steps
        .into_iter()
        .filter_map(|step| match step {
            RawStep::Text(text) => Some((text.trim().to_string(), None, None)),
            RawStep::Detail(detail) => detail
                .instruction
                .map(|text| (text, detail.duration_minutes, detail.temperature)),
        })
        .filter(|(instruction, _, _)| !instruction.is_empty())
        .enumerate()
        .map(|(index, (instruction, duration_minutes, temperature))| RecipeStep {
            order: index as u32 + 1,
            instruction,
            duration_minutes,
            temperature,
        })
        .collect();
    if steps.is_empty() {
        return Err(PipelineError::Parse("recipe has no steps".to_string()));
    }

    let raw_details = document.details;
    let mut details = RecipeDetails {
        servings: raw_details.servings,
        prep_minutes: raw_details.prep_minutes,
        cook_minutes: raw_details.cook_minutes,
        total_minutes: raw_details.total_minutes,
        difficulty: raw_details.difficulty.map(|value| value.to_lowercase()),
        cuisine: raw_details.cuisine,
        cost_tier: raw_details.cost_tier.map(|value| value.to_lowercase()),
        equipment: raw_details.equipment,
    };
    if details.total_minutes.is_none() {
        details.total_minutes = match (details.prep_minutes, details.cook_minutes) {
            (None, None) => None,
            (prep, cook) => Some(prep.unwrap_or(0).saturating_add(cook.unwrap_or(0))),
        };
    }

    let nutrition = document.nutrition.map(|raw| Nutrition {
        calories: raw.calories,
        protein_g: raw.protein_g,
        carbs_g: raw.carbs_g,
        fat_g: raw.fat_g,
        fiber_g: raw.fiber_g,
    });

    Ok(RawRecipe {
        title,
        summary: document.summary.unwrap_or_default(),
        description: document.description.unwrap_or_default(),
        ingredients,
        steps,
        details,
        nutrition,
        tips: document.tips,
        variations: document.variations,
        tags: document.tags,
    })
}

impl RawRecipe {
    pub fn into_recipe(self, id: String, model: &str, now: DateTime<Utc>) -> Recipe {
        Recipe {
            id,
            title: self.title,
            summary: self.summary,
            description: self.description,
            ingredients: self.ingredients,
            steps: self.steps,
            details: self.details,
            nutrition: self.nutrition,
            tips: self.tips,
            variations: self.variations,
            tags: self.tags,
            created_by: RecipeSource::Ai,
            ai_generated: true,
            ai_model: Some(model.to_string()),
            created_at: Some(now.to_rfc3339()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_REPLY: &str = r#"{
        "title": "Test Stew",
        "summary": "Slow-simmered beef and tomato stew",
        "ingredients": [
            {"name": "tomatoes", "amount": 4, "unit": "whole"},
            {"item": "onions", "quantity": "2"},
            "beef"
        ],
        "steps": [
            {"instruction": "Brown the beef", "durationMinutes": "10 minutes"},
            "Add onions and tomatoes",
            {"text": "Simmer", "time": 90, "temperature": "low heat"}
        ],
        "details": {"servings": "4", "prepTime": 15, "cookTime": 100, "difficulty": "Easy", "equipment": ["dutch oven"]},
        "nutrition": {"calories": "420 kcal", "protein": 35},
        "tips": ["Rest before serving"],
        "tags": "comfort food"
    }"#;

    #[test]
    fn parses_lenient_shapes() {
        let recipe = parse_recipe(FULL_REPLY).unwrap();
        assert_eq!(recipe.title, "Test Stew");
        assert_eq!(recipe.ingredients.len(), 3);
        assert_eq!(recipe.ingredients[0].amount.as_deref(), Some("4"));
        assert_eq!(recipe.ingredients[1].name, "onions");
        assert_eq!(recipe.ingredients[2].name, "beef");

        let orders: Vec<u32> = recipe.steps.iter().map(|s| s.order).collect();
        assert_eq!(orders, vec![1, 2, 3]);
        assert_eq!(recipe.steps[0].duration_minutes, Some(10));
        assert_eq!(recipe.steps[2].temperature.as_deref(), Some("low heat"));

        assert_eq!(recipe.details.servings, Some(4));
        assert_eq!(recipe.details.total_minutes, Some(115));
        assert_eq!(recipe.details.difficulty.as_deref(), Some("easy"));
        let nutrition = recipe.nutrition.unwrap();
        assert_eq!(nutrition.calories, Some(420.0));
        assert_eq!(nutrition.protein_g, Some(35.0));
        assert_eq!(recipe.tags, vec!["comfort food"]);
    }

    #[test]
    fn rejects_incomplete_recipes() {
        for raw in [
            r#"{"ingredients": ["egg"], "steps": ["boil"]}"#,
            r#"{"title": "Nothing", "ingredients": [], "steps": ["boil"]}"#,
            r#"{"title": "Raw egg", "ingredients": ["egg"]}"#,
            "not json at all",
        ] {
            assert!(
                matches!(parse_recipe(raw), Err(PipelineError::Parse(_))),
                "expected parse error for {raw}"
            );
        }
    }

    #[test]
    fn total_time_saturates() {
        let raw = r#"{"title": "X", "ingredients": ["egg"], "steps": ["boil"],
            "details": {"prepTime": 4294967295, "cookTime": 1}}"#;
        let recipe = parse_recipe(raw).unwrap();
        assert_eq!(recipe.details.total_minutes, Some(u32::MAX));
    }

    #[test]
    fn provenance_is_filled_in() {
        let now = Utc::now();
        let recipe = parse_recipe(FULL_REPLY)
            .unwrap()
            .into_recipe("ai-1-abc".to_string(), "gpt-4o-mini", now);
        assert_eq!(recipe.created_by, RecipeSource::Ai);
        assert!(recipe.ai_generated);
        assert_eq!(recipe.ai_model.as_deref(), Some("gpt-4o-mini"));
        assert_eq!(recipe.created_at, Some(now.to_rfc3339()));
    }
}
