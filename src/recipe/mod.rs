//! Recipe domain types shared by generation and the saved recipe store.

mod parse;
mod promotion;

pub use parse::{RawRecipe, parse_recipe};
pub use promotion::{
    FeaturedProduct, default_featured_products, ensure_featured_products, has_featured_product,
};

use chrono::{DateTime, Utc};
use rand::{Rng, distributions::Alphanumeric};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

const ID_SUFFIX_LEN: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum RecipeSource {
    Ai,
    Curated,
    Community,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecipeIngredient {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Set when the line names a featured product.
    #[serde(default)]
    pub is_promoted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecipeStep {
    /// 1-based position.
    pub order: u32,
    pub instruction: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct RecipeDetails {
    pub servings: Option<u32>,
    pub prep_minutes: Option<u32>,
    pub cook_minutes: Option<u32>,
    pub total_minutes: Option<u32>,
    pub difficulty: Option<String>,
    pub cuisine: Option<String>,
    pub cost_tier: Option<String>,
    pub equipment: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct Nutrition {
    pub calories: Option<f64>,
    pub protein_g: Option<f64>,
    pub carbs_g: Option<f64>,
    pub fat_g: Option<f64>,
    pub fiber_g: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub description: String,
    pub ingredients: Vec<RecipeIngredient>,
    pub steps: Vec<RecipeStep>,
    #[serde(default)]
    pub details: RecipeDetails,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nutrition: Option<Nutrition>,
    #[serde(default)]
    pub tips: Vec<String>,
    #[serde(default)]
    pub variations: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_by: RecipeSource,
    #[serde(default)]
    pub ai_generated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_model: Option<String>,
    /// RFC 3339.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// Output of recipe generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedRecipe {
    pub recipe: Recipe,
    pub generation_time_ms: u64,
    /// Rough total cost in dollars.
    pub estimated_cost: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct RecipePreferences {
    pub servings: Option<u32>,
    pub cuisine: Option<String>,
    pub dietary_restrictions: Vec<String>,
    pub max_minutes: Option<u32>,
    pub difficulty: Option<String>,
    pub meal_type: Option<String>,
}

/// `ai-<millis>-<9 lowercase alphanumerics>`.
pub fn new_recipe_id(now: DateTime<Utc>) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(ID_SUFFIX_LEN)
        .map(|byte| char::from(byte).to_ascii_lowercase())
        .collect();
    format!("ai-{}-{suffix}", now.timestamp_millis())
}

/// Per-ingredient price by cost tier, scaled from a four-serving baseline.
pub fn estimate_cost(recipe: &Recipe) -> f64 {
    let per_ingredient = match recipe
        .details
        .cost_tier
        .as_deref()
        .map(|tier| tier.trim().to_lowercase())
        .as_deref()
    {
        Some("budget" | "low" | "cheap" | "$") => 0.75,
        Some("premium" | "high" | "expensive" | "$$$") => 3.0,
        _ => 1.5,
    };
    let servings = f64::from(recipe.details.servings.unwrap_or(4).max(1));
    let total = recipe.ingredients.len() as f64 * per_ingredient * servings / 4.0;
    (total * 100.0).round() / 100.0
}

#[cfg(test)]
pub(crate) fn sample_recipe(id: &str) -> Recipe {
    Recipe {
        id: id.to_string(),
        title: "Tomato Beef Stew".to_string(),
        summary: "A hearty stew".to_string(),
        description: String::new(),
        ingredients: vec![RecipeIngredient {
            name: "beef".to_string(),
            amount: Some("500".to_string()),
            unit: Some("g".to_string()),
            notes: None,
            is_promoted: false,
        }],
        steps: vec![RecipeStep {
            order: 1,
            instruction: "Brown the beef.".to_string(),
            duration_minutes: Some(10),
            temperature: None,
        }],
        details: RecipeDetails::default(),
        nutrition: None,
        tips: Vec::new(),
        variations: Vec::new(),
        tags: Vec::new(),
        created_by: RecipeSource::Ai,
        ai_generated: true,
        ai_model: Some("gpt-4o-mini".to_string()),
        created_at: None,
    }
}
