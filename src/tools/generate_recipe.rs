use rmcp::{
    ErrorData as McpError, handler::server::wrapper::Parameters, model::CallToolResult,
    schemars::JsonSchema,
};
use serde::Deserialize;

use crate::{
    pipeline::AiPipeline,
    recipe::RecipePreferences,
    recipe_store::LocalRecipeStore,
    tools::{json_result, to_mcp_error},
};

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GenerateRecipeRequest {
    #[schemars(description = "Ingredients to cook with, e.g. [\"tomatoes\", \"onions\", \"beef\"]")]
    pub ingredients: Vec<String>,
    #[schemars(description = "Servings, cuisine, dietary restrictions, time limit, difficulty, meal type")]
    pub preferences: Option<RecipePreferences>,
    #[schemars(description = "Also keep the recipe in the saved recipe list. Defaults to false")]
    pub save: Option<bool>,
}

pub async fn generate_recipe(
    pipeline: &AiPipeline,
    recipes: &LocalRecipeStore,
    Parameters(request): Parameters<GenerateRecipeRequest>,
) -> Result<CallToolResult, McpError> {
    let preferences = request.preferences.unwrap_or_default();
    let generated = pipeline
        .generate_recipe_from_ingredients(&request.ingredients, &preferences)
        .await
        .map_err(|err| to_mcp_error("recipe generation failed", err))?;

    if request.save.unwrap_or(false) {
        recipes
            .try_save(&generated.recipe)
            .await
            .map_err(|err| to_mcp_error("save recipe failed", err))?;
    }
    json_result(&generated)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::model_client::ScriptedModelClient;
    use crate::tools::test_support::{pipeline, recipe_store, result_json};

    const STEW: &str = r#"{
        "title": "Test Stew",
        "ingredients": [{"name": "tomatoes"}, {"name": "onions"}, {"name": "beef"}],
        "steps": ["Brown the beef", "Simmer everything"]
    }"#;

    #[tokio::test]
    async fn generates_and_optionally_saves() {
        let pipeline = pipeline(Arc::new(ScriptedModelClient::replying(STEW)));
        let recipes = recipe_store();

        let result = generate_recipe(
            &pipeline,
            &recipes,
            Parameters(GenerateRecipeRequest {
                ingredients: vec!["tomatoes".into(), "onions".into(), "beef".into()],
                preferences: None,
                save: Some(true),
            }),
        )
        .await
        .unwrap();

        let json = result_json(&result);
        assert_eq!(json["recipe"]["title"], "Test Stew");
        assert_eq!(json["recipe"]["aiGenerated"], true);
        let saved = recipes.list().await;
        assert_eq!(saved.len(), 1);
        assert_eq!(json["recipe"]["id"], saved[0].id.as_str());
    }

    #[tokio::test]
    async fn empty_ingredients_are_invalid_params() {
        let pipeline = pipeline(Arc::new(ScriptedModelClient::replying(STEW)));
        let err = generate_recipe(
            &pipeline,
            &recipe_store(),
            Parameters(GenerateRecipeRequest {
                ingredients: Vec::new(),
                preferences: None,
                save: None,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, rmcp::model::ErrorCode::INVALID_PARAMS);
    }

    #[tokio::test]
    async fn upstream_failure_is_internal_error() {
        let pipeline = pipeline(Arc::new(ScriptedModelClient::failing(502)));
        let err = generate_recipe(
            &pipeline,
            &recipe_store(),
            Parameters(GenerateRecipeRequest {
                ingredients: vec!["rice".into()],
                preferences: None,
                save: None,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, rmcp::model::ErrorCode::INTERNAL_ERROR);
    }
}
