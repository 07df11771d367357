use rmcp::{
    ErrorData as McpError, handler::server::wrapper::Parameters, model::CallToolResult,
    schemars::JsonSchema,
};
use serde::{Deserialize, Serialize};

use crate::{
    recipe::Recipe,
    recipe_store::LocalRecipeStore,
    tools::{json_result, to_mcp_error},
};

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SaveRecipeRequest {
    #[schemars(description = "Recipe as returned by generate_recipe (the `recipe` field)")]
    pub recipe: Recipe,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct DeleteSavedRecipeRequest {
    #[schemars(description = "Id of the saved recipe")]
    pub id: String,
}

#[derive(Debug, Serialize)]
struct SavedRecipeSummary<'a> {
    id: &'a str,
    title: &'a str,
    summary: &'a str,
    #[serde(rename = "createdAt", skip_serializing_if = "Option::is_none")]
    created_at: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct SaveResponse<'a> {
    id: &'a str,
    saved: bool,
}

#[derive(Debug, Serialize)]
struct DeleteResponse<'a> {
    id: &'a str,
    deleted: bool,
}

pub async fn save_recipe(
    recipes: &LocalRecipeStore,
    Parameters(request): Parameters<SaveRecipeRequest>,
) -> Result<CallToolResult, McpError> {
    recipes
        .try_save(&request.recipe)
        .await
        .map_err(|err| to_mcp_error("save recipe failed", err))?;
    json_result(&SaveResponse {
        id: &request.recipe.id,
        saved: true,
    })
}

pub async fn list_saved_recipes(recipes: &LocalRecipeStore) -> Result<CallToolResult, McpError> {
    let saved = recipes
        .try_list()
        .await
        .map_err(|err| to_mcp_error("list saved recipes failed", err))?;
    let summaries: Vec<SavedRecipeSummary<'_>> = saved
        .iter()
        .map(|recipe| SavedRecipeSummary {
            id: &recipe.id,
            title: &recipe.title,
            summary: &recipe.summary,
            created_at: recipe.created_at.as_deref(),
        })
        .collect();
    json_result(&summaries)
}

pub async fn delete_saved_recipe(
    recipes: &LocalRecipeStore,
    Parameters(request): Parameters<DeleteSavedRecipeRequest>,
) -> Result<CallToolResult, McpError> {
    let id = request.id.trim();
    if id.is_empty() {
        return Err(McpError::invalid_params("id must not be empty", None));
    }
    let deleted = recipes
        .try_delete(id)
        .await
        .map_err(|err| to_mcp_error("delete saved recipe failed", err))?;
    json_result(&DeleteResponse { id, deleted })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipe::sample_recipe;
    use crate::tools::test_support::{recipe_store, result_json};

    #[tokio::test]
    async fn save_list_delete() {
        let recipes = recipe_store();
        let recipe = sample_recipe("ai-1-abcdefghi");

        save_recipe(&recipes, Parameters(SaveRecipeRequest { recipe: recipe.clone() }))
            .await
            .unwrap();
        let listed = result_json(&list_saved_recipes(&recipes).await.unwrap());
        assert_eq!(listed.as_array().unwrap().len(), 1);
        assert_eq!(listed[0]["id"], "ai-1-abcdefghi");
        assert_eq!(listed[0]["title"], recipe.title.as_str());

        let deleted = delete_saved_recipe(
            &recipes,
            Parameters(DeleteSavedRecipeRequest { id: recipe.id.clone() }),
        )
        .await
        .unwrap();
        assert_eq!(result_json(&deleted)["deleted"], true);
        let listed = result_json(&list_saved_recipes(&recipes).await.unwrap());
        assert!(listed.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn blank_recipe_id_is_invalid() {
        let recipes = recipe_store();
        let err = save_recipe(&recipes, Parameters(SaveRecipeRequest { recipe: sample_recipe("") }))
            .await
            .unwrap_err();
        assert_eq!(err.code, rmcp::model::ErrorCode::INVALID_PARAMS);
    }
}
