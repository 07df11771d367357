use std::sync::Arc;

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
};

use crate::pipeline::AiPipeline;
use crate::recipe_store::LocalRecipeStore;
use crate::tools::{
    DeleteSavedRecipeRequest, DetectIngredientsRequest, GenerateImagesRequest,
    GenerateRecipeRequest, SaveRecipeRequest,
};

const INSTRUCTIONS: &str = "Kitchen assistant tools: detect ingredients in a fridge or pantry photo, \
turn ingredients into a recipe, illustrate dishes, and keep a list of saved recipes.";

#[derive(Clone)]
pub struct PantryAiServer {
    tool_router: ToolRouter<Self>,
    pipeline: Arc<AiPipeline>,
    recipes: Arc<LocalRecipeStore>,
}

impl PantryAiServer {
    pub fn new(pipeline: Arc<AiPipeline>, recipes: Arc<LocalRecipeStore>) -> Self {
        Self {
            tool_router: Self::tool_router(),
            pipeline,
            recipes,
        }
    }
}

#[tool_router]
impl PantryAiServer {
    #[tool(
        description = "Detect food ingredients in a photo given as base64 or an http(s) URL. Returns names, confidence, quantity, category and freshness."
    )]
    async fn detect_ingredients(
        &self,
        Parameters(request): Parameters<DetectIngredientsRequest>,
    ) -> Result<CallToolResult, McpError> {
        crate::tools::detect_ingredients(&self.pipeline, Parameters(request)).await
    }

    #[tool(
        description = "Generate a full recipe (ingredients, steps, timing, nutrition) from a list of ingredients. Identical requests within 24 hours return the cached recipe."
    )]
    async fn generate_recipe(
        &self,
        Parameters(request): Parameters<GenerateRecipeRequest>,
    ) -> Result<CallToolResult, McpError> {
        crate::tools::generate_recipe(&self.pipeline, &self.recipes, Parameters(request)).await
    }

    #[tool(
        description = "Generate food photos for a dish. Tell the user this can take a while. Show results with ![](url)."
    )]
    async fn generate_images(
        &self,
        Parameters(request): Parameters<GenerateImagesRequest>,
    ) -> Result<CallToolResult, McpError> {
        crate::tools::generate_images(&self.pipeline, Parameters(request)).await
    }

    #[tool(description = "Save a generated recipe to the saved recipe list")]
    async fn save_recipe(
        &self,
        Parameters(request): Parameters<SaveRecipeRequest>,
    ) -> Result<CallToolResult, McpError> {
        crate::tools::save_recipe(&self.recipes, Parameters(request)).await
    }

    #[tool(description = "List saved recipes, newest first")]
    async fn list_saved_recipes(&self) -> Result<CallToolResult, McpError> {
        crate::tools::list_saved_recipes(&self.recipes).await
    }

    #[tool(description = "Delete a saved recipe by id")]
    async fn delete_saved_recipe(
        &self,
        Parameters(request): Parameters<DeleteSavedRecipeRequest>,
    ) -> Result<CallToolResult, McpError> {
        crate::tools::delete_saved_recipe(&self.recipes, Parameters(request)).await
    }

    #[tool(description = "Drop every cached AI response so the next request calls the model again")]
    async fn clear_ai_cache(&self) -> Result<CallToolResult, McpError> {
        crate::tools::clear_ai_cache(&self.pipeline).await
    }
}

#[tool_handler]
impl ServerHandler for PantryAiServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            instructions: Some(INSTRUCTIONS.to_string()),
            ..Default::default()
        }
    }
}
