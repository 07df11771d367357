pub mod clear_cache;
pub mod detect_ingredients;
pub mod generate_images;
pub mod generate_recipe;
pub mod saved_recipes;

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::Serialize;
use serde_json::Value;

use crate::error::PipelineError;

pub use clear_cache::{ClearCacheResponse, clear_ai_cache};
pub use detect_ingredients::{DetectIngredientsRequest, detect_ingredients};
pub use generate_images::{GenerateImagesRequest, GenerateImagesResponse, generate_images};
pub use generate_recipe::{GenerateRecipeRequest, generate_recipe};
pub use saved_recipes::{
    DeleteSavedRecipeRequest, SaveRecipeRequest, delete_saved_recipe, list_saved_recipes,
    save_recipe,
};

/// Caller mistakes become `invalid_params`; everything else is an internal
/// error with the pipeline's message attached.
pub fn to_mcp_error(context: &'static str, err: PipelineError) -> McpError {
    let detail = Some(Value::String(err.to_string()));
    match err {
        PipelineError::InvalidInput(_) => McpError::invalid_params(context, detail),
        _ => McpError::internal_error(context, detail),
    }
}

pub fn json_result<T: Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string(value).map_err(|err| {
        McpError::internal_error(
            "serialize tool response failed",
            Some(Value::String(err.to_string())),
        )
    })?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}
