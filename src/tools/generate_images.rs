use rmcp::{
    ErrorData as McpError, handler::server::wrapper::Parameters, model::CallToolResult,
    schemars::JsonSchema,
};
use serde::{Deserialize, Serialize};

use crate::{
    pipeline::{AiPipeline, MAX_IMAGES},
    tools::json_result,
};

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GenerateImagesRequest {
    #[schemars(description = "Dish to photograph, e.g. a recipe title")]
    pub prompt: String,
    #[schemars(description = "Number of images, 1 to 4. Defaults to 1")]
    pub count: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct GenerateImagesResponse {
    pub urls: Vec<String>,
    pub text: String,
}

pub async fn generate_images(
    pipeline: &AiPipeline,
    Parameters(request): Parameters<GenerateImagesRequest>,
) -> Result<CallToolResult, McpError> {
    let prompt = request.prompt.trim();
    if prompt.is_empty() {
        return Err(McpError::invalid_params("prompt must not be empty", None));
    }
    let count = request.count.unwrap_or(1);
    if count == 0 || count > MAX_IMAGES {
        return Err(McpError::invalid_params(
            format!("count must be between 1 and {MAX_IMAGES}"),
            None,
        ));
    }

    let urls = pipeline.generate_images(prompt, count).await;
    let text = urls
        .iter()
        .map(|url| format!("![{prompt}]({url})"))
        .collect::<Vec<_>>()
        .join("\n");
    json_result(&GenerateImagesResponse { urls, text })
}
