use base64::{Engine as _, engine::general_purpose::STANDARD};
use rmcp::{
    ErrorData as McpError, handler::server::wrapper::Parameters, model::CallToolResult,
    schemars::JsonSchema,
};
use serde::Deserialize;

use crate::{
    ingredients::DetectionOptions,
    pipeline::AiPipeline,
    tools::{json_result, to_mcp_error},
};

#[derive(Debug, Deserialize, JsonSchema)]
pub struct DetectIngredientsRequest {
    #[schemars(description = "Photo as base64 or a data: URL. Provide this or image_url.")]
    pub image_base64: Option<String>,
    #[schemars(description = "http(s) URL of the photo. Provide this or image_base64.")]
    pub image_url: Option<String>,
    #[schemars(description = "Detection options; quantities and freshness are on by default")]
    pub options: Option<DetectionOptions>,
}

pub async fn detect_ingredients(
    pipeline: &AiPipeline,
    Parameters(request): Parameters<DetectIngredientsRequest>,
) -> Result<CallToolResult, McpError> {
    let image_base64 = match (request.image_base64, request.image_url) {
        (Some(image), None) if !image.trim().is_empty() => image,
        (None, Some(url)) if !url.trim().is_empty() => {
            let bytes = pipeline
                .fetch_image(&url)
                .await
                .map_err(|err| to_mcp_error("fetch image failed", err))?;
            STANDARD.encode(bytes)
        }
        _ => {
            return Err(McpError::invalid_params(
                "provide exactly one of image_base64 or image_url",
                None,
            ));
        }
    };

    let options = request.options.unwrap_or_default();
    let detection = pipeline
        .detect_ingredients(&image_base64, &options)
        .await
        .map_err(|err| to_mcp_error("ingredient detection failed", err))?;
    json_result(&detection)
}
