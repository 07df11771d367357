use rmcp::{ErrorData as McpError, model::CallToolResult};
use serde::Serialize;

use crate::{pipeline::AiPipeline, tools::json_result};

#[derive(Debug, Serialize)]
pub struct ClearCacheResponse {
    pub removed: usize,
    #[serde(rename = "entriesBefore")]
    pub entries_before: usize,
    #[serde(rename = "freshBefore")]
    pub fresh_before: usize,
}

pub async fn clear_ai_cache(pipeline: &AiPipeline) -> Result<CallToolResult, McpError> {
    let before = pipeline.cache_stats().await;
    let removed = pipeline.clear_cache().await;
    tracing::info!(removed, "AI response cache cleared");
    json_result(&ClearCacheResponse {
        removed,
        entries_before: before.entries,
        fresh_before: before.fresh,
    })
}
