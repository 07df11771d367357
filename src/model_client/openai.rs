use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use super::{ChatRequest, ImageRequest, ModelClient};
use crate::config::{ConfigError, ModelConfig};
use crate::error::{PipelineError, Result};

async fn assert_ok_response(response: reqwest::Response) -> Result<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    Err(PipelineError::Http { status, body })
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Option<Vec<ChatChoice>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatReply>,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ImageGenerationResponse {
    data: Option<Vec<GeneratedImage>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct GeneratedImage {
    url: Option<String>,
}

/// Bearer-authenticated client for `/chat/completions` and `/images/generations`.
#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl OpenAiClient {
    /// Fails before any network traffic when the API key is blank.
    pub fn new(config: &ModelConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(ConfigError::MissingEnvVar("OPENAI_API_KEY".to_string()).into());
        }
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| PipelineError::Transport(err.to_string()))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl ModelClient for OpenAiClient {
    async fn chat_json(&self, request: &ChatRequest) -> Result<String> {
        let mut body = json!({
            "model": request.model,
            "messages": request.messages,
            "response_format": {"type": "json_object"},
        });
        if let Some(temperature) = request.temperature {
            body["temperature"] = json!(temperature);
        }
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }

        tracing::debug!(model = %request.model, "calling chat completion endpoint");
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let response = assert_ok_response(response).await?;
        let payload: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|err| PipelineError::Parse(format!("chat completion envelope: {err}")))?;
        if let Some(error) = payload.error.and_then(|err| err.message) {
            return Err(PipelineError::Transport(format!("model API error: {error}")));
        }
        payload
            .choices
            .and_then(|choices| choices.into_iter().next())
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| PipelineError::Parse("chat completion returned no content".to_string()))
    }

    async fn generate_image(&self, request: &ImageRequest) -> Result<String> {
        let body = json!({
            "model": request.model,
            "prompt": request.prompt,
            "n": 1,
            "size": request.size,
        });

        tracing::debug!(model = %request.model, size = %request.size, "calling image generation endpoint");
        let response = self
            .client
            .post(format!("{}/images/generations", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let response = assert_ok_response(response).await?;
        let payload: ImageGenerationResponse = response
            .json()
            .await
            .map_err(|err| PipelineError::Parse(format!("image generation envelope: {err}")))?;
        if let Some(error) = payload.error.and_then(|err| err.message) {
            return Err(PipelineError::Transport(format!("model API error: {error}")));
        }
        payload
            .data
            .and_then(|images| images.into_iter().find_map(|image| image.url))
            .ok_or_else(|| PipelineError::Parse("image generation returned no url".to_string()))
    }
}
