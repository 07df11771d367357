//! Runtime configuration, read once from the environment at startup.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_VISION_MODEL: &str = "gpt-4o";
pub const DEFAULT_TEXT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_IMAGE_MODEL: &str = "dall-e-3";
pub const DEFAULT_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1_000;
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_CACHE_TTL_HOURS: u64 = 24;
pub const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {name}: {value}")]
    InvalidValue { name: String, value: String },
}

/// Settings for the upstream model API.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub api_key: String,
    pub base_url: String,
    pub vision_model: String,
    pub text_model: String,
    pub image_model: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub model: ModelConfig,
    pub retries: u32,
    pub retry_delay: Duration,
    pub cache_ttl: Duration,
    pub data_dir: PathBuf,
    pub port: u16,
    pub secret_key: Option<String>,
}

impl AppConfig {
    /// Load configuration from process environment variables.
    ///
    /// Required:
    /// - `OPENAI_API_KEY`
    ///
    /// Optional:
    /// - `PANTRY_AI_BASE_URL`, `PANTRY_AI_VISION_MODEL`, `PANTRY_AI_TEXT_MODEL`,
    ///   `PANTRY_AI_IMAGE_MODEL`
    /// - `PANTRY_AI_RETRIES`, `PANTRY_AI_RETRY_DELAY_MS`, `PANTRY_AI_TIMEOUT_SECS`
    /// - `PANTRY_AI_CACHE_TTL_HOURS`, `PANTRY_AI_DATA_DIR`
    /// - `MCP_PORT`, `SECRET_KEY`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_blank = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let api_key = non_blank("OPENAI_API_KEY")
            .map(|value| value.trim().to_string())
            .ok_or_else(|| ConfigError::MissingEnvVar("OPENAI_API_KEY".to_string()))?;

        let model = ModelConfig {
            api_key,
            base_url: non_blank("PANTRY_AI_BASE_URL")
                .map(|value| value.trim().trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            vision_model: non_blank("PANTRY_AI_VISION_MODEL")
                .unwrap_or_else(|| DEFAULT_VISION_MODEL.to_string()),
            text_model: non_blank("PANTRY_AI_TEXT_MODEL")
                .unwrap_or_else(|| DEFAULT_TEXT_MODEL.to_string()),
            image_model: non_blank("PANTRY_AI_IMAGE_MODEL")
                .unwrap_or_else(|| DEFAULT_IMAGE_MODEL.to_string()),
            timeout: Duration::from_secs(parse_or(
                &non_blank,
                "PANTRY_AI_TIMEOUT_SECS",
                DEFAULT_TIMEOUT_SECS,
            )?),
        };

        let retries = parse_or(&non_blank, "PANTRY_AI_RETRIES", DEFAULT_RETRIES)?;
        if retries == 0 {
            return Err(ConfigError::InvalidValue {
                name: "PANTRY_AI_RETRIES".to_string(),
                value: "0".to_string(),
            });
        }
        let retry_delay = Duration::from_millis(parse_or(
            &non_blank,
            "PANTRY_AI_RETRY_DELAY_MS",
            DEFAULT_RETRY_DELAY_MS,
        )?);
        let ttl_hours: u64 =
            parse_or(&non_blank, "PANTRY_AI_CACHE_TTL_HOURS", DEFAULT_CACHE_TTL_HOURS)?;
        let cache_ttl = ttl_hours
            .checked_mul(3_600)
            .map(Duration::from_secs)
            .ok_or_else(|| ConfigError::InvalidValue {
                name: "PANTRY_AI_CACHE_TTL_HOURS".to_string(),
                value: ttl_hours.to_string(),
            })?;
        let data_dir = non_blank("PANTRY_AI_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(default_data_dir);
        let port = parse_or(&non_blank, "MCP_PORT", DEFAULT_PORT)?;
        let secret_key = non_blank("SECRET_KEY").map(|value| value.trim().to_string());

        Ok(Self {
            model,
            retries,
            retry_delay,
            cache_ttl,
            data_dir,
            port,
            secret_key,
        })
    }
}

fn parse_or<T, F>(lookup: &F, name: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
            name: name.to_string(),
            value: raw,
        }),
        None => Ok(default),
    }
}

pub fn default_data_dir() -> PathBuf {
    let mut base = dirs::cache_dir().unwrap_or_else(|| PathBuf::from("."));
    base.push("pantry-ai-rmcp");
    base
}
