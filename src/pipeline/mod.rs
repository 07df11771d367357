//! Cache → model call (with retry) → parse → cache write, for ingredient
//! detection, recipe generation and food image generation.

mod prompts;
mod single_flight;

pub use prompts::{image_prompt, recipe_system_prompt};
pub use single_flight::{KeyGuard, KeyedLocks};

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{NaiveDate, Utc};
use url::Url;

use crate::cache::{CacheStats, ResponseCache, cache_key, compute_hash};
use crate::config::{
    AppConfig, DEFAULT_IMAGE_MODEL, DEFAULT_TEXT_MODEL, DEFAULT_TIMEOUT_SECS, DEFAULT_VISION_MODEL,
};
use crate::error::{PipelineError, Result};
use crate::image_input::{ImageFetcher, MAX_IMAGE_BYTES, decode_base64_image, prepare_image};
use crate::ingredients::{DetectionOptions, IngredientDetection, parse_detection};
use crate::model_client::{ChatMessage, ChatRequest, ImageRequest, ModelClient, OpenAiClient};
use crate::pantry::{PantryItem, ingredient_names};
use crate::recipe::{
    FeaturedProduct, GeneratedRecipe, RecipePreferences, default_featured_products,
    ensure_featured_products, estimate_cost, new_recipe_id, parse_recipe,
};
use crate::retry::RetryPolicy;
use crate::storage::KeyValueStore;

pub const MAX_IMAGES: usize = 4;
pub const DEFAULT_IMAGE_SIZE: &str = "1024x1024";
const PLACEHOLDER_BASE_URL: &str = "https://placehold.co/1024x1024/png";

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub vision_model: String,
    pub text_model: String,
    pub image_model: String,
    pub image_size: String,
    pub retry: RetryPolicy,
    pub featured_products: Vec<FeaturedProduct>,
    /// Timeout for fetching photos given by URL.
    pub fetch_timeout: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            vision_model: DEFAULT_VISION_MODEL.to_string(),
            text_model: DEFAULT_TEXT_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            image_size: DEFAULT_IMAGE_SIZE.to_string(),
            retry: RetryPolicy::default(),
            featured_products: default_featured_products(),
            fetch_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl PipelineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            vision_model: config.model.vision_model.clone(),
            text_model: config.model.text_model.clone(),
            image_model: config.model.image_model.clone(),
            retry: RetryPolicy::new(config.retries, config.retry_delay),
            fetch_timeout: config.model.timeout,
            ..Self::default()
        }
    }
}

pub struct AiPipeline {
    client: Arc<dyn ModelClient>,
    cache: ResponseCache,
    settings: PipelineSettings,
    in_flight: KeyedLocks,
    fetcher: ImageFetcher,
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

pub fn placeholder_url(prompt: &str, index: usize) -> String {
    let label = format!("{} #{}", prompt.trim(), index + 1);
    Url::parse_with_params(PLACEHOLDER_BASE_URL, &[("text", label.as_str())])
        .map(String::from)
        .unwrap_or_else(|_| PLACEHOLDER_BASE_URL.to_string())
}

impl AiPipeline {
    pub fn new(
        client: Arc<dyn ModelClient>,
        store: Arc<dyn KeyValueStore>,
        cache_ttl: Duration,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            client,
            cache: ResponseCache::new(store, cache_ttl),
            fetcher: ImageFetcher::new(settings.fetch_timeout, MAX_IMAGE_BYTES),
            settings,
            in_flight: KeyedLocks::new(),
        }
    }

    /// Builds the production pipeline. Fails on a missing API key before any
    /// request is attempted.
    pub fn from_config(config: &AppConfig, store: Arc<dyn KeyValueStore>) -> Result<Self> {
        let client = OpenAiClient::new(&config.model)?;
        Ok(Self::new(
            Arc::new(client),
            store,
            config.cache_ttl,
            PipelineSettings::from_config(config),
        ))
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Downloads a photo given by URL, bounded by [`MAX_IMAGE_BYTES`].
    pub async fn fetch_image(&self, url: &str) -> Result<Vec<u8>> {
        self.fetcher.fetch(url).await
    }

    pub async fn detect_ingredients(
        &self,
        image_base64: &str,
        options: &DetectionOptions,
    ) -> Result<IngredientDetection> {
        let started = Instant::now();
        let key = cache_key(
            "detect",
            &(compute_hash(image_base64.trim()), options, &self.settings.vision_model),
        );
        if let Some(hit) = self.cache.get::<IngredientDetection>(&key).await {
            tracing::debug!(key = %key, "ingredient detection cache hit");
            return Ok(hit);
        }

        let _flight = self.in_flight.lock(&key).await;
        if let Some(hit) = self.cache.get::<IngredientDetection>(&key).await {
            tracing::debug!(key = %key, "ingredient detection filled by concurrent request");
            return Ok(hit);
        }

        let image = prepare_image(&decode_base64_image(image_base64)?)?;
        tracing::info!(
            key = %key,
            width = image.width,
            height = image.height,
            source_bytes = image.source_size,
            "detecting ingredients"
        );
        let request = ChatRequest {
            model: self.settings.vision_model.clone(),
            messages: vec![
                ChatMessage::system(prompts::DETECTION_SYSTEM_PROMPT),
                ChatMessage::user_with_image(prompts::detection_user_prompt(options), image.data_url),
            ],
            temperature: Some(0.2),
            max_tokens: Some(1_500),
        };
        let raw = self
            .settings
            .retry
            .run("detect_ingredients", || self.client.chat_json(&request))
            .await?;

        match parse_detection(&raw, options) {
            Ok(mut detection) => {
                detection.processing_time_ms = elapsed_ms(started);
                self.cache.set(&key, &detection).await;
                Ok(detection)
            }
            Err(err) => {
                tracing::warn!(error = %err, "ingredient detection reply unreadable");
                let mut detection = IngredientDetection::unreadable();
                detection.processing_time_ms = elapsed_ms(started);
                Ok(detection)
            }
        }
    }

    pub async fn generate_recipe_from_ingredients(
        &self,
        ingredients: &[String],
        preferences: &RecipePreferences,
    ) -> Result<GeneratedRecipe> {
        let started = Instant::now();
        let ingredients: Vec<String> = ingredients
            .iter()
            .map(|ingredient| ingredient.trim().to_string())
            .filter(|ingredient| !ingredient.is_empty())
            .collect();
        if ingredients.is_empty() {
            return Err(PipelineError::InvalidInput(
                "at least one ingredient is required".to_string(),
            ));
        }

        let key = cache_key(
            "recipe",
            &(&ingredients, preferences, &self.settings.text_model),
        );
        if let Some(hit) = self.cache.get::<GeneratedRecipe>(&key).await {
            tracing::debug!(key = %key, "recipe cache hit");
            return Ok(hit);
        }

        let _flight = self.in_flight.lock(&key).await;
        if let Some(hit) = self.cache.get::<GeneratedRecipe>(&key).await {
            tracing::debug!(key = %key, "recipe filled by concurrent request");
            return Ok(hit);
        }

        tracing::info!(key = %key, ingredients = ingredients.len(), "generating recipe");
        let request = ChatRequest {
            model: self.settings.text_model.clone(),
            messages: vec![
                ChatMessage::system(prompts::recipe_system_prompt(&self.settings.featured_products)),
                ChatMessage::user(prompts::recipe_user_prompt(&ingredients, preferences)),
            ],
            temperature: Some(0.7),
            max_tokens: Some(2_500),
        };
        let raw = self
            .settings
            .retry
            .run("generate_recipe", || self.client.chat_json(&request))
            .await?;

        let now = Utc::now();
        let mut recipe =
            parse_recipe(&raw)?.into_recipe(new_recipe_id(now), &self.settings.text_model, now);
        if ensure_featured_products(&mut recipe, &self.settings.featured_products) {
            tracing::debug!(recipe_id = %recipe.id, "featured product added after generation");
        }
        let estimated_cost = estimate_cost(&recipe);
        let generated = GeneratedRecipe {
            recipe,
            generation_time_ms: elapsed_ms(started),
            estimated_cost,
        };
        self.cache.set(&key, &generated).await;
        Ok(generated)
    }

    /// Recipe from the usable pantry items, soonest-expiring first.
    pub async fn generate_recipe_from_pantry(
        &self,
        items: &[PantryItem],
        today: NaiveDate,
        preferences: &RecipePreferences,
    ) -> Result<GeneratedRecipe> {
        let names = ingredient_names(items, today);
        if names.is_empty() {
            return Err(PipelineError::InvalidInput(
                "pantry has no unexpired items".to_string(),
            ));
        }
        self.generate_recipe_from_ingredients(&names, preferences).await
    }

    /// Returns exactly `count` URLs, substituting placeholders for failed
    /// images. A count of zero returns an empty list without any model call.
    pub async fn generate_images(&self, prompt: &str, count: usize) -> Vec<String> {
        if count == 0 {
            return Vec::new();
        }
        let key = cache_key(
            "images",
            &(prompt.trim(), count, &self.settings.image_model, &self.settings.image_size),
        );
        if let Some(hit) = self.cache.get::<Vec<String>>(&key).await {
            tracing::debug!(key = %key, "image cache hit");
            return hit;
        }

        let _flight = self.in_flight.lock(&key).await;
        if let Some(hit) = self.cache.get::<Vec<String>>(&key).await {
            return hit;
        }

        let request = ImageRequest {
            model: self.settings.image_model.clone(),
            prompt: prompts::image_prompt(prompt),
            size: self.settings.image_size.clone(),
        };
        let mut urls = Vec::with_capacity(count);
        let mut degraded = 0;
        for index in 0..count {
            match self
                .settings
                .retry
                .run("generate_image", || self.client.generate_image(&request))
                .await
            {
                Ok(url) => urls.push(url),
                Err(err) => {
                    tracing::warn!(index, error = %err, "image generation failed, using placeholder");
                    urls.push(placeholder_url(prompt, index));
                    degraded += 1;
                }
            }
        }

        if degraded == 0 {
            self.cache.set(&key, &urls).await;
        }
        urls
    }

    pub async fn clear_cache(&self) -> usize {
        self.cache.clear().await
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }
}
