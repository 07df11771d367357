//! Scripted model client for tests and offline runs.
//!
//! Responses are consumed in order from per-endpoint queues. When a queue runs
//! dry the fallback is used, or a 500 error when there is none.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use super::{ChatRequest, ImageRequest, ModelClient};
use crate::error::{PipelineError, Result};

#[derive(Debug, Clone)]
enum Scripted {
    Reply(String),
    Status(u16),
}

impl Scripted {
    fn into_result(self) -> Result<String> {
        match self {
            Scripted::Reply(body) => Ok(body),
            Scripted::Status(status) => Err(PipelineError::Http {
                status,
                body: "scripted failure".to_string(),
            }),
        }
    }
}

#[derive(Debug, Default)]
struct Script {
    queue: VecDeque<Scripted>,
    fallback: Option<Scripted>,
}

impl Script {
    fn next(&mut self) -> Result<String> {
        self.queue
            .pop_front()
            .or_else(|| self.fallback.clone())
            .unwrap_or(Scripted::Status(500))
            .into_result()
    }
}

#[derive(Debug, Default)]
pub struct ScriptedModelClient {
    chat: Mutex<Script>,
    images: Mutex<Script>,
    chat_calls: AtomicUsize,
    image_calls: AtomicUsize,
    chat_requests: Mutex<Vec<ChatRequest>>,
    latency: Option<Duration>,
}

impl ScriptedModelClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every chat call returns `body`.
    pub fn replying(body: &str) -> Self {
        let client = Self::new();
        client.chat_script().fallback = Some(Scripted::Reply(body.to_string()));
        client
    }

    /// Every call to either endpoint fails with `status`.
    pub fn failing(status: u16) -> Self {
        let client = Self::new();
        client.chat_script().fallback = Some(Scripted::Status(status));
        client.image_script().fallback = Some(Scripted::Status(status));
        client
    }

    /// Suspends each call for `latency` before answering.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn push_chat_reply(&self, body: &str) {
        self.chat_script()
            .queue
            .push_back(Scripted::Reply(body.to_string()));
    }

    pub fn push_chat_failure(&self, status: u16) {
        self.chat_script().queue.push_back(Scripted::Status(status));
    }

    pub fn push_image_url(&self, url: &str) {
        self.image_script()
            .queue
            .push_back(Scripted::Reply(url.to_string()));
    }

    pub fn push_image_failure(&self, status: u16) {
        self.image_script().queue.push_back(Scripted::Status(status));
    }

    pub fn chat_calls(&self) -> usize {
        self.chat_calls.load(Ordering::SeqCst)
    }

    pub fn image_calls(&self) -> usize {
        self.image_calls.load(Ordering::SeqCst)
    }

    pub fn chat_requests(&self) -> Vec<ChatRequest> {
        self.chat_requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn chat_script(&self) -> std::sync::MutexGuard<'_, Script> {
        self.chat
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn image_script(&self) -> std::sync::MutexGuard<'_, Script> {
        self.images
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ModelClient for ScriptedModelClient {
    async fn chat_json(&self, request: &ChatRequest) -> Result<String> {
        self.chat_calls.fetch_add(1, Ordering::SeqCst);
        self.chat_requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(request.clone());
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.chat_script().next()
    }

    async fn generate_image(&self, _request: &ImageRequest) -> Result<String> {
        self.image_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.image_script().next()
    }
}
