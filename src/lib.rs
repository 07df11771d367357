pub mod cache;
pub mod config;
pub mod error;
pub mod http_routes;
pub mod image_input;
pub mod ingredients;
pub mod mcp_server;
pub mod model_client;
pub mod pantry;
pub mod pipeline;
pub mod recipe;
pub mod recipe_store;
pub mod retry;
pub mod storage;
pub mod tools;

pub use error::{PipelineError, Result};
