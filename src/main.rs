use std::sync::Arc;

use anyhow::Result;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use rmcp::transport::streamable_http_server::{
    StreamableHttpService, session::local::LocalSessionManager,
};
use tower_http::trace::TraceLayer;

use pantry_ai_rmcp::{
    config::AppConfig,
    http_routes::{self, AppState, MAX_UPLOAD_BYTES},
    mcp_server::PantryAiServer,
    pipeline::AiPipeline,
    recipe_store::LocalRecipeStore,
    storage::{KeyValueStore, LocalFileStorage},
};

fn init_tracing() {
    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "pantry_ai_rmcp=debug,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    let bind_address = format!("0.0.0.0:{}", config.port);
    let mcp_path = http_routes::scoped_path(config.secret_key.as_deref(), "mcp");
    let detect_path = http_routes::scoped_path(config.secret_key.as_deref(), "detect");

    let store: Arc<dyn KeyValueStore> = Arc::new(LocalFileStorage::new(config.data_dir.clone()));
    let pipeline = Arc::new(AiPipeline::from_config(&config, store.clone())?);
    let recipes = Arc::new(LocalRecipeStore::new(store));
    let state = AppState {
        pipeline: pipeline.clone(),
        recipes: recipes.clone(),
    };

    let service = StreamableHttpService::new(
        move || Ok(PantryAiServer::new(pipeline.clone(), recipes.clone())),
        LocalSessionManager::default().into(),
        Default::default(),
    );
    let router = axum::Router::new()
        .route("/health", get(http_routes::health))
        .route(
            &detect_path,
            post(http_routes::handle_detect_upload).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .nest_service(&mcp_path, service)
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     _span: &tracing::Span| {
                        let status = res.status();
                        let latency_ms = latency.as_millis();
                        if status.is_server_error() {
                            tracing::error!(%status, latency_ms, "response");
                        } else {
                            tracing::info!(%status, latency_ms, "response");
                        }
                    },
                ),
        );
    let tcp_listener = tokio::net::TcpListener::bind(&bind_address).await?;

    tracing::info!(
        data_dir = %config.data_dir.display(),
        vision_model = %config.model.vision_model,
        text_model = %config.model.text_model,
        image_model = %config.model.image_model,
        "Pantry AI MCP HTTP server started at http://{}{}",
        bind_address,
        mcp_path
    );

    axum::serve(tcp_listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
        })
        .await?;
    Ok(())
}
