//! HTTP front-end.
//!
//! Routes:
//! - `GET  /`                      upload page
//! - `GET  /health`                liveness
//! - `GET  /api/models`            supported model identifiers
//! - `POST /api/separate`          multipart upload → zip of stems
//! - `POST /ui/separate`           multipart upload → JSON with stem URLs
//! - `GET  /ui/results/:id/:item`  stem or archive of an interactive result

pub mod api;
pub mod error;
pub mod form;
pub mod ui;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::Mutex as TokioMutex;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use crate::config::Settings;
use crate::core::separator::{probe_tool, ToolProbe};
use crate::pipeline::Pipeline;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub results: Arc<TokioMutex<HashMap<Uuid, ui::UiResult>>>,
    pub cleanup_delay: Duration,
}

impl AppState {
    pub fn new(pipeline: Pipeline, cleanup_delay: Duration) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            results: Arc::new(TokioMutex::new(HashMap::new())),
            cleanup_delay,
        }
    }
}

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(ui::page))
        .route("/health", get(|| async { "ok" }))
        .route("/api/models", get(api::list_models))
        .route("/api/separate", post(api::separate))
        .route("/ui/separate", post(ui::separate))
        .route("/ui/results/:id/:item", get(ui::result_file))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Log what the host offers before accepting requests. Never fatal.
pub fn preflight(settings: &Settings, pipeline: &Pipeline) {
    let tool = settings.tool.display_name();
    match probe_tool(&settings.tool) {
        ToolProbe::Ready => tracing::info!(%tool, "separation tool found"),
        ToolProbe::DeviceFlagUnknown => tracing::warn!(
            %tool,
            device_flag = %settings.tool.device_flag,
            "separation tool help does not mention the device flag; check --device-flag for this version"
        ),
        ToolProbe::Unavailable(e) => {
            tracing::warn!(%tool, "separation tool cannot be launched: {e}")
        }
    }
    if let Err(e) = pipeline.check_dependencies() {
        tracing::warn!("{e}");
    }
}

/// Bind and serve until Ctrl-C.
pub async fn serve(settings: Settings, pipeline: Pipeline) -> std::io::Result<()> {
    preflight(&settings, &pipeline);

    let state = AppState::new(pipeline, settings.cleanup_delay);
    let app = router(state, settings.max_upload_bytes);

    let listener = TcpListener::bind(settings.bind).await?;
    tracing::info!(addr = %listener.local_addr()?, "stem splitter listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown requested");
        })
        .await
}
