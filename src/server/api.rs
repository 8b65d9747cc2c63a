//! JSON/zip API: `GET /api/models`, `POST /api/separate`.

use axum::body::{Body, Bytes};
use axum::extract::{Multipart, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE};
use axum::response::Response;
use axum::Json;
use futures_util::Stream;
use serde::Serialize;
use std::time::Duration;
use tokio::io::AsyncReadExt;

use crate::core::cleanup::{defer_removal, CleanupGuard};
use crate::pipeline::SeparationFailure;
use crate::server::error::ApiError;
use crate::server::form::read_separation_form;
use crate::server::AppState;
use crate::types::SeparationOutput;

const STREAM_CHUNK: usize = 64 * 1024;

#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    pub models: Vec<String>,
    pub default: String,
}

pub async fn list_models(State(state): State<AppState>) -> Json<ModelsResponse> {
    let registry = state.pipeline.registry();
    Json(ModelsResponse {
        models: registry.names(),
        default: registry.default_model().to_string(),
    })
}

pub async fn separate(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let form = read_separation_form(multipart, state.pipeline.work_root()).await?;
    let model = form
        .model
        .clone()
        .unwrap_or_else(|| state.pipeline.registry().default_model().to_string());

    tracing::info!(
        file = %form.original_name,
        model = %model,
        use_gpu = form.use_gpu,
        "separation requested"
    );

    let output = run_pipeline(&state, form.source.clone(), model.clone(), form.use_gpu).await?;
    let filename = format!("{}_{}_stems.zip", form.base_name(), model);
    drop(form);

    // Dropped when the body stream ends, i.e. after the archive went out.
    let guard = CleanupGuard::new(vec![output.work_area.clone()]);
    let file = tokio::fs::File::open(&output.archive).await?;
    let len = file.metadata().await?.len();

    Response::builder()
        .header(CONTENT_TYPE, "application/zip")
        .header(
            CONTENT_DISPOSITION,
            format!("attachment; filename=\"{filename}\""),
        )
        .header(CONTENT_LENGTH, len)
        .body(Body::from_stream(archive_stream(file, guard)))
        .map_err(|e| ApiError::Internal(e.to_string()))
}

/// Run the blocking pipeline off the async workers. A failed run's work area
/// is scheduled for removal right away.
pub(crate) async fn run_pipeline(
    state: &AppState,
    source: std::path::PathBuf,
    model: String,
    use_gpu: bool,
) -> Result<SeparationOutput, ApiError> {
    let pipeline = state.pipeline.clone();
    let result =
        tokio::task::spawn_blocking(move || pipeline.separate(&source, &model, use_gpu)).await?;
    result.map_err(discard_failure)
}

pub(crate) fn discard_failure(failure: SeparationFailure) -> ApiError {
    if let Some(work_area) = failure.work_area {
        defer_removal(vec![work_area], Duration::ZERO);
    }
    failure.error.into()
}

fn archive_stream(
    file: tokio::fs::File,
    guard: CleanupGuard,
) -> impl Stream<Item = std::io::Result<Bytes>> + Send + 'static {
    futures_util::stream::try_unfold((file, guard), |(mut file, guard)| async move {
        let mut buf = vec![0u8; STREAM_CHUNK];
        let n = file.read(&mut buf).await?;
        if n == 0 {
            return Ok::<_, std::io::Error>(None);
        }
        buf.truncate(n);
        Ok(Some((Bytes::from(buf), (file, guard))))
    })
}
