//! Browser front-end: upload form, inline stem players, archive download.
//!
//! Results stay reachable for the configured cleanup delay, after which the
//! work area is deleted and the result id forgotten.

use axum::extract::{Multipart, Path, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use std::path::PathBuf;
use uuid::Uuid;

use crate::core::audio::wav_duration_secs;
use crate::core::cleanup::defer_removal;
use crate::core::stems::find_stems;
use crate::pipeline::SeparationFailure;
use crate::server::api::discard_failure;
use crate::server::error::ApiError;
use crate::server::form::read_separation_form;
use crate::server::AppState;
use crate::types::{StemKey, StemSet};

const PAGE_HTML: &str = include_str!("page.html");

/// One finished interactive separation.
#[derive(Clone, Debug)]
pub struct UiResult {
    pub stems: StemSet,
    pub archive: PathBuf,
    pub archive_name: String,
}

#[derive(Debug, Serialize)]
pub struct UiStem {
    pub key: StemKey,
    pub url: Option<String>,
    pub duration_secs: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct UiResponse {
    pub id: Uuid,
    pub model: String,
    pub stems: Vec<UiStem>,
    pub archive_url: String,
    pub archive_name: String,
    pub expires_in_secs: u64,
}

pub async fn page() -> Html<&'static str> {
    Html(PAGE_HTML)
}

pub async fn separate(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<UiResponse>, ApiError> {
    let form = read_separation_form(multipart, state.pipeline.work_root()).await?;
    let model = form
        .model
        .clone()
        .unwrap_or_else(|| state.pipeline.registry().default_model().to_string());
    let archive_name = format!("{}_{}_stems.zip", form.base_name(), model);

    let pipeline = state.pipeline.clone();
    let (source, run_model, use_gpu) = (form.source.clone(), model.clone(), form.use_gpu);
    let (output, stems, durations) = tokio::task::spawn_blocking(move || {
        let output = pipeline.separate(&source, &run_model, use_gpu)?;
        match find_stems(&output.stems_dir) {
            Ok(stems) => {
                let durations: Vec<Option<f64>> = stems
                    .iter()
                    .map(|(_, path)| path.and_then(wav_duration_secs))
                    .collect();
                Ok((output, stems, durations))
            }
            Err(error) => Err(SeparationFailure {
                error,
                work_area: Some(output.work_area),
            }),
        }
    })
    .await?
    .map_err(discard_failure)?;
    drop(form);

    let id = Uuid::new_v4();
    let delay = state.cleanup_delay;
    state.results.lock().await.insert(
        id,
        UiResult {
            stems: stems.clone(),
            archive: output.archive.clone(),
            archive_name: archive_name.clone(),
        },
    );

    defer_removal(vec![output.work_area.clone()], delay);
    let results = state.results.clone();
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        results.lock().await.remove(&id);
    });

    tracing::info!(%id, model = %model, expires_in = delay.as_secs(), "interactive result ready");

    let stems = stems
        .iter()
        .zip(durations)
        .map(|((key, path), duration_secs)| UiStem {
            key,
            url: path.map(|_| format!("/ui/results/{id}/{key}")),
            duration_secs,
        })
        .collect();

    Ok(Json(UiResponse {
        id,
        model,
        stems,
        archive_url: format!("/ui/results/{id}/archive"),
        archive_name,
        expires_in_secs: delay.as_secs(),
    }))
}

/// `GET /ui/results/{id}/{item}` where item is a stem key or `archive`.
pub async fn result_file(
    State(state): State<AppState>,
    Path((id, item)): Path<(Uuid, String)>,
) -> Result<Response, ApiError> {
    let expired = || ApiError::NotFound(format!("Result {id} has expired or does not exist"));

    let (path, download_name) = {
        let results = state.results.lock().await;
        let result = results.get(&id).ok_or_else(expired)?;
        if item == "archive" {
            (result.archive.clone(), Some(result.archive_name.clone()))
        } else {
            let key = StemKey::parse(&item)
                .ok_or_else(|| ApiError::NotFound(format!("Unknown stem `{item}`")))?;
            let path = result
                .stems
                .get(key)
                .cloned()
                .ok_or_else(|| ApiError::NotFound(format!("No {key} stem in this result")))?;
            (path, None)
        }
    };

    let bytes = tokio::fs::read(&path).await.map_err(|_| expired())?;
    let mime = mime_guess::from_path(&path).first_or_octet_stream();

    let mut response = ([(CONTENT_TYPE, mime.to_string())], bytes).into_response();
    if let Some(name) = download_name {
        if let Ok(value) = format!("attachment; filename=\"{name}\"").parse() {
            response.headers_mut().insert(CONTENT_DISPOSITION, value);
        }
    }
    Ok(response)
}
