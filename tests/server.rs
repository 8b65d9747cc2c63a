mod common;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use common::{entries, wav_bytes, FakeTool};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use stem_splitter_server::server::{router, AppState};
use tower::ServiceExt;

const BOUNDARY: &str = "stem-splitter-test-boundary";

fn app(fake: &FakeTool, work_root: &Path) -> Router {
    app_with_delay(fake, work_root, Duration::from_secs(60))
}

fn app_with_delay(fake: &FakeTool, work_root: &Path, cleanup_delay: Duration) -> Router {
    let state = AppState::new(fake.pipeline(work_root), cleanup_delay);
    router(state, 10 * 1024 * 1024)
}

fn multipart(file: Option<(&str, &[u8])>, fields: &[(&str, &str)]) -> Vec<u8> {
    let mut body = Vec::new();
    if let Some((name, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{name}\"\r\nContent-Type: audio/wav\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    for (name, value) in fields {
        body.extend_from_slice(
            format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                .as_bytes(),
        );
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn post(uri: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn json(resp: axum::response::Response) -> Value {
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Background cleanup is fire-and-forget; give it a moment.
async fn wait_empty(dir: &Path) -> bool {
    for _ in 0..100 {
        if entries(dir).is_empty() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

#[tokio::test]
async fn lists_models() {
    let fake = FakeTool::working();
    let work_root = tempfile::tempdir().unwrap();

    let resp = app(&fake, work_root.path())
        .oneshot(get("/api/models"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body = json(resp).await;
    assert_eq!(body["default"], "htdemucs");
    let models: Vec<&str> = body["models"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m.as_str().unwrap())
        .collect();
    assert!(models.contains(&"htdemucs"));
    assert!(models.contains(&"mdx_extra"));
}

#[tokio::test]
async fn serves_upload_page() {
    let fake = FakeTool::working();
    let work_root = tempfile::tempdir().unwrap();

    let resp = app(&fake, work_root.path()).oneshot(get("/")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    assert!(String::from_utf8_lossy(&bytes).contains("/ui/separate"));
}

#[tokio::test]
async fn api_separate_returns_zip_and_cleans_up() {
    let fake = FakeTool::working();
    let work_root = tempfile::tempdir().unwrap();
    let wav = wav_bytes();

    let body = multipart(
        Some(("My Song.wav", &wav)),
        &[("model", "htdemucs"), ("use_gpu", "false")],
    );
    let resp = app(&fake, work_root.path())
        .oneshot(post("/api/separate", body))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[header::CONTENT_TYPE], "application/zip");
    assert_eq!(
        resp.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"my-song_htdemucs_stems.zip\""
    );

    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let mut zip = zip::ZipArchive::new(std::io::Cursor::new(bytes.to_vec())).unwrap();
    let mut names: Vec<String> = (0..zip.len())
        .map(|i| zip.by_index(i).unwrap().name().to_string())
        .collect();
    names.sort();
    assert_eq!(names, ["bass.wav", "drums.wav", "other.wav", "vocals.wav"]);

    assert!(fake.was_invoked());
    assert!(wait_empty(work_root.path()).await, "work area left behind");
}

#[tokio::test]
async fn api_separate_defaults_model() {
    let fake = FakeTool::working();
    let work_root = tempfile::tempdir().unwrap();
    let wav = wav_bytes();

    let resp = app(&fake, work_root.path())
        .oneshot(post("/api/separate", multipart(Some(("x.wav", &wav)), &[])))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"x_htdemucs_stems.zip\""
    );
    let _ = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    assert!(wait_empty(work_root.path()).await);
}

#[tokio::test]
async fn invalid_model_is_bad_request() {
    let fake = FakeTool::working();
    let work_root = tempfile::tempdir().unwrap();
    let wav = wav_bytes();

    let body = multipart(Some(("a.wav", &wav)), &[("model", "nope")]);
    let resp = app(&fake, work_root.path())
        .oneshot(post("/api/separate", body))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = json(resp).await;
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
    assert!(body["error"]["message"].as_str().unwrap().contains("nope"));
    assert!(!fake.was_invoked());
    assert!(wait_empty(work_root.path()).await);
}

#[tokio::test]
async fn missing_file_is_bad_request() {
    let fake = FakeTool::working();
    let work_root = tempfile::tempdir().unwrap();

    let resp = app(&fake, work_root.path())
        .oneshot(post("/api/separate", multipart(None, &[("model", "htdemucs")])))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(json(resp).await["error"]["message"]
        .as_str()
        .unwrap()
        .contains("No audio file"));
    assert!(wait_empty(work_root.path()).await);
}

#[tokio::test]
async fn bad_gpu_flag_is_bad_request() {
    let fake = FakeTool::working();
    let work_root = tempfile::tempdir().unwrap();
    let wav = wav_bytes();

    let body = multipart(Some(("a.wav", &wav)), &[("use_gpu", "sometimes")]);
    let resp = app(&fake, work_root.path())
        .oneshot(post("/api/separate", body))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(!fake.was_invoked());
}

#[tokio::test]
async fn tool_failure_is_server_error_with_diagnostics() {
    let fake = FakeTool::failing();
    let work_root = tempfile::tempdir().unwrap();
    let wav = wav_bytes();

    let body = multipart(Some(("a.wav", &wav)), &[("use_gpu", "true")]);
    let resp = app(&fake, work_root.path())
        .oneshot(post("/api/separate", body))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json(resp).await;
    assert_eq!(body["error"]["code"], "SEPARATION_FAILED");
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("cuda is not available"));
    assert!(wait_empty(work_root.path()).await);
}

#[tokio::test]
async fn ui_flow_serves_stems_and_archive() {
    let fake = FakeTool::working();
    let work_root = tempfile::tempdir().unwrap();
    let wav = wav_bytes();
    let app = app(&fake, work_root.path());

    let body = multipart(Some(("Demo Track.wav", &wav)), &[("model", "mdx")]);
    let resp = app
        .clone()
        .oneshot(post("/ui/separate", body))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let result = json(resp).await;
    assert_eq!(result["model"], "mdx");
    assert_eq!(result["archive_name"], "demo-track_mdx_stems.zip");
    assert_eq!(result["expires_in_secs"], 60);

    let stems = result["stems"].as_array().unwrap();
    let keys: Vec<&str> = stems.iter().map(|s| s["key"].as_str().unwrap()).collect();
    assert_eq!(keys, ["vocals", "drums", "bass", "other"]);
    for stem in stems {
        let secs = stem["duration_secs"].as_f64().unwrap();
        assert!((secs - 1.0).abs() < 1e-6);
    }

    let vocals_url = stems[0]["url"].as_str().unwrap();
    let resp = app.clone().oneshot(get(vocals_url)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("audio/"));
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    assert_eq!(bytes.as_ref(), wav.as_slice());

    let archive_url = result["archive_url"].as_str().unwrap();
    let resp = app.clone().oneshot(get(archive_url)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"demo-track_mdx_stems.zip\""
    );

    // still on disk until the cleanup delay runs out
    let areas = entries(work_root.path());
    assert_eq!(areas.len(), 1);
    assert!(areas[0]
        .file_name()
        .unwrap()
        .to_string_lossy()
        .starts_with("demucs_work_"));
}

#[tokio::test]
async fn unknown_result_is_not_found() {
    let fake = FakeTool::working();
    let work_root = tempfile::tempdir().unwrap();
    let app = app(&fake, work_root.path());

    let uri = format!("/ui/results/{}/vocals", uuid::Uuid::new_v4());
    let resp = app.oneshot(get(&uri)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn health_check() {
    let fake = FakeTool::working();
    let work_root = tempfile::tempdir().unwrap();
    let resp = app(&fake, work_root.path())
        .oneshot(get("/health"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn blank_model_is_bad_request() {
    let fake = FakeTool::working();
    let work_root = tempfile::tempdir().unwrap();
    let wav = wav_bytes();

    let body = multipart(Some(("a.wav", &wav)), &[("model", "")]);
    let resp = app(&fake, work_root.path())
        .oneshot(post("/api/separate", body))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json(resp).await["error"]["code"], "BAD_REQUEST");
    assert!(!fake.was_invoked());
    assert!(wait_empty(work_root.path()).await);
}

#[tokio::test]
async fn ui_result_expires_after_cleanup_delay() {
    let fake = FakeTool::working();
    let work_root = tempfile::tempdir().unwrap();
    let wav = wav_bytes();
    let app = app_with_delay(&fake, work_root.path(), Duration::from_millis(300));

    let resp = app
        .clone()
        .oneshot(post("/ui/separate", multipart(Some(("a.wav", &wav)), &[])))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let result = json(resp).await;
    let vocals_url = result["stems"][0]["url"].as_str().unwrap().to_string();

    let resp = app.clone().oneshot(get(&vocals_url)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    tokio::time::sleep(Duration::from_millis(800)).await;

    let resp = app.clone().oneshot(get(&vocals_url)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let archive_url = result["archive_url"].as_str().unwrap();
    let resp = app.oneshot(get(archive_url)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    assert!(wait_empty(work_root.path()).await, "work area left behind");
}

#[tokio::test]
async fn ui_failure_cleans_up_work_area() {
    let fake = FakeTool::failing();
    let work_root = tempfile::tempdir().unwrap();
    let wav = wav_bytes();

    let resp = app(&fake, work_root.path())
        .oneshot(post("/ui/separate", multipart(Some(("a.wav", &wav)), &[])))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json(resp).await["error"]["code"], "SEPARATION_FAILED");
    assert!(fake.was_invoked());
    assert!(wait_empty(work_root.path()).await, "work area left behind");
}

#[tokio::test]
async fn ui_invalid_model_cleans_up_work_area() {
    let fake = FakeTool::working();
    let work_root = tempfile::tempdir().unwrap();
    let wav = wav_bytes();

    let body = multipart(Some(("a.wav", &wav)), &[("model", "bogus")]);
    let resp = app(&fake, work_root.path())
        .oneshot(post("/ui/separate", body))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(!fake.was_invoked());
    assert!(wait_empty(work_root.path()).await);
}
