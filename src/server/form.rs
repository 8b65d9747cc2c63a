use axum::extract::Multipart;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;

use crate::core::normalize::{slugify_basename, DEFAULT_BASENAME, INPUT_EXTENSION};
use crate::server::error::ApiError;

/// A parsed `file` / `model` / `use_gpu` upload.
///
/// The uploaded bytes live in `staging`, which is removed when this value
/// is dropped.
#[derive(Debug)]
pub struct SeparationForm {
    pub staging: TempDir,
    pub source: PathBuf,
    pub original_name: String,
    pub model: Option<String>,
    pub use_gpu: bool,
}

impl SeparationForm {
    /// Base name for files derived from the upload.
    pub fn base_name(&self) -> String {
        slugify_basename(&self.original_name, DEFAULT_BASENAME)
    }
}

pub async fn read_separation_form(
    mut multipart: Multipart,
    work_root: &Path,
) -> Result<SeparationForm, ApiError> {
    std::fs::create_dir_all(work_root)?;
    let staging = tempfile::Builder::new()
        .prefix("api_in_")
        .tempdir_in(work_root)?;

    let mut source: Option<(PathBuf, String)> = None;
    let mut model = None;
    let mut use_gpu = false;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Malformed form data: {e}")))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                let original = field.file_name().unwrap_or("upload").to_string();
                let path = staging.path().join(staged_name(&original));
                let mut out = tokio::fs::File::create(&path).await?;
                while let Some(chunk) = field
                    .chunk()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Failed to read file data: {e}")))?
                {
                    out.write_all(&chunk).await?;
                }
                out.flush().await?;
                source = Some((path, original));
            }
            "model" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Invalid model field: {e}")))?;
                // present but blank still goes through validation
                model = Some(text.trim().to_string());
            }
            "use_gpu" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Invalid use_gpu field: {e}")))?;
                use_gpu = parse_bool(&text).ok_or_else(|| {
                    ApiError::BadRequest(format!("use_gpu must be a boolean, got `{text}`"))
                })?;
            }
            _ => {}
        }
    }

    let (source, original_name) =
        source.ok_or_else(|| ApiError::BadRequest("No audio file provided.".into()))?;

    Ok(SeparationForm {
        staging,
        source,
        original_name,
        model,
        use_gpu,
    })
}

/// Staged file name: normalized base plus the original extension when it
/// looks sane.
fn staged_name(original: &str) -> String {
    let base = slugify_basename(original, DEFAULT_BASENAME);
    let ext = Path::new(original)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.len() <= 5 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| INPUT_EXTENSION.to_string());
    format!("{base}.{ext}")
}

pub fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "on" | "yes" => Some(true),
        "false" | "0" | "off" | "no" | "" => Some(false),
        _ => None,
    }
}
