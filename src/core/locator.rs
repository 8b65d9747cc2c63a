//! Finding the directory the separation tool actually wrote stems to.
//!
//! Tool releases disagree on layout: most write `<root>/<model>/<track>/*.wav`,
//! some rename the model directory, some skip the per-track level. Each
//! strategy below is a heuristic; [`locate_stems_dir`] tries them in order and
//! the first hit wins.

use crate::{
    core::audio::{is_audio_file, list_audio_files, list_subdirs},
    error::{Result, StemError},
};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Strategy 1: `<root>/<model>` when it exists.
pub fn model_dir_by_name(out_root: &Path, model: &str) -> Option<PathBuf> {
    let dir = out_root.join(model);
    dir.is_dir().then_some(dir)
}

/// Strategy 2: first subdirectory of `out_root`, by name.
pub fn first_subdir(out_root: &Path) -> Result<Option<PathBuf>> {
    Ok(list_subdirs(out_root)?.into_iter().next())
}

/// Strategy 3: first immediate child of `model_dir` holding audio files.
pub fn child_with_audio(model_dir: &Path) -> Result<Option<PathBuf>> {
    for child in list_subdirs(model_dir)? {
        if !list_audio_files(&child)?.is_empty() {
            return Ok(Some(child));
        }
    }
    Ok(None)
}

/// Strategy 4: `model_dir` itself when stems sit directly inside it.
pub fn direct_audio(model_dir: &Path) -> Result<Option<PathBuf>> {
    let found = !list_audio_files(model_dir)?.is_empty();
    Ok(found.then(|| model_dir.to_path_buf()))
}

/// Strategy 5: parent of the first audio file anywhere below `model_dir`.
pub fn recursive_audio(model_dir: &Path) -> Result<Option<PathBuf>> {
    for entry in WalkDir::new(model_dir).min_depth(1).sort_by_file_name() {
        let entry = entry?;
        if is_audio_file(entry.path()) {
            return Ok(entry.path().parent().map(Path::to_path_buf));
        }
    }
    Ok(None)
}

pub fn locate_stems_dir(out_root: &Path, model: &str) -> Result<PathBuf> {
    let not_found = || StemError::OutputNotFound {
        root: out_root.to_path_buf(),
    };

    let model_dir = match model_dir_by_name(out_root, model) {
        Some(dir) => dir,
        None => {
            let dir = first_subdir(out_root)?.ok_or_else(not_found)?;
            debug!(dir = %dir.display(), "model directory not found by name, using first subdirectory");
            dir
        }
    };

    if let Some(dir) = child_with_audio(&model_dir)? {
        debug!(dir = %dir.display(), "stems found in track subdirectory");
        return Ok(dir);
    }
    if let Some(dir) = direct_audio(&model_dir)? {
        debug!(dir = %dir.display(), "stems found directly in model directory");
        return Ok(dir);
    }
    if let Some(dir) = recursive_audio(&model_dir)? {
        debug!(dir = %dir.display(), "stems found by recursive search");
        return Ok(dir);
    }
    Err(not_found())
}
