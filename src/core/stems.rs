use crate::{
    core::audio::list_audio_files,
    error::Result,
    types::{StemKey, StemSet},
};
use std::path::Path;

/// Map the audio files in `stems_dir` to stem roles.
///
/// A file is assigned to every role whose name appears in its lowercased base
/// name; later files overwrite earlier ones. When no name matches at all the
/// files are handed out by sorted position (vocals, drums, bass, other), which
/// only works if the tool wrote them in that order.
pub fn find_stems(stems_dir: &Path) -> Result<StemSet> {
    let files = list_audio_files(stems_dir)?;
    let mut stems = StemSet::default();

    for file in &files {
        let name = file
            .file_stem()
            .map(|s| s.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        for key in StemKey::ALL {
            if name.contains(key.as_str()) {
                stems.set(key, file.clone());
            }
        }
    }

    if stems.is_empty() {
        for (key, file) in StemKey::ALL.into_iter().zip(&files) {
            stems.set(key, file.clone());
        }
    }

    Ok(stems)
}
