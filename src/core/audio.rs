use std::{
    fs, io,
    path::{Path, PathBuf},
};

/// Extensions the separation tool writes stems with.
pub const AUDIO_EXTENSIONS: [&str; 3] = ["wav", "mp3", "flac"];

pub fn is_audio_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| AUDIO_EXTENSIONS.iter().any(|a| a.eq_ignore_ascii_case(e)))
            .unwrap_or(false)
}

/// Audio files directly inside `dir`, sorted by file name.
pub fn list_audio_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if is_audio_file(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Subdirectories directly inside `dir`, sorted by name.
pub fn list_subdirs(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Playback length of a WAV stem, read from its header only.
pub fn wav_duration_secs<P: AsRef<Path>>(path: P) -> Option<f64> {
    let reader = hound::WavReader::open(path).ok()?;
    let rate = reader.spec().sample_rate;
    if rate == 0 {
        return None;
    }
    Some(reader.duration() as f64 / rate as f64)
}
