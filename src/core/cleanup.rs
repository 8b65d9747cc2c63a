use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::{debug, warn};

/// Remove `path` recursively. Never fails; errors are logged and dropped.
pub fn remove_tree(path: &Path) {
    match fs::remove_dir_all(path) {
        Ok(()) => debug!(path = %path.display(), "removed"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), "cleanup failed: {e}"),
    }
}

/// Fire-and-forget removal of `paths` after `delay`.
///
/// Runs on the current tokio runtime when there is one, otherwise on a
/// detached thread. There is no handle, no cancellation and no retry.
pub fn defer_removal(paths: Vec<PathBuf>, delay: Duration) {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(async move {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                let _ = tokio::task::spawn_blocking(move || remove_all(&paths)).await;
            });
        }
        Err(_) => {
            std::thread::spawn(move || {
                std::thread::sleep(delay);
                remove_all(&paths);
            });
        }
    }
}

fn remove_all(paths: &[PathBuf]) {
    for p in paths {
        remove_tree(p);
    }
}

/// Schedules removal of its paths when dropped.
///
/// Attached to a response body, this deletes the work area only once the
/// body has been fully sent (or abandoned by the client).
#[derive(Debug)]
pub struct CleanupGuard {
    paths: Vec<PathBuf>,
}

impl CleanupGuard {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self { paths }
    }
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        let paths = std::mem::take(&mut self.paths);
        if !paths.is_empty() {
            defer_removal(paths, Duration::ZERO);
        }
    }
}
