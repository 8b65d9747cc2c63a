use std::sync::Arc;

/// Coarse pipeline stage, reported around the blocking tool call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Progress {
    pub fraction: f32,
    pub stage: &'static str,
}

pub type ProgressFn = Arc<dyn Fn(Progress) + Send + Sync + 'static>;

pub const PREPARING: Progress = Progress {
    fraction: 0.0,
    stage: "Preparing",
};
pub const SEPARATING: Progress = Progress {
    fraction: 0.15,
    stage: "Running separation",
};
pub const ARCHIVING: Progress = Progress {
    fraction: 0.75,
    stage: "Archiving stems",
};
pub const DONE: Progress = Progress {
    fraction: 1.0,
    stage: "Done",
};

pub fn emit_progress(cb: Option<&ProgressFn>, progress: Progress) {
    tracing::info!(
        percent = (progress.fraction * 100.0).round() as u32,
        "{}",
        progress.stage
    );
    if let Some(cb) = cb {
        cb(progress);
    }
}
