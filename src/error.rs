use std::path::PathBuf;
use thiserror::Error;

/// Central error type for the stem-splitter-server crate.
#[derive(Debug, Error)]
pub enum StemError {
    #[error("Invalid model `{model}`. Use one of: {}", .supported.join(", "))]
    InvalidModel {
        model: String,
        supported: Vec<String>,
    },

    #[error("`{tool}` was not found on PATH.\n  {hint}")]
    DependencyMissing { tool: String, hint: String },

    #[error("Failed to run {tool} ({status}).\n{diagnostics}{}", format_hints(.hints))]
    ExecutionFailure {
        tool: String,
        status: String,
        diagnostics: String,
        hints: Vec<String>,
    },

    #[error("No separated stems found under '{root}'.\n  Tip: check the tool output above and the selected model")]
    OutputNotFound { root: PathBuf },

    #[error("Cannot read input audio '{path}': {source}")]
    ReadInput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Registry error: {0}")]
    Registry(String),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn format_hints(hints: &[String]) -> String {
    if hints.is_empty() {
        return String::new();
    }
    format!("\n\nHints:\n- {}", hints.join("\n- "))
}

impl From<walkdir::Error> for StemError {
    fn from(e: walkdir::Error) -> Self {
        StemError::Io(e.into())
    }
}

impl From<serde_json::Error> for StemError {
    fn from(e: serde_json::Error) -> Self {
        StemError::Registry(e.to_string())
    }
}

impl StemError {
    /// True for errors caused by the caller's input rather than the host.
    pub fn is_user_error(&self) -> bool {
        matches!(self, StemError::InvalidModel { .. })
    }
}

pub type Result<T> = std::result::Result<T, StemError>;
