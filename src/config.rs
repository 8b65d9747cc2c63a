//! Runtime configuration

use std::{
    net::{Ipv4Addr, SocketAddr},
    path::PathBuf,
    time::Duration,
};

/// Seconds an interactive result stays downloadable before its files are removed.
pub const DEFAULT_CLEANUP_DELAY_SECS: u64 = 120;

/// Command-line grammar of the external separation tool.
///
/// Demucs has changed its flags between releases (`--cpu` vs `-d cpu`), so
/// none of this is hard-coded in the invoker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolConfig {
    /// Executable to launch, e.g. `demucs` or `python3`.
    pub program: String,
    /// Arguments placed before everything else, e.g. `["-m", "demucs"]`.
    pub leading_args: Vec<String>,
    pub model_flag: String,
    pub output_flag: String,
    pub device_flag: String,
    pub cpu_device: String,
    pub accelerated_device: String,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            program: "demucs".into(),
            leading_args: Vec::new(),
            model_flag: "-n".into(),
            output_flag: "-o".into(),
            device_flag: "-d".into(),
            cpu_device: "cpu".into(),
            accelerated_device: "cuda".into(),
        }
    }
}

impl ToolConfig {
    /// Human readable name used in logs and error messages.
    pub fn display_name(&self) -> String {
        if self.leading_args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.leading_args.join(" "))
        }
    }
}

/// Settings shared by the server and the one-shot CLI.
#[derive(Clone, Debug)]
pub struct Settings {
    pub bind: SocketAddr,
    pub tool: ToolConfig,
    /// Format-conversion utility that must be on PATH before a run starts.
    pub converter: String,
    /// Parent directory for work areas and upload staging.
    pub work_root: PathBuf,
    pub cleanup_delay: Duration,
    pub max_upload_bytes: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from((Ipv4Addr::LOCALHOST, 8000)),
            tool: ToolConfig::default(),
            converter: "ffmpeg".into(),
            work_root: std::env::temp_dir(),
            cleanup_delay: Duration::from_secs(DEFAULT_CLEANUP_DELAY_SECS),
            max_upload_bytes: 200 * 1024 * 1024,
        }
    }
}
