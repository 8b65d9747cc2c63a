use crate::{
    config::ToolConfig,
    error::{Result, StemError},
    model::ModelRegistry,
    types::Device,
};
use std::{
    ffi::OsString,
    io,
    path::Path,
    process::{Command, Stdio},
};
use tracing::{debug, info, warn};

/// Characters of captured diagnostics kept in an [`StemError::ExecutionFailure`].
pub const DIAGNOSTIC_TAIL_CHARS: usize = 2000;

/// Drives the external separation CLI (Demucs).
#[derive(Clone, Debug)]
pub struct DemucsCli {
    tool: ToolConfig,
    registry: ModelRegistry,
}

impl DemucsCli {
    pub fn new(tool: ToolConfig, registry: ModelRegistry) -> Self {
        Self { tool, registry }
    }

    pub fn tool(&self) -> &ToolConfig {
        &self.tool
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn device_token(&self, device: Device) -> &str {
        match device {
            Device::Cpu => &self.tool.cpu_device,
            Device::Accelerated => &self.tool.accelerated_device,
        }
    }

    /// Arguments passed after the program name.
    pub fn command_args(
        &self,
        input: &Path,
        model: &str,
        device: Device,
        out_root: &Path,
    ) -> Vec<OsString> {
        let t = &self.tool;
        let mut args: Vec<OsString> = t.leading_args.iter().map(OsString::from).collect();
        args.push(t.model_flag.clone().into());
        args.push(model.into());
        args.push(t.output_flag.clone().into());
        args.push(out_root.into());
        args.push(t.device_flag.clone().into());
        args.push(self.device_token(device).into());
        args.push(input.into());
        args
    }

    /// Run the tool to completion. Output lands under `out_root`; nothing is
    /// returned, the layout is inspected by the output locator afterwards.
    pub fn run(&self, input: &Path, model: &str, device: Device, out_root: &Path) -> Result<()> {
        self.registry.validate(model)?;

        let args = self.command_args(input, model, device, out_root);
        info!(
            tool = %self.tool.display_name(),
            model,
            device = self.device_token(device),
            input = %input.display(),
            "Running separation tool"
        );
        debug!(?args, "separation command line");

        let output = Command::new(&self.tool.program)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| self.launch_error(e))?;

        if output.status.success() {
            debug!("separation tool finished");
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let captured = if stderr.trim().is_empty() {
            stdout.trim()
        } else {
            stderr.trim()
        };
        let hints = failure_hints(captured, &self.tool, device);
        let diagnostics = if captured.is_empty() {
            "(no output captured)".to_string()
        } else {
            tail_chars(captured, DIAGNOSTIC_TAIL_CHARS).to_string()
        };

        warn!(status = %output.status, hints = hints.len(), "separation tool failed");
        Err(StemError::ExecutionFailure {
            tool: self.tool.display_name(),
            status: output.status.to_string(),
            diagnostics,
            hints,
        })
    }

    fn launch_error(&self, e: io::Error) -> StemError {
        if e.kind() == io::ErrorKind::NotFound {
            StemError::DependencyMissing {
                tool: self.tool.program.clone(),
                hint: "Install Demucs with `pip install demucs` or point --tool at its executable."
                    .into(),
            }
        } else {
            StemError::Io(e)
        }
    }
}

/// Targeted advice for failure signatures seen in the wild.
pub fn failure_hints(captured: &str, tool: &ToolConfig, device: Device) -> Vec<String> {
    let lower = captured.to_lowercase();
    let mut hints = Vec::new();

    if lower.contains("argument") && lower.contains("--cpu") {
        hints.push(format!(
            "This version of the tool has no --cpu flag. Select the device with `{} {}` or `{} {}`.",
            tool.device_flag, tool.cpu_device, tool.device_flag, tool.accelerated_device
        ));
    }
    if device == Device::Accelerated && lower.contains("not available") {
        hints.push(format!(
            "`{}` is not available: install a PyTorch build with {} support or disable the GPU option to use `{}`.",
            tool.accelerated_device, tool.accelerated_device, tool.cpu_device
        ));
    }
    hints
}

/// Last `max` characters of `s`, never splitting a code point.
pub fn tail_chars(s: &str, max: usize) -> &str {
    let count = s.chars().count();
    if count <= max {
        return s;
    }
    let start = s
        .char_indices()
        .nth(count - max)
        .map(|(i, _)| i)
        .unwrap_or(0);
    &s[start..]
}

/// What the startup check learned about the installed tool.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ToolProbe {
    /// Help text mentions the configured device flag.
    Ready,
    /// Tool runs but its help text does not mention the device flag.
    DeviceFlagUnknown,
    /// Tool could not be launched at all.
    Unavailable(String),
}

/// Run `<tool> --help` and check it understands the configured device flag.
pub fn probe_tool(tool: &ToolConfig) -> ToolProbe {
    let output = Command::new(&tool.program)
        .args(&tool.leading_args)
        .arg("--help")
        .stdin(Stdio::null())
        .output();

    match output {
        Err(e) => ToolProbe::Unavailable(e.to_string()),
        Ok(out) => {
            let mut text = String::from_utf8_lossy(&out.stdout).into_owned();
            text.push_str(&String::from_utf8_lossy(&out.stderr));
            let flag_listed = text
                .split(|c: char| c.is_whitespace() || c == ',' || c == '[' || c == ']')
                .any(|word| word == tool.device_flag);
            if flag_listed {
                ToolProbe::Ready
            } else {
                ToolProbe::DeviceFlagUnknown
            }
        }
    }
}
