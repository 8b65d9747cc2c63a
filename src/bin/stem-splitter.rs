use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::{
    fs,
    net::SocketAddr,
    path::{Path, PathBuf},
    process::ExitCode,
    time::Duration,
};
use stem_splitter_server::{
    config::DEFAULT_CLEANUP_DELAY_SECS, find_stems, remove_tree, server, slugify_basename,
    ModelRegistry, Pipeline, Progress, Settings, ToolConfig,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "stem-splitter")]
#[command(about = "Split audio into stems with Demucs, from the shell or over HTTP", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the upload page and the HTTP API
    Serve {
        #[arg(short, long, env = "STEM_SPLITTER_BIND", default_value = "127.0.0.1:8000")]
        bind: SocketAddr,

        /// Seconds interactive results stay available
        #[arg(long, env = "STEM_SPLITTER_CLEANUP_DELAY", default_value_t = DEFAULT_CLEANUP_DELAY_SECS)]
        cleanup_delay: u64,

        /// Largest accepted upload, in megabytes
        #[arg(long, env = "STEM_SPLITTER_MAX_UPLOAD_MB", default_value_t = 200)]
        max_upload_mb: usize,

        #[command(flatten)]
        tool: ToolArgs,
    },

    /// Separate one local file and copy the results to a directory
    Split {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        #[arg(short, long)]
        model: Option<String>,

        /// Run on the accelerated device instead of the CPU
        #[arg(long)]
        gpu: bool,

        #[arg(short, long)]
        quiet: bool,

        #[command(flatten)]
        tool: ToolArgs,
    },

    /// List available models
    Models {
        #[command(flatten)]
        tool: ToolArgs,
    },
}

/// How to reach the separation tool and what it accepts.
#[derive(Args, Clone, Debug)]
struct ToolArgs {
    /// Separation executable
    #[arg(long, env = "STEM_SPLITTER_TOOL", default_value = "demucs")]
    tool: String,

    /// Extra argument placed before the generated ones (repeatable), e.g. `--tool python3 --tool-arg=-m --tool-arg demucs`
    #[arg(long = "tool-arg", allow_hyphen_values = true)]
    tool_args: Vec<String>,

    #[arg(long, env = "STEM_SPLITTER_DEVICE_FLAG", default_value = "-d", allow_hyphen_values = true)]
    device_flag: String,

    #[arg(long, env = "STEM_SPLITTER_CPU_DEVICE", default_value = "cpu")]
    cpu_device: String,

    #[arg(long, env = "STEM_SPLITTER_GPU_DEVICE", default_value = "cuda")]
    gpu_device: String,

    /// Conversion utility that must be installed
    #[arg(long, env = "STEM_SPLITTER_CONVERTER", default_value = "ffmpeg")]
    converter: String,

    /// Where work areas are created (defaults to the system temp dir)
    #[arg(long, env = "STEM_SPLITTER_TMP_DIR")]
    work_dir: Option<PathBuf>,

    /// Comma separated model list overriding the built-in registry; the first is the default
    #[arg(long, env = "STEM_SPLITTER_MODELS", value_delimiter = ',')]
    models: Vec<String>,
}

impl ToolArgs {
    fn settings(&self) -> Settings {
        let mut settings = Settings::default();
        settings.tool = ToolConfig {
            program: self.tool.clone(),
            leading_args: self.tool_args.clone(),
            device_flag: self.device_flag.clone(),
            cpu_device: self.cpu_device.clone(),
            accelerated_device: self.gpu_device.clone(),
            ..ToolConfig::default()
        };
        settings.converter = self.converter.clone();
        if let Some(dir) = &self.work_dir {
            settings.work_root = dir.clone();
        }
        settings
    }

    fn registry(&self) -> anyhow::Result<ModelRegistry> {
        let registry = if self.models.is_empty() {
            ModelRegistry::builtin()
        } else {
            ModelRegistry::from_names(self.models.iter().map(|m| m.trim().to_string()))
        };
        registry.context("Failed to load the model registry")
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Serve {
            bind,
            cleanup_delay,
            max_upload_mb,
            tool,
        } => handle_serve(bind, cleanup_delay, max_upload_mb, tool),
        Commands::Split {
            input,
            output,
            model,
            gpu,
            quiet,
            tool,
        } => handle_split(input, output, model, gpu, quiet, tool),
        Commands::Models { tool } => handle_models(tool),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();
}

fn handle_serve(
    bind: SocketAddr,
    cleanup_delay: u64,
    max_upload_mb: usize,
    tool: ToolArgs,
) -> anyhow::Result<()> {
    let mut settings = tool.settings();
    settings.bind = bind;
    settings.cleanup_delay = Duration::from_secs(cleanup_delay);
    settings.max_upload_bytes = upload_limit_bytes(max_upload_mb);

    let pipeline = Pipeline::from_settings(&settings, tool.registry()?);

    eprintln!("🎛️  Stem Splitter on http://{bind}");
    let runtime = tokio::runtime::Runtime::new().context("Failed to start the async runtime")?;
    runtime
        .block_on(server::serve(settings, pipeline))
        .with_context(|| format!("Server on {bind} stopped"))
}

fn upload_limit_bytes(megabytes: usize) -> usize {
    megabytes.saturating_mul(1024 * 1024)
}

fn handle_split(
    input: PathBuf,
    output: PathBuf,
    model: Option<String>,
    gpu: bool,
    quiet: bool,
    tool: ToolArgs,
) -> anyhow::Result<()> {
    if !input.exists() {
        anyhow::bail!("Input file not found: {}", input.display());
    }

    let settings = tool.settings();
    let registry = tool.registry()?;
    let model = model.unwrap_or_else(|| registry.default_model().to_string());

    let mut pipeline = Pipeline::from_settings(&settings, registry);
    if !quiet {
        pipeline = pipeline.with_progress(print_progress);
        eprintln!("🎵 Stem Splitter");
        eprintln!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        eprintln!("Input:  {}", input.display());
        eprintln!("Output: {}", output.display());
        eprintln!("Model:  {}", model);
        eprintln!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        eprintln!();
    }

    let result = match pipeline.separate(&input, &model, gpu) {
        Ok(result) => result,
        Err(failure) => {
            if let Some(work_area) = &failure.work_area {
                remove_tree(work_area);
            }
            return Err(failure.error.into());
        }
    };

    let base = slugify_basename(&input.to_string_lossy(), "output");
    let copied = copy_results(&result.archive, &result.stems_dir, &output, &base, &model);
    remove_tree(&result.work_area);
    let (archive, stems) = copied?;

    if !quiet {
        eprintln!();
        eprintln!("✅ Split completed successfully!");
        eprintln!();
        eprintln!("Output files:");
        eprintln!("  📦 Archive: {}", archive.display());
        for (label, path) in &stems {
            eprintln!("  {label}: {}", path.display());
        }
    } else {
        // Quiet mode: just print paths
        println!("{}", archive.display());
        for (_, path) in &stems {
            println!("{}", path.display());
        }
    }

    Ok(())
}

fn copy_results(
    archive: &Path,
    stems_dir: &Path,
    output: &Path,
    base: &str,
    model: &str,
) -> anyhow::Result<(PathBuf, Vec<(String, PathBuf)>)> {
    fs::create_dir_all(output)
        .with_context(|| format!("Cannot create output directory {}", output.display()))?;

    let archive_out = output.join(format!("{base}_{model}_stems.zip"));
    fs::copy(archive, &archive_out)
        .with_context(|| format!("Cannot write {}", archive_out.display()))?;

    let stems = find_stems(stems_dir)?;
    let mut copied = Vec::new();
    for (key, path) in stems.iter() {
        let Some(path) = path else { continue };
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("wav");
        let dst = output.join(format!("{base}_{key}.{ext}"));
        fs::copy(path, &dst).with_context(|| format!("Cannot write {}", dst.display()))?;
        copied.push((stem_label(key.as_str()), dst));
    }
    Ok((archive_out, copied))
}

fn stem_label(key: &str) -> String {
    match key {
        "vocals" => "🎤 Vocals".into(),
        "drums" => "🥁 Drums ".into(),
        "bass" => "🎸 Bass  ".into(),
        "other" => "🎹 Other ".into(),
        other => other.into(),
    }
}

fn print_progress(progress: Progress) {
    let percent = (progress.fraction * 100.0).round() as u32;
    eprintln!("⏳ {:>3}% {}", percent, progress.stage);
}

fn handle_models(tool: ToolArgs) -> anyhow::Result<()> {
    let registry = tool.registry()?;

    eprintln!("📋 Available Models");
    eprintln!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    for model in registry.entries() {
        let marker = if model.name == registry.default_model() {
            " (default)"
        } else {
            ""
        };
        if model.description.is_empty() {
            eprintln!("  • {}{}", model.name, marker);
        } else {
            eprintln!("  • {}{} - {}", model.name, marker, model.description);
        }
    }
    eprintln!();
    eprintln!("Use --model <name> to specify a model");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_limit_in_bytes() {
        assert_eq!(upload_limit_bytes(200), 200 * 1024 * 1024);
        assert_eq!(upload_limit_bytes(0), 0);
    }

    #[test]
    fn huge_upload_limit_saturates() {
        assert_eq!(upload_limit_bytes(usize::MAX), usize::MAX);
        assert_eq!(upload_limit_bytes(usize::MAX / 1024), usize::MAX);
    }

    #[test]
    fn serve_accepts_large_limit() {
        let max = usize::MAX.to_string();
        let cli =
            Cli::try_parse_from(["stem-splitter", "serve", "--max-upload-mb", max.as_str()])
                .unwrap();
        match cli.command {
            Commands::Serve { max_upload_mb, .. } => {
                assert_eq!(upload_limit_bytes(max_upload_mb), usize::MAX)
            }
            _ => panic!("expected serve"),
        }
    }
}
