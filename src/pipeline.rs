use crate::{
    config::{Settings, ToolConfig},
    core::{
        archive::zip_dir,
        cleanup::remove_tree,
        locator::locate_stems_dir,
        normalize::{slugify_basename, DEFAULT_BASENAME, INPUT_EXTENSION},
        separator::DemucsCli,
    },
    error::{Result, StemError},
    io::{
        paths::find_executable,
        progress::{emit_progress, Progress, ProgressFn, ARCHIVING, DONE, PREPARING, SEPARATING},
    },
    model::ModelRegistry,
    types::{Device, SeparationOutput},
};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

/// Prefix of every work area directory name.
pub const WORK_AREA_PREFIX: &str = "demucs_work_";

/// Per-run scratch tree: `<root>/uploads` and `<root>/separated`.
///
/// Removed on drop unless handed over with [`WorkArea::into_path`], so a
/// panicking run does not leave it behind.
#[derive(Debug)]
pub struct WorkArea {
    root: PathBuf,
    handed_over: bool,
}

impl WorkArea {
    /// Create a fresh, uniquely named work area under `parent`.
    pub fn create(parent: &Path) -> std::io::Result<Self> {
        fs::create_dir_all(parent)?;
        let root = parent.join(format!("{WORK_AREA_PREFIX}{}", Uuid::new_v4().simple()));
        fs::create_dir(&root)?;
        let area = WorkArea {
            root,
            handed_over: false,
        };
        fs::create_dir(area.uploads())?;
        fs::create_dir(area.separated())?;
        Ok(area)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn uploads(&self) -> PathBuf {
        self.root.join("uploads")
    }

    pub fn separated(&self) -> PathBuf {
        self.root.join("separated")
    }

    /// Hand the directory over to whoever deletes it.
    pub fn into_path(mut self) -> PathBuf {
        self.handed_over = true;
        std::mem::take(&mut self.root)
    }
}

impl Drop for WorkArea {
    fn drop(&mut self) {
        if !self.handed_over {
            remove_tree(&self.root);
        }
    }
}

/// A failed run. `work_area` is set when the run got far enough to create
/// one; the caller must delete it.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct SeparationFailure {
    #[source]
    pub error: StemError,
    pub work_area: Option<PathBuf>,
}

impl SeparationFailure {
    fn before_work_area(error: StemError) -> Self {
        Self {
            error,
            work_area: None,
        }
    }
}

/// Upload → separate → locate → archive.
#[derive(Clone)]
pub struct Pipeline {
    separator: DemucsCli,
    converter: String,
    work_root: PathBuf,
    progress: Option<ProgressFn>,
}

impl Pipeline {
    pub fn new(
        tool: ToolConfig,
        registry: ModelRegistry,
        converter: impl Into<String>,
        work_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            separator: DemucsCli::new(tool, registry),
            converter: converter.into(),
            work_root: work_root.into(),
            progress: None,
        }
    }

    pub fn from_settings(settings: &Settings, registry: ModelRegistry) -> Self {
        Self::new(
            settings.tool.clone(),
            registry,
            settings.converter.clone(),
            settings.work_root.clone(),
        )
    }

    pub fn with_progress(mut self, cb: impl Fn(Progress) + Send + Sync + 'static) -> Self {
        self.progress = Some(Arc::new(cb));
        self
    }

    pub fn registry(&self) -> &ModelRegistry {
        self.separator.registry()
    }

    pub fn work_root(&self) -> &Path {
        &self.work_root
    }

    /// Fails with [`StemError::DependencyMissing`] when the converter is not on PATH.
    pub fn check_dependencies(&self) -> Result<()> {
        if find_executable(&self.converter).is_some() {
            return Ok(());
        }
        Err(StemError::DependencyMissing {
            tool: self.converter.clone(),
            hint: format!(
                "Install {} (e.g. `apt install {}`, `brew install {}` or `winget install Gyan.FFmpeg`) and reopen the terminal.",
                self.converter, self.converter, self.converter
            ),
        })
    }

    /// Run one separation. Blocks until the tool exits and the archive is written.
    ///
    /// On success the work area is left on disk and handed to the caller.
    pub fn separate(
        &self,
        source: &Path,
        model: &str,
        use_gpu: bool,
    ) -> std::result::Result<SeparationOutput, SeparationFailure> {
        emit_progress(self.progress.as_ref(), PREPARING);
        self.check_dependencies()
            .map_err(SeparationFailure::before_work_area)?;

        let work_area = WorkArea::create(&self.work_root)
            .map_err(|e| SeparationFailure::before_work_area(e.into()))?;

        match self.run(&work_area, source, model, Device::from_gpu_flag(use_gpu)) {
            Ok((archive, stems_dir)) => {
                emit_progress(self.progress.as_ref(), DONE);
                Ok(SeparationOutput {
                    archive,
                    stems_dir,
                    work_area: work_area.into_path(),
                })
            }
            Err(error) => Err(SeparationFailure {
                error,
                work_area: Some(work_area.into_path()),
            }),
        }
    }

    fn run(
        &self,
        work_area: &WorkArea,
        source: &Path,
        model: &str,
        device: Device,
    ) -> Result<(PathBuf, PathBuf)> {
        let original = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let base = slugify_basename(&original, DEFAULT_BASENAME);
        let input = work_area
            .uploads()
            .join(format!("{base}.{INPUT_EXTENSION}"));
        fs::copy(source, &input).map_err(|e| StemError::ReadInput {
            path: source.to_path_buf(),
            source: e,
        })?;

        emit_progress(self.progress.as_ref(), SEPARATING);
        let out_root = work_area.separated();
        self.separator.run(&input, model, device, &out_root)?;

        let stems_dir = locate_stems_dir(&out_root, model)?;
        info!(stems_dir = %stems_dir.display(), "stems located");

        emit_progress(self.progress.as_ref(), ARCHIVING);
        let archive = zip_dir(&stems_dir, &work_area.root().join(&base))?;
        Ok((archive, stems_dir))
    }
}
