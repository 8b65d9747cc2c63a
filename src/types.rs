use serde::Serialize;
use std::{fmt, path::PathBuf};

/// Canonical stem roles, in display order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StemKey {
    Vocals,
    Drums,
    Bass,
    Other,
}

impl StemKey {
    pub const ALL: [StemKey; 4] = [StemKey::Vocals, StemKey::Drums, StemKey::Bass, StemKey::Other];

    pub fn as_str(self) -> &'static str {
        match self {
            StemKey::Vocals => "vocals",
            StemKey::Drums => "drums",
            StemKey::Bass => "bass",
            StemKey::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<StemKey> {
        StemKey::ALL.into_iter().find(|k| k.as_str() == s)
    }
}

impl fmt::Display for StemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved stem files of one separation run. Unresolved roles stay `None`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StemSet {
    pub vocals: Option<PathBuf>,
    pub drums: Option<PathBuf>,
    pub bass: Option<PathBuf>,
    pub other: Option<PathBuf>,
}

impl StemSet {
    pub fn get(&self, key: StemKey) -> Option<&PathBuf> {
        match key {
            StemKey::Vocals => self.vocals.as_ref(),
            StemKey::Drums => self.drums.as_ref(),
            StemKey::Bass => self.bass.as_ref(),
            StemKey::Other => self.other.as_ref(),
        }
    }

    pub fn set(&mut self, key: StemKey, path: PathBuf) {
        let slot = match key {
            StemKey::Vocals => &mut self.vocals,
            StemKey::Drums => &mut self.drums,
            StemKey::Bass => &mut self.bass,
            StemKey::Other => &mut self.other,
        };
        *slot = Some(path);
    }

    pub fn is_empty(&self) -> bool {
        StemKey::ALL.iter().all(|k| self.get(*k).is_none())
    }

    /// Every role with its path, in fixed order.
    pub fn iter(&self) -> impl Iterator<Item = (StemKey, Option<&PathBuf>)> + '_ {
        StemKey::ALL.into_iter().map(move |k| (k, self.get(k)))
    }
}

/// Compute device handed to the separation tool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Device {
    Cpu,
    Accelerated,
}

impl Device {
    pub fn from_gpu_flag(use_gpu: bool) -> Self {
        if use_gpu {
            Device::Accelerated
        } else {
            Device::Cpu
        }
    }
}

/// Handles returned by a successful [`crate::Pipeline::separate`] run.
///
/// The work area is NOT removed by the pipeline; whoever holds this value
/// owns its deletion.
#[derive(Clone, Debug)]
pub struct SeparationOutput {
    pub archive: PathBuf,
    pub work_area: PathBuf,
    pub stems_dir: PathBuf,
}
