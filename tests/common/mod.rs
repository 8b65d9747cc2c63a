// Shared fixtures: a shell stand-in for the separation tool and WAV writers.
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use stem_splitter_server::{ModelRegistry, Pipeline, ToolConfig};

/// Mimics `demucs -n <model> -o <out> -d <device> <input>`: writes the four
/// stems to `<out>/<model>/<track>/` and leaves an `invoked` marker next to
/// the script.
const FAKE_DEMUCS: &str = r#"#!/bin/sh
model=""; out=""; input=""
while [ $# -gt 0 ]; do
  case "$1" in
    -n) model="$2"; shift 2 ;;
    -o) out="$2"; shift 2 ;;
    -d) shift 2 ;;
    --help) echo "usage: demucs [-n NAME] [-o OUT] [-d DEVICE] tracks"; exit 0 ;;
    *) input="$1"; shift ;;
  esac
done
touch "$(dirname "$0")/invoked"
name=$(basename "$input")
name="${name%.*}"
dir="$out/$model/$name"
mkdir -p "$dir"
for s in vocals drums bass other; do
  cp "$input" "$dir/$s.wav"
done
"#;

/// Always exits non-zero with a CUDA complaint on stderr.
const FAILING_DEMUCS: &str = r#"#!/bin/sh
touch "$(dirname "$0")/invoked"
echo "Separating track"
echo "RuntimeError: device cuda is not available" >&2
exit 3
"#;

pub struct FakeTool {
    pub dir: tempfile::TempDir,
    pub script: PathBuf,
}

impl FakeTool {
    pub fn working() -> Self {
        Self::with_script(FAKE_DEMUCS)
    }

    pub fn failing() -> Self {
        Self::with_script(FAILING_DEMUCS)
    }

    fn with_script(body: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("demucs.sh");
        fs::write(&script, body).unwrap();
        Self { dir, script }
    }

    /// Run through `sh` so the freshly written script needs no exec bit.
    pub fn config(&self) -> ToolConfig {
        ToolConfig {
            program: "sh".into(),
            leading_args: vec![self.script.to_string_lossy().into_owned()],
            ..ToolConfig::default()
        }
    }

    pub fn was_invoked(&self) -> bool {
        self.dir.path().join("invoked").exists()
    }

    /// Pipeline whose converter check is satisfied by `sh`.
    pub fn pipeline(&self, work_root: &Path) -> Pipeline {
        Pipeline::new(
            self.config(),
            ModelRegistry::builtin().unwrap(),
            "sh",
            work_root,
        )
    }
}

/// One second of 8 kHz mono silence.
pub fn write_wav(path: &Path) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 8000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for _ in 0..8000 {
        writer.write_sample(0i16).unwrap();
    }
    writer.finalize().unwrap();
}

pub fn wav_bytes() -> Vec<u8> {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tone.wav");
    write_wav(&path);
    fs::read(path).unwrap()
}

/// Entries directly inside `dir`.
pub fn entries(dir: &Path) -> Vec<PathBuf> {
    let mut out: Vec<PathBuf> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    out.sort();
    out
}

pub fn touch(path: &Path) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, b"x").unwrap();
}
