use crate::error::Result;
use std::{
    ffi::OsString,
    fs::File,
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};
use tracing::debug;
use walkdir::WalkDir;
use zip::{write::SimpleFileOptions, CompressionMethod, ZipWriter};

/// Zip everything under `src_dir` into `<dest_base>.zip`.
///
/// Entry names are relative to `src_dir`, so stems sit at the archive root.
pub fn zip_dir(src_dir: &Path, dest_base: &Path) -> Result<PathBuf> {
    let mut dest = OsString::from(dest_base.as_os_str());
    dest.push(".zip");
    let dest = PathBuf::from(dest);

    let mut zip = ZipWriter::new(BufWriter::new(File::create(&dest)?));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut entries = 0usize;
    for entry in WalkDir::new(src_dir).min_depth(1).sort_by_file_name() {
        let entry = entry?;
        let rel = entry
            .path()
            .strip_prefix(src_dir)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        let name = entry_name(rel);

        if entry.file_type().is_dir() {
            zip.add_directory(name, options)?;
        } else {
            zip.start_file(name, options)?;
            let mut file = File::open(entry.path())?;
            io::copy(&mut file, &mut zip)?;
            entries += 1;
        }
    }

    zip.finish()?.flush()?;
    debug!(archive = %dest.display(), files = entries, "archive written");
    Ok(dest)
}

fn entry_name(rel: &Path) -> String {
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
