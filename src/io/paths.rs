use std::{
    env,
    path::{Path, PathBuf},
};

/// Locate `program` the way a shell would, without running it.
///
/// Names containing a path separator are checked as given.
pub fn find_executable(program: &str) -> Option<PathBuf> {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return is_executable_file(candidate).then(|| candidate.to_path_buf());
    }

    let path_var = env::var_os("PATH")?;
    env::split_paths(&path_var)
        .flat_map(|dir| executable_names(program).map(move |name| dir.join(name)))
        .find(|p| is_executable_file(p))
}

#[cfg(windows)]
fn executable_names(program: &str) -> impl Iterator<Item = String> + '_ {
    ["", ".exe", ".cmd", ".bat"]
        .into_iter()
        .map(move |ext| format!("{program}{ext}"))
}

#[cfg(not(windows))]
fn executable_names(program: &str) -> impl Iterator<Item = String> + '_ {
    std::iter::once(program.to_string())
}

#[cfg(unix)]
fn is_executable_file(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable_file(path: &Path) -> bool {
    path.is_file()
}
