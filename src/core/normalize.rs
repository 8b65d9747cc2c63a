use std::path::Path;

/// Base name used when nothing survives normalization.
pub const DEFAULT_BASENAME: &str = "input";

/// Extension forced onto the copy handed to the separation tool.
pub const INPUT_EXTENSION: &str = "wav";

/// Turn an arbitrary uploaded filename into a lowercase ASCII base name made of
/// `[a-z0-9_-]` only. Falls back to `default` when the result would be empty.
pub fn slugify_basename(name: &str, default: &str) -> String {
    let stem = Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("");

    let mut out = String::with_capacity(stem.len());
    let mut pending_sep = false;
    for c in stem.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() || c == '_' {
            if pending_sep && !out.is_empty() {
                out.push('-');
            }
            pending_sep = false;
            out.push(c);
        } else if c == '-' || c.is_whitespace() {
            pending_sep = true;
        }
    }

    let trimmed = out.trim_matches(|c| c == '-' || c == '_');
    if trimmed.is_empty() {
        default.to_string()
    } else {
        trimmed.to_string()
    }
}
