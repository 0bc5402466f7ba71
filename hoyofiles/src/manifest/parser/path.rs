//! Remote path normalization.

/// Normalize a remote name to a relative `/`-separated path.
///
/// Backslashes are converted to slashes. Absolute paths and paths with
/// empty, `.` or `..` segments are rejected with a description of the fault.
pub(crate) fn normalize_path(raw: &str) -> Result<String, String> {
    let path = raw.trim().replace('\\', "/");
    if path.is_empty() {
        return Err("empty path".to_string());
    }
    if path.starts_with('/') {
        return Err(format!("absolute path `{}`", raw));
    }
    for segment in path.split('/') {
        match segment {
            "" => return Err(format!("empty path segment in `{}`", raw)),
            "." | ".." => return Err(format!("relative segment `{}` in `{}`", segment, raw)),
            s if s.contains('\0') => return Err(format!("NUL byte in `{}`", raw)),
            _ => {}
        }
    }
    Ok(path)
}
