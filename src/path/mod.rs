//! Path utilities shared by every backend
//!
//! Paths are plain strings, always relative, using the separator declared by
//! the backend. These functions never touch storage and keep no state.

/// Joins the non-blank parts with `separator`
///
/// Empty and whitespace-only parts are skipped entirely rather than collapsed,
/// so `["a", "", "b"]` becomes `a/b`.
pub fn combine<S: AsRef<str>>(separator: char, parts: &[S]) -> String {
    let mut result = String::new();
    for part in parts.iter().map(AsRef::as_ref) {
        if part.trim().is_empty() {
            continue;
        }
        if !result.is_empty() {
            result.push(separator);
        }
        result.push_str(part);
    }
    result
}

/// Strips leading/trailing `\` and `/`, then rewrites both to `separator`
pub fn clean(separator: char, path: &str) -> String {
    path.trim_matches(|c| c == '\\' || c == '/')
        .chars()
        .map(|c| if c == '\\' || c == '/' { separator } else { c })
        .collect()
}

/// Ordered segments of the cleaned path; the root has none
pub fn segments(separator: char, path: &str) -> Vec<String> {
    let cleaned = clean(separator, path);
    if cleaned.is_empty() {
        return Vec::new();
    }
    cleaned.split(separator).map(str::to_string).collect()
}

/// Parent of `path` (cleaned), or the empty root path for a single segment
pub fn directory_name(separator: char, path: &str) -> String {
    let cleaned = clean(separator, path);
    match cleaned.rfind(separator) {
        Some(index) => cleaned[..index].to_string(),
        None => String::new(),
    }
}

/// Last segment of the cleaned path
pub fn file_name(separator: char, path: &str) -> String {
    let cleaned = clean(separator, path);
    match cleaned.rsplit(separator).next() {
        Some(name) => name.to_string(),
        None => cleaned,
    }
}

/// Text after the last `.` of the last segment, or empty when there is none
pub fn file_extension(path: &str) -> String {
    let name = path.rsplit(['\\', '/']).next().unwrap_or(path);
    match name.rsplit_once('.') {
        Some((_, extension)) => extension.to_string(),
        None => String::new(),
    }
}

/// True for blank input or a lone separator
pub fn is_root_path(path: &str) -> bool {
    let trimmed = path.trim();
    trimmed.is_empty() || trimmed == "/" || trimmed == "\\"
}
