//! Store key helpers.

/// Canonicalize path separators to `/`.
pub fn unify_separators(name: &str) -> String {
    name.replace('\\', "/")
}

/// Derive the store key for an adapter file name: separators become `/` and
/// the final extension is dropped. Case and whitespace are kept as-is.
pub fn normalize(raw_name: &str) -> String {
    let unified = unify_separators(raw_name);
    strip_extension(&unified).to_string()
}

/// Drop the extension of the final path segment. Leading dots of the segment
/// (`.hidden`) do not start an extension.
fn strip_extension(path: &str) -> &str {
    let seg_start = path.rfind('/').map(|i| i + 1).unwrap_or(0);
    let segment = &path[seg_start..];
    let body_start = segment.len() - segment.trim_start_matches('.').len();
    match segment[body_start..].rfind('.') {
        Some(dot) => &path[..seg_start + body_start + dot],
        None => path,
    }
}
