//! Path normalization (see the Path entity).
//!
//! The mount observes paths as the kernel hands them to us (leading slash,
//! no trailing slash except when a directory reference is explicit). The
//! backend's flat key space never wants the leading slash. Every cache
//! keyed on "the path as observed from the mount" uses the un-normalized
//! form; every backend call uses [`normalize`].

/// Strip exactly one leading slash, leaving everything else (including any
/// trailing slash) untouched.
pub fn normalize(path: &str) -> String {
    path.strip_prefix('/').unwrap_or(path).to_string()
}

/// True when `path` is a directory reference (trailing slash).
pub fn is_directory_ref(path: &str) -> bool {
    path.ends_with('/') && path != "/"
}

/// Normalized directory prefix for a `List` call: normalized form with
/// exactly one trailing slash, or the empty string for the root.
pub fn directory_prefix(path: &str) -> String {
    let norm = normalize(path);
    if norm.is_empty() || norm.ends_with('/') {
        norm
    } else {
        format!("{norm}/")
    }
}

/// The marker object key for a directory at the given (un-normalized) path.
pub fn keep_marker(path: &str) -> String {
    format!("{}.keep", directory_prefix(path))
}

/// Split a path into `(parent, name)`. The root has no parent.
pub fn split(path: &str) -> (String, String) {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rsplit_once('/') {
        Some((parent, name)) => (format!("{parent}/"), name.to_string()),
        None => (String::new(), trimmed.trim_start_matches('/').to_string()),
    }
}

/// Join a parent directory path with a child name.
pub fn join(parent: &str, name: &str) -> String {
    if parent.is_empty() || parent == "/" {
        format!("/{name}")
    } else if parent.ends_with('/') {
        format!("{parent}{name}")
    } else {
        format!("{parent}/{name}")
    }
}

/// True when `path` is the root directory.
pub fn is_root(path: &str) -> bool {
    path.is_empty() || path == "/"
}

/// Relative path component directly beneath `prefix` for a key returned
/// from `List(prefix)`, with a flag for whether it is itself a directory
/// (the key had further path separators beneath the first component).
pub fn first_component(key: &str, prefix: &str) -> Option<(String, bool)> {
    let rest = key.strip_prefix(prefix)?;
    if rest.is_empty() {
        return None;
    }
    match rest.split_once('/') {
        Some((head, _)) => Some((head.to_string(), true)),
        None => Some((rest.to_string(), false)),
    }
}
