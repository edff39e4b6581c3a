//! Path normalization shared by mapping expansion, keep-set tracking and pruning
//!
//! Mapping rules and ignore patterns are written with forward slashes, while
//! the keep set and the destination listing must agree on one platform-native
//! spelling. Everything here is lexical: no function touches the filesystem.

use std::path::{Component, Path, PathBuf, MAIN_SEPARATOR, MAIN_SEPARATOR_STR};

/// Convert a forward-slash path into a platform-native one.
///
/// Empty and `.` segments are dropped, `..` consumes the previous segment when
/// there is one, and a leading `/` survives as an absolute-path marker.
pub fn normalize(path: &str) -> PathBuf {
    let absolute = path.starts_with('/') || path.starts_with(MAIN_SEPARATOR);
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split(|c: char| c == '/' || c == MAIN_SEPARATOR) {
        match segment {
            "" | "." => {}
            ".." => match segments.last() {
                Some(last) if *last != ".." => {
                    segments.pop();
                }
                _ if absolute => {}
                _ => segments.push(".."),
            },
            other => segments.push(other),
        }
    }

    let joined = segments.join(MAIN_SEPARATOR_STR);
    match (absolute, joined.is_empty()) {
        (true, _) => PathBuf::from(format!("{MAIN_SEPARATOR}{joined}")),
        (false, true) => PathBuf::from("."),
        (false, false) => PathBuf::from(joined),
    }
}

/// Normalize an already-built path (see [`normalize`]).
pub fn normalize_path(path: &Path) -> PathBuf {
    normalize(&path.to_string_lossy())
}

/// Key a destination root consistently regardless of how it was declared.
///
/// Exactly one trailing separator is stripped before normalizing, so `out/`
/// and `out` produce the same key.
pub fn canonical_root(root: &Path) -> PathBuf {
    let raw = root.to_string_lossy();
    let trimmed = match raw.strip_suffix(['/', MAIN_SEPARATOR]) {
        Some(rest) if !rest.is_empty() => rest,
        _ => &raw[..],
    };
    normalize(trimmed)
}

/// `path` relative to `root`, when it is lexically under it.
///
/// A root of `.` contains every relative path that does not climb out of it.
pub fn relative_to<'a>(root: &Path, path: &'a Path) -> Option<&'a Path> {
    if root == Path::new(".") {
        let escapes = path.is_absolute() || path.starts_with("..");
        return (!escapes).then_some(path);
    }
    path.strip_prefix(root).ok()
}

/// Directories strictly between `root` and `path`, shallowest first.
///
/// Returns `None` when `path` is not lexically under `root`.
pub fn ancestors_between(root: &Path, path: &Path) -> Option<Vec<PathBuf>> {
    let relative = relative_to(root, path)?;
    let mut current = if root == Path::new(".") {
        PathBuf::new()
    } else {
        root.to_path_buf()
    };
    let mut parents = Vec::new();

    let mut components = relative.components().peekable();
    while let Some(component) = components.next() {
        if components.peek().is_none() {
            break;
        }
        current.push(component.as_os_str());
        parents.push(current.clone());
    }

    Some(parents)
}

/// Render a relative path with forward slashes for glob matching.
pub fn to_slash(path: &Path) -> String {
    path.components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            Component::ParentDir => Some("..".to_string()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
