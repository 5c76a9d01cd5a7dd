//! Helpers for share-relative remote paths
//!
//! Remote paths never start or end with a separator, use `/` between components and never
//! contain `.` or `..` components.

/// Join path segments, dropping empty segments and redundant separators.
///
/// Backslashes are treated as separators so that Windows-style base paths from configuration
/// files are accepted.
#[must_use]
pub fn join<S: AsRef<str>>(parts: &[S]) -> String {
    parts
        .iter()
        .flat_map(|part| components(part.as_ref()))
        .collect::<Vec<_>>()
        .join("/")
}

/// Split a path into its non-empty components.
pub fn components(path: &str) -> impl Iterator<Item = &str> {
    path.split(['/', '\\']).filter(|part| !part.is_empty())
}

/// Every ancestor of `path` including `path` itself, shortest first.
///
/// `"a/b/c"` yields `["a", "a/b", "a/b/c"]`.
#[must_use]
pub fn ancestors(path: &str) -> Vec<String> {
    let mut current = String::new();
    components(path)
        .map(|part| {
            if !current.is_empty() {
                current.push('/');
            }
            current.push_str(part);
            current.clone()
        })
        .collect()
}

/// Check that `path` stays inside the share root.
pub fn validate(path: &str) -> crate::Result<()> {
    if path.is_empty() || components(path).any(|part| part == "." || part == "..") {
        return Err(crate::Error::InvalidPath(path.to_string()));
    }
    Ok(())
}

/// Map a remote path onto a local directory.
pub fn to_local(root: &std::path::Path, path: &str) -> crate::Result<std::path::PathBuf> {
    validate(path)?;
    Ok(components(path).fold(root.to_path_buf(), |acc, part| acc.join(part)))
}
