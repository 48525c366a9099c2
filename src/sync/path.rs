// Path normalization for local paths, remote keys and exclude patterns.
// Everything that crosses into the sync core goes through `normalize` first
// so local and remote key spaces compare with a single separator.

use std::path::Path;

/// Replace every backslash with a forward slash.
pub fn normalize(path: &str) -> String {
    path.replace('\\', "/")
}

/// Normalize a filesystem path, lossily converting non-UTF-8 names.
pub fn normalize_path(path: &Path) -> String {
    normalize(&path.to_string_lossy())
}

/// Join a remote prefix and a relative path into an object key.
///
/// Empty segments are dropped, so leading, trailing and doubled slashes in
/// either side never produce empty key components.
pub fn join_key(prefix: &str, relative: &str) -> String {
    let prefix = normalize(prefix);
    let relative = normalize(relative);
    prefix
        .split('/')
        .chain(relative.split('/'))
        .filter(|s| !s.is_empty() && *s != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// Prefix handed to the listing call.
///
/// A non-empty prefix always ends in `/` so that `site` does not also list
/// `site-old/...`.
pub fn listing_prefix(prefix: &str) -> String {
    let trimmed = normalize(prefix).trim_matches('/').to_string();
    if trimmed.is_empty() {
        trimmed
    } else {
        format!("{}/", trimmed)
    }
}
