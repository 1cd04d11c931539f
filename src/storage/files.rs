//! Source file discovery and relocation

use eyre::{Context, Result};
use std::path::{Path, PathBuf};

/// Resolve a configured file path with the trailing-`*` convention
///
/// A path ending in `*` selects the first file (in name order) in its
/// directory that starts with the text before the `*` and has the given
/// extension. Any other path is returned unchanged. `Ok(None)` means the
/// pattern matched nothing.
///
/// # Example
/// ```no_run
/// use etlit::storage::resolve_glob_path;
///
/// // data/input/export_2025-01.csv, data/input/export_2025-02.csv
/// let path = resolve_glob_path("data/input/export_*", "csv").unwrap();
/// assert_eq!(path.unwrap().file_name().unwrap(), "export_2025-01.csv");
/// ```
pub fn resolve_glob_path(pattern: &str, extension: &str) -> Result<Option<PathBuf>> {
    let Some(stem) = pattern.strip_suffix('*') else {
        return Ok(Some(PathBuf::from(pattern)));
    };

    let (dir, prefix) = match stem.rfind(['/', '\\']) {
        Some(pos) => (&stem[..pos], &stem[pos + 1..]),
        None => (".", stem),
    };
    let dir = if dir.is_empty() { "/" } else { dir };

    let mut candidates: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to list directory: {}", dir))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default();
            name.starts_with(prefix)
                && path
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case(extension))
        })
        .collect();
    candidates.sort();

    Ok(candidates.into_iter().next())
}

/// Move a file to `target`, which may be a directory or a file path
///
/// Falls back to copy-and-delete when a rename crosses file systems.
pub fn relocate_file(source: impl AsRef<Path>, target: impl AsRef<Path>) -> Result<PathBuf> {
    let source = source.as_ref();
    let target = target.as_ref();

    let destination = if target.is_dir() {
        match source.file_name() {
            Some(name) => target.join(name),
            None => eyre::bail!("Cannot relocate {}: no file name", source.display()),
        }
    } else {
        if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        target.to_path_buf()
    };

    if std::fs::rename(source, &destination).is_err() {
        std::fs::copy(source, &destination).with_context(|| {
            format!(
                "Failed to move {} to {}",
                source.display(),
                destination.display()
            )
        })?;
        std::fs::remove_file(source)
            .with_context(|| format!("Failed to remove {}", source.display()))?;
    }

    Ok(destination)
}
