//! Template file discovery and file ids.
//!
//! A file's id is its path relative to the root it was found under, with `/`
//! separators. Ids name files in diagnostics and are the names of each
//! file's root template.

use std::path::{Component, Path, PathBuf};

/// Convert a relative path to a file id.
pub fn file_id(relative_path: &Path) -> String {
    relative_path
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Recursively discover template files under `root`.
///
/// Returns paths relative to `root`, sorted for determinism. Hidden files and
/// directories (names starting with `.`) are skipped.
pub fn discover_templates(root: &Path, extensions: &[String]) -> Result<Vec<PathBuf>, String> {
    let mut files = Vec::new();
    discover_recursive(root, root, extensions, &mut files)
        .map_err(|e| format!("Failed to walk directory '{}': {}", root.display(), e))?;
    files.sort();
    Ok(files)
}

fn discover_recursive(
    root: &Path,
    dir: &Path,
    extensions: &[String],
    files: &mut Vec<PathBuf>,
) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let entry_path = entry.path();
        let file_name = entry.file_name();
        if file_name.to_string_lossy().starts_with('.') {
            continue;
        }

        if entry_path.is_dir() {
            discover_recursive(root, &entry_path, extensions, files)?;
        } else if has_extension(&entry_path, extensions) {
            let relative = entry_path
                .strip_prefix(root)
                .unwrap_or(&entry_path)
                .to_path_buf();
            files.push(relative);
        }
    }
    Ok(())
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| extensions.iter().any(|wanted| wanted == ext))
}
