use std::fs;
use std::path::Path;
use walkdir::{DirEntry, WalkDir};

/// Directory names whose whole subtree is never visited
pub const EXCLUDED_DIRS: &[&str] = &[".git", "node_modules", "vendor"];

/// True for directories below the walk root that must be skipped
pub(crate) fn is_excluded_dir(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .map(|name| EXCLUDED_DIRS.contains(&name))
            .unwrap_or(false)
}

/// Walks `root` in file-name order, yielding regular files outside excluded
/// directories. Entries that cannot be read are skipped.
pub(crate) fn walk_files(root: &Path) -> impl Iterator<Item = DirEntry> {
    WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_excluded_dir(e))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
}

/// Harvests up to `max_files` source files under `root` into one text blob.
///
/// Each file contributes a `# <path>` header line followed by its content.
/// Files past the cap are not read, unreadable files are skipped, and an
/// empty or missing root yields an empty string.
pub fn scan(root: &Path, extensions: &[String], max_files: usize) -> String {
    let wanted: Vec<&str> = extensions
        .iter()
        .map(|ext| ext.trim_start_matches('.'))
        .collect();

    let mut collected = String::new();
    let mut count = 0;

    for entry in walk_files(root) {
        if count >= max_files {
            continue;
        }

        let path = entry.path();
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            continue;
        };
        if !wanted.contains(&ext) {
            continue;
        }

        if let Ok(content) = fs::read_to_string(path) {
            collected.push_str(&format!("\n# {}\n{}\n", path.display(), content));
            count += 1;
        }
    }

    collected
}
