use super::directory_scanner::walk_files;
use crate::data::TodoMap;
use std::fs;
use std::path::Path;

/// Files of this crate that carry the default marker literally; they are
/// never sent for rewriting
const SELF_SKIP_FILES: [&str; 3] = [
    "todo_extractor.rs",
    "pipeline_config.rs",
    "prompt_registry.rs",
];

/// Finds files whose content contains a marker string
#[derive(Debug, Clone)]
pub struct TodoExtractor {
    marker: String,
    skip_files: Vec<String>,
}

impl TodoExtractor {
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
            skip_files: SELF_SKIP_FILES.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Never inspect files with this exact file name
    pub fn skip_file(mut self, name: impl Into<String>) -> Self {
        self.skip_files.push(name.into());
        self
    }

    pub fn skip_files<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.skip_files.extend(names.into_iter().map(Into::into));
        self
    }

    fn is_skipped(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|n| n.to_str())
            .map(|name| self.skip_files.iter().any(|s| s == name))
            .unwrap_or(false)
    }

    /// Walks `root` and collects every readable file containing the marker.
    ///
    /// Keys are the walked paths; a repeated path gets a `#N` suffix rather
    /// than replacing the earlier entry.
    pub fn find(&self, root: &Path) -> TodoMap {
        let mut results = TodoMap::new();

        for entry in walk_files(root) {
            let path = entry.path();
            if self.is_skipped(path) {
                continue;
            }

            let Ok(content) = fs::read_to_string(path) else {
                continue;
            };

            if content.contains(&self.marker) {
                results.insert_unique(&path.to_string_lossy(), content);
            }
        }

        results
    }
}

/// Collects files under `root` containing `marker`
pub fn find_marked(root: &Path, marker: &str) -> TodoMap {
    TodoExtractor::new(marker).find(root)
}
