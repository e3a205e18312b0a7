use super::path_validator::{confine, join_under, validate, PathError};
use crate::data::{Destination, GeneratedFileSet};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::{self, DirBuilder, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// What happened to one generated file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileStatus {
    Written,
    /// The file already held exactly this content
    Unchanged,
    /// Dry run: the file passed validation but was not written
    WouldWrite,
    Rejected(PathError),
    Failed(String),
}

impl FileStatus {
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            FileStatus::Written | FileStatus::Unchanged | FileStatus::WouldWrite
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            FileStatus::Written => "written",
            FileStatus::Unchanged => "unchanged",
            FileStatus::WouldWrite => "would-write",
            FileStatus::Rejected(_) => "rejected",
            FileStatus::Failed(_) => "failed",
        }
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FileStatus::Rejected(e) => write!(f, "rejected: {}", e),
            FileStatus::Failed(reason) => write!(f, "failed: {}", reason),
            other => f.write_str(other.label()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOutcome {
    /// Key as it appeared in the generated set
    pub path: String,
    /// Resolved location on disk, once known
    pub target: Option<PathBuf>,
    pub status: FileStatus,
    /// SHA-256 of the generated content
    pub digest: String,
}

/// Per-file results of one materialization, in write order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaterializeReport {
    pub outcomes: Vec<FileOutcome>,
}

impl MaterializeReport {
    pub fn succeeded(&self) -> impl Iterator<Item = &FileOutcome> {
        self.outcomes.iter().filter(|o| o.status.is_success())
    }

    pub fn failed(&self) -> impl Iterator<Item = &FileOutcome> {
        self.outcomes.iter().filter(|o| !o.status.is_success())
    }

    pub fn count(&self, label: &str) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status.label() == label)
            .count()
    }

    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(|o| o.status.is_success())
    }
}

/// Writes generated files under a base path
#[derive(Debug, Clone)]
pub struct Materializer {
    base_path: PathBuf,
    required_root: Option<String>,
    dry_run: bool,
}

impl Materializer {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            required_root: None,
            dry_run: false,
        }
    }

    pub fn from_destination(destination: &Destination) -> Self {
        let materializer = Self::new(destination.base_path.clone());
        match &destination.required_root {
            Some(root) => materializer.with_required_root(root.clone()),
            None => materializer,
        }
    }

    /// Every generated path must start with `root`
    pub fn with_required_root(mut self, root: impl Into<String>) -> Self {
        self.required_root = Some(root.into());
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Directory no write may escape
    fn containment_root(&self) -> PathBuf {
        match &self.required_root {
            Some(root) => join_under(&self.base_path, root),
            None => self.base_path.clone(),
        }
    }

    /// Writes every file, continuing past failures.
    ///
    /// Two keys resolving to the same file are both written; the later one
    /// in iteration order wins.
    pub fn materialize(&self, files: &GeneratedFileSet) -> MaterializeReport {
        let containment_root = self.containment_root();
        let outcomes = files
            .iter()
            .map(|(path, content)| self.materialize_one(&containment_root, path, content))
            .collect();
        MaterializeReport { outcomes }
    }

    fn materialize_one(&self, containment_root: &Path, path: &str, content: &str) -> FileOutcome {
        let digest = content_digest(content.as_bytes());
        let outcome = |target: Option<PathBuf>, status: FileStatus| FileOutcome {
            path: path.to_string(),
            target,
            status,
            digest: digest.clone(),
        };

        let logical = match &self.required_root {
            Some(root) => match validate(path, root) {
                Ok(validated) => validated.into_string(),
                Err(e) => return outcome(None, FileStatus::Rejected(e)),
            },
            None => path.to_string(),
        };

        let joined = join_under(&self.base_path, &logical);
        let target = match confine(&joined, containment_root) {
            Ok(target) => target,
            Err(e) => return outcome(Some(joined), FileStatus::Rejected(e)),
        };

        if has_content(&target, &digest) {
            return outcome(Some(target), FileStatus::Unchanged);
        }

        if self.dry_run {
            return outcome(Some(target), FileStatus::WouldWrite);
        }

        let status = match write_file(&target, content) {
            Ok(()) => FileStatus::Written,
            Err(reason) => FileStatus::Failed(reason),
        };
        outcome(Some(target), status)
    }
}

/// Writes `files` under `base_path` without a required root
pub fn materialize(base_path: &Path, files: &GeneratedFileSet) -> MaterializeReport {
    Materializer::new(base_path).materialize(files)
}

pub fn content_digest(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}

fn has_content(target: &Path, digest: &str) -> bool {
    match fs::read(target) {
        Ok(existing) => content_digest(&existing) == digest,
        Err(_) => false,
    }
}

fn create_dirs(path: &Path) -> io::Result<()> {
    let mut builder = DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o755);
    }
    builder.create(path)
}

fn write_file(target: &Path, content: &str) -> Result<(), String> {
    if let Some(parent) = target.parent() {
        create_dirs(parent).map_err(|e| {
            format!("Could not create directories {}: {}", parent.display(), e)
        })?;
    }

    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o644);
    }

    options
        .open(target)
        .and_then(|mut file| file.write_all(content.as_bytes()))
        .map_err(|e| format!("Could not write file {}: {}", target.display(), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn files(pairs: &[(&str, &str)]) -> GeneratedFileSet {
        pairs.iter().map(|(k, v)| (*k, *v)).collect()
    }

    #[test]
    fn test_materialize_creates_parents_and_writes() {
        let base = TempDir::new().unwrap();
        let report = materialize(base.path(), &files(&[("/x/a.txt", "hello")]));

        assert!(report.all_succeeded());
        assert_eq!(report.outcomes[0].status, FileStatus::Written);
        assert_eq!(fs::read_to_string(base.path().join("x/a.txt")).unwrap(), "hello");
    }

    #[test]
    fn test_second_run_is_a_no_op() {
        let base = TempDir::new().unwrap();
        let set = files(&[("/x/a.txt", "hello"), ("./b/c.txt", "world")]);

        let first = materialize(base.path(), &set);
        assert_eq!(first.count("written"), 2);

        let second = materialize(base.path(), &set);
        assert!(second.all_succeeded());
        assert_eq!(second.count("unchanged"), 2);
        assert_eq!(fs::read_to_string(base.path().join("x/a.txt")).unwrap(), "hello");
        assert_eq!(fs::read_to_string(base.path().join("b/c.txt")).unwrap(), "world");
    }

    #[test]
    fn test_existing_content_is_overwritten() {
        let base = TempDir::new().unwrap();
        fs::write(base.path().join("a.txt"), "old content that is longer").unwrap();

        let report = materialize(base.path(), &files(&[("a.txt", "new")]));
        assert_eq!(report.outcomes[0].status, FileStatus::Written);
        assert_eq!(fs::read_to_string(base.path().join("a.txt")).unwrap(), "new");
    }

    #[test]
    fn test_same_physical_path_last_write_wins() {
        let base = TempDir::new().unwrap();
        let report = materialize(base.path(), &files(&[("./a.txt", "first"), ("a.txt", "second")]));

        assert!(report.all_succeeded());
        assert_eq!(fs::read_to_string(base.path().join("a.txt")).unwrap(), "second");
    }

    #[test]
    fn test_traversal_is_rejected_and_others_still_written() {
        let outer = TempDir::new().unwrap();
        let base = outer.path().join("base");
        fs::create_dir_all(&base).unwrap();

        let report = materialize(&base, &files(&[("../escape.txt", "bad"), ("ok.txt", "good")]));

        assert_eq!(report.count("rejected"), 1);
        assert_eq!(report.count("written"), 1);
        assert!(!outer.path().join("escape.txt").exists());
        assert_eq!(fs::read_to_string(base.join("ok.txt")).unwrap(), "good");
        let failed: Vec<&str> = report.failed().map(|o| o.path.as_str()).collect();
        assert_eq!(failed, vec!["../escape.txt"]);
    }

    #[test]
    fn test_destination_required_root_is_enforced() {
        let base = TempDir::new().unwrap();
        fs::create_dir_all(base.path().join("proj")).unwrap();
        let destination = Destination {
            base_path: base.path().to_path_buf(),
            required_root: Some("/proj".to_string()),
        };

        let report = Materializer::from_destination(&destination)
            .materialize(&files(&[("proj/ok.go", "ok"), ("elsewhere.go", "nope")]));

        assert_eq!(report.count("written"), 1);
        assert_eq!(report.count("rejected"), 1);
        assert!(!base.path().join("elsewhere.go").exists());
    }

    #[test]
    fn test_required_root_rejects_foreign_paths() {
        let base = TempDir::new().unwrap();
        fs::create_dir_all(base.path().join("proj")).unwrap();

        let report = Materializer::new(base.path())
            .with_required_root("/proj")
            .materialize(&files(&[("/proj/a.go", "package a"), ("/other/a.go", "nope")]));

        let rejected: Vec<&FileOutcome> = report.failed().collect();
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].path, "/other/a.go");
        assert!(matches!(rejected[0].status, FileStatus::Rejected(PathError::OutsideRoot { .. })));
        assert!(!base.path().join("other").exists());
        assert_eq!(fs::read_to_string(base.path().join("proj/a.go")).unwrap(), "package a");
    }

    #[test]
    fn test_write_failure_is_reported_not_fatal() {
        let base = TempDir::new().unwrap();
        fs::write(base.path().join("blocker"), "i am a file").unwrap();

        let report = materialize(
            base.path(),
            &files(&[("blocker/child.txt", "x"), ("fine.txt", "y")]),
        );

        let failed: Vec<&FileOutcome> = report.failed().collect();
        assert_eq!(failed.len(), 1);
        assert!(matches!(failed[0].status, FileStatus::Failed(_)));
        assert_eq!(fs::read_to_string(base.path().join("fine.txt")).unwrap(), "y");
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let base = TempDir::new().unwrap();
        let report = Materializer::new(base.path())
            .dry_run(true)
            .materialize(&files(&[("a/b.txt", "x")]));

        assert_eq!(report.outcomes[0].status, FileStatus::WouldWrite);
        assert!(!base.path().join("a").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_dangling_symlink_is_not_followed() {
        let base = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        let victim = outside.path().join("pwned.txt");
        std::os::unix::fs::symlink(&victim, base.path().join("link.txt")).unwrap();

        let report = Materializer::new(base.path()).materialize(&files(&[("link.txt", "escaped")]));

        assert!(matches!(report.outcomes[0].status, FileStatus::Rejected(_)));
        assert!(!victim.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let base = TempDir::new().unwrap();
        materialize(base.path(), &files(&[("dir/file.txt", "x")]));

        let file_mode = fs::metadata(base.path().join("dir/file.txt")).unwrap().permissions().mode();
        let dir_mode = fs::metadata(base.path().join("dir")).unwrap().permissions().mode();
        // umask may only remove bits
        assert_eq!(file_mode & 0o777 & !0o644, 0);
        assert_eq!(dir_mode & 0o777 & !0o755, 0);
    }
}
