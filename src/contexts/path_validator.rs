use crate::data::ValidatedPath;
use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    /// The path does not start with the required root
    OutsideRoot { path: String, root: String },
    /// After resolving `..` and symlinks the path escapes the root
    Escapes { path: PathBuf, root: PathBuf },
    /// The root or an ancestor of the path could not be resolved
    Unresolvable { path: PathBuf, reason: String },
}

impl fmt::Display for PathError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PathError::OutsideRoot { path, root } => {
                write!(f, "Path '{}' must start with '{}'", path, root)
            }
            PathError::Escapes { path, root } => {
                write!(
                    f,
                    "Path '{}' resolves outside of '{}'",
                    path.display(),
                    root.display()
                )
            }
            PathError::Unresolvable { path, reason } => {
                write!(f, "Cannot resolve '{}': {}", path.display(), reason)
            }
        }
    }
}

impl std::error::Error for PathError {}

/// Checks that `path` lies under `required_root` and gives it a leading `/`.
///
/// `proj/a.go` and `/proj/a.go` both validate against `/proj`. The check is
/// component-wise, so `/project/a.go` does not match `/proj`. `..` segments
/// and symlinks are not resolved here; see [`confine`].
pub fn validate(path: &str, required_root: &str) -> Result<ValidatedPath, PathError> {
    let rooted = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    };
    let root = if required_root.starts_with('/') {
        required_root.to_string()
    } else {
        format!("/{}", required_root)
    };

    if !Path::new(&rooted).starts_with(&root) {
        return Err(PathError::OutsideRoot {
            path: path.to_string(),
            root: required_root.to_string(),
        });
    }

    Ok(ValidatedPath::new_unchecked(rooted))
}

/// Joins a generated path onto `base`, treating a leading `/` as relative.
pub fn join_under(base: &Path, path: &str) -> PathBuf {
    base.join(path.trim_start_matches('/'))
}

/// Removes `.` and resolves `..` without touching the filesystem
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn is_symlink(path: &Path) -> bool {
    fs::symlink_metadata(path)
        .map(|meta| meta.file_type().is_symlink())
        .unwrap_or(false)
}

/// Canonicalizes the deepest existing ancestor and re-attaches the rest.
/// A dangling symlink on the way cannot be resolved and is an error.
fn resolve(path: &Path) -> Result<PathBuf, PathError> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|e| PathError::Unresolvable {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?
            .join(path)
    };
    let lexical = normalize_lexically(&absolute);
    let mut existing = lexical.clone();
    let mut rest: Vec<std::ffi::OsString> = Vec::new();

    // symlink_metadata does not follow links, so a dangling link stops the walk
    while fs::symlink_metadata(&existing).is_err() {
        match existing.file_name() {
            Some(name) => rest.push(name.to_os_string()),
            None => break,
        }
        if !existing.pop() {
            break;
        }
    }

    let mut resolved = existing.canonicalize().map_err(|e| {
        let reason = if is_symlink(&existing) {
            format!("dangling symlink {}", existing.display())
        } else {
            e.to_string()
        };
        PathError::Unresolvable {
            path: path.to_path_buf(),
            reason,
        }
    })?;
    for name in rest.iter().rev() {
        resolved.push(name);
    }
    Ok(resolved)
}

/// Ensures `target` stays inside `root` once `..` and symlinks are resolved.
///
/// Returns the resolved target, which is the path that must be written.
/// Call immediately before writing.
pub fn confine(target: &Path, root: &Path) -> Result<PathBuf, PathError> {
    let root_resolved = root.canonicalize().map_err(|e| PathError::Unresolvable {
        path: root.to_path_buf(),
        reason: e.to_string(),
    })?;
    let resolved = resolve(target)?;

    if !resolved.starts_with(&root_resolved) {
        return Err(PathError::Escapes {
            path: target.to_path_buf(),
            root: root.to_path_buf(),
        });
    }
    Ok(resolved)
}
