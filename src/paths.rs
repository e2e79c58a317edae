//! Containment of user-supplied paths inside the games root.
//!
//! Every tool that reads or writes a game directory resolves its `path`
//! argument through [`GamesRoot::resolve`] before touching the filesystem.

use std::path::{Component, Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PathError {
    #[error("Path must be inside {root}: {path}")]
    OutsideRoot { path: String, root: String },
    #[error("Path is empty")]
    Empty,
}

/// The directory every game checkout lives under.
#[derive(Debug, Clone)]
pub struct GamesRoot {
    root: PathBuf,
}

impl GamesRoot {
    /// Create a games root. The directory does not need to exist yet.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let root = canonicalize_lenient(&normalize(&root));
        Self { root }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Directory a game with the given slug is cloned into.
    pub fn game_dir(&self, slug: &str) -> PathBuf {
        self.root.join(slug)
    }

    /// Resolve `input` (absolute, or relative to `base`) and require the result
    /// to lie inside the root.
    ///
    /// `..` components are folded lexically and symlinks of the existing part
    /// of the path are followed, so neither can be used to escape.
    pub fn resolve(&self, base: &Path, input: &str) -> Result<PathBuf, PathError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(PathError::Empty);
        }

        let raw = Path::new(trimmed);
        let joined = if raw.is_absolute() { raw.to_path_buf() } else { base.join(raw) };
        let resolved = canonicalize_lenient(&normalize(&joined));

        if resolved.starts_with(&self.root) {
            Ok(resolved)
        } else {
            tracing::warn!(path = %resolved.display(), "rejected path outside games root");
            Err(PathError::OutsideRoot {
                path: resolved.display().to_string(),
                root: self.root.display().to_string(),
            })
        }
    }
}

/// Lexically remove `.` and fold `..` components.
fn normalize(path: &Path) -> PathBuf {
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

/// Canonicalize the longest existing ancestor and re-append the rest.
fn canonicalize_lenient(path: &Path) -> PathBuf {
    let mut existing = path.to_path_buf();
    let mut rest = Vec::new();
    loop {
        if let Ok(canonical) = existing.canonicalize() {
            let mut out = canonical;
            for part in rest.iter().rev() {
                out.push(part);
            }
            return out;
        }
        match (existing.file_name().map(|n| n.to_os_string()), existing.parent()) {
            (Some(name), Some(parent)) => {
                rest.push(name);
                existing = parent.to_path_buf();
            }
            _ => return path.to_path_buf(),
        }
    }
}
