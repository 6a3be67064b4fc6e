//! Path resolution and containment checks.
//!
//! Every operation in the crate takes library-relative paths (forward-slash
//! separated) from callers and resolves them to absolute paths through
//! [`PathResolver`]. Resolution normalizes `.` and `..` lexically and fails
//! if the result would land outside the library root — this is the sole
//! security control for the filesystem surface, so it runs on every
//! boundary-crossing operation.
//!
//! Trash-scoped operations additionally constrain which side of the trash
//! root the resolved path may fall on: a trash move must start outside the
//! trash, a restore or purge must start inside it.

use crate::config::LibraryConfig;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PathError {
    #[error("path escapes the library root: {0}")]
    EscapesRoot(String),
    #[error("path is inside the trash: {0}")]
    InsideTrash(String),
    #[error("path is outside the trash: {0}")]
    OutsideTrash(String),
}

/// Resolves library-relative paths against the configured roots.
#[derive(Debug, Clone)]
pub struct PathResolver {
    root: PathBuf,
    trash_root: PathBuf,
}

impl PathResolver {
    pub fn new(config: &LibraryConfig) -> Self {
        Self {
            root: config.root().to_path_buf(),
            trash_root: config.trash_root(),
        }
    }

    /// Resolve a relative path to an absolute path strictly under the
    /// library root. `".."` components are folded lexically; any attempt
    /// to climb above the root fails with [`PathError::EscapesRoot`].
    pub fn resolve(&self, relative: &str) -> Result<PathBuf, PathError> {
        let mut resolved = self.root.clone();
        let mut depth = 0usize;
        for component in Path::new(relative).components() {
            match component {
                Component::Normal(part) => {
                    resolved.push(part);
                    depth += 1;
                }
                Component::CurDir => {}
                Component::ParentDir => {
                    if depth == 0 {
                        return Err(PathError::EscapesRoot(relative.to_string()));
                    }
                    resolved.pop();
                    depth -= 1;
                }
                // Absolute paths and Windows prefixes never resolve inside
                // the library.
                Component::RootDir | Component::Prefix(_) => {
                    return Err(PathError::EscapesRoot(relative.to_string()));
                }
            }
        }
        Ok(resolved)
    }

    /// Resolve for a library-scoped operation: the result must not lie
    /// under (or be) the trash root.
    pub fn resolve_library(&self, relative: &str) -> Result<PathBuf, PathError> {
        let resolved = self.resolve(relative)?;
        if self.in_trash(&resolved) {
            return Err(PathError::InsideTrash(relative.to_string()));
        }
        Ok(resolved)
    }

    /// Resolve for a trash-scoped operation: the result must lie strictly
    /// under the trash root.
    pub fn resolve_trash(&self, relative: &str) -> Result<PathBuf, PathError> {
        let resolved = self.resolve(relative)?;
        if !resolved.starts_with(&self.trash_root) || resolved == self.trash_root {
            return Err(PathError::OutsideTrash(relative.to_string()));
        }
        Ok(resolved)
    }

    /// Whether an absolute path lies under (or is) the trash root.
    pub fn in_trash(&self, absolute: &Path) -> bool {
        absolute.starts_with(&self.trash_root)
    }

    /// Library-relative, forward-slash-normalized form of an absolute path.
    /// Paths outside the root come back as-is (lossy) — callers only pass
    /// paths they resolved through this resolver.
    pub fn relative(&self, absolute: &Path) -> String {
        let rel = absolute.strip_prefix(&self.root).unwrap_or(absolute);
        rel.components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn trash_root(&self) -> &Path {
        &self.trash_root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn resolver() -> (TempDir, PathResolver) {
        let tmp = TempDir::new().unwrap();
        let config = LibraryConfig::open(tmp.path()).unwrap();
        let resolver = PathResolver::new(&config);
        (tmp, resolver)
    }

    #[test]
    fn resolves_nested_relative_path() {
        let (_tmp, r) = resolver();
        let abs = r.resolve("2024/01/a.jpg").unwrap();
        assert_eq!(abs, r.root().join("2024/01/a.jpg"));
    }

    #[test]
    fn empty_path_is_the_root() {
        let (_tmp, r) = resolver();
        assert_eq!(r.resolve("").unwrap(), r.root());
    }

    #[test]
    fn dotdot_inside_tree_folds() {
        let (_tmp, r) = resolver();
        let abs = r.resolve("2024/01/../02/b.jpg").unwrap();
        assert_eq!(abs, r.root().join("2024/02/b.jpg"));
    }

    #[test]
    fn dotdot_escape_rejected() {
        let (_tmp, r) = resolver();
        assert!(matches!(
            r.resolve("../outside.jpg"),
            Err(PathError::EscapesRoot(_))
        ));
        assert!(matches!(
            r.resolve("2024/../../outside.jpg"),
            Err(PathError::EscapesRoot(_))
        ));
    }

    #[test]
    fn absolute_path_rejected() {
        let (_tmp, r) = resolver();
        assert!(matches!(
            r.resolve("/etc/passwd"),
            Err(PathError::EscapesRoot(_))
        ));
    }

    #[test]
    fn library_scope_rejects_trash_paths() {
        let (_tmp, r) = resolver();
        assert!(matches!(
            r.resolve_library("_Trash/a.jpg"),
            Err(PathError::InsideTrash(_))
        ));
        assert!(r.resolve_library("2024/a.jpg").is_ok());
    }

    #[test]
    fn trash_scope_rejects_library_paths() {
        let (_tmp, r) = resolver();
        assert!(matches!(
            r.resolve_trash("2024/a.jpg"),
            Err(PathError::OutsideTrash(_))
        ));
        assert!(r.resolve_trash("_Trash/a.jpg").is_ok());
    }

    #[test]
    fn trash_scope_rejects_the_trash_root_itself() {
        let (_tmp, r) = resolver();
        assert!(matches!(
            r.resolve_trash("_Trash"),
            Err(PathError::OutsideTrash(_))
        ));
    }

    #[test]
    fn relative_round_trip_uses_forward_slashes() {
        let (_tmp, r) = resolver();
        let abs = r.resolve("2024/01/a.jpg").unwrap();
        assert_eq!(r.relative(&abs), "2024/01/a.jpg");
    }
}
