//! Recursive folder item counts, cached in `_count.meta` sidecars.
//!
//! Counting a deep folder tree on every listing is the kind of cost that
//! compounds — a gallery page listing twelve month folders would walk the
//! entire library. Instead each folder carries a `_count.meta` sidecar
//! holding `{"item_count": N}`, the recursive number of media files below
//! it. Reads hit the sidecar; a missing or corrupt sidecar triggers a
//! recount and rewrite, never a silent zero.
//!
//! Counts include every media file in the subtree. Hidden directories
//! (derived assets) and sidecars are excluded everywhere. The trash subtree
//! is excluded from library folder counts but counted normally when the
//! trash root itself is the query.

use crate::config::{self, LibraryConfig};
use crate::formats;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Serialize, Deserialize)]
struct CountRecord {
    item_count: u64,
}

/// Reads, computes, and invalidates per-folder count sidecars.
#[derive(Debug, Clone)]
pub struct FolderCountCache {
    root: PathBuf,
    trash_root: PathBuf,
}

impl FolderCountCache {
    pub fn new(config: &LibraryConfig) -> Self {
        Self {
            root: config.root().to_path_buf(),
            trash_root: config.trash_root(),
        }
    }

    /// Recursive media-file count for `dir`, from the sidecar when present
    /// and readable, recomputed (and persisted) otherwise.
    pub fn get(&self, dir: &Path) -> io::Result<u64> {
        let sidecar = dir.join(config::COUNT_META_FILENAME);
        if let Ok(bytes) = std::fs::read(&sidecar) {
            match serde_json::from_slice::<CountRecord>(&bytes) {
                Ok(record) => return Ok(record.item_count),
                Err(e) => {
                    log::warn!("corrupt count sidecar {}: {}", sidecar.display(), e);
                }
            }
        }
        self.refresh(dir)
    }

    /// Recount `dir` and rewrite its sidecar.
    pub fn refresh(&self, dir: &Path) -> io::Result<u64> {
        let count = self.recount(dir)?;
        let record = CountRecord { item_count: count };
        let json = serde_json::to_vec(&record).map_err(io::Error::other)?;
        std::fs::write(dir.join(config::COUNT_META_FILENAME), json)?;
        Ok(count)
    }

    /// Drop the cached count for `dir` so the next read recomputes it.
    /// Harmless when `dir` no longer exists.
    pub fn invalidate(&self, dir: &Path) {
        if !dir.is_dir() {
            return;
        }
        let sidecar = dir.join(config::COUNT_META_FILENAME);
        if let Err(e) = std::fs::remove_file(&sidecar) {
            if e.kind() != io::ErrorKind::NotFound {
                log::warn!("failed to invalidate {}: {}", sidecar.display(), e);
            }
        }
    }

    /// `dir` and every ancestor up to and including the library root, in
    /// leaf-to-root order. Empty when `dir` is not under the root.
    pub fn ancestor_chain(&self, dir: &Path) -> Vec<PathBuf> {
        let mut chain = Vec::new();
        for ancestor in dir.ancestors() {
            if !ancestor.starts_with(&self.root) {
                break;
            }
            chain.push(ancestor.to_path_buf());
            if ancestor == self.root {
                break;
            }
        }
        chain
    }

    /// Invalidate `dir` and every ancestor up to the library root. A
    /// mutation deep in the tree changes every ancestor's recursive count,
    /// not just the immediate parent's.
    pub fn invalidate_up_to_root(&self, dir: &Path) {
        for dir in self.ancestor_chain(dir) {
            self.invalidate(&dir);
        }
    }

    fn recount(&self, dir: &Path) -> io::Result<u64> {
        let counting_trash = dir == self.trash_root;
        let mut count = 0u64;
        let walker = WalkDir::new(dir).into_iter().filter_entry(|entry| {
            // The walk root is always counted, whatever its own name.
            if entry.depth() == 0 {
                return true;
            }
            let name = entry.file_name().to_string_lossy();
            if entry.file_type().is_dir() && formats::is_hidden_name(&name) {
                return false;
            }
            // A library count never descends into the trash.
            if !counting_trash && entry.path() == self.trash_root {
                return false;
            }
            true
        });
        for entry in walker {
            let entry = entry.map_err(io::Error::other)?;
            if entry.file_type().is_file()
                && formats::is_media_file(&entry.file_name().to_string_lossy())
            {
                count += 1;
            }
        }
        Ok(count)
    }
}
