//! Soft-delete lifecycle: trash, restore, purge.
//!
//! Trashed files live flat under `<root>/_Trash/` with a collision-proof
//! name (`{stem}_{timestamp}_{8hexrand}{ext}`) and a JSON sidecar
//! (`<trashed name>.meta`) recording where they came from:
//!
//! ```text
//! {
//!   "original_path": "2024/01/a.jpg",
//!   "trashed_at": "2024-01-15T10:30:00.123456",
//!   "trashed_as": "a_20240115103000_9f2c4e01.jpg",
//!   "trashed_thumbnail_path": "_Trash/.thumbnails/a_20240115103000_9f2c4e01.webp"
//! }
//! ```
//!
//! Derived assets travel with the file in both directions, and always move
//! BEFORE the main file: a crash mid-sequence can strand an orphan
//! thumbnail (harmless, regenerable) but never a media file whose assets
//! point at the wrong location. The sidecar is written last on trash and
//! deleted last on restore, so a sidecar's presence implies the moves it
//! describes completed.
//!
//! Every mutation runs under the per-path lock shared with asset
//! generation, so a trash move cannot interleave with a regeneration of
//! the same file.

use crate::assets::AssetKind;
use crate::config::{self, LibraryConfig};
use crate::counts::FolderCountCache;
use crate::formats::{self, MediaClass};
use crate::locks::PathLocks;
use crate::paths::{PathError, PathResolver};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrashError {
    #[error(transparent)]
    Containment(#[from] PathError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("no trash record for: {0}")]
    MissingMetadata(String),
    #[error("corrupt trash record for {0}: {1}")]
    CorruptRecord(String, serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Sidecar record written next to every trashed file. Field names are the
/// wire format shared with other installations; do not rename.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrashRecord {
    pub original_path: String,
    pub trashed_at: String,
    pub trashed_as: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trashed_thumbnail_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trashed_preview_path: Option<String>,
}

/// One entry in a trash listing.
#[derive(Debug, Clone, Serialize)]
pub struct TrashSummary {
    pub filename: String,
    pub media_class: MediaClass,
    pub original_path: Option<String>,
    pub trashed_at: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TrashListing {
    pub files: Vec<TrashSummary>,
    pub count: usize,
}

/// Per-item results of a bulk trash operation. Item failures never abort
/// the batch.
#[derive(Debug, Default)]
pub struct BulkOutcome {
    pub succeeded: Vec<String>,
    pub failed: Vec<(String, String)>,
}

/// Moves files (and their derived assets) between the library and the
/// trash.
pub struct TrashManager {
    resolver: PathResolver,
    counts: FolderCountCache,
    locks: Arc<PathLocks>,
}

impl TrashManager {
    pub fn new(config: &LibraryConfig, counts: FolderCountCache, locks: Arc<PathLocks>) -> Self {
        Self {
            resolver: PathResolver::new(config),
            counts,
            locks,
        }
    }

    // ==================== trash ====================

    /// Soft-delete the library file at `relative`. Returns the trash-
    /// relative path of the moved file.
    pub fn move_to_trash(&self, relative: &str) -> Result<String, TrashError> {
        let (trashed_rel, parent) = self.trash_one(relative)?;
        self.counts.invalidate_up_to_root(&parent);
        self.counts.invalidate(self.resolver.trash_root());
        Ok(trashed_rel)
    }

    /// Trash a batch of files, invalidating each affected folder once.
    pub fn move_many_to_trash(&self, relatives: &[String]) -> BulkOutcome {
        let mut outcome = BulkOutcome::default();
        let mut parents: HashSet<PathBuf> = HashSet::new();
        for rel in relatives {
            match self.trash_one(rel) {
                Ok((trashed_rel, parent)) => {
                    parents.insert(parent);
                    outcome.succeeded.push(trashed_rel);
                }
                Err(e) => outcome.failed.push((rel.clone(), e.to_string())),
            }
        }
        if !outcome.succeeded.is_empty() {
            self.invalidate_affected(&parents);
        }
        outcome
    }

    fn trash_one(&self, relative: &str) -> Result<(String, PathBuf), TrashError> {
        let source = self.resolver.resolve_library(relative)?;

        // Lock on the normalized form so `2024/./a.jpg` and `2024/a.jpg`
        // contend on the same key, as asset generation does.
        let slot = self.locks.entry(&self.resolver.relative(&source));
        let _guard = slot.lock().unwrap_or_else(|e| e.into_inner());

        if !source.is_file() {
            return Err(TrashError::NotFound(relative.to_string()));
        }
        let parent = source
            .parent()
            .ok_or_else(|| TrashError::NotFound(relative.to_string()))?
            .to_path_buf();
        let filename = source
            .file_name()
            .ok_or_else(|| TrashError::NotFound(relative.to_string()))?
            .to_string_lossy()
            .into_owned();

        let (stem, ext) = split_name(&filename);
        let trashed_as = format!(
            "{}_{}_{:08x}{}",
            stem,
            chrono::Local::now().format("%Y%m%d%H%M%S"),
            rand::random::<u32>(),
            ext
        );
        let trash_root = self.resolver.trash_root().to_path_buf();
        let dest = trash_root.join(&trashed_as);
        let (trashed_stem, _) = split_name(&trashed_as);

        // Assets move first; the main file only moves once they are out of
        // the way.
        let mut record = TrashRecord {
            original_path: relative.to_string(),
            trashed_at: chrono::Local::now()
                .format("%Y-%m-%dT%H:%M:%S%.6f")
                .to_string(),
            trashed_as: trashed_as.clone(),
            trashed_thumbnail_path: None,
            trashed_preview_path: None,
        };
        for kind in [AssetKind::Thumbnail, AssetKind::Preview] {
            let asset = derived_sibling(&source, kind);
            if !asset.is_file() {
                continue;
            }
            let asset_dest = trash_root
                .join(kind.dir_name())
                .join(format!("{}.{}", trashed_stem, config::DERIVED_EXTENSION));
            move_file(&asset, &asset_dest)?;
            let rel = self.resolver.relative(&asset_dest);
            match kind {
                AssetKind::Thumbnail => record.trashed_thumbnail_path = Some(rel),
                AssetKind::Preview => record.trashed_preview_path = Some(rel),
            }
        }

        move_file(&source, &dest)?;
        let json = serde_json::to_vec_pretty(&record).map_err(io::Error::other)?;
        std::fs::write(meta_path(&dest), json)?;

        remove_empty_asset_dirs(&parent);
        log::info!("trashed {} as {}", relative, trashed_as);
        Ok((self.resolver.relative(&dest), parent))
    }

    // ==================== restore ====================

    /// Move a trashed file back to its recorded location. Returns the
    /// library-relative path it landed at (suffixed when the original name
    /// is taken).
    pub fn restore(&self, trash_relative: &str) -> Result<String, TrashError> {
        let (restored_rel, parent) = self.restore_one(trash_relative)?;
        self.counts.invalidate_up_to_root(&parent);
        self.counts.invalidate(self.resolver.trash_root());
        Ok(restored_rel)
    }

    pub fn restore_many(&self, trash_relatives: &[String]) -> BulkOutcome {
        let mut outcome = BulkOutcome::default();
        let mut parents: HashSet<PathBuf> = HashSet::new();
        for rel in trash_relatives {
            match self.restore_one(rel) {
                Ok((restored_rel, parent)) => {
                    parents.insert(parent);
                    outcome.succeeded.push(restored_rel);
                }
                Err(e) => outcome.failed.push((rel.clone(), e.to_string())),
            }
        }
        if !outcome.succeeded.is_empty() {
            self.invalidate_affected(&parents);
        }
        outcome
    }

    /// Restore everything currently in the trash.
    pub fn restore_all(&self) -> BulkOutcome {
        match self.trashed_files() {
            Ok(rels) => self.restore_many(&rels),
            Err(e) => BulkOutcome {
                succeeded: Vec::new(),
                failed: vec![("_Trash".to_string(), e.to_string())],
            },
        }
    }

    fn restore_one(&self, trash_relative: &str) -> Result<(String, PathBuf), TrashError> {
        let trashed = self.resolver.resolve_trash(trash_relative)?;

        // The trashed-path lock is always taken before the destination
        // lock, and purge takes only the trashed-path lock, so the two
        // ops serialize on the same item without lock-order cycles (trash
        // keys and library keys are disjoint namespaces).
        let trash_slot = self.locks.entry(&self.resolver.relative(&trashed));
        let _trash_guard = trash_slot.lock().unwrap_or_else(|e| e.into_inner());

        if !trashed.is_file() {
            return Err(TrashError::NotFound(trash_relative.to_string()));
        }
        let record = self.read_record(&trashed)?;

        let slot = self.locks.entry(&record.original_path);
        let _guard = slot.lock().unwrap_or_else(|e| e.into_inner());

        let mut dest = self.resolver.resolve_library(&record.original_path)?;
        if dest.exists() {
            // The original name has been reused since; restore alongside it.
            let filename = dest.file_name().map(|n| n.to_string_lossy().into_owned());
            let (stem, ext) = split_name(filename.as_deref().unwrap_or_default());
            let suffixed = format!(
                "{}_{}{}",
                stem,
                chrono::Local::now().format("%Y%m%d%H%M%S"),
                ext
            );
            dest = dest.with_file_name(suffixed);
        }
        let parent = dest
            .parent()
            .ok_or_else(|| TrashError::NotFound(trash_relative.to_string()))?
            .to_path_buf();
        std::fs::create_dir_all(&parent)?;

        let dest_stem = dest
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        for (kind, trashed_asset) in [
            (AssetKind::Thumbnail, &record.trashed_thumbnail_path),
            (AssetKind::Preview, &record.trashed_preview_path),
        ] {
            let Some(rel) = trashed_asset else { continue };
            let asset = self.resolver.resolve(rel)?;
            if !asset.is_file() {
                continue;
            }
            let asset_dest = parent
                .join(kind.dir_name())
                .join(format!("{}.{}", dest_stem, config::DERIVED_EXTENSION));
            move_file(&asset, &asset_dest)?;
        }

        move_file(&trashed, &dest)?;
        std::fs::remove_file(meta_path(&trashed))?;

        let restored_rel = self.resolver.relative(&dest);
        log::info!("restored {} to {}", trash_relative, restored_rel);
        Ok((restored_rel, parent))
    }

    // ==================== purge ====================

    /// Permanently delete a trashed file, its relocated assets, and its
    /// sidecar. A missing sidecar is tolerated here — purging is how an
    /// inconsistent trash entry gets cleaned up.
    pub fn purge_forever(&self, trash_relative: &str) -> Result<(), TrashError> {
        self.purge_one(trash_relative)?;
        self.counts.invalidate(self.resolver.trash_root());
        Ok(())
    }

    pub fn purge_many(&self, trash_relatives: &[String]) -> BulkOutcome {
        let mut outcome = BulkOutcome::default();
        for rel in trash_relatives {
            match self.purge_one(rel) {
                Ok(()) => outcome.succeeded.push(rel.clone()),
                Err(e) => outcome.failed.push((rel.clone(), e.to_string())),
            }
        }
        if !outcome.succeeded.is_empty() {
            self.counts.invalidate(self.resolver.trash_root());
        }
        outcome
    }

    /// Permanently delete everything in the trash.
    pub fn empty_trash(&self) -> BulkOutcome {
        match self.trashed_files() {
            Ok(rels) => self.purge_many(&rels),
            Err(e) => BulkOutcome {
                succeeded: Vec::new(),
                failed: vec![("_Trash".to_string(), e.to_string())],
            },
        }
    }

    fn purge_one(&self, trash_relative: &str) -> Result<(), TrashError> {
        let trashed = self.resolver.resolve_trash(trash_relative)?;

        let slot = self.locks.entry(&self.resolver.relative(&trashed));
        let _guard = slot.lock().unwrap_or_else(|e| e.into_inner());

        if !trashed.is_file() {
            return Err(TrashError::NotFound(trash_relative.to_string()));
        }

        if let Ok(record) = self.read_record(&trashed) {
            for rel in [&record.trashed_thumbnail_path, &record.trashed_preview_path] {
                let Some(rel) = rel else { continue };
                if let Ok(asset) = self.resolver.resolve(rel) {
                    remove_if_present(&asset)?;
                }
            }
        }
        std::fs::remove_file(&trashed)?;
        remove_if_present(&meta_path(&trashed))?;
        log::info!("purged {}", trash_relative);
        Ok(())
    }

    // ==================== listing ====================

    /// Flat listing of the trash contents, newest metadata included when
    /// the sidecar is readable.
    pub fn list_trash(&self) -> Result<TrashListing, TrashError> {
        let mut files = Vec::new();
        for name in self.trashed_names()? {
            let trashed = self.resolver.trash_root().join(&name);
            let record = self.read_record(&trashed).ok();
            files.push(TrashSummary {
                media_class: formats::classify(&name),
                filename: name,
                original_path: record.as_ref().map(|r| r.original_path.clone()),
                trashed_at: record.map(|r| r.trashed_at),
            });
        }
        files.sort_by(|a, b| a.filename.cmp(&b.filename));
        let count = files.len();
        Ok(TrashListing { files, count })
    }

    fn trashed_names(&self) -> Result<Vec<String>, TrashError> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(self.resolver.trash_root())? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if formats::is_hidden_name(&name) || formats::is_sidecar_name(&name) {
                continue;
            }
            names.push(name);
        }
        Ok(names)
    }

    fn trashed_files(&self) -> Result<Vec<String>, TrashError> {
        let trash_rel = self.resolver.relative(self.resolver.trash_root());
        Ok(self
            .trashed_names()?
            .into_iter()
            .map(|name| format!("{}/{}", trash_rel, name))
            .collect())
    }

    /// Invalidate the count chain of every affected parent plus the trash
    /// root, each directory exactly once even when items shared ancestors.
    fn invalidate_affected(&self, parents: &HashSet<PathBuf>) {
        let dirs: HashSet<PathBuf> = parents
            .iter()
            .flat_map(|p| self.counts.ancestor_chain(p))
            .collect();
        for dir in &dirs {
            self.counts.invalidate(dir);
        }
        self.counts.invalidate(self.resolver.trash_root());
    }

    fn read_record(&self, trashed: &Path) -> Result<TrashRecord, TrashError> {
        let meta = meta_path(trashed);
        let bytes = std::fs::read(&meta).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                TrashError::MissingMetadata(self.resolver.relative(trashed))
            } else {
                TrashError::Io(e)
            }
        })?;
        serde_json::from_slice(&bytes)
            .map_err(|e| TrashError::CorruptRecord(self.resolver.relative(trashed), e))
    }
}

/// `(stem, extension-with-dot)` split of a filename.
fn split_name(filename: &str) -> (String, String) {
    match filename.rfind('.') {
        Some(idx) if idx > 0 => (filename[..idx].to_string(), filename[idx..].to_string()),
        _ => (filename.to_string(), String::new()),
    }
}

fn meta_path(trashed: &Path) -> PathBuf {
    let mut name = trashed.as_os_str().to_os_string();
    name.push(".meta");
    PathBuf::from(name)
}

fn derived_sibling(source: &Path, kind: AssetKind) -> PathBuf {
    let parent = source.parent().unwrap_or(Path::new(""));
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    parent
        .join(kind.dir_name())
        .join(format!("{}.{}", stem, config::DERIVED_EXTENSION))
}

/// Rename, falling back to copy+remove for cross-device moves.
fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    if let Some(dir) = to.parent() {
        std::fs::create_dir_all(dir)?;
    }
    match std::fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(_) => {
            std::fs::copy(from, to)?;
            std::fs::remove_file(from)
        }
    }
}

fn remove_if_present(path: &Path) -> io::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Drop now-empty derived-asset directories after their contents moved.
fn remove_empty_asset_dirs(parent: &Path) {
    for dir_name in [config::THUMBNAIL_DIR_NAME, config::PREVIEW_DIR_NAME] {
        // remove_dir only succeeds on empty directories.
        let _ = std::fs::remove_dir(parent.join(dir_name));
    }
}
