//! The library facade — one entry point over browsing, derived assets,
//! counts, and the trash lifecycle.
//!
//! [`Library`] owns one instance of each component and a single shared
//! [`PathLocks`] map, so asset generation and trash moves for the same
//! file serialize against each other. Callers hand in library-relative
//! paths; everything is resolved and containment-checked before touching
//! the filesystem.
//!
//! Browsing order follows photo-archive convention: folders named after
//! months sort in calendar order (Jan before Feb, not Feb before Jan),
//! everything else alphabetically after them.

use crate::assets::{AssetError, AssetKind, DerivedAssetCache};
use crate::config::LibraryConfig;
use crate::counts::FolderCountCache;
use crate::decode::{Decoder, MediaDecoder};
use crate::formats::{self, MediaClass};
use crate::locks::PathLocks;
use crate::paths::{PathError, PathResolver};
use crate::trash::{BulkOutcome, TrashError, TrashListing, TrashManager};
use rayon::prelude::*;
use serde::Serialize;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error(transparent)]
    Path(#[from] PathError),
    #[error(transparent)]
    Asset(#[from] AssetError),
    #[error(transparent)]
    Trash(#[from] TrashError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// A subfolder in a listing, with its recursive media count.
#[derive(Debug, Clone, Serialize)]
pub struct FolderEntry {
    pub name: String,
    pub item_count: u64,
}

/// A media file in a listing.
#[derive(Debug, Clone, Serialize)]
pub struct MediaEntry {
    pub filename: String,
    /// Library-relative path, forward-slash separated.
    pub path: String,
    pub media_class: MediaClass,
}

#[derive(Debug, Serialize)]
pub struct FolderListing {
    pub path: String,
    pub folders: Vec<FolderEntry>,
    pub files: Vec<MediaEntry>,
}

/// Facade over one on-disk media library.
pub struct Library<D: Decoder = MediaDecoder> {
    config: LibraryConfig,
    resolver: PathResolver,
    assets: DerivedAssetCache<D>,
    counts: FolderCountCache,
    trash: TrashManager,
}

impl Library<MediaDecoder> {
    /// Open a library with the production decoder stack.
    pub fn open(config: LibraryConfig) -> Self {
        Self::with_decoder(config, MediaDecoder::new())
    }
}

impl<D: Decoder> Library<D> {
    /// Open a library with a custom decoder (tests substitute a mock).
    pub fn with_decoder(config: LibraryConfig, decoder: D) -> Self {
        let locks = Arc::new(PathLocks::new());
        let counts = FolderCountCache::new(&config);
        Self {
            resolver: PathResolver::new(&config),
            assets: DerivedAssetCache::new(&config, decoder, locks.clone()),
            counts: counts.clone(),
            trash: TrashManager::new(&config, counts, locks),
            config,
        }
    }

    pub fn config(&self) -> &LibraryConfig {
        &self.config
    }

    // ==================== browsing ====================

    /// List the immediate contents of a folder: subfolders with counts,
    /// then media files. Hidden entries, sidecars, and the trash directory
    /// never appear.
    pub fn browse(&self, relative: &str) -> Result<FolderListing, LibraryError> {
        let dir = self.resolver.resolve_library(relative)?;
        if !dir.is_dir() {
            return Err(LibraryError::NotFound(relative.to_string()));
        }

        let mut folders = Vec::new();
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if formats::is_hidden_name(&name) {
                continue;
            }
            let path = entry.path();
            if path == self.config.trash_root() {
                continue;
            }
            if entry.file_type()?.is_dir() {
                folders.push(FolderEntry {
                    item_count: self.counts.get(&path)?,
                    name,
                });
            } else if formats::is_media_file(&name) {
                files.push(MediaEntry {
                    path: self.resolver.relative(&path),
                    media_class: formats::classify(&name),
                    filename: name,
                });
            }
        }

        folders.sort_by_key(|f| folder_sort_key(&f.name));
        files.sort_by(|a, b| a.filename.cmp(&b.filename));
        Ok(FolderListing {
            path: relative.trim_matches('/').to_string(),
            folders,
            files,
        })
    }

    /// All media files under a folder, recursively, in path order.
    pub fn list_recursive(&self, relative: &str) -> Result<Vec<MediaEntry>, LibraryError> {
        let dir = self.resolver.resolve_library(relative)?;
        if !dir.is_dir() {
            return Err(LibraryError::NotFound(relative.to_string()));
        }

        let trash_root = self.config.trash_root();
        let mut entries = Vec::new();
        let walker = WalkDir::new(&dir).into_iter().filter_entry(|e| {
            if e.depth() == 0 {
                return true;
            }
            let name = e.file_name().to_string_lossy();
            !formats::is_hidden_name(&name) && e.path() != trash_root
        });
        for entry in walker {
            let entry = entry.map_err(io::Error::other)?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if entry.file_type().is_file() && formats::is_media_file(&name) {
                entries.push(MediaEntry {
                    path: self.resolver.relative(entry.path()),
                    media_class: formats::classify(&name),
                    filename: name,
                });
            }
        }
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }

    // ==================== derived assets ====================

    /// Path to a current thumbnail for the file, generating on demand.
    pub fn thumbnail(&self, relative: &str) -> Result<PathBuf, LibraryError> {
        self.derived(relative, AssetKind::Thumbnail)
    }

    /// Path to a current full-size preview for the file, generating on
    /// demand.
    pub fn preview(&self, relative: &str) -> Result<PathBuf, LibraryError> {
        self.derived(relative, AssetKind::Preview)
    }

    fn derived(&self, relative: &str, kind: AssetKind) -> Result<PathBuf, LibraryError> {
        let source = self.resolver.resolve_library(relative)?;
        if !source.is_file() {
            return Err(LibraryError::NotFound(relative.to_string()));
        }
        let class = formats::classify(relative);
        Ok(self.assets.get_or_create(&source, class, kind)?)
    }

    /// Pre-generate thumbnails for every media file under a folder.
    /// Failures are logged and skipped; returns how many assets are now
    /// current.
    pub fn warm_thumbnails(&self, relative: &str) -> Result<usize, LibraryError> {
        let entries = self.list_recursive(relative)?;
        let warmed = entries
            .par_iter()
            .filter(|entry| match self.thumbnail(&entry.path) {
                Ok(_) => true,
                Err(e) => {
                    log::warn!("thumbnail warm failed for {}: {}", entry.path, e);
                    false
                }
            })
            .count();
        Ok(warmed)
    }

    // ==================== folders ====================

    /// Create a folder (and any missing parents) with a fresh count
    /// sidecar.
    pub fn create_folder(&self, relative: &str) -> Result<(), LibraryError> {
        let dir = self.resolver.resolve_library(relative)?;
        std::fs::create_dir_all(&dir)?;
        self.counts.refresh(&dir)?;
        Ok(())
    }

    /// Soft-delete a folder: every media file inside moves to the trash
    /// (individually restorable), then the emptied tree is removed.
    pub fn delete_folder(&self, relative: &str) -> Result<BulkOutcome, LibraryError> {
        let dir = self.resolver.resolve_library(relative)?;
        if !dir.is_dir() || dir == self.config.root() {
            return Err(LibraryError::NotFound(relative.to_string()));
        }

        let media: Vec<String> = self
            .list_recursive(relative)?
            .into_iter()
            .map(|e| e.path)
            .collect();
        let outcome = self.trash.move_many_to_trash(&media);
        if outcome.failed.is_empty() {
            std::fs::remove_dir_all(&dir)?;
            if let Some(parent) = dir.parent() {
                self.counts.invalidate_up_to_root(parent);
            }
        } else {
            log::warn!(
                "delete_folder {}: {} item(s) failed to trash, folder kept",
                relative,
                outcome.failed.len()
            );
        }
        Ok(outcome)
    }

    // ==================== trash ====================

    pub fn trash_file(&self, relative: &str) -> Result<String, LibraryError> {
        Ok(self.trash.move_to_trash(relative)?)
    }

    pub fn trash_files(&self, relatives: &[String]) -> BulkOutcome {
        self.trash.move_many_to_trash(relatives)
    }

    pub fn restore(&self, trash_relative: &str) -> Result<String, LibraryError> {
        Ok(self.trash.restore(trash_relative)?)
    }

    pub fn restore_files(&self, trash_relatives: &[String]) -> BulkOutcome {
        self.trash.restore_many(trash_relatives)
    }

    pub fn restore_all(&self) -> BulkOutcome {
        self.trash.restore_all()
    }

    pub fn purge(&self, trash_relative: &str) -> Result<(), LibraryError> {
        Ok(self.trash.purge_forever(trash_relative)?)
    }

    pub fn purge_files(&self, trash_relatives: &[String]) -> BulkOutcome {
        self.trash.purge_many(trash_relatives)
    }

    pub fn empty_trash(&self) -> BulkOutcome {
        self.trash.empty_trash()
    }

    pub fn list_trash(&self) -> Result<TrashListing, LibraryError> {
        Ok(self.trash.list_trash()?)
    }

    // ==================== maintenance ====================

    /// Populate count sidecars for every folder in the library, trash
    /// included. Run once at startup so first listings are cheap.
    pub fn initialize(&self) -> Result<(), LibraryError> {
        let trash_root = self.config.trash_root();
        for entry in WalkDir::new(self.config.root())
            .into_iter()
            .filter_entry(|e| {
                e.depth() == 0
                    || e.path() == trash_root
                    || !formats::is_hidden_name(&e.file_name().to_string_lossy())
            })
        {
            let entry = entry.map_err(io::Error::other)?;
            let is_library_dir =
                entry.file_type().is_dir() && !entry.path().starts_with(&trash_root);
            if is_library_dir || entry.path() == trash_root {
                self.counts.refresh(entry.path())?;
            }
        }
        Ok(())
    }

    /// Register a file that appeared outside this API (an upload, a copy):
    /// refresh the affected counts and warm its thumbnail. Asset failures
    /// are logged, not fatal — the file is still browsable.
    pub fn index_new_file(&self, relative: &str) -> Result<(), LibraryError> {
        let path = self.resolver.resolve_library(relative)?;
        if !path.is_file() {
            return Err(LibraryError::NotFound(relative.to_string()));
        }
        if let Some(parent) = path.parent() {
            self.counts.invalidate_up_to_root(parent);
        }
        if let Err(e) = self.thumbnail(relative) {
            log::warn!("thumbnail for new file {} failed: {}", relative, e);
        }
        Ok(())
    }
}

const MONTH_NAMES: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

/// Calendar position for month-named folders, alphabetical for the rest.
fn folder_sort_key(name: &str) -> (u8, usize, String) {
    let lower = name.to_lowercase();
    let month = MONTH_NAMES
        .iter()
        .position(|m| *m == lower || m[..3] == lower);
    match month {
        Some(idx) => (0, idx, String::new()),
        None => (1, 0, lower),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::tests::MockDecoder;
    use std::path::Path;
    use tempfile::TempDir;

    fn library() -> (TempDir, Library<MockDecoder>) {
        let tmp = TempDir::new().unwrap();
        let config = LibraryConfig::open(tmp.path()).unwrap();
        let lib = Library::with_decoder(config, MockDecoder::with_size(800, 600));
        (tmp, lib)
    }

    fn touch(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"bytes").unwrap();
    }

    // ==================== browsing ====================

    #[test]
    fn browse_lists_folders_and_files() {
        let (tmp, lib) = library();
        touch(&tmp.path().join("2024/a.jpg"));
        touch(&tmp.path().join("2024/sub/b.png"));
        touch(&tmp.path().join("2024/notes.txt"));

        let listing = lib.browse("2024").unwrap();
        assert_eq!(listing.folders.len(), 1);
        assert_eq!(listing.folders[0].name, "sub");
        assert_eq!(listing.folders[0].item_count, 1);
        assert_eq!(listing.files.len(), 1);
        assert_eq!(listing.files[0].path, "2024/a.jpg");
        assert_eq!(listing.files[0].media_class, MediaClass::Image);
    }

    #[test]
    fn browse_root_hides_the_trash() {
        let (tmp, lib) = library();
        touch(&tmp.path().join("2024/a.jpg"));
        touch(&tmp.path().join("_Trash/old.jpg"));

        let listing = lib.browse("").unwrap();
        let names: Vec<_> = listing.folders.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["2024"]);
    }

    #[test]
    fn browse_hides_derived_asset_dirs() {
        let (tmp, lib) = library();
        touch(&tmp.path().join("2024/a.jpg"));
        touch(&tmp.path().join("2024/.thumbnails/a.webp"));
        touch(&tmp.path().join("2024/.previews/a.webp"));

        let listing = lib.browse("2024").unwrap();
        assert!(listing.folders.is_empty());
        assert_eq!(listing.files.len(), 1);
    }

    #[test]
    fn browse_missing_folder_is_not_found() {
        let (_tmp, lib) = library();
        assert!(matches!(
            lib.browse("nowhere"),
            Err(LibraryError::NotFound(_))
        ));
    }

    #[test]
    fn month_folders_sort_in_calendar_order() {
        let (tmp, lib) = library();
        for month in ["March", "January", "December", "Archive", "February"] {
            std::fs::create_dir_all(tmp.path().join("2024").join(month)).unwrap();
        }

        let listing = lib.browse("2024").unwrap();
        let names: Vec<_> = listing.folders.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["January", "February", "March", "December", "Archive"]);
    }

    #[test]
    fn abbreviated_month_names_sort_too() {
        assert!(folder_sort_key("Jan") < folder_sort_key("Feb"));
        assert!(folder_sort_key("Dec") < folder_sort_key("Anything"));
    }

    #[test]
    fn list_recursive_spans_subfolders() {
        let (tmp, lib) = library();
        touch(&tmp.path().join("2024/01/a.jpg"));
        touch(&tmp.path().join("2024/02/b.mp4"));
        touch(&tmp.path().join("2024/02/.thumbnails/b.webp"));

        let entries = lib.list_recursive("2024").unwrap();
        let paths: Vec<_> = entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, ["2024/01/a.jpg", "2024/02/b.mp4"]);
    }

    // ==================== derived assets ====================

    #[test]
    fn thumbnail_resolves_and_generates() {
        let (tmp, lib) = library();
        touch(&tmp.path().join("2024/a.jpg"));

        let thumb = lib.thumbnail("2024/a.jpg").unwrap();
        assert!(thumb.exists());
        assert!(thumb.ends_with("2024/.thumbnails/a.webp"));
    }

    #[test]
    fn thumbnail_for_missing_file_is_not_found() {
        let (_tmp, lib) = library();
        assert!(matches!(
            lib.thumbnail("2024/ghost.jpg"),
            Err(LibraryError::NotFound(_))
        ));
    }

    #[test]
    fn preview_uses_the_previews_dir() {
        let (tmp, lib) = library();
        touch(&tmp.path().join("2024/a.jpg"));

        let preview = lib.preview("2024/a.jpg").unwrap();
        assert!(preview.ends_with("2024/.previews/a.webp"));
    }

    #[test]
    fn warm_thumbnails_covers_the_subtree() {
        let (tmp, lib) = library();
        touch(&tmp.path().join("2024/01/a.jpg"));
        touch(&tmp.path().join("2024/02/b.jpg"));

        let warmed = lib.warm_thumbnails("2024").unwrap();
        assert_eq!(warmed, 2);
        assert!(tmp.path().join("2024/01/.thumbnails/a.webp").exists());
        assert!(tmp.path().join("2024/02/.thumbnails/b.webp").exists());
    }

    // ==================== folders ====================

    #[test]
    fn create_folder_writes_a_count_sidecar() {
        let (tmp, lib) = library();
        lib.create_folder("2025/06").unwrap();
        assert!(tmp.path().join("2025/06").is_dir());
        assert!(tmp.path().join("2025/06/_count.meta").exists());
    }

    #[test]
    fn delete_folder_trashes_contents() {
        let (tmp, lib) = library();
        touch(&tmp.path().join("2024/01/a.jpg"));
        touch(&tmp.path().join("2024/01/b.jpg"));

        let outcome = lib.delete_folder("2024/01").unwrap();
        assert_eq!(outcome.succeeded.len(), 2);
        assert!(!tmp.path().join("2024/01").exists());
        assert_eq!(lib.list_trash().unwrap().count, 2);
    }

    #[test]
    fn deleted_folder_contents_are_restorable() {
        let (tmp, lib) = library();
        touch(&tmp.path().join("2024/01/a.jpg"));
        lib.delete_folder("2024/01").unwrap();

        let outcome = lib.restore_all();
        assert_eq!(outcome.succeeded, ["2024/01/a.jpg"]);
        assert!(tmp.path().join("2024/01/a.jpg").is_file());
    }

    #[test]
    fn delete_folder_updates_ancestor_counts() {
        let (tmp, lib) = library();
        touch(&tmp.path().join("archive/2024/a.jpg"));
        assert_eq!(lib.browse("").unwrap().folders[0].item_count, 1);

        lib.delete_folder("archive/2024").unwrap();
        assert_eq!(lib.browse("").unwrap().folders[0].item_count, 0);
    }

    #[test]
    fn delete_folder_refuses_the_root() {
        let (_tmp, lib) = library();
        assert!(matches!(
            lib.delete_folder(""),
            Err(LibraryError::NotFound(_))
        ));
    }

    // ==================== lifecycle ====================

    #[test]
    fn lifecycle_mutations_update_ancestor_counts() {
        let (tmp, lib) = library();
        touch(&tmp.path().join("archive/2024/06/a.jpg"));
        // "archive" is two levels above the mutated file's parent.
        assert_eq!(lib.browse("").unwrap().folders[0].item_count, 1);

        lib.trash_file("archive/2024/06/a.jpg").unwrap();
        assert_eq!(lib.browse("").unwrap().folders[0].item_count, 0);

        lib.restore_all();
        assert_eq!(lib.browse("").unwrap().folders[0].item_count, 1);
    }

    #[test]
    fn index_new_file_in_a_subfolder_updates_ancestor_counts() {
        let (tmp, lib) = library();
        touch(&tmp.path().join("2024/06/a.jpg"));
        assert_eq!(lib.browse("").unwrap().folders[0].item_count, 1);

        touch(&tmp.path().join("2024/06/b.jpg"));
        lib.index_new_file("2024/06/b.jpg").unwrap();
        assert_eq!(lib.browse("").unwrap().folders[0].item_count, 2);
    }

    #[test]
    fn trash_and_restore_through_the_facade() {
        let (tmp, lib) = library();
        touch(&tmp.path().join("2024/a.jpg"));

        let trashed = lib.trash_file("2024/a.jpg").unwrap();
        assert!(!tmp.path().join("2024/a.jpg").exists());
        assert_eq!(lib.list_trash().unwrap().count, 1);

        let restored = lib.restore(&trashed).unwrap();
        assert_eq!(restored, "2024/a.jpg");
        assert_eq!(lib.list_trash().unwrap().count, 0);
    }

    #[test]
    fn trashing_moves_generated_assets() {
        let (tmp, lib) = library();
        touch(&tmp.path().join("2024/a.jpg"));
        lib.thumbnail("2024/a.jpg").unwrap();

        lib.trash_file("2024/a.jpg").unwrap();
        assert!(!tmp.path().join("2024/.thumbnails/a.webp").exists());
        let trash_thumbs: Vec<_> = std::fs::read_dir(tmp.path().join("_Trash/.thumbnails"))
            .unwrap()
            .collect();
        assert_eq!(trash_thumbs.len(), 1);
    }

    // ==================== maintenance ====================

    #[test]
    fn initialize_populates_all_count_sidecars() {
        let (tmp, lib) = library();
        touch(&tmp.path().join("2024/01/a.jpg"));
        touch(&tmp.path().join("2024/02/b.jpg"));

        lib.initialize().unwrap();
        assert!(tmp.path().join("_count.meta").exists());
        assert!(tmp.path().join("2024/_count.meta").exists());
        assert!(tmp.path().join("2024/01/_count.meta").exists());
        assert!(tmp.path().join("_Trash/_count.meta").exists());
    }

    #[test]
    fn index_new_file_refreshes_counts_and_warms_thumbnail() {
        let (tmp, lib) = library();
        touch(&tmp.path().join("2024/a.jpg"));
        assert_eq!(lib.browse("").unwrap().folders[0].item_count, 1);

        // File arrives out of band; the stale sidecar still says 1.
        touch(&tmp.path().join("2024/b.jpg"));
        lib.index_new_file("2024/b.jpg").unwrap();

        assert_eq!(lib.browse("").unwrap().folders[0].item_count, 2);
        assert!(tmp.path().join("2024/.thumbnails/b.webp").exists());
    }
}
