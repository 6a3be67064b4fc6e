//! Library configuration and on-disk layout constants.
//!
//! Everything that was a process-wide constant in ad-hoc gallery servers is
//! an explicit, immutable [`LibraryConfig`] here: components receive it at
//! construction time, which keeps tests isolated to a `TempDir` and makes
//! the containment roots unambiguous.
//!
//! ## On-disk layout
//!
//! ```text
//! <root>/
//! ├── 2024/
//! │   └── 01/
//! │       ├── a.jpg
//! │       ├── .thumbnails/a.webp     # derived, hidden sibling dir
//! │       ├── .previews/a.webp
//! │       └── _count.meta            # {"item_count": N}
//! └── _Trash/
//!     ├── a_20240115103000_9f2c4e01.jpg
//!     ├── a_20240115103000_9f2c4e01.jpg.meta
//!     ├── .thumbnails/               # relocated derived assets
//!     └── .previews/
//! ```
//!
//! The layout is load-bearing: other tools read and write the same sidecar
//! files, so the names and JSON fields are fixed.

use std::io;
use std::path::{Path, PathBuf};

/// Hidden sibling directory holding thumbnails.
pub const THUMBNAIL_DIR_NAME: &str = ".thumbnails";

/// Hidden sibling directory holding full-size previews.
pub const PREVIEW_DIR_NAME: &str = ".previews";

/// Per-directory item count sidecar.
pub const COUNT_META_FILENAME: &str = "_count.meta";

/// Extension of every derived asset.
pub const DERIVED_EXTENSION: &str = "webp";

/// Immutable library configuration, shared by every component.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LibraryConfig {
    root: PathBuf,
    /// Reserved top-level directory name holding soft-deleted items.
    pub trash_dir_name: String,
    /// Longest side of a generated thumbnail, in pixels.
    pub thumbnail_max_dimension: u32,
    /// WebP encoding quality for thumbnails and previews (0-100).
    pub webp_quality: f32,
}

impl LibraryConfig {
    /// Open a library rooted at `root`, creating the root and trash
    /// directories if absent. The root is canonicalized so containment
    /// checks compare against a stable absolute path.
    pub fn open(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        let root = root.canonicalize()?;
        let config = Self {
            root,
            trash_dir_name: "_Trash".to_string(),
            thumbnail_max_dimension: 480,
            webp_quality: 85.0,
        };
        std::fs::create_dir_all(config.trash_root())?;
        Ok(config)
    }

    /// Absolute library root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute trash root (`<root>/<trash_dir_name>`).
    pub fn trash_root(&self) -> PathBuf {
        self.root.join(&self.trash_dir_name)
    }
}
