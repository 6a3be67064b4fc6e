//! shoebox — a filesystem-backed media library with derived-asset caching
//! and a soft-delete trash.
//!
//! The library is a plain directory tree of photos, RAW files, and videos.
//! shoebox layers three things on top without ever owning the files:
//!
//! 1. **Derived assets** — lazily generated WebP thumbnails and previews
//!    in hidden sibling directories, invalidated by source mtime.
//! 2. **Folder counts** — recursive media counts cached in `_count.meta`
//!    sidecars so listings stay cheap on deep trees.
//! 3. **Trash lifecycle** — soft-delete into a flat `_Trash/` directory
//!    with JSON records, full restore (assets included), and purge.
//!
//! ## Module map
//!
//! | Module | Role |
//! |---|---|
//! | [`config`] | Layout constants and [`LibraryConfig`] |
//! | [`paths`] | Relative-path resolution and containment checks |
//! | [`formats`] | Extension-based [`MediaClass`] classification |
//! | [`locks`] | Per-path mutual exclusion shared by assets and trash |
//! | [`decode`] | Source decoding: still images, RAW, video first frames |
//! | [`assets`] | The derived-asset cache |
//! | [`counts`] | `_count.meta` folder count cache |
//! | [`trash`] | Trash, restore, purge |
//! | [`library`] | [`Library`], the facade callers use |
//!
//! ## Quick start
//!
//! ```no_run
//! use shoebox::{Library, LibraryConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = LibraryConfig::open("/srv/photos")?;
//! let library = Library::open(config);
//! library.initialize()?;
//!
//! let listing = library.browse("2024/January")?;
//! let thumb = library.thumbnail("2024/January/a.jpg")?;
//! let trashed = library.trash_file("2024/January/a.jpg")?;
//! library.restore(&trashed)?;
//! # Ok(())
//! # }
//! ```

pub mod assets;
pub mod config;
pub mod counts;
pub mod decode;
pub mod formats;
pub mod library;
pub mod locks;
pub mod paths;
pub mod trash;

pub use assets::{AssetError, AssetKind, DerivedAssetCache};
pub use config::LibraryConfig;
pub use counts::FolderCountCache;
pub use decode::{DecodeError, Decoder, MediaDecoder, RenderIntent};
pub use formats::MediaClass;
pub use library::{FolderEntry, FolderListing, Library, LibraryError, MediaEntry};
pub use locks::PathLocks;
pub use paths::{PathError, PathResolver};
pub use trash::{BulkOutcome, TrashError, TrashListing, TrashManager, TrashRecord, TrashSummary};
