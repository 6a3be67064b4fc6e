//! Derived-asset cache: thumbnails and previews.
//!
//! Every media file can have two derived WebP renditions, stored in hidden
//! sibling directories next to the source:
//!
//! | Kind | Directory | Sizing |
//! |---|---|---|
//! | [`AssetKind::Thumbnail`] | `.thumbnails/` | longest side capped (480px default) |
//! | [`AssetKind::Preview`] | `.previews/` | full decoded resolution |
//!
//! Assets are generated lazily on first request and considered current
//! while their mtime is at or after the source's mtime — touching the
//! source invalidates both renditions without any bookkeeping. Concurrent
//! requests for the same stale asset serialize on the source's path lock
//! and re-check freshness after acquiring, so exactly one request decodes
//! and the rest pick up the written file.

use crate::config::{self, LibraryConfig};
use crate::decode::{DecodeError, Decoder, RenderIntent};
use crate::formats::MediaClass;
use crate::locks::PathLocks;
use crate::paths::PathResolver;
use image::imageops::FilterType;
use image::RgbImage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AssetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("WebP encoding failed: {0}")]
    Encode(PathBuf),
}

/// Which derived rendition of a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Thumbnail,
    Preview,
}

impl AssetKind {
    /// Hidden sibling directory this kind lives in.
    pub fn dir_name(self) -> &'static str {
        match self {
            AssetKind::Thumbnail => config::THUMBNAIL_DIR_NAME,
            AssetKind::Preview => config::PREVIEW_DIR_NAME,
        }
    }

    fn intent(self) -> RenderIntent {
        match self {
            AssetKind::Thumbnail => RenderIntent::Thumbnail,
            AssetKind::Preview => RenderIntent::Preview,
        }
    }
}

/// Lazily-populated cache of derived assets, generic over the decoder so
/// tests can count decodes.
pub struct DerivedAssetCache<D: Decoder> {
    decoder: D,
    resolver: PathResolver,
    max_thumbnail_dimension: u32,
    quality: f32,
    locks: Arc<PathLocks>,
}

impl<D: Decoder> DerivedAssetCache<D> {
    pub fn new(config: &LibraryConfig, decoder: D, locks: Arc<PathLocks>) -> Self {
        Self {
            decoder,
            resolver: PathResolver::new(config),
            max_thumbnail_dimension: config.thumbnail_max_dimension,
            quality: config.webp_quality,
            locks,
        }
    }

    /// Where the derived asset for `source` lives: hidden sibling directory,
    /// source stem, `.webp` extension.
    pub fn derived_path(&self, source: &Path, kind: AssetKind) -> PathBuf {
        let parent = source.parent().unwrap_or(Path::new(""));
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        parent
            .join(kind.dir_name())
            .join(format!("{}.{}", stem, config::DERIVED_EXTENSION))
    }

    /// Return the path to a current derived asset, generating it first if
    /// missing or stale. `source` must be an existing absolute path.
    pub fn get_or_create(
        &self,
        source: &Path,
        class: MediaClass,
        kind: AssetKind,
    ) -> Result<PathBuf, AssetError> {
        let derived = self.derived_path(source, kind);
        if self.is_current(source, &derived) {
            return Ok(derived);
        }

        let slot = self.locks.entry(&self.resolver.relative(source));
        let _guard = slot.lock().unwrap_or_else(|e| e.into_inner());

        // Another request may have generated it while we waited.
        if self.is_current(source, &derived) {
            return Ok(derived);
        }

        log::debug!("generating {:?} for {}", kind, source.display());
        let img = self.decoder.decode(source, class, kind.intent())?;
        let img = match kind {
            AssetKind::Thumbnail => self.shrink(img),
            AssetKind::Preview => img,
        };

        if let Some(dir) = derived.parent() {
            std::fs::create_dir_all(dir)?;
        }
        self.encode_webp(&img, &derived)?;
        Ok(derived)
    }

    /// Whether `derived` exists and is at least as new as `source`.
    pub fn is_current(&self, source: &Path, derived: &Path) -> bool {
        let derived_mtime = match std::fs::metadata(derived).and_then(|m| m.modified()) {
            Ok(t) => t,
            Err(_) => return false,
        };
        match std::fs::metadata(source).and_then(|m| m.modified()) {
            Ok(source_mtime) => derived_mtime >= source_mtime,
            Err(_) => false,
        }
    }

    /// Bounding-box resize to the thumbnail cap; images already within the
    /// cap are kept at native size.
    fn shrink(&self, img: RgbImage) -> RgbImage {
        let (w, h) = img.dimensions();
        let max = self.max_thumbnail_dimension;
        if w <= max && h <= max {
            return img;
        }
        let scale = max as f64 / w.max(h) as f64;
        let new_w = ((w as f64 * scale).round() as u32).max(1);
        let new_h = ((h as f64 * scale).round() as u32).max(1);
        image::imageops::resize(&img, new_w, new_h, FilterType::Lanczos3)
    }

    fn encode_webp(&self, img: &RgbImage, dest: &Path) -> Result<(), AssetError> {
        let (w, h) = img.dimensions();
        let encoder = webp::Encoder::from_rgb(img.as_raw(), w, h);
        let memory = encoder.encode(self.quality);
        if memory.is_empty() {
            return Err(AssetError::Encode(dest.to_path_buf()));
        }
        std::fs::write(dest, &*memory)?;
        Ok(())
    }
}
