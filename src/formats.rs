//! Media classification by filename extension.
//!
//! A [`MediaClass`] is computed once per file and threaded through decode
//! and caching, rather than re-deriving the extension at every call site.
//! Classification is pure — no I/O, no error cases — from a fixed,
//! case-insensitive extension table.

use std::path::Path;

/// Image extensions handled by the still-image codec path (HEIC/AVIF are
/// classified here too; whether they decode depends on the enabled codecs).
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "heic", "avif"];

/// RAW camera formats handled by the demosaic path.
pub const RAW_EXTENSIONS: &[&str] = &[
    "nef", "nrw", "cr2", "cr3", "crw", "arw", "srf", "sr2", "orf", "raf", "rw2", "raw", "dng",
    "kdc", "dcr", "erf", "3fr", "mef", "pef", "x3f",
];

/// Video containers handled by the first-frame grab path.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "webm", "ogg", "avi", "mkv"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaClass {
    Image,
    Raw,
    Video,
    Unknown,
}

impl MediaClass {
    pub fn is_media(self) -> bool {
        self != MediaClass::Unknown
    }
}

/// Classify a filename by its extension (case-insensitive).
pub fn classify(filename: &str) -> MediaClass {
    let ext = match Path::new(filename).extension() {
        Some(ext) => ext.to_string_lossy().to_lowercase(),
        None => return MediaClass::Unknown,
    };
    if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        MediaClass::Image
    } else if RAW_EXTENSIONS.contains(&ext.as_str()) {
        MediaClass::Raw
    } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
        MediaClass::Video
    } else {
        MediaClass::Unknown
    }
}

/// Whether a directory entry name is hidden (derived-asset directories and
/// dotfiles are never listed or counted).
pub fn is_hidden_name(name: &str) -> bool {
    name.starts_with('.')
}

/// Whether a filename is a sidecar record (`*.meta`).
pub fn is_sidecar_name(name: &str) -> bool {
    name.ends_with(".meta")
}

/// Whether a filename counts as a library media item: a known media class,
/// not hidden, not a sidecar.
pub fn is_media_file(name: &str) -> bool {
    !is_hidden_name(name) && !is_sidecar_name(name) && classify(name).is_media()
}
