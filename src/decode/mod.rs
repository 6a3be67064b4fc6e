//! Media decoding — every source format normalized to an 8-bit RGB bitmap.
//!
//! | Source class | Path |
//! |---|---|
//! | `Image` (JPEG, PNG, GIF, TIFF, WebP) | `image` crate decoders |
//! | `Raw` (NEF, CR2, ARW, DNG, ...) | [`raw`] — `rawloader` + camera-WB demosaic |
//! | `Video` (MP4, MOV, MKV, ...) | [`video`] — ffmpeg first-frame grab |
//!
//! After format-specific decode, [`orientation`] applies the EXIF rotation
//! when present, and the result is flattened to 3-channel RGB (alpha,
//! palette, and grayscale inputs included). Decoding never writes into the
//! library tree (video extraction uses a scratch file in the system temp
//! directory).
//!
//! The [`Decoder`] trait is the seam between decoding and the derived-asset
//! cache: production code uses [`MediaDecoder`], tests substitute a mock
//! that records calls.

pub mod orientation;
pub mod raw;
pub mod video;

use crate::formats::MediaClass;
use image::RgbImage;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("video open failed: {0}")]
    OpenFailed(PathBuf),
    #[error("video produced no frame: {0}")]
    NoFrame(PathBuf),
    #[error("raw decode failed: {0}")]
    RawDecodeFailed(String),
    #[error("unsupported or corrupt: {0}")]
    UnsupportedOrCorrupt(String),
}

/// What the decoded bitmap is for. RAW decoding applies a display gamma
/// curve for previews that thumbnails skip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderIntent {
    Thumbnail,
    Preview,
}

/// Decode seam between source formats and the derived-asset cache.
pub trait Decoder: Send + Sync {
    fn decode(
        &self,
        path: &Path,
        class: MediaClass,
        intent: RenderIntent,
    ) -> Result<RgbImage, DecodeError>;
}

/// Production decoder dispatching on [`MediaClass`].
#[derive(Debug, Default, Clone, Copy)]
pub struct MediaDecoder;

impl MediaDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for MediaDecoder {
    fn decode(
        &self,
        path: &Path,
        class: MediaClass,
        intent: RenderIntent,
    ) -> Result<RgbImage, DecodeError> {
        let img = match class {
            MediaClass::Image => decode_still(path)?,
            MediaClass::Raw => image::DynamicImage::ImageRgb8(raw::decode(path, intent)?),
            MediaClass::Video => image::DynamicImage::ImageRgb8(video::first_frame(path)?),
            MediaClass::Unknown => {
                return Err(DecodeError::UnsupportedOrCorrupt(
                    path.display().to_string(),
                ))
            }
        };
        let img = orientation::apply_from_file(path, img);
        Ok(img.to_rgb8())
    }
}

/// Decode a standard still image via the `image` crate, guessing the format
/// from content so mislabeled extensions still decode.
fn decode_still(path: &Path) -> Result<image::DynamicImage, DecodeError> {
    image::ImageReader::open(path)?
        .with_guessed_format()?
        .decode()
        .map_err(|e| DecodeError::UnsupportedOrCorrupt(format!("{}: {}", path.display(), e)))
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Mock decoder that records every call and returns a solid-color
    /// bitmap of a configurable size, or a decode error.
    pub struct MockDecoder {
        pub size: (u32, u32),
        pub fail: bool,
        pub calls: Mutex<Vec<(PathBuf, MediaClass, RenderIntent)>>,
    }

    impl MockDecoder {
        pub fn with_size(width: u32, height: u32) -> Self {
            Self {
                size: (width, height),
                fail: false,
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn failing() -> Self {
            Self {
                size: (1, 1),
                fail: true,
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    impl Decoder for MockDecoder {
        fn decode(
            &self,
            path: &Path,
            class: MediaClass,
            intent: RenderIntent,
        ) -> Result<RgbImage, DecodeError> {
            self.calls
                .lock()
                .unwrap()
                .push((path.to_path_buf(), class, intent));
            if self.fail {
                return Err(DecodeError::UnsupportedOrCorrupt(
                    path.display().to_string(),
                ));
            }
            Ok(RgbImage::from_pixel(
                self.size.0,
                self.size.1,
                image::Rgb([120, 130, 140]),
            ))
        }
    }

    #[test]
    fn unknown_class_is_an_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("file.txt");
        std::fs::write(&path, "not media").unwrap();

        let result = MediaDecoder::new().decode(&path, MediaClass::Unknown, RenderIntent::Thumbnail);
        assert!(matches!(result, Err(DecodeError::UnsupportedOrCorrupt(_))));
    }

    #[test]
    fn still_decode_round_trips_a_png() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("test.png");
        RgbImage::from_pixel(20, 10, image::Rgb([10, 20, 30]))
            .save(&path)
            .unwrap();

        let decoded = MediaDecoder::new()
            .decode(&path, MediaClass::Image, RenderIntent::Thumbnail)
            .unwrap();
        assert_eq!(decoded.dimensions(), (20, 10));
        assert_eq!(decoded.get_pixel(0, 0).0, [10, 20, 30]);
    }

    #[test]
    fn corrupt_image_maps_to_unsupported() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("bad.jpg");
        std::fs::write(&path, b"definitely not a jpeg").unwrap();

        let result = MediaDecoder::new().decode(&path, MediaClass::Image, RenderIntent::Preview);
        assert!(matches!(result, Err(DecodeError::UnsupportedOrCorrupt(_))));
    }

    #[test]
    fn alpha_is_flattened_to_rgb() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("rgba.png");
        image::RgbaImage::from_pixel(8, 8, image::Rgba([200, 100, 50, 255]))
            .save(&path)
            .unwrap();

        let decoded = MediaDecoder::new()
            .decode(&path, MediaClass::Image, RenderIntent::Thumbnail)
            .unwrap();
        assert_eq!(decoded.get_pixel(4, 4).0, [200, 100, 50]);
    }
}
