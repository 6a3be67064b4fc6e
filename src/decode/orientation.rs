//! EXIF orientation correction.
//!
//! Cameras record the physical sensor orientation in EXIF tag 274 rather
//! than rotating pixels. The three rotation-only values are corrected here;
//! the mirrored variants (2, 4, 5, 7) are rare in camera output and pass
//! through unchanged.
//!
//! Tag 6 means "rotate 90° clockwise to display", tag 8 the opposite, and
//! tag 3 is upside-down. The same correction applies to thumbnails and
//! previews so the two never disagree.

use image::DynamicImage;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Read the orientation tag from `path` and apply the matching rotation.
/// Files without readable EXIF (PNGs, videos, corrupt segments) pass
/// through untouched.
pub fn apply_from_file(path: &Path, img: DynamicImage) -> DynamicImage {
    match read_orientation(path) {
        Some(tag) => apply(img, tag),
        None => img,
    }
}

/// Apply a rotation for a known orientation tag value.
pub fn apply(img: DynamicImage, tag: u32) -> DynamicImage {
    match tag {
        3 => img.rotate180(),
        6 => img.rotate90(),
        8 => img.rotate270(),
        _ => img,
    }
}

/// Best-effort read of EXIF tag 274 (Orientation).
pub fn read_orientation(path: &Path) -> Option<u32> {
    let file = File::open(path).ok()?;
    let mut reader = BufReader::new(&file);
    let exif = exif::Reader::new().read_from_container(&mut reader).ok()?;
    exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)
        .and_then(|field| field.value.get_uint(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    /// 2x1 image: red on the left, blue on the right.
    fn two_pixel() -> DynamicImage {
        let mut img = RgbImage::new(2, 1);
        img.put_pixel(0, 0, image::Rgb([255, 0, 0]));
        img.put_pixel(1, 0, image::Rgb([0, 0, 255]));
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn tag_3_rotates_180() {
        let out = apply(two_pixel(), 3).to_rgb8();
        assert_eq!(out.dimensions(), (2, 1));
        assert_eq!(out.get_pixel(0, 0).0, [0, 0, 255]);
        assert_eq!(out.get_pixel(1, 0).0, [255, 0, 0]);
    }

    #[test]
    fn tag_6_rotates_90_clockwise() {
        let out = apply(two_pixel(), 6).to_rgb8();
        // Landscape 2x1 becomes portrait 1x2; the left (red) pixel moves
        // to the top.
        assert_eq!(out.dimensions(), (1, 2));
        assert_eq!(out.get_pixel(0, 0).0, [255, 0, 0]);
        assert_eq!(out.get_pixel(0, 1).0, [0, 0, 255]);
    }

    #[test]
    fn tag_8_rotates_90_counter_clockwise() {
        let out = apply(two_pixel(), 8).to_rgb8();
        assert_eq!(out.dimensions(), (1, 2));
        assert_eq!(out.get_pixel(0, 0).0, [0, 0, 255]);
        assert_eq!(out.get_pixel(0, 1).0, [255, 0, 0]);
    }

    #[test]
    fn normal_and_mirrored_tags_pass_through() {
        for tag in [1, 2, 4, 5, 7, 99] {
            let out = apply(two_pixel(), tag).to_rgb8();
            assert_eq!(out.dimensions(), (2, 1));
            assert_eq!(out.get_pixel(0, 0).0, [255, 0, 0]);
        }
    }

    #[test]
    fn file_without_exif_passes_through() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("plain.png");
        RgbImage::from_pixel(4, 2, image::Rgb([1, 2, 3]))
            .save(&path)
            .unwrap();

        assert_eq!(read_orientation(&path), None);
        let out = apply_from_file(&path, two_pixel());
        assert_eq!(out.to_rgb8().dimensions(), (2, 1));
    }
}
