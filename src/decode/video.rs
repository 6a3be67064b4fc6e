//! Video first-frame extraction via the system `ffmpeg` binary.
//!
//! One frame is all the derived-asset pipeline needs, so instead of linking
//! a decoder for every container and codec, ffmpeg writes frame zero to a
//! temporary PNG and the `image` crate reads it back. Failure modes stay
//! distinct: a nonzero ffmpeg exit means the file could not be opened or
//! decoded at all, while a clean exit with no output frame means the
//! container held no usable video stream.

use super::DecodeError;
use image::RgbImage;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Grab the first frame of the video at `path` as an RGB bitmap.
pub fn first_frame(path: &Path) -> Result<RgbImage, DecodeError> {
    let frame_path = scratch_frame_path();
    let result = run_ffmpeg(path, &frame_path);
    // Scratch frame is removed on every exit path, including errors.
    let cleanup = FrameCleanup(&frame_path);
    let img = result?;
    drop(cleanup);
    Ok(img)
}

fn run_ffmpeg(source: &Path, frame_path: &Path) -> Result<RgbImage, DecodeError> {
    let status = Command::new("ffmpeg")
        .arg("-v")
        .arg("error")
        .arg("-i")
        .arg(source)
        .arg("-frames:v")
        .arg("1")
        .arg("-y")
        .arg(frame_path)
        .status()
        .map_err(|e| match e.kind() {
            // ffmpeg missing from PATH reads the same as an unopenable file
            // to callers; log the real cause.
            std::io::ErrorKind::NotFound => {
                log::error!("ffmpeg binary not found on PATH");
                DecodeError::OpenFailed(source.to_path_buf())
            }
            _ => DecodeError::Io(e),
        })?;

    if !status.success() {
        return Err(DecodeError::OpenFailed(source.to_path_buf()));
    }
    if !frame_path.exists() {
        return Err(DecodeError::NoFrame(source.to_path_buf()));
    }
    let img = image::open(frame_path)
        .map_err(|_| DecodeError::NoFrame(source.to_path_buf()))?;
    Ok(img.to_rgb8())
}

/// Collision-safe scratch path for the extracted frame.
fn scratch_frame_path() -> PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    std::env::temp_dir().join(format!("frame_{}_{}.png", std::process::id(), nanos))
}

struct FrameCleanup<'a>(&'a Path);

impl Drop for FrameCleanup<'_> {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(self.0);
    }
}
