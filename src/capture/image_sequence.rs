use super::FrameSource;
use anyhow::{Context, Result};
use image::RgbImage;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

/// Directory of already-extracted frames, read in file name order
pub struct ImageSequence {
    frames: std::vec::IntoIter<PathBuf>,
}

fn is_image_file(path: &Path) -> bool {
    let Some(ext) = path.extension().and_then(OsStr::to_str) else {
        return false;
    };
    matches!(
        ext.to_ascii_lowercase().as_str(),
        "png" | "jpg" | "jpeg" | "bmp" | "tif" | "tiff" | "webp"
    )
}

impl ImageSequence {
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();

        let mut frames: Vec<PathBuf> = fs::read_dir(dir)
            .with_context(|| format!("Failed to list {}", dir.display()))?
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| p.is_file() && is_image_file(p))
            .collect();
        frames.sort();

        tracing::info!("Found {} frame images in {}", frames.len(), dir.display());

        Ok(Self {
            frames: frames.into_iter(),
        })
    }
}

impl FrameSource for ImageSequence {
    fn next_frame(&mut self) -> Option<Result<RgbImage>> {
        let path = self.frames.next()?;
        Some(
            image::open(&path)
                .map(|img| img.to_rgb8())
                .with_context(|| format!("Failed to decode {}", path.display())),
        )
    }

    /// Image files carry no timing; the pipeline falls back to the configured rate
    fn frame_rate(&self) -> Option<f64> {
        None
    }
}
