use crate::capture::FrameTimestamp;
use crate::detection::Crop;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Saves the crop each sample was taken from, one image per frame
pub struct CropArchive {
    dir: PathBuf,
}

impl CropArchive {
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create crop directory {}", dir.display()))?;
        tracing::info!("Saving dosimeter crops to {}", dir.display());
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn path_for(&self, timestamp: &FrameTimestamp) -> PathBuf {
        self.dir.join(format!(
            "frame_{}_{}_{}.png",
            timestamp.minute, timestamp.second, timestamp.frame
        ))
    }

    pub fn save(&self, timestamp: &FrameTimestamp, crop: &Crop<'_>) -> Result<PathBuf> {
        let path = self.path_for(timestamp);
        crop.to_image()
            .save(&path)
            .with_context(|| format!("Failed to save crop {}", path.display()))?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use imageproc::rect::Rect;

    #[test]
    fn saves_crop_named_by_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let archive = CropArchive::new(dir.path().join("crops")).unwrap();
        let frame = RgbImage::from_pixel(20, 20, Rgb([160, 120, 90]));
        let crop = Crop::new(&frame, Rect::at(2, 3).of_size(8, 6)).unwrap();
        let ts = FrameTimestamp {
            minute: 1,
            second: 20,
            frame: 7,
        };

        let path = archive.save(&ts, &crop).unwrap();

        assert!(path.ends_with("frame_1_20_7.png"));
        let saved = image::open(path).unwrap().to_rgb8();
        assert_eq!(saved.dimensions(), (8, 6));
    }
}
