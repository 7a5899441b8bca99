mod clock;
mod image_sequence;
mod video;

pub use clock::{FrameClock, FrameTimestamp, SamplingMode};
pub use image_sequence::ImageSequence;
pub use video::VideoDecoder;

use anyhow::{bail, Result};
use image::RgbImage;
use std::path::Path;

/// Forward-only sequence of decoded frames
pub trait FrameSource {
    /// Decode the next frame; `None` once the source is exhausted.
    ///
    /// An `Err` covers only this frame, later calls may still succeed.
    fn next_frame(&mut self) -> Option<Result<RgbImage>>;

    /// Native frame rate, if the source knows it
    fn frame_rate(&self) -> Option<f64>;
}

/// Open a directory of extracted frames or a video file
pub fn open_source(path: &Path) -> Result<Box<dyn FrameSource>> {
    if path.is_dir() {
        Ok(Box::new(ImageSequence::open(path)?))
    } else if path.is_file() {
        Ok(Box::new(VideoDecoder::open(path)?))
    } else {
        bail!("Input not found: {}", path.display())
    }
}
