use super::FrameSource;
use anyhow::{bail, Context, Result};
use image::RgbImage;
use opencv::{
    core::Mat,
    imgproc,
    prelude::*,
    videoio::{self, VideoCapture},
};
use std::path::{Path, PathBuf};

/// Video file decoded through OpenCV's videoio backend
pub struct VideoDecoder {
    path: PathBuf,
    capture: VideoCapture,
    frame: Mat,
    fps: Option<f64>,
    frame_count: Option<u64>,
    position: u64,
    // set when a look-ahead grab already holds the next frame
    grabbed: bool,
    finished: bool,
}

impl VideoDecoder {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let name = path.to_str().context("Video path is not valid UTF-8")?;

        let capture = VideoCapture::from_file(name, videoio::CAP_ANY)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        if !capture.is_opened()? {
            bail!("Cannot decode video {}", path.display());
        }

        let width = capture.get(videoio::CAP_PROP_FRAME_WIDTH)?;
        let height = capture.get(videoio::CAP_PROP_FRAME_HEIGHT)?;
        let fps = capture.get(videoio::CAP_PROP_FPS)?;
        let frame_count = capture.get(videoio::CAP_PROP_FRAME_COUNT)?;

        let fps = (fps.is_finite() && fps > 0.0).then_some(fps);
        let frame_count =
            (frame_count.is_finite() && frame_count > 0.0).then(|| frame_count as u64);

        tracing::info!(
            "Decoding {} at {}x{} ({} fps, {} frames)",
            path.display(),
            width,
            height,
            fps.map_or_else(|| "unknown".to_string(), |f| format!("{f:.2}")),
            frame_count.map_or_else(|| "unknown".to_string(), |n| n.to_string())
        );

        Ok(Self {
            path: path.to_path_buf(),
            capture,
            frame: Mat::default(),
            fps,
            frame_count,
            position: 0,
            grabbed: false,
            finished: false,
        })
    }

    fn decode(&mut self) -> opencv::Result<bool> {
        if std::mem::take(&mut self.grabbed) {
            self.capture.retrieve(&mut self.frame, 0)
        } else {
            self.capture.read(&mut self.frame)
        }
    }

    /// A failed read before the reported end is one broken frame, provided
    /// the stream can still move past it.
    fn skip_broken_frame(&mut self) -> bool {
        if !is_within_stream(self.position, self.frame_count) {
            return false;
        }
        self.grabbed = self.capture.grab().unwrap_or(false);
        self.grabbed
    }
}

impl FrameSource for VideoDecoder {
    fn next_frame(&mut self) -> Option<Result<RgbImage>> {
        if self.finished {
            return None;
        }

        let decoded = self.decode();
        let index = self.position;
        self.position += 1;

        let failure = match decoded {
            Ok(true) if !self.frame.empty() => return Some(bgr_to_rgb(&self.frame)),
            Ok(_) => None,
            Err(e) => Some(e),
        };

        if !self.skip_broken_frame() {
            self.finished = true;
            return failure.map(|e| {
                Err(e).with_context(|| format!("Failed to decode {}", self.path.display()))
            });
        }

        let reason = failure.map_or_else(|| "empty frame".to_string(), |e| e.to_string());
        Some(Err(anyhow::anyhow!(
            "Frame {} of {} could not be decoded: {}",
            index + 1,
            self.path.display(),
            reason
        )))
    }

    fn frame_rate(&self) -> Option<f64> {
        self.fps
    }
}

fn is_within_stream(position: u64, frame_count: Option<u64>) -> bool {
    frame_count.is_some_and(|total| position < total)
}

/// Convert an 8-bit BGR `Mat` into an `RgbImage` of the same size
pub fn bgr_to_rgb(bgr: &Mat) -> Result<RgbImage> {
    let mut rgb = Mat::default();
    imgproc::cvt_color(bgr, &mut rgb, imgproc::COLOR_BGR2RGB, 0)
        .context("Failed to convert frame to RGB")?;

    let width = u32::try_from(rgb.cols()).context("negative frame width")?;
    let height = u32::try_from(rgb.rows()).context("negative frame height")?;
    let bytes = rgb.data_bytes()?.to_vec();

    RgbImage::from_raw(width, height, bytes).context("Decoded frame has unexpected size")
}
