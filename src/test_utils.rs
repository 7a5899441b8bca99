use crate::capture::FrameSource;
use crate::output::{FrameRecord, ResultSink};
use anyhow::{anyhow, Result};
use image::{Rgb, RgbImage};
use imageproc::rect::Rect;
use std::collections::VecDeque;

/// Outside the default red band
pub const BACKGROUND: [u8; 3] = [20, 20, 20];

/// Inside all three default bands
pub const DOSIMETER: [u8; 3] = [160, 120, 90];

/// Background frame with one filled rectangle
pub fn frame_with_rect(width: u32, height: u32, rect: Rect, color: [u8; 3]) -> RgbImage {
    let mut frame = RgbImage::from_pixel(width, height, Rgb(BACKGROUND));
    let (left, top) = (rect.left() as u32, rect.top() as u32);
    for y in top..top + rect.height() {
        for x in left..left + rect.width() {
            frame.put_pixel(x, y, Rgb(color));
        }
    }
    frame
}

/// One entry per frame; `None` simulates a decode failure
pub struct MemorySource {
    frames: VecDeque<Option<RgbImage>>,
    fps: Option<f64>,
}

impl MemorySource {
    pub fn new(frames: Vec<Option<RgbImage>>, fps: Option<f64>) -> Self {
        Self {
            frames: frames.into(),
            fps,
        }
    }
}

impl FrameSource for MemorySource {
    fn next_frame(&mut self) -> Option<Result<RgbImage>> {
        let frame = self.frames.pop_front()?;
        Some(frame.ok_or_else(|| anyhow!("corrupt frame")))
    }

    fn frame_rate(&self) -> Option<f64> {
        self.fps
    }
}

#[derive(Default)]
pub struct MemorySink {
    pub baseline: Option<Option<[u8; 3]>>,
    pub records: Vec<FrameRecord>,
    pub finished: bool,
}

impl ResultSink for MemorySink {
    fn write_baseline(&mut self, rgb: Option<[u8; 3]>) -> Result<()> {
        self.baseline = Some(rgb);
        Ok(())
    }

    fn write_frame(&mut self, record: &FrameRecord) -> Result<()> {
        self.records.push(record.clone());
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.finished = true;
        Ok(())
    }
}
