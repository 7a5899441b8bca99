mod crops;
mod csv_sink;

pub use crops::CropArchive;
pub use csv_sink::CsvSink;

use crate::capture::FrameTimestamp;
use anyhow::Result;

/// Written in place of an RGB triplet when a frame yields no sample
pub const FAILURE_SENTINEL: [i16; 3] = [-1, -1, -1];

/// One output row per processed frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameRecord {
    pub timestamp: FrameTimestamp,
    /// Averaged testing-point color, `None` for a failed frame
    pub rgb: Option<[u8; 3]>,
}

impl FrameRecord {
    /// RGB columns as written, with the failure sentinel for failed frames
    pub fn columns(&self) -> [i16; 3] {
        self.rgb.map_or(FAILURE_SENTINEL, |rgb| rgb.map(i16::from))
    }
}

/// Trait for result destinations
pub trait ResultSink {
    /// Summary row with the baseline ring color; written before any frame
    fn write_baseline(&mut self, rgb: Option<[u8; 3]>) -> Result<()>;

    /// Append one frame row
    fn write_frame(&mut self, record: &FrameRecord) -> Result<()>;

    /// Flush everything
    fn finish(&mut self) -> Result<()>;
}
