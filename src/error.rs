use crate::detection::SizeWindow;
use thiserror::Error;

/// Fatal errors that stop the run; per-frame problems are a [`FrameFailure`]
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Calibration(#[from] CalibrationError),

    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CalibrationError {
    /// No candidate in the representative frame passed both tests
    #[error("No dosimeter among {candidates} candidate regions (size window {window})")]
    NotFound { candidates: usize, window: SizeWindow },

    /// The frame source produced nothing to calibrate from
    #[error("Frame source produced no frames to calibrate from")]
    NoFrames,
}

impl CalibrationError {
    /// Guidance shown to the user before the run terminates
    pub fn user_message(&self) -> &'static str {
        match self {
            CalibrationError::NotFound { .. } => {
                "Could not locate the dosimeter. Adjust the color bands or the default size \
                 window in the configuration file and try again."
            }
            CalibrationError::NoFrames => {
                "The video contains no decodable frames. Check the input file."
            }
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GeometryError {
    #[error("Cannot derive sample points for a {width}x{height} dosimeter")]
    ZeroDimension { width: u32, height: u32 },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Color band {channel} ({lower}..{upper}) admits no values")]
    EmptyBand {
        channel: &'static str,
        lower: u8,
        upper: u8,
    },

    #[error("Size window minimum {min} exceeds maximum {max}")]
    InvalidWindow { min: u32, max: u32 },

    #[error("Invalid parameter: {parameter} = {value}")]
    OutOfRange {
        parameter: &'static str,
        value: String,
    },
}

/// Recoverable per-frame failure, reported as a sentinel row
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameFailure {
    #[error("no region passed the size and color tests ({candidates} candidates)")]
    NotLocalized { candidates: usize },

    #[error("every sample point fell outside the {width}x{height} crop")]
    NoSamplesInBounds { width: u32, height: u32 },

    #[error("frame could not be decoded: {0}")]
    Decode(String),

    #[error("sampling attempted before calibration")]
    NotCalibrated,
}
