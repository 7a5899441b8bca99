use crate::error::ConfigError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Complete configuration for one run, loadable from a JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DosimeterConfig {
    /// Color bands a dosimeter pixel must fall into
    pub bands: ColorBands,

    /// Where the color test probes a candidate region
    pub probe: ProbeConfig,

    /// Size gate before and after calibration
    pub size: SizeConfig,

    /// Sample point layout ratios
    pub geometry: GeometryConfig,

    /// Frame timing and sampling density
    pub timing: TimingConfig,
}

/// Exclusive numeric band: `lower < value < upper`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Band {
    pub lower: u8,
    pub upper: u8,
}

impl Band {
    pub const fn new(lower: u8, upper: u8) -> Self {
        Self { lower, upper }
    }

    pub fn contains(&self, value: u8) -> bool {
        self.lower < value && value < self.upper
    }
}

/// Per-channel bands, read in R, G, B order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorBands {
    pub red: Band,
    pub green: Band,
    pub blue: Band,
}

impl ColorBands {
    pub fn contains(&self, rgb: [u8; 3]) -> bool {
        self.red.contains(rgb[0]) && self.green.contains(rgb[1]) && self.blue.contains(rgb[2])
    }
}

impl Default for ColorBands {
    fn default() -> Self {
        Self {
            red: Band::new(140, 180),
            green: Band::new(70, 180),
            blue: Band::new(45, 150),
        }
    }
}

/// Offsets of the four quadrant probes from the region center.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub offset_x: u32,
    pub offset_y: u32,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            offset_x: 10,
            offset_y: 10,
        }
    }
}

/// Size gate configuration.
///
/// `default_min..=default_max` admits candidates before calibration.
/// `tolerance` widens the calibrated dimensions into the steady-state window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SizeConfig {
    pub default_min: u32,
    pub default_max: u32,
    pub tolerance: u32,
}

impl Default for SizeConfig {
    fn default() -> Self {
        Self {
            default_min: 300,
            default_max: 350,
            tolerance: 15,
        }
    }
}

/// Ratios used to derive the testing and baseline point layout.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometryConfig {
    /// Inner radius as a fraction of the mean half-dimension
    pub inner_ratio: f64,

    /// Outer band inset as a fraction of the mean quarter-dimension
    pub outer_ratio: f64,

    /// `(width + height) / jitter_divisor` gives the point jitter margin
    pub jitter_divisor: u32,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            inner_ratio: 0.5,
            outer_ratio: 0.5,
            jitter_divisor: 20,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Used when the frame source cannot report its own rate
    pub fallback_fps: u32,

    /// Skipped before the calibration frame is taken
    pub warm_up_seconds: f64,

    /// Filtered mode keeps seconds where `second % filter_interval == 0`
    pub filter_interval: u32,

    /// Progress is logged every this many frames
    pub stats_interval: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            fallback_fps: 30,
            warm_up_seconds: 2.0,
            filter_interval: 10,
            stats_interval: 300,
        }
    }
}

impl DosimeterConfig {
    /// Load and validate a configuration file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize config")
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        for (name, band) in [
            ("bands.red", self.bands.red),
            ("bands.green", self.bands.green),
            ("bands.blue", self.bands.blue),
        ] {
            // an exclusive band needs at least one integer strictly inside
            if band.upper <= band.lower.saturating_add(1) {
                return Err(ConfigError::EmptyBand {
                    channel: name,
                    lower: band.lower,
                    upper: band.upper,
                });
            }
        }

        if self.size.default_min > self.size.default_max {
            return Err(ConfigError::InvalidWindow {
                min: self.size.default_min,
                max: self.size.default_max,
            });
        }

        for (name, ratio) in [
            ("geometry.inner_ratio", self.geometry.inner_ratio),
            ("geometry.outer_ratio", self.geometry.outer_ratio),
        ] {
            if !(ratio > 0.0 && ratio <= 1.0) {
                return Err(ConfigError::OutOfRange {
                    parameter: name,
                    value: ratio.to_string(),
                });
            }
        }

        if self.geometry.jitter_divisor == 0 {
            return Err(ConfigError::OutOfRange {
                parameter: "geometry.jitter_divisor",
                value: "0".to_string(),
            });
        }

        if self.timing.fallback_fps == 0 {
            return Err(ConfigError::OutOfRange {
                parameter: "timing.fallback_fps",
                value: "0".to_string(),
            });
        }

        if self.timing.filter_interval == 0 {
            return Err(ConfigError::OutOfRange {
                parameter: "timing.filter_interval",
                value: "0".to_string(),
            });
        }

        if !(self.timing.warm_up_seconds >= 0.0 && self.timing.warm_up_seconds.is_finite()) {
            return Err(ConfigError::OutOfRange {
                parameter: "timing.warm_up_seconds",
                value: self.timing.warm_up_seconds.to_string(),
            });
        }

        Ok(())
    }
}
