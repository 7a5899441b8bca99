mod calibration;
mod classifier;
mod contours;
mod geometry;
mod region;
mod sampler;

pub use calibration::{Calibration, CalibrationState, Calibrator};
pub use classifier::{ColorTest, SizeWindow};
pub use contours::{OtsuContourExtractor, RegionExtractor};
pub use geometry::SampleLayout;
pub use region::Crop;
pub use sampler::FrameSampler;

use crate::config::DosimeterConfig;

/// Color test configured from `config`
pub fn color_test(config: &DosimeterConfig) -> ColorTest {
    ColorTest::new(config.bands, config.probe)
}
