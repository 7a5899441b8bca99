use super::calibration::Calibration;
use super::classifier::{ColorTest, RegionClassifier};
use super::contours::RegionExtractor;
use super::geometry::SampleLayout;
use super::region::Crop;
use crate::error::FrameFailure;
use image::RgbImage;

/// Averaged testing-point color of one located dosimeter
#[derive(Debug, Clone, Copy)]
pub struct SampledFrame<'f> {
    pub rgb: [u8; 3],
    pub crop: Crop<'f>,
    /// Testing points that fell outside this frame's crop
    pub skipped_points: usize,
}

/// Locates the dosimeter with the calibrated size window and averages the
/// testing points over the crop.
///
/// Holds only immutable state, so one sampler can serve any number of frames.
pub struct FrameSampler<'a, E: ?Sized> {
    extractor: &'a E,
    classifier: RegionClassifier,
    layout: &'a SampleLayout,
}

impl<'a, E: RegionExtractor + ?Sized> FrameSampler<'a, E> {
    pub fn new(
        extractor: &'a E,
        calibration: &Calibration,
        color: ColorTest,
        layout: &'a SampleLayout,
    ) -> Self {
        Self {
            extractor,
            classifier: RegionClassifier::new(calibration.window, color),
            layout,
        }
    }

    pub fn sample<'f>(&self, frame: &'f RgbImage) -> Result<SampledFrame<'f>, FrameFailure> {
        let _span = tracing::debug_span!("sample_frame").entered();

        let candidates = self.extractor.extract(frame);
        let crop = self
            .classifier
            .locate(frame, &candidates)
            .ok_or(FrameFailure::NotLocalized {
                candidates: candidates.len(),
            })?;

        let (mean, skipped_points) = crop.mean_at(self.layout.testing());
        if skipped_points > 0 {
            tracing::debug!(
                "{} testing points outside {}x{} crop",
                skipped_points,
                crop.width(),
                crop.height()
            );
        }

        let rgb = mean.ok_or(FrameFailure::NoSamplesInBounds {
            width: crop.width(),
            height: crop.height(),
        })?;

        Ok(SampledFrame {
            rgb,
            crop,
            skipped_points,
        })
    }
}
