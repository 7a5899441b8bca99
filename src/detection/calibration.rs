use super::classifier::{ColorTest, RegionClassifier, SizeWindow};
use super::contours::RegionExtractor;
use crate::config::SizeConfig;
use crate::error::CalibrationError;
use image::RgbImage;
use imageproc::rect::Rect;
use std::sync::OnceLock;

/// Dosimeter dimensions measured on the representative frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Calibration {
    /// Region accepted in the calibration frame
    pub region: Rect,

    /// Size window applied to every later frame
    pub window: SizeWindow,
}

impl Calibration {
    pub fn from_region(region: Rect, tolerance: u32) -> Self {
        Self {
            region,
            window: SizeWindow::around(region.width(), region.height(), tolerance),
        }
    }

    pub fn width(&self) -> u32 {
        self.region.width()
    }

    pub fn height(&self) -> u32 {
        self.region.height()
    }
}

/// Write-once holder for the calibration.
///
/// Starts empty, is set by the first successful calibration and is
/// read-only afterwards. Later attempts to set it are ignored.
#[derive(Debug, Default)]
pub struct CalibrationState {
    inner: OnceLock<Calibration>,
}

impl CalibrationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<&Calibration> {
        self.inner.get()
    }

    pub fn is_set(&self) -> bool {
        self.inner.get().is_some()
    }

    /// Store `calibration` unless one is already stored; returns the stored value
    pub fn set_once(&self, calibration: Calibration) -> &Calibration {
        if self.is_set() {
            tracing::debug!("Calibration already set, ignoring {:?}", calibration.region);
        }
        self.inner.get_or_init(|| calibration)
    }

    /// Calibrated window, or `default` before calibration
    pub fn size_window(&self, default: SizeWindow) -> SizeWindow {
        self.get().map_or(default, |c| c.window)
    }
}

/// Finds the dosimeter on one representative frame using the wide default
/// size window and records its dimensions.
pub struct Calibrator<'a, E: ?Sized> {
    extractor: &'a E,
    color: ColorTest,
    size: SizeConfig,
}

impl<'a, E: RegionExtractor + ?Sized> Calibrator<'a, E> {
    pub fn new(extractor: &'a E, color: ColorTest, size: SizeConfig) -> Self {
        Self {
            extractor,
            color,
            size,
        }
    }

    pub fn default_window(&self) -> SizeWindow {
        SizeWindow::new(self.size.default_min, self.size.default_max)
    }

    /// Calibrate from `frame`; a no-op returning the stored value once `state` is set
    pub fn calibrate(
        &self,
        frame: &RgbImage,
        state: &CalibrationState,
    ) -> Result<Calibration, CalibrationError> {
        if let Some(existing) = state.get() {
            tracing::debug!("Calibration already established, skipping");
            return Ok(*existing);
        }

        let window = state.size_window(self.default_window());
        let classifier = RegionClassifier::new(window, self.color);
        let candidates = self.extractor.extract(frame);

        let Some(crop) = classifier.locate(frame, &candidates) else {
            return Err(CalibrationError::NotFound {
                candidates: candidates.len(),
                window,
            });
        };

        let stored = state.set_once(Calibration::from_region(crop.rect(), self.size.tolerance));
        tracing::info!(
            "Calibrated dosimeter at ({}, {}) size {}x{}, window {}",
            stored.region.left(),
            stored.region.top(),
            stored.width(),
            stored.height(),
            stored.window
        );

        Ok(*stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ColorBands, ProbeConfig};
    use crate::detection::OtsuContourExtractor;
    use crate::test_utils::{frame_with_rect, BACKGROUND, DOSIMETER};
    use image::Rgb;

    fn calibrator(extractor: &OtsuContourExtractor) -> Calibrator<'_, OtsuContourExtractor> {
        Calibrator::new(
            extractor,
            ColorTest::new(ColorBands::default(), ProbeConfig::default()),
            SizeConfig::default(),
        )
    }

    #[test]
    fn calibrates_to_tolerant_window() {
        let frame = frame_with_rect(640, 480, Rect::at(100, 60).of_size(320, 330), DOSIMETER);
        let state = CalibrationState::new();

        let calibration = calibrator(&OtsuContourExtractor).calibrate(&frame, &state).unwrap();

        assert_eq!((calibration.width(), calibration.height()), (320, 330));
        assert_eq!(calibration.window, SizeWindow::new(305, 345));
        assert_eq!(state.get(), Some(&calibration));
    }

    #[test]
    fn second_calibration_is_a_no_op() {
        let state = CalibrationState::new();
        let extractor = OtsuContourExtractor;
        let calibrator = calibrator(&extractor);

        let first = frame_with_rect(640, 480, Rect::at(100, 60).of_size(320, 330), DOSIMETER);
        let calibration = calibrator.calibrate(&first, &state).unwrap();

        let larger = frame_with_rect(640, 480, Rect::at(50, 50).of_size(345, 345), DOSIMETER);
        assert_eq!(calibrator.calibrate(&larger, &state).unwrap(), calibration);

        let empty = RgbImage::from_pixel(640, 480, Rgb(BACKGROUND));
        assert_eq!(calibrator.calibrate(&empty, &state).unwrap(), calibration);
        assert_eq!(state.get(), Some(&calibration));
    }

    #[test]
    fn set_once_keeps_first_value() {
        let state = CalibrationState::new();
        let first = Calibration::from_region(Rect::at(0, 0).of_size(320, 330), 15);
        let second = Calibration::from_region(Rect::at(5, 5).of_size(300, 300), 15);

        assert_eq!(*state.set_once(first), first);
        assert_eq!(*state.set_once(second), first);
    }

    #[test]
    fn window_falls_back_to_default_before_calibration() {
        let state = CalibrationState::new();
        let default = SizeWindow::new(300, 350);
        assert_eq!(state.size_window(default), default);

        state.set_once(Calibration::from_region(Rect::at(0, 0).of_size(320, 330), 15));
        assert_eq!(state.size_window(default), SizeWindow::new(305, 345));
    }

    #[test]
    fn fails_without_matching_region() {
        let frame = frame_with_rect(640, 480, Rect::at(100, 60).of_size(200, 200), DOSIMETER);
        let state = CalibrationState::new();

        let err = calibrator(&OtsuContourExtractor).calibrate(&frame, &state).unwrap_err();

        assert!(matches!(
            err,
            CalibrationError::NotFound { window, .. } if window == SizeWindow::new(300, 350)
        ));
        assert!(!state.is_set());
    }
}
