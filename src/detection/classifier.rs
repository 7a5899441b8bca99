use super::contours::Candidate;
use super::region::{Crop, Point};
use crate::config::{ColorBands, ProbeConfig};
use image::RgbImage;
use std::fmt;

/// Center plus one probe per quadrant
pub const PROBE_COUNT: usize = 5;

/// Inclusive bounds on both sides of a region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeWindow {
    pub min: u32,
    pub max: u32,
}

impl SizeWindow {
    pub const fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }

    /// `[min(w, h) - tolerance, max(w, h) + tolerance]`
    pub fn around(width: u32, height: u32, tolerance: u32) -> Self {
        Self {
            min: width.min(height).saturating_sub(tolerance),
            max: width.max(height).saturating_add(tolerance),
        }
    }

    pub fn contains(&self, width: u32, height: u32) -> bool {
        (self.min..=self.max).contains(&width) && (self.min..=self.max).contains(&height)
    }
}

impl fmt::Display for SizeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.min, self.max)
    }
}

/// Majority vote over five probes against per-channel color bands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorTest {
    bands: ColorBands,
    probe: ProbeConfig,
}

impl ColorTest {
    pub fn new(bands: ColorBands, probe: ProbeConfig) -> Self {
        Self { bands, probe }
    }

    /// Probe coordinates for a region of the given size.
    ///
    /// A probe whose offset underflows the region origin is `None`.
    pub fn probe_points(&self, width: u32, height: u32) -> [Option<Point>; PROBE_COUNT] {
        let (cx, cy) = (width / 2, height / 2);
        let (dx, dy) = (self.probe.offset_x, self.probe.offset_y);

        let right = cx.checked_add(dx);
        let left = cx.checked_sub(dx);
        let below = cy.checked_add(dy);
        let above = cy.checked_sub(dy);

        [
            Some((cx, cy)),
            right.zip(below),
            right.zip(above),
            left.zip(below),
            left.zip(above),
        ]
    }

    /// Number of probes inside all three bands.
    ///
    /// `None` if any probe falls outside the crop.
    pub fn matching_samples(&self, crop: &Crop<'_>) -> Option<usize> {
        let mut matches = 0;
        for point in self.probe_points(crop.width(), crop.height()) {
            let (x, y) = point?;
            let rgb = crop.pixel(x, y)?;
            if self.bands.contains(rgb) {
                matches += 1;
            }
        }
        Some(matches)
    }

    pub fn accepts(&self, crop: &Crop<'_>) -> bool {
        self.matching_samples(crop)
            .is_some_and(|matches| matches > PROBE_COUNT / 2)
    }
}

/// Size and color tests combined; both must pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionClassifier {
    window: SizeWindow,
    color: ColorTest,
}

impl RegionClassifier {
    pub fn new(window: SizeWindow, color: ColorTest) -> Self {
        Self { window, color }
    }

    pub fn accepts(&self, crop: &Crop<'_>) -> bool {
        self.window.contains(crop.width(), crop.height()) && self.color.accepts(crop)
    }

    /// First ranked candidate that passes both tests
    pub fn locate<'f>(&self, frame: &'f RgbImage, ranked: &[Candidate]) -> Option<Crop<'f>> {
        let crops = ranked
            .iter()
            .filter_map(|candidate| Crop::new(frame, candidate.rect));

        first_match(crops, |crop| self.accepts(crop))
    }
}

/// Short-circuiting search over a ranked sequence
pub fn first_match<T, I, P>(ranked: I, mut predicate: P) -> Option<T>
where
    I: IntoIterator<Item = T>,
    P: FnMut(&T) -> bool,
{
    ranked.into_iter().find(|item| predicate(item))
}
