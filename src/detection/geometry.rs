use super::region::Point;
use crate::config::GeometryConfig;
use crate::error::GeometryError;

/// Points per side of the baseline ring
const BASELINE_STEPS: u32 = 4;

/// Testing points on the inner disc and baseline points on the lower
/// outer ring, in the local coordinates of the calibrated region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleLayout {
    tolerance: u32,
    testing: Vec<Point>,
    baseline: Vec<Point>,
}

impl SampleLayout {
    pub fn derive(
        width: u32,
        height: u32,
        config: &GeometryConfig,
    ) -> Result<Self, GeometryError> {
        if width == 0 || height == 0 || config.jitter_divisor == 0 {
            return Err(GeometryError::ZeroDimension { width, height });
        }

        let span = u64::from(width) + u64::from(height);
        let tolerance = (span / u64::from(config.jitter_divisor)) as u32;
        let (cx, cy) = (width / 2, height / 2);
        let clamp_x = |x: u64| x.min(u64::from(width - 1)) as u32;
        let clamp_y = |y: u64| y.min(u64::from(height - 1)) as u32;

        let inner_radius = (config.inner_ratio * span as f64 / 4.0).floor() as u64;
        let reach = inner_radius.saturating_sub(u64::from(tolerance));
        let (cx64, cy64) = (u64::from(cx), u64::from(cy));

        let testing = vec![
            (cx, clamp_y(cy64.saturating_sub(reach))),
            (clamp_x(cx64 + reach), cy),
            (cx, clamp_y(cy64 + reach)),
            (clamp_x(cx64.saturating_sub(reach)), cy),
        ];

        let band = (config.outer_ratio * span as f64 / 8.0).floor() as u64;
        let step = u64::from(tolerance);
        let right_edge = u64::from(width - 1);

        let left: Vec<Point> = (0..u64::from(BASELINE_STEPS))
            .map(|k| {
                let x = band + k * step;
                let y = cy64 + (k + 1) * step;
                (clamp_x(x), clamp_y(y))
            })
            .collect();
        let right = (0..u64::from(BASELINE_STEPS)).rev().map(|k| {
            let x = right_edge.saturating_sub(band + k * step);
            let y = cy64 + (k + 1) * step;
            (clamp_x(x), clamp_y(y))
        });
        let baseline = left.into_iter().chain(right).collect();

        Ok(Self {
            tolerance,
            testing,
            baseline,
        })
    }

    /// Jitter margin `(width + height) / jitter_divisor`
    pub fn tolerance(&self) -> u32 {
        self.tolerance
    }

    pub fn testing(&self) -> &[Point] {
        &self.testing
    }

    pub fn baseline(&self) -> &[Point] {
        &self.baseline
    }
}
