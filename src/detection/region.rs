use image::RgbImage;
use imageproc::rect::Rect;

/// Sample coordinate in the local space of a region
pub type Point = (u32, u32);

/// Read-only view of a rectangular region of a frame.
///
/// All pixel access goes through [`Crop::pixel`], which returns `None`
/// instead of panicking when a coordinate falls outside the region.
#[derive(Debug, Clone, Copy)]
pub struct Crop<'a> {
    frame: &'a RgbImage,
    rect: Rect,
}

impl<'a> Crop<'a> {
    /// Returns `None` if `rect` does not lie entirely inside `frame`
    pub fn new(frame: &'a RgbImage, rect: Rect) -> Option<Self> {
        let (frame_width, frame_height) = frame.dimensions();
        let left = u32::try_from(rect.left()).ok()?;
        let top = u32::try_from(rect.top()).ok()?;

        if left.checked_add(rect.width())? > frame_width
            || top.checked_add(rect.height())? > frame_height
        {
            return None;
        }

        Some(Self { frame, rect })
    }

    pub fn rect(&self) -> Rect {
        self.rect
    }

    pub fn width(&self) -> u32 {
        self.rect.width()
    }

    pub fn height(&self) -> u32 {
        self.rect.height()
    }

    /// Pixel at local `(x, y)`, or `None` outside the region
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width() || y >= self.height() {
            return None;
        }

        // left/top were checked non-negative in `new`
        let frame_x = self.rect.left() as u32 + x;
        let frame_y = self.rect.top() as u32 + y;

        self.frame.get_pixel_checked(frame_x, frame_y).map(|p| p.0)
    }

    /// Average the color at `points`, re-anchored to this crop's origin.
    ///
    /// Points outside the crop are skipped and counted in the second value.
    pub fn mean_at(&self, points: &[Point]) -> (Option<[u8; 3]>, usize) {
        let mut skipped = 0;
        let samples: Vec<[u8; 3]> = points
            .iter()
            .filter_map(|&(x, y)| {
                let pixel = self.pixel(x, y);
                if pixel.is_none() {
                    skipped += 1;
                }
                pixel
            })
            .collect();

        (mean_color(&samples), skipped)
    }

    /// Copy the region out of the frame
    pub fn to_image(&self) -> RgbImage {
        image::imageops::crop_imm(
            self.frame,
            self.rect.left() as u32,
            self.rect.top() as u32,
            self.width(),
            self.height(),
        )
        .to_image()
    }
}

/// Per-channel arithmetic mean, rounded to the nearest integer with ties to even
pub fn mean_color(samples: &[[u8; 3]]) -> Option<[u8; 3]> {
    if samples.is_empty() {
        return None;
    }

    let mut sums = [0u64; 3];
    for sample in samples {
        for (sum, &value) in sums.iter_mut().zip(sample) {
            *sum += u64::from(value);
        }
    }

    let n = samples.len() as f64;
    Some(sums.map(|sum| (sum as f64 / n).round_ties_even() as u8))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn gradient(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| Rgb([x as u8, y as u8, 7]))
    }

    #[test]
    fn crop_reads_relative_to_origin() {
        let frame = gradient(50, 40);
        let crop = Crop::new(&frame, Rect::at(10, 5).of_size(20, 20)).unwrap();

        assert_eq!(crop.pixel(0, 0), Some([10, 5, 7]));
        assert_eq!(crop.pixel(19, 19), Some([29, 24, 7]));
    }

    #[test]
    fn crop_rejects_out_of_range_access() {
        let frame = gradient(50, 40);
        let crop = Crop::new(&frame, Rect::at(10, 5).of_size(20, 20)).unwrap();

        assert_eq!(crop.pixel(20, 0), None);
        assert_eq!(crop.pixel(0, 20), None);
        assert_eq!(crop.pixel(u32::MAX, u32::MAX), None);
    }

    #[test]
    fn crop_must_fit_inside_frame() {
        let frame = gradient(50, 40);

        assert!(Crop::new(&frame, Rect::at(-1, 0).of_size(10, 10)).is_none());
        assert!(Crop::new(&frame, Rect::at(45, 0).of_size(10, 10)).is_none());
        assert!(Crop::new(&frame, Rect::at(0, 0).of_size(50, 40)).is_some());
    }

    #[test]
    fn mean_rounds_to_nearest() {
        assert_eq!(mean_color(&[[0, 0, 0], [1, 2, 3]]), Some([0, 1, 2]));
        assert_eq!(mean_color(&[[10, 20, 30], [10, 20, 30], [11, 20, 30]]), Some([10, 20, 30]));
        assert_eq!(mean_color(&[]), None);
    }

    #[test]
    fn mean_rounds_halves_to_even() {
        let samples = [[120, 121, 0]; 2].into_iter().chain([[121, 122, 1]; 2]);
        let samples: Vec<[u8; 3]> = samples.collect();

        // 120.5 -> 120, 121.5 -> 122, 0.5 -> 0
        assert_eq!(mean_color(&samples), Some([120, 122, 0]));
    }

    #[test]
    fn mean_at_skips_points_outside_crop() {
        let frame = RgbImage::from_pixel(30, 30, Rgb([100, 150, 200]));
        let crop = Crop::new(&frame, Rect::at(0, 0).of_size(10, 10)).unwrap();

        let (mean, skipped) = crop.mean_at(&[(1, 1), (5, 5), (12, 3)]);
        assert_eq!(mean, Some([100, 150, 200]));
        assert_eq!(skipped, 1);
    }

    #[test]
    fn to_image_copies_region() {
        let frame = gradient(50, 40);
        let crop = Crop::new(&frame, Rect::at(3, 4).of_size(5, 6)).unwrap();
        let copy = crop.to_image();

        assert_eq!(copy.dimensions(), (5, 6));
        assert_eq!(copy.get_pixel(0, 0).0, [3, 4, 7]);
    }
}
