use image::{GrayImage, RgbImage};
use imageproc::contours::find_contours;
use imageproc::contrast::{otsu_level, threshold, ThresholdType};
use imageproc::point::Point;
use imageproc::rect::Rect;

/// Bounding box of one traced contour, with the area enclosed by the contour
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub rect: Rect,
    pub area: f64,
}

/// Turns a frame into candidate regions ranked by descending area.
///
/// The largest candidate is usually the frame border itself; consumers
/// search by rank with a predicate instead of indexing into the list.
pub trait RegionExtractor {
    fn extract(&self, frame: &RgbImage) -> Vec<Candidate>;
}

/// Grayscale, Otsu threshold, then Suzuki-Abe border following
#[derive(Debug, Clone, Copy, Default)]
pub struct OtsuContourExtractor;

impl OtsuContourExtractor {
    pub fn binarize(frame: &RgbImage) -> GrayImage {
        let gray = image::imageops::grayscale(frame);
        let level = otsu_level(&gray);
        tracing::trace!("Otsu level {}", level);
        threshold(&gray, level, ThresholdType::Binary)
    }
}

impl RegionExtractor for OtsuContourExtractor {
    fn extract(&self, frame: &RgbImage) -> Vec<Candidate> {
        let _span = tracing::debug_span!("extract_regions").entered();

        let binary = Self::binarize(frame);
        let mut candidates: Vec<Candidate> = find_contours::<u32>(&binary)
            .iter()
            .filter_map(|contour| {
                let rect = bounding_rect(&contour.points)?;
                Some(Candidate {
                    rect,
                    area: enclosed_area(&contour.points),
                })
            })
            .collect();

        rank_by_area(&mut candidates);
        tracing::debug!("Extracted {} candidate regions", candidates.len());
        candidates
    }
}

/// Stable sort, largest area first
pub fn rank_by_area(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| b.area.total_cmp(&a.area));
}

/// Smallest axis-aligned rectangle containing every point (inclusive)
fn bounding_rect(points: &[Point<u32>]) -> Option<Rect> {
    let first = points.first()?;
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);

    for p in &points[1..] {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }

    let left = i32::try_from(min_x).ok()?;
    let top = i32::try_from(min_y).ok()?;
    Some(Rect::at(left, top).of_size(max_x - min_x + 1, max_y - min_y + 1))
}

/// Shoelace area of the closed polygon through `points`
fn enclosed_area(points: &[Point<u32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }

    let twice_area: f64 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| a.x as f64 * b.y as f64 - b.x as f64 * a.y as f64)
        .sum();

    twice_area.abs() / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{frame_with_rect, BACKGROUND, DOSIMETER};
    use image::Rgb;

    #[test]
    fn finds_filled_rectangle_bounds() {
        let frame = frame_with_rect(200, 150, Rect::at(40, 30).of_size(60, 50), DOSIMETER);
        let candidates = OtsuContourExtractor.extract(&frame);

        assert!(!candidates.is_empty());
        assert_eq!(candidates[0].rect, Rect::at(40, 30).of_size(60, 50));
    }

    #[test]
    fn ranks_by_descending_area() {
        let mut frame = frame_with_rect(300, 200, Rect::at(10, 10).of_size(40, 40), DOSIMETER);
        for y in 100..180 {
            for x in 150..280 {
                frame.put_pixel(x, y, Rgb(DOSIMETER));
            }
        }

        let candidates = OtsuContourExtractor.extract(&frame);
        assert!(candidates.len() >= 2);
        assert_eq!(candidates[0].rect, Rect::at(150, 100).of_size(130, 80));
        assert_eq!(candidates[1].rect, Rect::at(10, 10).of_size(40, 40));
        assert!(candidates.windows(2).all(|w| w[0].area >= w[1].area));
    }

    #[test]
    fn nested_regions_are_all_reported() {
        // bright ring with a dark hole and a bright core
        let mut frame = frame_with_rect(200, 200, Rect::at(20, 20).of_size(160, 160), DOSIMETER);
        for y in 60..140 {
            for x in 60..140 {
                frame.put_pixel(x, y, Rgb(BACKGROUND));
            }
        }
        for y in 90..110 {
            for x in 90..110 {
                frame.put_pixel(x, y, Rgb(DOSIMETER));
            }
        }

        let rects: Vec<Rect> = OtsuContourExtractor
            .extract(&frame)
            .iter()
            .map(|c| c.rect)
            .collect();

        assert_eq!(rects[0], Rect::at(20, 20).of_size(160, 160));
        assert!(rects.contains(&Rect::at(90, 90).of_size(20, 20)));
    }

    #[test]
    fn uniform_frame_yields_no_dosimeter_sized_region() {
        let frame = RgbImage::from_pixel(120, 90, Rgb(BACKGROUND));
        let candidates = OtsuContourExtractor.extract(&frame);

        assert!(candidates
            .iter()
            .all(|c| c.rect == Rect::at(0, 0).of_size(120, 90)));
    }

    #[test]
    fn shoelace_area_of_square_outline() {
        let square = [
            Point::new(0u32, 0),
            Point::new(10, 0),
            Point::new(10, 10),
            Point::new(0, 10),
        ];
        assert_eq!(enclosed_area(&square), 100.0);
        assert_eq!(enclosed_area(&square[..2]), 0.0);
    }

    #[test]
    fn rank_keeps_ties_in_order() {
        let tile = |x: i32, area: f64| Candidate {
            rect: Rect::at(x, x).of_size(1, 1),
            area,
        };
        let (a, b, c) = (tile(0, 5.0), tile(1, 5.0), tile(2, 9.0));
        let mut ranked = vec![a, b, c];

        rank_by_area(&mut ranked);
        assert_eq!(ranked, vec![c, a, b]);
    }
}
