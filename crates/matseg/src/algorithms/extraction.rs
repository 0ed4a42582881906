use geo::Area;
use geo_types::{Coord, LineString, Polygon};
use image::GrayImage;
use imageproc::contours::BorderType;
use crate::{error::Result, traits::ContourExtractor};

/// Imageproc-based extractor returning only top-level outer borders.
///
/// Borders of holes, and of regions nested inside holes, are skipped.
#[derive(Debug, Clone, Default)]
pub struct ImageprocContourExtractor;

impl ContourExtractor for ImageprocContourExtractor {
    fn extract_contours(&self, binary_image: &GrayImage) -> Result<Vec<Vec<[u32; 2]>>> {
        // Border following needs a zero frame; without it regions touching the
        // left edge come back as parentless hole borders.
        let mut padded = GrayImage::new(binary_image.width() + 2, binary_image.height() + 2);
        image::imageops::replace(&mut padded, binary_image, 1, 1);
        let contours = imageproc::contours::find_contours::<u32>(&padded);

        let result = contours
            .into_iter()
            .filter(|contour| matches!(contour.border_type, BorderType::Outer) && contour.parent.is_none())
            .map(|contour| {
                contour
                    .points
                    .iter()
                    .map(|p| [p.x.saturating_sub(1), p.y.saturating_sub(1)])
                    .collect()
            })
            .collect();

        Ok(result)
    }
}

/// Keep only the vertices where the walking direction changes.
pub fn compress_chain(points: &[[u32; 2]]) -> Vec<[u32; 2]> {
    let mut points = points.to_vec();
    points.dedup();
    while points.len() > 1 && points.first() == points.last() {
        points.pop();
    }
    let n = points.len();
    if n < 3 {
        return points;
    }
    let step = |a: [u32; 2], b: [u32; 2]| {
        (
            (b[0] as i64 - a[0] as i64).signum(),
            (b[1] as i64 - a[1] as i64).signum(),
        )
    };
    let kept: Vec<[u32; 2]> = (0..n)
        .filter(|&i| {
            let prev = points[(i + n - 1) % n];
            let next = points[(i + 1) % n];
            step(prev, points[i]) != step(points[i], next)
        })
        .map(|i| points[i])
        .collect();
    if kept.is_empty() { points } else { kept }
}

/// Number of pixels enclosed by a closed lattice contour, boundary included.
///
/// Uses Pick's theorem: `interior + boundary = area + boundary / 2 + 1`.
pub fn enclosed_pixel_count(points: &[[u32; 2]]) -> f64 {
    if points.is_empty() {
        return 0.0;
    }
    let boundary: u64 = (0..points.len())
        .map(|i| {
            let a = points[i];
            let b = points[(i + 1) % points.len()];
            gcd(a[0].abs_diff(b[0]) as u64, a[1].abs_diff(b[1]) as u64)
        })
        .sum();
    shoelace_area(points) + boundary as f64 / 2.0 + 1.0
}

/// Unsigned polygon area through the vertex coordinates
pub fn shoelace_area(points: &[[u32; 2]]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let coords: Vec<Coord<f64>> = points
        .iter()
        .map(|&[x, y]| Coord { x: x as f64, y: y as f64 })
        .collect();
    Polygon::new(LineString::new(coords), vec![]).unsigned_area()
}

/// `[x, y, width, height]` covering every pixel of the contour
pub fn bounding_box(points: &[[u32; 2]]) -> [u32; 4] {
    let Some(&[first_x, first_y]) = points.first() else {
        return [0, 0, 0, 0];
    };
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (first_x, first_y, first_x, first_y);
    for &[x, y] in points {
        min_x = min_x.min(x);
        min_y = min_y.min(y);
        max_x = max_x.max(x);
        max_y = max_y.max(y);
    }
    [min_x, min_y, max_x - min_x + 1, max_y - min_y + 1]
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}
