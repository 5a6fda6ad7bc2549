use image::{GrayImage, Luma};

use crate::landmarks::Point;

/// Segments used to flatten each cubic Bézier curve.
const BEZIER_STEPS: usize = 16;

/// A closed polygon built from line and cubic Bézier segments.
///
/// Curves are flattened as they are added, so the path is always a plain
/// vertex list. The closing edge from the last vertex back to the first is
/// implicit.
#[derive(Debug, Clone, Default)]
pub(crate) struct Path {
    vertices: Vec<Point>,
}

impl Path {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub(crate) fn line_to(&mut self, p: Point) {
        self.vertices.push(p);
    }

    pub(crate) fn extend<'a>(&mut self, points: impl IntoIterator<Item = &'a Point>) {
        self.vertices.extend(points.into_iter().copied());
    }

    /// Append a cubic Bézier from the current end point. On an empty path
    /// `c1` acts as the start point.
    pub(crate) fn cubic_to(&mut self, c1: Point, c2: Point, end: Point) {
        let start = match self.vertices.last() {
            Some(p) => *p,
            None => {
                self.vertices.push(c1);
                c1
            }
        };
        for step in 1..=BEZIER_STEPS {
            let t = step as f32 / BEZIER_STEPS as f32;
            let u = 1.0 - t;
            let a = u * u * u;
            let b = 3.0 * u * u * t;
            let c = 3.0 * u * t * t;
            let d = t * t * t;
            self.vertices.push(Point::new(
                a * start.x + b * c1.x + c * c2.x + d * end.x,
                a * start.y + b * c1.y + c * c2.y + d * end.y,
            ));
        }
    }

    #[cfg(test)]
    pub(crate) fn vertices(&self) -> &[Point] {
        &self.vertices
    }

    /// Nonzero winding number of `p` with respect to the closed path.
    fn winding_number(&self, p: Point) -> i32 {
        let n = self.vertices.len();
        let mut winding = 0;
        for i in 0..n {
            let a = self.vertices[i];
            let b = self.vertices[(i + 1) % n];
            if a.y <= p.y {
                if b.y > p.y && cross(a, b, p) > 0.0 {
                    winding += 1;
                }
            } else if b.y <= p.y && cross(a, b, p) < 0.0 {
                winding -= 1;
            }
        }
        winding
    }

    /// Whether `p` is inside the path under the nonzero fill rule.
    pub(crate) fn contains(&self, p: Point) -> bool {
        self.vertices.len() >= 3 && self.winding_number(p) != 0
    }

    /// Rasterize the path into a `width` × `height` coverage mask.
    ///
    /// A pixel is filled (255) when its center lies inside the path after
    /// shifting the path by `(-origin_x, -origin_y)`.
    pub(crate) fn rasterize(&self, width: u32, height: u32, origin: Point) -> GrayImage {
        let mut mask = GrayImage::new(width, height);
        if self.vertices.len() < 3 {
            return mask;
        }

        let (mut min_y, mut max_y) = (f32::INFINITY, f32::NEG_INFINITY);
        for v in &self.vertices {
            min_y = min_y.min(v.y - origin.y);
            max_y = max_y.max(v.y - origin.y);
        }
        let row_start = min_y.floor().max(0.0) as u32;
        let row_end = (max_y.ceil().max(0.0) as u32).min(height);

        for y in row_start..row_end {
            for x in 0..width {
                let center = Point::new(x as f32 + 0.5 + origin.x, y as f32 + 0.5 + origin.y);
                if self.contains(center) {
                    mask.put_pixel(x, y, Luma([255]));
                }
            }
        }
        mask
    }
}

/// Z component of `(b - a) × (p - a)`; positive when `p` is left of `a→b`.
fn cross(a: Point, b: Point, p: Point) -> f32 {
    (b.x - a.x) * (p.y - a.y) - (p.x - a.x) * (b.y - a.y)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(size: f32) -> Path {
        let mut path = Path::new();
        path.line_to(Point::new(0.0, 0.0));
        path.line_to(Point::new(size, 0.0));
        path.line_to(Point::new(size, size));
        path.line_to(Point::new(0.0, size));
        path
    }

    #[test]
    fn square_contains_interior_only() {
        let path = square(10.0);
        assert!(path.contains(Point::new(5.0, 5.0)));
        assert!(!path.contains(Point::new(15.0, 5.0)));
        assert!(!path.contains(Point::new(5.0, -1.0)));
    }

    #[test]
    fn winding_is_orientation_independent() {
        let mut reversed = Path::new();
        reversed.extend(square(10.0).vertices().iter().rev());
        assert!(reversed.contains(Point::new(5.0, 5.0)));
    }

    #[test]
    fn overlapping_loops_stay_filled_under_nonzero() {
        // Same square traced twice: even-odd would leave it empty.
        let mut path = square(10.0);
        path.extend(square(10.0).vertices());
        assert!(path.contains(Point::new(5.0, 5.0)));
    }

    #[test]
    fn rasterize_square_fills_expected_pixels() {
        let mask = square(4.0).rasterize(8, 8, Point::default());
        let filled = mask.pixels().filter(|p| p.0[0] == 255).count();
        assert_eq!(filled, 16);
        assert_eq!(mask.get_pixel(0, 0).0[0], 255);
        assert_eq!(mask.get_pixel(4, 0).0[0], 0);
    }

    #[test]
    fn rasterize_respects_origin() {
        let mask = square(4.0).rasterize(4, 4, Point::new(2.0, 2.0));
        assert_eq!(mask.get_pixel(0, 0).0[0], 255);
        assert_eq!(mask.get_pixel(3, 3).0[0], 0);
    }

    #[test]
    fn cubic_ends_on_target() {
        let mut path = Path::new();
        path.line_to(Point::new(0.0, 0.0));
        path.cubic_to(Point::new(0.0, 10.0), Point::new(10.0, 10.0), Point::new(10.0, 0.0));
        assert_eq!(path.vertices().len(), 1 + BEZIER_STEPS);
        let last = path.vertices().last().unwrap();
        assert!((last.x - 10.0).abs() < 1e-4);
        assert!(last.y.abs() < 1e-4);
    }

    #[test]
    fn degenerate_path_is_empty() {
        let mut path = Path::new();
        path.line_to(Point::new(1.0, 1.0));
        path.line_to(Point::new(2.0, 2.0));
        assert!(!path.contains(Point::new(1.5, 1.5)));
        let mask = path.rasterize(4, 4, Point::default());
        assert!(mask.pixels().all(|p| p.0[0] == 0));
    }
}
