use std::ops::Range;

use crate::error::{FaceSwapError, Result};

/// Number of points in a 68-point facial landmark set.
pub const LANDMARK_COUNT: usize = 68;

const JAW: Range<usize> = 0..17;
const LEFT_EYEBROW: Range<usize> = 17..22;
const RIGHT_EYEBROW: Range<usize> = 22..27;
const NOSE: Range<usize> = 27..36;
const LEFT_EYE: Range<usize> = 36..42;
const RIGHT_EYE: Range<usize> = 42..48;
const MOUTH: Range<usize> = 48..68;

/// A 2D point in image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    /// Horizontal coordinate (pixels).
    pub x: f32,
    /// Vertical coordinate (pixels).
    pub y: f32,
}

impl Point {
    /// Create a point from its coordinates.
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    pub fn distance(&self, other: &Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Axis-aligned bounding box of a detected face.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FaceBox {
    /// X coordinate of the top-left corner (pixels).
    pub x: f32,
    /// Y coordinate of the top-left corner (pixels).
    pub y: f32,
    /// Width of the box (pixels).
    pub width: f32,
    /// Height of the box (pixels).
    pub height: f32,
}

impl FaceBox {
    /// Create a box from its top-left corner and size.
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Center point of the box.
    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Smallest box containing every point, or `None` for an empty iterator.
    pub fn enclosing<'a>(points: impl IntoIterator<Item = &'a Point>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for p in iter {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Some(Self::new(min_x, min_y, max_x - min_x, max_y - min_y))
    }
}

/// The 68 ordered landmark points of one face (iBUG 300-W layout).
///
/// Group accessors return slices in detector order, so contours such as the
/// jaw outline can be walked start-to-end. Left and right follow the
/// face-api.js naming: "left" is the lower index range, on the image's left.
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkSet {
    points: Vec<Point>,
}

impl LandmarkSet {
    /// Build a landmark set, rejecting anything other than 68 points.
    pub fn new(points: Vec<Point>) -> Result<Self> {
        if points.len() != LANDMARK_COUNT {
            return Err(FaceSwapError::InvalidLandmarks(points.len()));
        }
        Ok(Self { points })
    }

    /// All 68 points in order.
    pub fn positions(&self) -> &[Point] {
        &self.points
    }

    /// Jaw outline, 17 points from one ear to the other.
    pub fn jaw_outline(&self) -> &[Point] {
        &self.points[JAW]
    }

    /// Left eyebrow, points 17..22.
    pub fn left_eyebrow(&self) -> &[Point] {
        &self.points[LEFT_EYEBROW]
    }

    /// Right eyebrow, points 22..27.
    pub fn right_eyebrow(&self) -> &[Point] {
        &self.points[RIGHT_EYEBROW]
    }

    /// Nose bridge and base, 9 points.
    pub fn nose(&self) -> &[Point] {
        &self.points[NOSE]
    }

    /// Left eye, points 36..42.
    pub fn left_eye(&self) -> &[Point] {
        &self.points[LEFT_EYE]
    }

    /// Right eye, points 42..48.
    pub fn right_eye(&self) -> &[Point] {
        &self.points[RIGHT_EYE]
    }

    /// Outer and inner lip contours, 20 points.
    pub fn mouth(&self) -> &[Point] {
        &self.points[MOUTH]
    }

    /// Bounding box of all 68 points.
    pub fn bounds(&self) -> FaceBox {
        // A LandmarkSet is never empty.
        FaceBox::enclosing(&self.points).unwrap_or_default()
    }

    /// Copy of this set with every point shifted by `(dx, dy)`.
    pub fn translated(&self, dx: f32, dy: f32) -> Self {
        Self {
            points: self
                .points
                .iter()
                .map(|p| Point::new(p.x + dx, p.y + dy))
                .collect(),
        }
    }
}

/// One face reported by a landmark detector.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedFace {
    /// Detector bounding box.
    pub bbox: FaceBox,
    /// Landmarks in the same image coordinate space as `bbox`.
    pub landmarks: LandmarkSet,
    /// Detection confidence score, informational only.
    pub confidence: f32,
}

impl DetectedFace {
    /// Pair a bounding box with its landmarks.
    pub fn new(bbox: FaceBox, landmarks: LandmarkSet) -> Self {
        Self {
            bbox,
            landmarks,
            confidence: 1.0,
        }
    }
}
