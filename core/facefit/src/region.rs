use image::{Rgba, RgbaImage};

use crate::error::{FaceSwapError, Result};
use crate::geometry::Path;
use crate::landmarks::{FaceBox, LandmarkSet, Point};

/// How far the landmark box is grown before the head silhouette is cut.
///
/// Horizontal padding is applied to both sides. Vertical padding is applied
/// above the landmarks only, where the forehead and hair are.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaddingPolicy {
    /// Fraction of the landmark box width added on each side.
    pub horizontal: f32,
    /// Fraction of the landmark box height added above.
    pub vertical: f32,
}

impl Default for PaddingPolicy {
    fn default() -> Self {
        Self {
            horizontal: 0.3,
            vertical: 0.7,
        }
    }
}

/// A face cut out of its source image.
#[derive(Debug, Clone)]
pub struct FaceRegion {
    /// Pixels of the padded box. Alpha is zero outside the head silhouette.
    pub image: RgbaImage,
    /// Top-left corner of `image` in source image coordinates.
    pub origin: Point,
}

impl FaceRegion {
    /// Map landmarks from source image space into this region's pixel space.
    pub fn local_landmarks(&self, landmarks: &LandmarkSet) -> LandmarkSet {
        landmarks.translated(-self.origin.x, -self.origin.y)
    }
}

/// Closed head silhouette: the jaw outline plus a synthesized skull curve.
///
/// The top is two cubic Béziers meeting at an apex above the landmark box.
/// It approximates where hair and forehead usually are and knows nothing
/// about the actual hairline.
pub(crate) fn head_silhouette(landmarks: &LandmarkSet, bounds: FaceBox, vertical_pad: f32) -> Path {
    let jaw = landmarks.jaw_outline();
    let jaw_start = jaw[0];

    let center_x = bounds.x + bounds.width / 2.0;
    let apex = Point::new(center_x, bounds.y - vertical_pad * 0.5);
    let shoulder = vertical_pad * 0.25;
    let half_width = bounds.width * 0.5;

    let mut path = Path::new();
    path.extend(jaw);
    path.cubic_to(
        Point::new(bounds.x + bounds.width, apex.y + shoulder),
        Point::new(center_x + half_width, apex.y),
        apex,
    );
    path.cubic_to(
        Point::new(center_x - half_width, apex.y),
        Point::new(bounds.x, apex.y + shoulder),
        jaw_start,
    );
    path
}

/// Cut the padded head region around `landmarks` out of `image`.
///
/// The output is sized to the padded box with no scaling. Pixels outside the
/// silhouette keep their color but get zero alpha; pixels beyond the source
/// image are transparent black.
pub fn extract(
    image: &RgbaImage,
    landmarks: &LandmarkSet,
    padding: PaddingPolicy,
) -> Result<FaceRegion> {
    if !(padding.horizontal > 0.0 && padding.vertical > 0.0) {
        return Err(FaceSwapError::InvalidOption(format!(
            "padding must be positive, got {}x{}",
            padding.horizontal, padding.vertical
        )));
    }

    let mut bounds = landmarks.bounds();
    bounds.width = bounds.width.max(1.0);
    bounds.height = bounds.height.max(1.0);

    let pad_x = bounds.width * padding.horizontal;
    let pad_y = bounds.height * padding.vertical;
    let origin = Point::new((bounds.x - pad_x).floor(), (bounds.y - pad_y).floor());
    let width = (bounds.width + 2.0 * pad_x).ceil();
    let height = (bounds.height + pad_y).ceil();
    if !width.is_finite() || !height.is_finite() || width * height * 4.0 > isize::MAX as f32 {
        return Err(FaceSwapError::CanvasContextFailure(format!(
            "region of {width}x{height} pixels cannot be allocated"
        )));
    }
    let (width, height) = (width as u32, height as u32);

    let silhouette = head_silhouette(landmarks, bounds, pad_y);
    let coverage = silhouette.rasterize(width, height, origin);

    let left = origin.x as i64;
    let top = origin.y as i64;
    let mut region = RgbaImage::new(width, height);
    for (x, y, pixel) in region.enumerate_pixels_mut() {
        let sx = left + x as i64;
        let sy = top + y as i64;
        if sx < 0 || sy < 0 || sx >= image.width() as i64 || sy >= image.height() as i64 {
            continue;
        }
        let Rgba([r, g, b, a]) = *image.get_pixel(sx as u32, sy as u32);
        let alpha = if coverage.get_pixel(x, y).0[0] > 0 { a } else { 0 };
        *pixel = Rgba([r, g, b, alpha]);
    }

    log::debug!(
        "extracted {}x{} face region at ({:.1}, {:.1})",
        width,
        height,
        origin.x,
        origin.y
    );

    Ok(FaceRegion {
        image: region,
        origin,
    })
}
