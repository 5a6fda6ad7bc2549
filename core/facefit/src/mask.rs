use image::{GrayImage, Luma};
use imageproc::filter::gaussian_blur_f32;

use crate::error::{FaceSwapError, Result};
use crate::geometry::Path;
use crate::landmarks::{DetectedFace, Point};

/// Default feather radius (Gaussian sigma, in pixels).
pub const DEFAULT_FEATHER_RADIUS: f32 = 8.0;

/// Per-pixel opacity over the whole destination canvas.
#[derive(Debug, Clone, PartialEq)]
pub struct AlphaMask {
    alpha: GrayImage,
}

impl AlphaMask {
    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.alpha.width()
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.alpha.height()
    }

    /// Opacity at `(x, y)`, 0 (transparent) to 255 (opaque). Zero outside the mask.
    pub fn opacity(&self, x: u32, y: u32) -> u8 {
        if x < self.alpha.width() && y < self.alpha.height() {
            self.alpha.get_pixel(x, y).0[0]
        } else {
            0
        }
    }

    /// The underlying single-channel buffer.
    pub fn as_gray(&self) -> &GrayImage {
        &self.alpha
    }
}

/// Outline through the jaw, nose, mouth, left eye and right eye, in detector
/// index order: 0..17, 27..36, 48..68, 36..42, 42..48.
fn feature_outline(face: &DetectedFace) -> Path {
    let landmarks = &face.landmarks;
    let mut path = Path::new();
    path.extend(landmarks.jaw_outline());
    path.extend(landmarks.nose());
    path.extend(landmarks.mouth());
    path.extend(landmarks.left_eye());
    path.extend(landmarks.right_eye());
    path
}

/// Opacity of the radial falloff at distance `d` from the face center.
fn falloff(d: f32, inner: f32, outer: f32) -> f32 {
    if d <= inner {
        1.0
    } else if d >= outer {
        0.0
    } else {
        1.0 - (d - inner) / (outer - inner)
    }
}

/// Build the soft face mask for `target` on a `width` × `height` canvas.
///
/// The feature outline is filled opaque, then a blurred copy is laid over
/// it, then the result is tapered by a radial falloff centered on the
/// target box: opaque within a third of the box width, transparent beyond
/// one full box width.
pub fn build_mask(
    width: u32,
    height: u32,
    target: &DetectedFace,
    feather_radius: f32,
) -> Result<AlphaMask> {
    if width == 0 || height == 0 {
        return Err(FaceSwapError::CanvasContextFailure(format!(
            "cannot build a {width}x{height} mask"
        )));
    }
    if !(feather_radius >= 0.0) {
        return Err(FaceSwapError::InvalidOption(format!(
            "feather radius must be >= 0, got {feather_radius}"
        )));
    }

    let fill = feature_outline(target).rasterize(width, height, Point::default());
    let feathered = if feather_radius > 0.0 {
        gaussian_blur_f32(&fill, feather_radius)
    } else {
        fill.clone()
    };

    let center = target.bbox.center();
    let inner = target.bbox.width / 3.0;
    let outer = target.bbox.width;

    let mut alpha = GrayImage::new(width, height);
    for (x, y, out) in alpha.enumerate_pixels_mut() {
        let base = fill.get_pixel(x, y).0[0] as f32 / 255.0;
        let blur = feathered.get_pixel(x, y).0[0] as f32 / 255.0;
        // Blurred copy drawn source-over onto the sharp fill.
        let combined = blur + base * (1.0 - blur);

        let d = Point::new(x as f32 + 0.5, y as f32 + 0.5).distance(&center);
        let value = combined * falloff(d, inner, outer);
        *out = Luma([(value * 255.0).round().clamp(0.0, 255.0) as u8]);
    }

    Ok(AlphaMask { alpha })
}
