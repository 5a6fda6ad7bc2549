use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};

use crate::error::{FaceSwapError, Result};
use crate::landmarks::{DetectedFace, FaceBox, Point};
use crate::mask::AlphaMask;
use crate::region::FaceRegion;

/// Default opacity of the final draw, leaving a hint of the template visible.
pub const DEFAULT_GLOBAL_ALPHA: f32 = 0.95;

/// Largest resampled region allowed, as a multiple of each canvas dimension.
const MAX_OVERDRAW: f32 = 2.0;

/// Uniform scale plus translation from source face space to target face space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffinePlacement {
    /// Uniform scale factor.
    pub scale: f32,
    /// Horizontal offset applied after scaling (pixels).
    pub offset_x: f32,
    /// Vertical offset applied after scaling (pixels).
    pub offset_y: f32,
}

impl AffinePlacement {
    /// Placement that maps `source`'s box onto `target`'s, matching widths.
    ///
    /// A degenerate box means the detector returned unusable data, reported
    /// as [`FaceSwapError::DetectionFailure`].
    pub fn between(source: &FaceBox, target: &FaceBox) -> Result<Self> {
        let scale = target.width / source.width;
        if !scale.is_finite() || scale <= 0.0 {
            return Err(FaceSwapError::DetectionFailure(format!(
                "cannot place a face of width {} onto width {}",
                source.width, target.width
            )));
        }
        Ok(Self {
            scale,
            offset_x: target.x - source.x * scale,
            offset_y: target.y - source.y * scale,
        })
    }

    /// Map a source-space point into target space.
    pub fn apply(&self, p: Point) -> Point {
        Point::new(p.x * self.scale + self.offset_x, p.y * self.scale + self.offset_y)
    }
}

/// Which [`BlendStrategy`] the compositor uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlendMode {
    /// Erase the destination under the mask, then draw the source into the hole.
    /// Keeps the template background intact around the face.
    #[default]
    Cutout,

    /// Center the scaled source on the target face and draw it directly.
    /// Simpler, but the region's box can show as a seam without feathering.
    DirectPlacement,
}

impl BlendMode {
    /// The strategy implementing this mode.
    pub fn strategy(&self) -> &'static dyn BlendStrategy {
        match self {
            BlendMode::Cutout => &Cutout,
            BlendMode::DirectPlacement => &DirectPlacement,
        }
    }
}

/// Everything a blend strategy may draw with.
#[derive(Debug, Clone, Copy)]
pub struct Layers<'a> {
    /// Color-corrected source face, in source image space.
    pub region: &'a FaceRegion,
    /// Soft mask over the destination canvas.
    pub mask: &'a AlphaMask,
    /// Mapping from source image space to destination space.
    pub placement: AffinePlacement,
    /// The face being replaced.
    pub target: &'a DetectedFace,
    /// Opacity of the final draw, 0.0 to 1.0.
    pub global_alpha: f32,
}

/// A way of blending the source face into the destination canvas.
pub trait BlendStrategy: Send + Sync {
    /// Draw `layers` into `destination` in place.
    fn blend(&self, destination: &mut RgbaImage, layers: &Layers<'_>) -> Result<()>;
}

/// Mask-cutout blending.
#[derive(Debug, Clone, Copy, Default)]
pub struct Cutout;

impl BlendStrategy for Cutout {
    fn blend(&self, destination: &mut RgbaImage, layers: &Layers<'_>) -> Result<()> {
        let scaled = scale_image(
            &layers.region.image,
            layers.placement.scale,
            destination.dimensions(),
        )?;
        erase(destination, layers.mask);

        let at = layers.placement.apply(layers.region.origin);
        draw_over(
            destination,
            &scaled,
            at.x.round() as i64,
            at.y.round() as i64,
            layers.global_alpha,
        );
        Ok(())
    }
}

/// Direct region placement with a final softening pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectPlacement;

impl BlendStrategy for DirectPlacement {
    fn blend(&self, destination: &mut RgbaImage, layers: &Layers<'_>) -> Result<()> {
        let source = &layers.region.image;
        let scale = layers.target.bbox.width / source.width().max(1) as f32;
        let scaled = scale_image(source, scale, destination.dimensions())?;

        // Pivot on the face center rather than the region's corner.
        let center = layers.target.bbox.center();
        let x = center.x - scaled.width() as f32 / 2.0;
        let y = center.y - scaled.height() as f32 / 2.0;
        draw_over(destination, &scaled, x.round() as i64, y.round() as i64, 1.0);

        fade_onto_self(destination, layers.global_alpha);
        Ok(())
    }
}

/// Blend `layers` into a copy of `destination` using `mode`.
pub fn composite(destination: &RgbaImage, layers: &Layers<'_>, mode: BlendMode) -> Result<RgbaImage> {
    if !(0.0..=1.0).contains(&layers.global_alpha) {
        return Err(FaceSwapError::InvalidOption(format!(
            "global alpha must be between 0.0 and 1.0, got {}",
            layers.global_alpha
        )));
    }
    let mut canvas = destination.clone();
    mode.strategy().blend(&mut canvas, layers)?;
    Ok(canvas)
}

/// Resample `image` by a uniform `scale` with bilinear filtering.
///
/// Refuses results more than [`MAX_OVERDRAW`] times larger than `canvas` in
/// either dimension. Such a scale comes from a face box far smaller than
/// its landmarks.
fn scale_image(image: &RgbaImage, scale: f32, canvas: (u32, u32)) -> Result<RgbaImage> {
    let width = (image.width() as f32 * scale).round();
    let height = (image.height() as f32 * scale).round();
    let max_width = canvas.0.max(1) as f32 * MAX_OVERDRAW;
    let max_height = canvas.1.max(1) as f32 * MAX_OVERDRAW;
    if !(width.is_finite() && height.is_finite()) || width > max_width || height > max_height {
        return Err(FaceSwapError::DetectionFailure(format!(
            "a {}x{} face region scaled by {scale} does not fit a {}x{} canvas",
            image.width(),
            image.height(),
            canvas.0,
            canvas.1
        )));
    }
    let (width, height) = ((width as u32).max(1), (height as u32).max(1));
    if (width, height) == image.dimensions() {
        return Ok(image.clone());
    }
    Ok(imageops::resize(image, width, height, FilterType::Triangle))
}

/// Porter-Duff source-over of `src` onto `dst`, with `src` alpha scaled by `global_alpha`.
fn source_over(dst: &mut Rgba<u8>, src: Rgba<u8>, global_alpha: f32) {
    let sa = src.0[3] as f32 / 255.0 * global_alpha;
    if sa <= 0.0 {
        return;
    }
    let da = dst.0[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    let mut out = [0u8; 4];
    for i in 0..3 {
        let c = (src.0[i] as f32 * sa + dst.0[i] as f32 * da * (1.0 - sa)) / out_a;
        out[i] = c.round().clamp(0.0, 255.0) as u8;
    }
    out[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
    *dst = Rgba(out);
}

/// Draw `src` over `dst` with its top-left corner at `(x, y)`, clipped to `dst`.
fn draw_over(dst: &mut RgbaImage, src: &RgbaImage, x: i64, y: i64, global_alpha: f32) {
    let (dw, dh) = (dst.width() as i64, dst.height() as i64);
    for (sx, sy, pixel) in src.enumerate_pixels() {
        let tx = x + sx as i64;
        let ty = y + sy as i64;
        if tx < 0 || ty < 0 || tx >= dw || ty >= dh {
            continue;
        }
        source_over(dst.get_pixel_mut(tx as u32, ty as u32), *pixel, global_alpha);
    }
}

/// Destination-out: reduce `dst` alpha by the mask's opacity.
fn erase(dst: &mut RgbaImage, mask: &AlphaMask) {
    for (x, y, pixel) in dst.enumerate_pixels_mut() {
        let m = mask.opacity(x, y) as f32 / 255.0;
        if m > 0.0 {
            let a = pixel.0[3] as f32 * (1.0 - m);
            pixel.0[3] = a.round() as u8;
        }
    }
}

/// Redraw the canvas onto itself at `global_alpha`. Opaque pixels are
/// unchanged; translucent ones gain opacity.
fn fade_onto_self(dst: &mut RgbaImage, global_alpha: f32) {
    for pixel in dst.pixels_mut() {
        let copy = *pixel;
        source_over(pixel, copy, global_alpha);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::tests::synthetic_landmarks;
    use crate::mask::build_mask;

    fn face_at(bbox: FaceBox) -> DetectedFace {
        DetectedFace::new(bbox, synthetic_landmarks(bbox))
    }

    fn region(width: u32, height: u32, color: [u8; 4], origin: Point) -> FaceRegion {
        FaceRegion {
            image: RgbaImage::from_pixel(width, height, Rgba(color)),
            origin,
        }
    }

    #[test]
    fn placement_scales_by_box_width() {
        let source = FaceBox::new(0.0, 0.0, 40.0, 40.0);
        let target = FaceBox::new(200.0, 50.0, 60.0, 60.0);
        let placement = AffinePlacement::between(&source, &target).unwrap();
        assert!((placement.scale - 1.5).abs() < f32::EPSILON);
        assert_eq!(placement.apply(Point::new(0.0, 0.0)), Point::new(200.0, 50.0));
        assert_eq!(placement.apply(Point::new(40.0, 40.0)), Point::new(260.0, 110.0));
    }

    #[test]
    fn placement_rejects_degenerate_boxes() {
        let target = FaceBox::new(0.0, 0.0, 10.0, 10.0);
        for width in [0.0, -5.0, f32::NAN, f32::INFINITY] {
            let source = FaceBox::new(0.0, 0.0, width, 10.0);
            assert!(matches!(
                AffinePlacement::between(&source, &target),
                Err(FaceSwapError::DetectionFailure(_))
            ));
        }
    }

    #[test]
    fn oversized_placement_fails_without_resampling() {
        let template = RgbaImage::from_pixel(200, 200, Rgba([0, 0, 255, 255]));
        let target = face_at(FaceBox::new(50.0, 50.0, 100.0, 100.0));
        let mask = build_mask(200, 200, &target, 4.0).unwrap();
        // A 100px region from a 0.001px source box.
        let region = region(140, 130, [255, 0, 0, 255], Point::default());
        let placement =
            AffinePlacement::between(&FaceBox::new(0.0, 0.0, 0.001, 0.001), &target.bbox).unwrap();

        let layers = Layers {
            region: &region,
            mask: &mask,
            placement,
            target: &target,
            global_alpha: DEFAULT_GLOBAL_ALPHA,
        };
        assert!(matches!(
            composite(&template, &layers, BlendMode::Cutout),
            Err(FaceSwapError::DetectionFailure(_))
        ));
    }

    #[test]
    fn scaling_up_to_twice_the_canvas_is_allowed() {
        let image = RgbaImage::from_pixel(10, 10, Rgba([1, 2, 3, 255]));
        let scaled = scale_image(&image, 4.0, (20, 20)).unwrap();
        assert_eq!(scaled.dimensions(), (40, 40));
        assert!(scale_image(&image, 4.1, (20, 20)).is_err());
    }

    #[test]
    fn source_over_math() {
        let mut dst = Rgba([0, 0, 255, 255]);
        source_over(&mut dst, Rgba([255, 0, 0, 255]), 1.0);
        assert_eq!(dst.0, [255, 0, 0, 255]);

        let mut dst = Rgba([0, 0, 0, 255]);
        source_over(&mut dst, Rgba([200, 200, 200, 255]), 0.5);
        assert_eq!(dst.0, [100, 100, 100, 255]);

        let mut dst = Rgba([0, 0, 0, 0]);
        source_over(&mut dst, Rgba([10, 20, 30, 255]), 0.95);
        assert_eq!(dst.0, [10, 20, 30, 242]);
    }

    #[test]
    fn fade_keeps_opaque_pixels() {
        let mut canvas = RgbaImage::from_pixel(4, 4, Rgba([12, 34, 56, 255]));
        canvas.put_pixel(0, 0, Rgba([100, 100, 100, 0]));
        fade_onto_self(&mut canvas, 0.95);
        assert_eq!(canvas.get_pixel(1, 1).0, [12, 34, 56, 255]);
        assert_eq!(canvas.get_pixel(0, 0).0[3], 0);
    }

    #[test]
    fn cutout_replaces_face_and_keeps_background() {
        let template = RgbaImage::from_pixel(300, 300, Rgba([0, 0, 255, 255]));
        let target = face_at(FaceBox::new(100.0, 100.0, 100.0, 100.0));
        let mask = build_mask(300, 300, &target, 8.0).unwrap();
        let source_box = FaceBox::new(0.0, 0.0, 50.0, 50.0);
        let placement = AffinePlacement::between(&source_box, &target.bbox).unwrap();
        // Fully opaque red source covering the whole source face box.
        let region = region(50, 50, [255, 0, 0, 255], Point::new(0.0, 0.0));

        let layers = Layers {
            region: &region,
            mask: &mask,
            placement,
            target: &target,
            global_alpha: DEFAULT_GLOBAL_ALPHA,
        };
        let out = composite(&template, &layers, BlendMode::Cutout).unwrap();

        // Face center: hole punched fully, red drawn at 95%.
        assert_eq!(out.get_pixel(150, 150).0, [255, 0, 0, 242]);
        // Far corner: untouched template.
        assert_eq!(out.get_pixel(5, 5).0, [0, 0, 255, 255]);
        assert_eq!(out.dimensions(), (300, 300));
    }

    #[test]
    fn direct_placement_centers_on_target() {
        let template = RgbaImage::from_pixel(300, 300, Rgba([0, 0, 255, 255]));
        let target = face_at(FaceBox::new(100.0, 100.0, 100.0, 100.0));
        let mask = build_mask(300, 300, &target, 8.0).unwrap();
        let region = region(50, 50, [0, 255, 0, 255], Point::new(500.0, 500.0));
        let placement =
            AffinePlacement::between(&FaceBox::new(0.0, 0.0, 50.0, 50.0), &target.bbox).unwrap();

        let layers = Layers {
            region: &region,
            mask: &mask,
            placement,
            target: &target,
            global_alpha: DEFAULT_GLOBAL_ALPHA,
        };
        let out = composite(&template, &layers, BlendMode::DirectPlacement).unwrap();

        // Region scaled to 100x100 and centered on (150, 150): covers 100..200.
        assert_eq!(out.get_pixel(101, 101).0, [0, 255, 0, 255]);
        assert_eq!(out.get_pixel(198, 198).0, [0, 255, 0, 255]);
        assert_eq!(out.get_pixel(99, 150).0, [0, 0, 255, 255]);
        assert_eq!(out.get_pixel(201, 150).0, [0, 0, 255, 255]);
    }

    #[test]
    fn composite_is_deterministic() {
        let template = RgbaImage::from_pixel(120, 120, Rgba([40, 80, 120, 255]));
        let target = face_at(FaceBox::new(30.0, 30.0, 60.0, 60.0));
        let mask = build_mask(120, 120, &target, 4.0).unwrap();
        let region = region(30, 40, [200, 100, 50, 200], Point::new(5.0, 5.0));
        let placement =
            AffinePlacement::between(&FaceBox::new(5.0, 5.0, 30.0, 30.0), &target.bbox).unwrap();
        let layers = Layers {
            region: &region,
            mask: &mask,
            placement,
            target: &target,
            global_alpha: DEFAULT_GLOBAL_ALPHA,
        };
        for mode in [BlendMode::Cutout, BlendMode::DirectPlacement] {
            let a = composite(&template, &layers, mode).unwrap();
            let b = composite(&template, &layers, mode).unwrap();
            assert_eq!(a, b);
        }
    }

    #[test]
    fn invalid_global_alpha_is_rejected() {
        let template = RgbaImage::new(10, 10);
        let target = face_at(FaceBox::new(2.0, 2.0, 6.0, 6.0));
        let mask = build_mask(10, 10, &target, 1.0).unwrap();
        let region = region(4, 4, [0, 0, 0, 255], Point::default());
        let layers = Layers {
            region: &region,
            mask: &mask,
            placement: AffinePlacement::between(&target.bbox, &target.bbox).unwrap(),
            target: &target,
            global_alpha: 1.5,
        };
        assert!(matches!(
            composite(&template, &layers, BlendMode::Cutout),
            Err(FaceSwapError::InvalidOption(_))
        ));
    }
}
