use image::RgbaImage;

use crate::landmarks::LandmarkSet;

/// Number of leading landmarks sampled for a face's average color.
///
/// In the 68-point layout these are all jaw points, so the sample can pick
/// up background or hair near the jawline.
pub const COLOR_SAMPLE_POINTS: usize = 10;

/// Average color at a fixed subset of a face's landmarks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ColorSample {
    sum: [u32; 3],
    count: u32,
}

impl ColorSample {
    /// Sample the pixels under the first [`COLOR_SAMPLE_POINTS`] landmarks.
    ///
    /// Points outside the image read as black.
    pub fn from_landmarks(image: &RgbaImage, landmarks: &LandmarkSet) -> Self {
        let mut sample = ColorSample::default();
        for point in landmarks.positions().iter().take(COLOR_SAMPLE_POINTS) {
            let (x, y) = (point.x.floor(), point.y.floor());
            let rgb = if x >= 0.0 && y >= 0.0 && x < image.width() as f32 && y < image.height() as f32
            {
                let p = image.get_pixel(x as u32, y as u32).0;
                [p[0], p[1], p[2]]
            } else {
                [0, 0, 0]
            };
            for (acc, v) in sample.sum.iter_mut().zip(rgb) {
                *acc += v as u32;
            }
            sample.count += 1;
        }
        sample
    }

    /// Mean (r, g, b) of the sampled pixels.
    pub fn mean(&self) -> [f32; 3] {
        if self.count == 0 {
            return [0.0; 3];
        }
        self.sum.map(|s| s as f32 / self.count as f32)
    }

    /// Offset that moves this sample's mean onto `target`'s, rounded half up.
    pub fn delta_to(&self, target: &ColorSample) -> ColorDelta {
        let n = self.count.max(1) as i64;
        let m = target.count.max(1) as i64;
        let mut channels = [0i16; 3];
        for (i, channel) in channels.iter_mut().enumerate() {
            // target/m - source/n over a common denominator, then floor(x + 1/2).
            let numerator = target.sum[i] as i64 * n - self.sum[i] as i64 * m;
            let denominator = n * m;
            *channel = (2 * numerator + denominator).div_euclid(2 * denominator) as i16;
        }
        ColorDelta(channels)
    }
}

/// Per-channel (r, g, b) offset applied to every pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ColorDelta(pub [i16; 3]);

/// Shift every pixel of `buffer` by `delta`, clamping to [0, 255]. Alpha is kept.
pub fn apply_delta(buffer: &mut RgbaImage, delta: ColorDelta) {
    if delta == ColorDelta::default() {
        return;
    }
    for pixel in buffer.pixels_mut() {
        for (channel, offset) in pixel.0.iter_mut().zip(delta.0) {
            *channel = (*channel as i16 + offset).clamp(0, 255) as u8;
        }
    }
}

/// Shift `source` so its sampled color matches `target`'s.
///
/// `source_landmarks` must be in `source`'s pixel space and
/// `target_landmarks` in `target`'s. Mutates `source` in place and returns
/// the delta that was applied.
pub fn match_colors(
    source: &mut RgbaImage,
    target: &RgbaImage,
    source_landmarks: &LandmarkSet,
    target_landmarks: &LandmarkSet,
) -> ColorDelta {
    let source_sample = ColorSample::from_landmarks(source, source_landmarks);
    let target_sample = ColorSample::from_landmarks(target, target_landmarks);
    let delta = source_sample.delta_to(&target_sample);
    log::debug!(
        "color sample source={:?} target={:?} delta={:?}",
        source_sample.mean(),
        target_sample.mean(),
        delta.0
    );
    apply_delta(source, delta);
    delta
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::tests::synthetic_landmarks;
    use crate::landmarks::FaceBox;
    use image::Rgba;

    fn solid(color: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(120, 120, Rgba(color))
    }

    fn face() -> LandmarkSet {
        synthetic_landmarks(FaceBox::new(10.0, 10.0, 100.0, 100.0))
    }

    #[test]
    fn sample_of_solid_image_is_that_color() {
        let sample = ColorSample::from_landmarks(&solid([10, 20, 30, 255]), &face());
        assert_eq!(sample.mean(), [10.0, 20.0, 30.0]);
    }

    #[test]
    fn out_of_bounds_points_read_black() {
        let far = synthetic_landmarks(FaceBox::new(1000.0, 1000.0, 50.0, 50.0));
        let sample = ColorSample::from_landmarks(&solid([200, 200, 200, 255]), &far);
        assert_eq!(sample.mean(), [0.0, 0.0, 0.0]);
    }

    #[test]
    fn black_source_white_target_saturates() {
        let mut source = solid([0, 0, 0, 255]);
        let target = solid([255, 255, 255, 255]);
        let delta = match_colors(&mut source, &target, &face(), &face());
        assert_eq!(delta, ColorDelta([255, 255, 255]));
        assert!(source.pixels().all(|p| p.0 == [255, 255, 255, 255]));
    }

    #[test]
    fn clamps_at_zero() {
        let mut source = solid([30, 200, 255, 128]);
        source.put_pixel(0, 0, Rgba([250, 5, 100, 7]));
        apply_delta(&mut source, ColorDelta([-100, 100, -255]));
        assert_eq!(source.get_pixel(0, 0).0, [150, 105, 0, 7]);
        assert_eq!(source.get_pixel(1, 1).0, [0, 255, 0, 128]);
    }

    #[test]
    fn clamps_at_255() {
        let mut source = solid([250, 0, 128, 255]);
        apply_delta(&mut source, ColorDelta([10, 255, 127]));
        assert_eq!(source.get_pixel(5, 5).0, [255, 255, 255, 255]);
    }

    #[test]
    fn alpha_is_untouched() {
        let mut source = solid([100, 100, 100, 42]);
        apply_delta(&mut source, ColorDelta([50, -50, 0]));
        assert!(source.pixels().all(|p| p.0[3] == 42));
    }

    #[test]
    fn idempotent_without_saturation() {
        let mut source = RgbaImage::new(120, 120);
        for (x, y, p) in source.enumerate_pixels_mut() {
            *p = Rgba([(60 + x % 50) as u8, (80 + y % 40) as u8, 100, 255]);
        }
        let mut target = solid([140, 110, 90, 255]);
        target.put_pixel(10, 40, Rgba([145, 111, 97, 255]));

        let landmarks = face();
        let mut once = source.clone();
        match_colors(&mut once, &target, &landmarks, &landmarks);
        let mut twice = once.clone();
        let second = match_colors(&mut twice, &target, &landmarks, &landmarks);

        assert_eq!(second, ColorDelta::default());
        assert_eq!(once, twice);
    }

    #[test]
    fn delta_rounds_half_up() {
        let source = ColorSample {
            sum: [0, 0, 0],
            count: 10,
        };
        let target = ColorSample {
            sum: [25, 15, 0],
            count: 10,
        };
        // 2.5 -> 3, 1.5 -> 2
        assert_eq!(source.delta_to(&target), ColorDelta([3, 2, 0]));
        assert_eq!(target.delta_to(&source), ColorDelta([-2, -1, 0]));
    }
}
