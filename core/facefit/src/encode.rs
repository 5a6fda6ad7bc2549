use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ImageEncoder, Rgb, RgbImage, Rgba, RgbaImage};

use crate::error::{FaceSwapError, Result};

/// Fixed filename offered when the result is downloaded.
pub const OUTPUT_FILENAME: &str = "face-swap.png";

/// Encoded output format.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum OutputFormat {
    /// Lossless PNG, alpha preserved.
    #[default]
    Png,

    /// JPEG at the given quality (0.0–1.0). Alpha is flattened onto white.
    Jpeg {
        /// Compression quality from 0.0 (lowest) to 1.0 (highest).
        quality: f32,
    },
}

impl OutputFormat {
    /// MIME type of the encoded bytes.
    pub fn mime_type(&self) -> &'static str {
        match self {
            OutputFormat::Png => "image/png",
            OutputFormat::Jpeg { .. } => "image/jpeg",
        }
    }
}

/// Decode input bytes (PNG, JPEG, or WebP) into an RGBA buffer.
pub(crate) fn decode_image(input: &[u8]) -> Result<RgbaImage> {
    let decoded =
        image::load_from_memory(input).map_err(|e| FaceSwapError::DecodeError(e.to_string()))?;
    if decoded.width() == 0 || decoded.height() == 0 {
        return Err(FaceSwapError::ZeroDimensions);
    }
    Ok(decoded.to_rgba8())
}

/// `channel` at opacity `alpha` over white, in integer math.
fn over_white(channel: u8, alpha: u8) -> u8 {
    let (c, a) = (channel as u32, alpha as u32);
    ((c * a + 255 * (255 - a) + 127) / 255) as u8
}

/// Drop the canvas's alpha for JPEG, showing white where it was transparent.
pub(crate) fn flatten_alpha(canvas: &RgbaImage) -> RgbImage {
    RgbImage::from_fn(canvas.width(), canvas.height(), |x, y| {
        let Rgba([r, g, b, a]) = *canvas.get_pixel(x, y);
        Rgb([over_white(r, a), over_white(g, a), over_white(b, a)])
    })
}

/// Encode an image to the specified format.
pub(crate) fn encode_image(image: &RgbaImage, format: OutputFormat) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();

    match format {
        OutputFormat::Png => {
            PngEncoder::new(&mut buffer)
                .write_image(
                    image.as_raw(),
                    image.width(),
                    image.height(),
                    image::ExtendedColorType::Rgba8,
                )
                .map_err(|e| FaceSwapError::EncodeError(e.to_string()))?;
        }
        OutputFormat::Jpeg { quality } => {
            if !(0.0..=1.0).contains(&quality) {
                return Err(FaceSwapError::InvalidOption(format!(
                    "quality must be between 0.0 and 1.0, got {quality}"
                )));
            }
            let rgb = flatten_alpha(image);
            let quality_percent = ((quality * 100.0).round() as u8).max(1);
            JpegEncoder::new_with_quality(&mut buffer, quality_percent)
                .write_image(
                    rgb.as_raw(),
                    rgb.width(),
                    rgb.height(),
                    image::ExtendedColorType::Rgb8,
                )
                .map_err(|e| FaceSwapError::EncodeError(e.to_string()))?;
        }
    }

    Ok(buffer)
}

/// Encode as a `data:` URL for direct display.
pub(crate) fn to_data_url(image: &RgbaImage, format: OutputFormat) -> Result<String> {
    let bytes = encode_image(image, format)?;
    Ok(format!(
        "data:{};base64,{}",
        format.mime_type(),
        STANDARD.encode(bytes)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_test_rgba(width: u32, height: u32) -> RgbaImage {
        let mut img = RgbaImage::new(width, height);
        for (x, y, pixel) in img.enumerate_pixels_mut() {
            *pixel = image::Rgba([
                (x * 255 / width.max(1)) as u8,
                (y * 255 / height.max(1)) as u8,
                128,
                ((x + y) % 256) as u8,
            ]);
        }
        img
    }

    #[test]
    fn png_round_trip_is_lossless() {
        let img = make_test_rgba(48, 64);
        let data = encode_image(&img, OutputFormat::Png).unwrap();
        assert_eq!(&data[1..4], b"PNG");
        let decoded = decode_image(&data).unwrap();
        assert_eq!(decoded, img);
    }

    #[test]
    fn jpeg_produces_valid_output() {
        let img = make_test_rgba(48, 64);
        let data = encode_image(&img, OutputFormat::Jpeg { quality: 0.8 }).unwrap();
        assert_eq!(data[0], 0xFF);
        assert_eq!(data[1], 0xD8);
    }

    #[test]
    fn jpeg_rejects_bad_quality() {
        let img = make_test_rgba(4, 4);
        let result = encode_image(&img, OutputFormat::Jpeg { quality: 1.5 });
        assert!(matches!(result, Err(FaceSwapError::InvalidOption(_))));
    }

    #[test]
    fn data_url_has_png_prefix() {
        let img = make_test_rgba(4, 4);
        let url = to_data_url(&img, OutputFormat::Png).unwrap();
        assert!(url.starts_with("data:image/png;base64,iVBOR"));
    }

    #[test]
    fn erased_face_hole_turns_white_in_jpeg() {
        // A cutout canvas: opaque template, a fully erased pixel and a
        // half-faded one.
        let mut canvas = RgbaImage::from_pixel(3, 1, Rgba([100, 150, 200, 255]));
        canvas.put_pixel(1, 0, Rgba([255, 0, 0, 0]));
        canvas.put_pixel(2, 0, Rgba([0, 0, 0, 128]));

        let rgb = flatten_alpha(&canvas);
        assert_eq!(rgb.get_pixel(0, 0).0, [100, 150, 200]);
        assert_eq!(rgb.get_pixel(1, 0).0, [255, 255, 255]);
        assert_eq!(rgb.get_pixel(2, 0).0, [127, 127, 127]);
    }

    #[test]
    fn invalid_input_returns_error() {
        assert!(matches!(
            decode_image(b"not an image"),
            Err(FaceSwapError::DecodeError(_))
        ));
    }
}
