//! Face swapping onto a template photo: landmark-driven alignment, color
//! matching, and soft-masked compositing.
//!
//! Landmark detection is delegated to a [`LandmarkDetector`] you provide.
//!
//! # Example
//!
//! ```no_run
//! use facefit::{DetectedFace, FaceSwapper, LandmarkDetector};
//! use image::RgbaImage;
//!
//! struct MyDetector;
//!
//! impl LandmarkDetector for MyDetector {
//!     async fn load_models(&mut self) -> facefit::Result<()> {
//!         Ok(())
//!     }
//!
//!     async fn detect_faces(&self, _image: &RgbaImage) -> facefit::Result<Vec<DetectedFace>> {
//!         // Run your 68-point landmark model here
//!         Ok(vec![])
//!     }
//! }
//!
//! # async fn run() -> facefit::Result<()> {
//! let template = std::fs::read("template.jpg").unwrap();
//! let upload = std::fs::read("me.png").unwrap();
//!
//! let mut swapper = FaceSwapper::new(MyDetector);
//! swapper.load_models().await?;
//! let result = swapper.swap(&template, &upload).await?;
//! std::fs::write(facefit::OUTPUT_FILENAME, result.encode()?).unwrap();
//! # Ok(())
//! # }
//! ```
#![warn(missing_docs)]

mod color;
mod composite;
/// Landmark detector trait and model lifecycle.
pub mod detector;
mod encode;
mod error;
mod geometry;
mod landmarks;
mod mask;
mod region;
mod select;

pub use color::{apply_delta, match_colors, ColorDelta, ColorSample, COLOR_SAMPLE_POINTS};
pub use composite::{
    composite, AffinePlacement, BlendMode, BlendStrategy, Cutout, DirectPlacement, Layers,
    DEFAULT_GLOBAL_ALPHA,
};
pub use detector::{DetectorAdapter, LandmarkDetector, ModelState};
pub use encode::{OutputFormat, OUTPUT_FILENAME};
/// Error type returned by facefit operations.
pub use error::{FaceSwapError, Result};
pub use landmarks::{DetectedFace, FaceBox, LandmarkSet, Point, LANDMARK_COUNT};
pub use mask::{build_mask, AlphaMask, DEFAULT_FEATHER_RADIUS};
pub use region::{extract, FaceRegion, PaddingPolicy};
pub use select::{select_source, select_target};

use image::RgbaImage;

/// Pre-configured blending settings.
///
/// Apply a preset with [`FaceSwapper::preset`], then override individual
/// settings as needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    /// Mask cutout with a wide feather. Keeps the template background.
    ///
    /// - `BlendMode::Cutout`
    /// - 8px feather
    /// - 0.95 global alpha
    Natural,

    /// Direct placement with a tight feather. Sharper, may show a seam.
    ///
    /// - `BlendMode::DirectPlacement`
    /// - 4px feather
    /// - 0.95 global alpha
    Crisp,
}

/// Output of one face swap run.
#[derive(Debug, Clone)]
pub struct SwapResult {
    /// The composited image, same size as the template.
    pub image: RgbaImage,

    /// The template face that was replaced.
    pub target_face: DetectedFace,

    /// The uploaded face that replaced it.
    pub source_face: DetectedFace,

    /// Mapping from upload space to template space.
    pub placement: AffinePlacement,

    /// Color shift applied to the source face.
    pub color_delta: ColorDelta,

    /// Format used by [`SwapResult::encode`] and [`SwapResult::to_data_url`].
    pub format: OutputFormat,
}

impl SwapResult {
    /// Width of the result in pixels.
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Height of the result in pixels.
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Encode the result in the configured output format.
    pub fn encode(&self) -> Result<Vec<u8>> {
        encode::encode_image(&self.image, self.format)
    }

    /// Encode the result as a `data:` URL for display.
    pub fn to_data_url(&self) -> Result<String> {
        encode::to_data_url(&self.image, self.format)
    }
}

/// Builder and runner for the face swap pipeline.
///
/// Owns the detector. [`FaceSwapper::swap`] borrows the swapper mutably, so
/// one swapper runs at most one swap at a time. Every run allocates its own
/// buffers; a failed run leaves nothing behind.
pub struct FaceSwapper<D> {
    detector: DetectorAdapter<D>,
    blend_mode: BlendMode,
    feather_radius: f32,
    global_alpha: f32,
    padding: PaddingPolicy,
    format: OutputFormat,
}

impl<D: LandmarkDetector> FaceSwapper<D> {
    /// Create a swapper around `detector` with the [`Preset::Natural`] settings.
    pub fn new(detector: D) -> Self {
        Self {
            detector: DetectorAdapter::new(detector),
            blend_mode: BlendMode::Cutout,
            feather_radius: DEFAULT_FEATHER_RADIUS,
            global_alpha: DEFAULT_GLOBAL_ALPHA,
            padding: PaddingPolicy::default(),
            format: OutputFormat::default(),
        }
    }

    /// Apply a preset. Individual settings can be overridden after this call.
    pub fn preset(mut self, preset: Preset) -> Self {
        match preset {
            Preset::Natural => {
                self.blend_mode = BlendMode::Cutout;
                self.feather_radius = DEFAULT_FEATHER_RADIUS;
                self.global_alpha = DEFAULT_GLOBAL_ALPHA;
            }
            Preset::Crisp => {
                self.blend_mode = BlendMode::DirectPlacement;
                self.feather_radius = 4.0;
                self.global_alpha = DEFAULT_GLOBAL_ALPHA;
            }
        }
        self
    }

    /// Set the blending strategy (default: `BlendMode::Cutout`).
    pub fn blend_mode(mut self, mode: BlendMode) -> Self {
        self.blend_mode = mode;
        self
    }

    /// Set the mask feather radius in pixels (default: 8.0). `0.0` disables feathering.
    pub fn feather_radius(mut self, radius: f32) -> Self {
        self.feather_radius = radius;
        self
    }

    /// Set the opacity of the final draw, 0.0 to 1.0 (default: 0.95).
    pub fn global_alpha(mut self, alpha: f32) -> Self {
        self.global_alpha = alpha;
        self
    }

    /// Set the head region padding (default: 0.3 horizontal, 0.7 vertical).
    pub fn padding(mut self, padding: PaddingPolicy) -> Self {
        self.padding = padding;
        self
    }

    /// Set the output format (default: `OutputFormat::Png`).
    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    /// Load the detector's models. Must succeed before [`FaceSwapper::swap`].
    pub async fn load_models(&mut self) -> Result<()> {
        self.detector.load_models().await
    }

    /// Current state of the detector's models.
    pub fn model_state(&self) -> ModelState {
        self.detector.state()
    }

    /// The wrapped detector.
    pub fn detector(&self) -> &D {
        self.detector.backend()
    }

    fn validate(&self) -> Result<()> {
        if !(self.feather_radius >= 0.0 && self.feather_radius.is_finite()) {
            return Err(FaceSwapError::InvalidOption(format!(
                "feather radius must be a finite value >= 0, got {}",
                self.feather_radius
            )));
        }
        if !(0.0..=1.0).contains(&self.global_alpha) {
            return Err(FaceSwapError::InvalidOption(format!(
                "global alpha must be between 0.0 and 1.0, got {}",
                self.global_alpha
            )));
        }
        if !(self.padding.horizontal > 0.0 && self.padding.vertical > 0.0) {
            return Err(FaceSwapError::InvalidOption(
                "padding must be positive".to_string(),
            ));
        }
        if let OutputFormat::Jpeg { quality } = self.format {
            if !(0.0..=1.0).contains(&quality) {
                return Err(FaceSwapError::InvalidOption(format!(
                    "quality must be between 0.0 and 1.0, got {quality}"
                )));
            }
        }
        Ok(())
    }

    /// Decode both images and swap the upload's face onto the template.
    ///
    /// `template` must contain at least two faces; the rightmost one is
    /// replaced. The first face found in `upload` is used.
    pub async fn swap(&mut self, template: &[u8], upload: &[u8]) -> Result<SwapResult> {
        self.validate()?;
        let template = encode::decode_image(template)?;
        let upload = encode::decode_image(upload)?;
        self.swap_images(&template, &upload).await
    }

    /// Swap using already-decoded buffers.
    pub async fn swap_images(
        &mut self,
        template: &RgbaImage,
        upload: &RgbaImage,
    ) -> Result<SwapResult> {
        self.validate()?;
        if template.width() == 0 || template.height() == 0 || upload.width() == 0 || upload.height() == 0 {
            return Err(FaceSwapError::ZeroDimensions);
        }

        let result = self.run(template, upload).await;
        if let Err(e) = &result {
            log::warn!("face swap failed: {e}");
        }
        result
    }

    async fn run(&self, template: &RgbaImage, upload: &RgbaImage) -> Result<SwapResult> {
        let template_faces = self.detector.detect(template).await?;
        let upload_faces = self.detector.detect(upload).await?;

        let target = select_target(&template_faces)?.clone();
        let source = select_source(&upload_faces)?.clone();
        log::debug!(
            "target face at {:?} of {}, source face at {:?}",
            target.bbox,
            template_faces.len(),
            source.bbox
        );

        let placement = AffinePlacement::between(&source.bbox, &target.bbox)?;
        log::debug!("placement {placement:?}");

        let mut region = extract(upload, &source.landmarks, self.padding)?;
        let local_landmarks = region.local_landmarks(&source.landmarks);
        let color_delta = match_colors(
            &mut region.image,
            template,
            &local_landmarks,
            &target.landmarks,
        );

        let mask = build_mask(template.width(), template.height(), &target, self.feather_radius)?;

        let layers = Layers {
            region: &region,
            mask: &mask,
            placement,
            target: &target,
            global_alpha: self.global_alpha,
        };
        let image = composite(template, &layers, self.blend_mode)?;

        log::info!(
            "swapped face onto {}x{} template (scale {:.3}, {:?})",
            image.width(),
            image.height(),
            placement.scale,
            self.blend_mode
        );

        Ok(SwapResult {
            image,
            target_face: target,
            source_face: source,
            placement,
            color_delta,
            format: self.format,
        })
    }
}
