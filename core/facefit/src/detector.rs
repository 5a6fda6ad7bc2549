//! Landmark detector contract and the lifecycle wrapper around it.

use std::future::Future;

use image::RgbaImage;

use crate::error::{FaceSwapError, Result};
use crate::landmarks::DetectedFace;

/// Pluggable 68-point landmark detection backend.
///
/// Implement this trait to plug in any detector (an ONNX model, a JS
/// library behind wasm-bindgen, a fixed fixture in tests). Both methods may
/// suspend while the backend works.
pub trait LandmarkDetector {
    /// Load model weights. Called before the first detection.
    fn load_models(&mut self) -> impl Future<Output = Result<()>>;

    /// Detect every face in `image`, with landmarks in `image`'s pixel space.
    fn detect_faces(&self, image: &RgbaImage) -> impl Future<Output = Result<Vec<DetectedFace>>>;
}

/// Lifecycle of the detector's models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModelState {
    /// `load_models` has not been called.
    #[default]
    Uninitialized,
    /// A load is in progress.
    Loading,
    /// Models are loaded; detection is allowed.
    Ready,
    /// The last load failed. Loading may be retried.
    Failed,
}

/// Wraps a [`LandmarkDetector`] and refuses detection until its models are ready.
#[derive(Debug)]
pub struct DetectorAdapter<D> {
    backend: D,
    state: ModelState,
}

impl<D: LandmarkDetector> DetectorAdapter<D> {
    /// Wrap `backend`; models start unloaded.
    pub fn new(backend: D) -> Self {
        Self {
            backend,
            state: ModelState::Uninitialized,
        }
    }

    /// Current model state.
    pub fn state(&self) -> ModelState {
        self.state
    }

    /// Load the backend's models. A no-op once they are ready.
    pub async fn load_models(&mut self) -> Result<()> {
        if self.state == ModelState::Ready {
            return Ok(());
        }

        self.state = ModelState::Loading;
        log::info!("loading face detection models");
        match self.backend.load_models().await {
            Ok(()) => {
                self.state = ModelState::Ready;
                log::info!("face detection models ready");
                Ok(())
            }
            Err(e) => {
                self.state = ModelState::Failed;
                log::warn!("failed to load face detection models: {e}");
                Err(match e {
                    FaceSwapError::ModelLoadFailure(_) => e,
                    other => FaceSwapError::ModelLoadFailure(other.to_string()),
                })
            }
        }
    }

    /// Detect faces in `image`. Fails with `ModelsNotReady` unless loaded.
    pub async fn detect(&self, image: &RgbaImage) -> Result<Vec<DetectedFace>> {
        if self.state != ModelState::Ready {
            return Err(FaceSwapError::ModelsNotReady);
        }
        let faces = self
            .backend
            .detect_faces(image)
            .await
            .map_err(|e| match e {
                FaceSwapError::DetectionFailure(_) => e,
                other => FaceSwapError::DetectionFailure(other.to_string()),
            })?;
        log::debug!(
            "detected {} face(s) in {}x{} image",
            faces.len(),
            image.width(),
            image.height()
        );
        Ok(faces)
    }

    /// The wrapped backend.
    pub fn backend(&self) -> &D {
        &self.backend
    }
}
