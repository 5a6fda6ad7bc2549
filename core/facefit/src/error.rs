use thiserror::Error;

#[derive(Debug, Error)]
pub enum FaceSwapError {
    #[error("face detection models are not loaded")]
    ModelsNotReady,

    #[error("failed to load face detection models: {0}")]
    ModelLoadFailure(String),

    #[error("face detection failed: {0}")]
    DetectionFailure(String),

    #[error("expected at least 2 faces in the template, found {found}")]
    InsufficientFaces { found: usize },

    #[error("no face detected in the uploaded image")]
    NoFaceDetected,

    #[error("drawing surface unavailable: {0}")]
    CanvasContextFailure(String),

    #[error("expected 68 landmarks, got {0}")]
    InvalidLandmarks(usize),

    #[error("failed to decode image: {0}")]
    DecodeError(String),

    #[error("failed to encode image: {0}")]
    EncodeError(String),

    #[error("image dimensions are zero")]
    ZeroDimensions,

    #[error("invalid option: {0}")]
    InvalidOption(String),

    #[error("unexpected failure: {0}")]
    Unknown(String),
}

impl FaceSwapError {
    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            FaceSwapError::ModelsNotReady => "MODELS_NOT_READY",
            FaceSwapError::ModelLoadFailure(_) => "MODEL_LOAD_FAILURE",
            FaceSwapError::DetectionFailure(_) => "DETECTION_FAILURE",
            FaceSwapError::InsufficientFaces { .. } => "INSUFFICIENT_FACES",
            FaceSwapError::NoFaceDetected => "NO_FACE_DETECTED",
            FaceSwapError::CanvasContextFailure(_) => "CANVAS_CONTEXT_FAILURE",
            FaceSwapError::InvalidLandmarks(_) => "INVALID_LANDMARKS",
            FaceSwapError::DecodeError(_) => "DECODE_ERROR",
            FaceSwapError::EncodeError(_) => "ENCODE_ERROR",
            FaceSwapError::ZeroDimensions => "ZERO_DIMENSIONS",
            FaceSwapError::InvalidOption(_) => "INVALID_OPTION",
            FaceSwapError::Unknown(_) => "UNKNOWN_FAILURE",
        }
    }

    /// Message suitable for showing to the person who uploaded the photo.
    pub fn user_message(&self) -> String {
        match self {
            FaceSwapError::ModelsNotReady => {
                "Face detection models are still loading. Please wait and try again.".to_string()
            }
            FaceSwapError::ModelLoadFailure(_) => {
                "Failed to load face detection models. Please try refreshing the page.".to_string()
            }
            FaceSwapError::InsufficientFaces { .. } => {
                "Could not detect two faces in the template image".to_string()
            }
            FaceSwapError::NoFaceDetected => {
                "Could not detect a face in the uploaded image".to_string()
            }
            FaceSwapError::DecodeError(_) | FaceSwapError::ZeroDimensions => {
                "The selected file could not be read as an image".to_string()
            }
            FaceSwapError::InvalidOption(_) => self.to_string(),
            other => format!("An error occurred while processing images: {other}"),
        }
    }
}

/// Shorthand for results carrying a [`FaceSwapError`].
pub type Result<T> = std::result::Result<T, FaceSwapError>;
