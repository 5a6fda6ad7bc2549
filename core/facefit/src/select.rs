use crate::error::{FaceSwapError, Result};
use crate::landmarks::DetectedFace;

/// Pick the face to replace: the rightmost box by x. Ties go to the earlier face.
///
/// The template is expected to hold at least two people.
pub fn select_target(faces: &[DetectedFace]) -> Result<&DetectedFace> {
    if faces.len() < 2 {
        return Err(FaceSwapError::InsufficientFaces { found: faces.len() });
    }
    let mut best = &faces[0];
    for face in &faces[1..] {
        if face.bbox.x > best.bbox.x {
            best = face;
        }
    }
    Ok(best)
}

/// Pick the replacement face: the first one detected.
pub fn select_source(faces: &[DetectedFace]) -> Result<&DetectedFace> {
    faces.first().ok_or(FaceSwapError::NoFaceDetected)
}
