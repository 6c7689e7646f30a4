//! Error types for the vision adapters

use guard_core::GuardError;
use thiserror::Error;

pub type VisionResult<T> = Result<T, VisionError>;

#[derive(Error, Debug)]
pub enum VisionError {
    #[error("Camera error: {0}")]
    Camera(String),

    #[error("Face service error: {0}")]
    Embedding(String),

    #[error("Enrollment error: {0}")]
    Enrollment(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Camera failures are fatal to the guard loop; the face service is transient.
impl From<VisionError> for GuardError {
    fn from(err: VisionError) -> Self {
        match err {
            VisionError::Camera(msg) => GuardError::Camera(msg),
            VisionError::Enrollment(msg) => GuardError::Config(msg),
            VisionError::Embedding(msg) => GuardError::Classifier(msg),
            VisionError::Io(e) => GuardError::Io(e),
        }
    }
}
