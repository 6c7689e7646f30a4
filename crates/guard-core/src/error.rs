//! Error types for the room guard core

use thiserror::Error;

/// Result type alias for guard operations
pub type GuardResult<T> = Result<T, GuardError>;

/// Errors surfaced by the guard core and its collaborators.
///
/// Collaborator-transient variants (`Classifier`, `Listener`, `Synthesizer`, `Announcer`)
/// are absorbed by the orchestrator at the call site. `Camera` and `Config` are fatal.
#[derive(Error, Debug)]
pub enum GuardError {
    #[error("Camera error: {0}")]
    Camera(String),

    #[error("Classifier error: {0}")]
    Classifier(String),

    #[error("Listener error: {0}")]
    Listener(String),

    #[error("Synthesizer error: {0}")]
    Synthesizer(String),

    #[error("Announcer error: {0}")]
    Announcer(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GuardError {
    /// True for device and configuration failures that must end the process.
    pub fn is_fatal(&self) -> bool {
        matches!(self, GuardError::Camera(_) | GuardError::Config(_))
    }
}

impl From<config::ConfigError> for GuardError {
    fn from(err: config::ConfigError) -> Self {
        GuardError::Config(err.to_string())
    }
}
