/// Errors from tour editing, playback transitions, and the storage boundary.
#[derive(Debug, thiserror::Error)]
pub enum TourError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Step {index} out of range for a tour with {len} steps")]
    StepOutOfRange { index: usize, len: usize },

    #[error("Tour not found: {0}")]
    TourNotFound(String),

    #[error("Cannot {action} while {mode}")]
    InvalidTransition {
        action: &'static str,
        mode: &'static str,
    },

    #[error("Sign in to author tours")]
    SignedOut,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Failures reported by a [`crate::store::TourStore`] or [`crate::store::KeyValueStore`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage encoding error: {0}")]
    Json(#[from] serde_json::Error),
}
