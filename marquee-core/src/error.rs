use uuid::Uuid;

/// Error taxonomy shared by the booking pipeline. Domain crates convert
/// their local errors into this; the API layer maps each variant to an
/// HTTP status.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("seats already taken: {taken:?}")]
    SeatsUnavailable { taken: Vec<Uuid> },

    #[error("showtime is not open for booking")]
    ShowtimeUnavailable,

    #[error("promotion not applicable: {0}")]
    PromotionInvalid(String),

    #[error("callback signature mismatch")]
    InvalidSignature,

    #[error("invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("actor is not allowed to perform this action")]
    Forbidden,

    #[error("invalid request: {0}")]
    Validation(String),

    #[error("storage failure: {0}")]
    Storage(String),
}

impl CoreError {
    pub fn storage<E: std::fmt::Display>(err: E) -> Self {
        Self::Storage(err.to_string())
    }
}
