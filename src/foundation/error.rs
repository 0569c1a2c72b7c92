/// Convenience result type used across stagewire.
pub type StageResult<T> = Result<T, StageError>;

/// Top-level error taxonomy used by runtime APIs.
///
/// Stale handles and missing textures are not errors: those operations are skipped where they
/// happen. What reaches the caller is either a corrupt wire stream or invalid host input.
#[derive(thiserror::Error, Debug)]
pub enum StageError {
    /// Corrupt or truncated wire stream (unknown tag, premature end, bad table index).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Invalid host-provided data (sizes, ranges, scene topology).
    #[error("validation error: {0}")]
    Validation(String),

    /// Errors while encoding or reading back surface pixels.
    #[error("surface error: {0}")]
    Surface(String),

    /// Errors when serializing or deserializing data structures.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StageError {
    /// Build a [`StageError::Protocol`] value.
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Build a [`StageError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`StageError::Surface`] value.
    pub fn surface(msg: impl Into<String>) -> Self {
        Self::Surface(msg.into())
    }

    /// Build a [`StageError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}

impl From<serde_json::Error> for StageError {
    fn from(err: serde_json::Error) -> Self {
        Self::serde(err.to_string())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
