/// Result alias that carries the custom [`LedWeaverError`] type.
pub type Result<T> = std::result::Result<T, LedWeaverError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum LedWeaverError {
    /// Free-form error used where a dedicated variant would add nothing. It
    /// lets callers surface a readable message without forcing every
    /// subsystem into a rigid taxonomy.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Wrapper around JSON (de)serialization errors.
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    /// Audio device or stream failure.
    #[error("audio: {0}")]
    Audio(String),
}

impl LedWeaverError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }
}

impl From<&str> for LedWeaverError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for LedWeaverError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
