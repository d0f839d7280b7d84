/// Result alias that carries the custom [`PreviewerError`] type.
pub type Result<T> = std::result::Result<T, PreviewerError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum PreviewerError {
    /// Free-form message for failures that do not warrant their own variant.
    #[error("{0}")]
    Message(String),
    /// A caller handed the core an argument it cannot work with.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// The preview parameters are structurally valid JSON but describe
    /// something that cannot be played.
    #[error("invalid preview parameters: {location}: {reason}")]
    InvalidParams {
        location: String,
        reason: &'static str,
    },
    /// The URL fragment could not be decoded into text.
    #[error("malformed URL fragment: {0}")]
    Fragment(String),
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Url(#[from] url::ParseError),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
}

impl PreviewerError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub(crate) fn invalid_line(line: usize, reason: &'static str) -> Self {
        Self::InvalidParams {
            location: format!("line {line}"),
            reason,
        }
    }

    pub(crate) fn invalid_clip(line: usize, clip: usize, reason: &'static str) -> Self {
        Self::InvalidParams {
            location: format!("line {line}, clip {clip}"),
            reason,
        }
    }
}

impl From<&str> for PreviewerError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for PreviewerError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
