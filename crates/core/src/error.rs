use std::path::PathBuf;

/// Result alias that carries the custom [`SonifyError`] type.
pub type Result<T> = std::result::Result<T, SonifyError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum SonifyError {
    /// The image at `path` could not be read or decoded.
    #[error("failed to decode image {}: {reason}", .path.display())]
    Decode { path: PathBuf, reason: String },
    /// Rendering a scan document failed inside a synthesis task.
    #[error("failed to synthesize {}: {reason}", .path.display())]
    Synthesis { path: PathBuf, reason: String },
    /// A stage was handed nothing it could work with.
    #[error("nothing to process: {0}")]
    EmptyInput(String),
    /// A WAV segment does not share the sample rate of the first segment.
    #[error("{} has sample rate {found} Hz, expected {expected} Hz", .path.display())]
    SampleRateMismatch {
        path: PathBuf,
        expected: u32,
        found: u32,
    },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("invalid scan document: {0}")]
    InvalidDocument(String),
    /// Input file names do not sort into a unique time sequence.
    #[error("ambiguous input order: {0}")]
    InputOrder(String),
    #[error("midi error: {0}")]
    Midi(String),
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Wav(#[from] hound::Error),
}

impl SonifyError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub fn config<T: Into<String>>(msg: T) -> Self {
        Self::InvalidConfig(msg.into())
    }

    pub fn document<T: Into<String>>(msg: T) -> Self {
        Self::InvalidDocument(msg.into())
    }
}

impl From<&str> for SonifyError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for SonifyError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_error_names_the_offending_path() {
        let err = SonifyError::Decode {
            path: PathBuf::from("frames/002.png"),
            reason: "truncated".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("002.png"));
        assert!(text.contains("truncated"));
    }

    #[test]
    fn string_conversions_produce_messages() {
        let err: SonifyError = "boom".into();
        assert!(matches!(err, SonifyError::Message(ref m) if m == "boom"));
    }
}
