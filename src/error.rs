//! Error types for ProRes decoding

use thiserror::Error;

/// Result type for ProRes operations
pub type Result<T> = std::result::Result<T, ProResError>;

/// Errors that can occur during ProRes decoding
#[derive(Error, Debug)]
pub enum ProResError {
    /// Frame, picture, or slice header failed validation
    #[error("malformed header: {0}")]
    MalformedHeader(String),

    /// The bitstream uses a feature this decoder does not handle
    #[error("unsupported feature: {0}")]
    Unsupported(String),

    /// A read ran past the end of the coded data
    #[error("bitstream underflow")]
    BitstreamUnderflow,

    /// The coded data decodes to an impossible value
    #[error("invalid bitstream: {0}")]
    BitstreamInvalid(String),

    /// IO error from the file convenience wrapper
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ProResError::MalformedHeader("frame header size 20 below minimum 28".into());
        assert_eq!(
            err.to_string(),
            "malformed header: frame header size 20 below minimum 28"
        );

        assert_eq!(ProResError::BitstreamUnderflow.to_string(), "bitstream underflow");
    }

    #[test]
    fn test_io_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: ProResError = io_err.into();
        assert!(matches!(err, ProResError::Io(_)));
    }
}
