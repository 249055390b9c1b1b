//! Error types for s-zip-io

use std::io;

/// Result type for stream operations
pub type Result<T> = std::result::Result<T, StreamError>;

/// Error types that can occur while reading, writing or filtering a stream
#[derive(Debug)]
pub enum StreamError {
    /// Malformed constructor or call parameter (zero cache size, window out of range, ...)
    InvalidArgument(String),
    /// The stream lacks the capability the operation needs
    NotSupported(String),
    /// A fixed-size read could not be satisfied before end-of-data
    UnexpectedEndOfData,
    /// I/O error from the underlying resource, or a stalled sink
    Io(io::Error),
    /// The stream has already been disposed
    Disposed,
    /// Checked arithmetic on a position, length or window bound overflowed
    Overflow(String),
}

impl StreamError {
    /// The error reported when a sink accepts zero bytes of a non-empty buffer.
    pub fn write_zero() -> Self {
        StreamError::Io(io::Error::new(
            io::ErrorKind::WriteZero,
            "cannot write any more",
        ))
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        StreamError::InvalidArgument(msg.into())
    }

    pub(crate) fn overflow(msg: impl Into<String>) -> Self {
        StreamError::Overflow(msg.into())
    }
}

impl std::fmt::Display for StreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamError::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            StreamError::NotSupported(msg) => write!(f, "Not supported: {}", msg),
            StreamError::UnexpectedEndOfData => write!(f, "Unexpected end of data"),
            StreamError::Io(e) => write!(f, "I/O error: {}", e),
            StreamError::Disposed => write!(f, "Stream already disposed"),
            StreamError::Overflow(msg) => write!(f, "Arithmetic overflow: {}", msg),
        }
    }
}

impl std::error::Error for StreamError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StreamError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for StreamError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            // e.g. seeking or resizing a pipe through an `IoStream`
            io::ErrorKind::Unsupported => StreamError::NotSupported(err.to_string()),
            _ => StreamError::Io(err),
        }
    }
}

impl From<StreamError> for io::Error {
    fn from(err: StreamError) -> Self {
        match err {
            StreamError::Io(e) => e,
            StreamError::UnexpectedEndOfData => {
                io::Error::new(io::ErrorKind::UnexpectedEof, err.to_string())
            }
            StreamError::InvalidArgument(_) | StreamError::Overflow(_) => {
                io::Error::new(io::ErrorKind::InvalidInput, err.to_string())
            }
            StreamError::NotSupported(_) => io::Error::new(io::ErrorKind::Unsupported, err.to_string()),
            StreamError::Disposed => io::Error::new(io::ErrorKind::Other, err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_round_trip_keeps_kind() {
        let err: StreamError = io::Error::new(io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, StreamError::Io(_)));
        let back: io::Error = err.into();
        assert_eq!(back.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_unsupported_io_maps_to_not_supported() {
        let err: StreamError = io::Error::new(io::ErrorKind::Unsupported, "no seek").into();
        assert!(matches!(err, StreamError::NotSupported(_)));
        let back: io::Error = err.into();
        assert_eq!(back.kind(), io::ErrorKind::Unsupported);
    }

    #[test]
    fn test_write_zero_is_io() {
        match StreamError::write_zero() {
            StreamError::Io(e) => assert_eq!(e.kind(), io::ErrorKind::WriteZero),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_display() {
        assert!(StreamError::Disposed.to_string().contains("disposed"));
        let eod: io::Error = StreamError::UnexpectedEndOfData.into();
        assert_eq!(eod.kind(), io::ErrorKind::UnexpectedEof);
    }
}
