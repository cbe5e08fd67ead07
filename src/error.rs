/// Result type for binary view operations
pub type Result<T> = std::result::Result<T, Error>;

/// The two recoverable error classes a caller can observe.
///
/// Internal dispatch failures (an element kind outside the closed set, a
/// number reaching a BigInt slot after coercion) are programming errors and
/// panic instead of producing one of these.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Size limits, out-of-bounds indices and offsets, over-long strings
    #[error("RangeError: {0}")]
    Range(String),

    /// Detached buffers, wrong receiver kinds, content type mismatches,
    /// incompatible species results, non-callable arguments
    #[error("TypeError: {0}")]
    Type(String),
}

impl Error {
    pub fn range_error(msg: impl Into<String>) -> Self {
        Error::Range(msg.into())
    }

    pub fn type_error(msg: impl Into<String>) -> Self {
        Error::Type(msg.into())
    }

    pub fn detached() -> Self {
        Error::Type("typed array is detached".to_string())
    }

    pub fn is_range_error(&self) -> bool {
        matches!(self, Error::Range(_))
    }

    pub fn is_type_error(&self) -> bool {
        matches!(self, Error::Type(_))
    }
}
