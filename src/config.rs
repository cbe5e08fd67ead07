/// Largest byte length a single store may have.
pub const MAX_BYTE_LENGTH: u64 = i32::MAX as u64;

/// Default ceiling on the running total of native (off-heap) store bytes.
pub const MAX_NATIVE_SIZE_LIMIT: usize = 4 * 1024 * 1024 * 1024;

/// Stores up to this many bytes are allocated inline (on-heap) by default.
pub const ON_HEAP_MAX_BYTES: usize = 128;

/// Longest string `join`/`to_string` may produce, in code units.
pub const MAX_STRING_LENGTH: usize = (1 << 30) - 1;

/// Limits and policy switches for an [`Engine`](crate::Engine).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    pub max_byte_length: u64,
    pub native_size_limit: usize,
    pub on_heap_max_bytes: usize,
    pub max_string_length: usize,
    /// Turn lossy BigInt element writes into a RangeError instead of
    /// silently wrapping modulo 2^64.
    pub strict_bigint: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_byte_length: MAX_BYTE_LENGTH,
            native_size_limit: MAX_NATIVE_SIZE_LIMIT,
            on_heap_max_bytes: ON_HEAP_MAX_BYTES,
            max_string_length: MAX_STRING_LENGTH,
            strict_bigint: false,
        }
    }
}

impl EngineConfig {
    pub fn with_native_size_limit(mut self, bytes: usize) -> Self {
        self.native_size_limit = bytes;
        self
    }

    pub fn with_max_byte_length(mut self, bytes: u64) -> Self {
        self.max_byte_length = bytes.min(MAX_BYTE_LENGTH);
        self
    }

    pub fn with_on_heap_max_bytes(mut self, bytes: usize) -> Self {
        self.on_heap_max_bytes = bytes;
        self
    }

    pub fn with_max_string_length(mut self, len: usize) -> Self {
        self.max_string_length = len;
        self
    }

    pub fn with_strict_bigint(mut self, strict: bool) -> Self {
        self.strict_bigint = strict;
        self
    }
}
