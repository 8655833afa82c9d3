//! Ring Buffer Error Types

use thiserror::Error;

/// Errors raised when constructing a ring buffer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RingBufferError {
    /// A buffer must be able to hold at least one byte
    #[error("Ring buffer capacity must be positive")]
    ZeroCapacity,
}
