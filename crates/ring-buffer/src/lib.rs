//! Interrupt-Safe Byte Ring Buffer
//!
//! Decouples the radio receive path (a periodic producer that must never
//! block) from the main-loop consumer that frames and dispatches packets.
//! The consumer suppresses the producer with a hold flag; the producer checks
//! the flag and simply skips its cycle while it is set.

mod buffer;
mod error;
mod source;

pub use buffer::{Append, FillReport, HoldGuard, RingBuffer, RingView, ServiceOutcome, DEFAULT_CAPACITY};
pub use error::RingBufferError;
pub use source::ByteSource;
