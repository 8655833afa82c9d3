//! Hardware receive source abstraction

use std::collections::VecDeque;

/// A non-blocking source of received bytes, such as a UART receive FIFO.
///
/// Every method must return immediately; the producer calls them from a
/// periodic tick that is not allowed to wait.
pub trait ByteSource {
    /// Number of bytes that can be read right now.
    fn available(&mut self) -> usize;

    /// Read up to `buf.len()` bytes, returning how many were written.
    fn read_into(&mut self, buf: &mut [u8]) -> usize;

    /// Throw away everything currently available, returning the byte count.
    fn discard(&mut self) -> usize;
}

impl<S: ByteSource + ?Sized> ByteSource for &mut S {
    fn available(&mut self) -> usize {
        (**self).available()
    }

    fn read_into(&mut self, buf: &mut [u8]) -> usize {
        (**self).read_into(buf)
    }

    fn discard(&mut self) -> usize {
        (**self).discard()
    }
}

impl ByteSource for VecDeque<u8> {
    fn available(&mut self) -> usize {
        self.len()
    }

    fn read_into(&mut self, buf: &mut [u8]) -> usize {
        let n = buf.len().min(self.len());
        for (slot, byte) in buf.iter_mut().zip(self.drain(..n)) {
            *slot = byte;
        }
        n
    }

    fn discard(&mut self) -> usize {
        let n = self.len();
        self.clear();
        n
    }
}
