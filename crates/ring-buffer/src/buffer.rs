//! Byte Ring Buffer Implementation

use crate::error::RingBufferError;
use crate::source::ByteSource;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError, TryLockError};
use tracing::trace;

/// Default buffer capacity in bytes (~0.5 s of traffic at 9600 baud)
pub const DEFAULT_CAPACITY: usize = 512;

/// Result of a single-byte append
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Append {
    /// Byte was written at the head
    Stored,
    /// Buffer was full; byte was counted as overrun and discarded
    Overrun,
    /// Buffer is held by the consumer; nothing was touched
    Held,
}

/// Bytes moved by one fill from a [`ByteSource`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FillReport {
    /// Bytes written into the buffer
    pub stored: usize,
    /// Bytes discarded from the source because the buffer was full
    pub dropped: usize,
}

/// Result of one producer tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceOutcome {
    /// Consumer holds the buffer; the tick did nothing
    Skipped,
    /// Source was drained into the buffer
    Filled(FillReport),
}

/// Mutable state shared across the producer/consumer boundary
struct Slots {
    storage: Box<[u8]>,
    /// Next write position
    head: usize,
    /// Valid bytes ending at `head`
    count: usize,
    /// Bytes dropped since the last reset because the buffer was full
    overrun_bytes: usize,
}

impl Slots {
    fn capacity(&self) -> usize {
        self.storage.len()
    }

    fn tail(&self) -> usize {
        (self.head + self.capacity() - self.count) % self.capacity()
    }

    fn physical(&self, logical: usize) -> usize {
        (self.tail() + logical) % self.capacity()
    }

    fn append(&mut self, byte: u8) -> Append {
        if self.count == self.capacity() {
            self.overrun_bytes += 1;
            return Append::Overrun;
        }
        let head = self.head;
        self.storage[head] = byte;
        self.head = (head + 1) % self.capacity();
        self.count += 1;
        Append::Stored
    }

    /// Pull everything the source has. Once full, the remainder is
    /// discarded in one step rather than byte by byte.
    fn fill_from<S: ByteSource + ?Sized>(&mut self, source: &mut S) -> FillReport {
        let mut report = FillReport::default();
        loop {
            let available = source.available();
            if available == 0 {
                break;
            }
            let capacity = self.capacity();
            let free = capacity - self.count;
            if free == 0 {
                let dropped = source.discard();
                self.overrun_bytes += dropped;
                report.dropped += dropped;
                break;
            }
            let head = self.head;
            let contiguous = (capacity - head).min(free).min(available);
            let read = source.read_into(&mut self.storage[head..head + contiguous]);
            if read == 0 {
                break;
            }
            self.head = (head + read) % capacity;
            self.count += read;
            report.stored += read;
        }
        report
    }

    fn reset(&mut self) {
        self.head = 0;
        self.count = 0;
        self.overrun_bytes = 0;
    }
}

/// Fixed-capacity circular byte store shared by one producer and one consumer
///
/// The producer path ([`RingBuffer::service`], [`RingBuffer::append`]) checks
/// the hold flag first and never waits. The consumer takes a [`HoldGuard`]
/// before scanning or trimming the buffer through a [`RingView`].
pub struct RingBuffer {
    slots: Mutex<Slots>,
    /// Capacity of the buffer
    capacity: usize,
    /// When set, the producer must not mutate the buffer
    held: AtomicBool,
    /// Total bytes stored (for statistics)
    total_written: AtomicUsize,
    /// Producer ticks skipped because the buffer was held
    skipped_cycles: AtomicUsize,
}

impl RingBuffer {
    /// Create a new ring buffer with given capacity
    pub fn new(capacity: usize) -> Result<Self, RingBufferError> {
        if capacity == 0 {
            return Err(RingBufferError::ZeroCapacity);
        }
        Ok(Self::allocate(capacity))
    }

    /// Create a buffer with default capacity (512 bytes)
    pub fn with_default_capacity() -> Self {
        Self::allocate(DEFAULT_CAPACITY)
    }

    fn allocate(capacity: usize) -> Self {
        Self {
            slots: Mutex::new(Slots {
                storage: vec![0u8; capacity].into_boxed_slice(),
                head: 0,
                count: 0,
                overrun_bytes: 0,
            }),
            capacity,
            held: AtomicBool::new(false),
            total_written: AtomicUsize::new(0),
            skipped_cycles: AtomicUsize::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Producer entry without blocking: `None` if held or mid-consumer-access.
    fn try_lock_unheld(&self) -> Option<MutexGuard<'_, Slots>> {
        if self.held.load(Ordering::Acquire) {
            self.skipped_cycles.fetch_add(1, Ordering::Relaxed);
            return None;
        }
        match self.slots.try_lock() {
            Ok(slots) => Some(slots),
            Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner()),
            Err(TryLockError::WouldBlock) => {
                self.skipped_cycles.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Producer tick: drain the source into the buffer unless held.
    pub fn service<S: ByteSource + ?Sized>(&self, source: &mut S) -> ServiceOutcome {
        let Some(mut slots) = self.try_lock_unheld() else {
            return ServiceOutcome::Skipped;
        };
        let report = slots.fill_from(source);
        drop(slots);
        self.total_written.fetch_add(report.stored, Ordering::Relaxed);
        if report.dropped > 0 {
            trace!("Ring buffer full, discarded {} source bytes", report.dropped);
        }
        ServiceOutcome::Filled(report)
    }

    /// Producer append of a single byte, respecting the hold flag
    pub fn append(&self, byte: u8) -> Append {
        let Some(mut slots) = self.try_lock_unheld() else {
            return Append::Held;
        };
        let result = slots.append(byte);
        if result == Append::Stored {
            self.total_written.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    /// Set the hold flag, returning its previous value
    pub fn acquire_hold(&self) -> bool {
        self.held.swap(true, Ordering::AcqRel)
    }

    /// Clear the hold flag
    pub fn release(&self) {
        self.held.store(false, Ordering::Release);
    }

    /// Whether the consumer currently holds the buffer
    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }

    /// Acquire the hold for the lifetime of the returned guard.
    ///
    /// Nested guards are allowed; only the outermost one releases.
    pub fn hold(&self) -> HoldGuard<'_> {
        let was_held = self.acquire_hold();
        HoldGuard {
            buffer: self,
            was_held,
        }
    }

    /// Empty the buffer and zero the overrun counter. The hold flag is kept.
    pub fn reset(&self) {
        self.lock().reset();
    }

    /// Get the number of bytes currently in the buffer
    pub fn len(&self) -> usize {
        self.lock().count
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check if buffer is full
    pub fn is_full(&self) -> bool {
        self.len() == self.capacity
    }

    /// Get the buffer capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Get fill ratio (0.0 to 1.0)
    pub fn fill_ratio(&self) -> f64 {
        self.len() as f64 / self.capacity as f64
    }

    /// Bytes dropped since the last reset or overrun recovery
    pub fn overrun_bytes(&self) -> usize {
        self.lock().overrun_bytes
    }

    /// Get total bytes written (for statistics)
    pub fn total_written(&self) -> usize {
        self.total_written.load(Ordering::Relaxed)
    }

    /// Producer ticks skipped because the consumer held the buffer
    pub fn skipped_cycles(&self) -> usize {
        self.skipped_cycles.load(Ordering::Relaxed)
    }
}

/// Consumer hold on a [`RingBuffer`], released on drop by the outermost holder
pub struct HoldGuard<'a> {
    buffer: &'a RingBuffer,
    was_held: bool,
}

impl<'a> HoldGuard<'a> {
    /// Whether the buffer was already held when this guard was taken
    pub fn was_held(&self) -> bool {
        self.was_held
    }

    /// Borrow the buffer contents for scanning and trimming.
    ///
    /// Do not keep a view alive across a nested [`RingBuffer::hold`] call
    /// that also takes a view.
    pub fn view(&self) -> RingView<'a> {
        RingView {
            slots: self.buffer.lock(),
            total_written: &self.buffer.total_written,
        }
    }
}

impl Drop for HoldGuard<'_> {
    fn drop(&mut self) {
        if !self.was_held {
            self.buffer.release();
        }
    }
}

/// Consumer access to the buffered bytes in logical order (index 0 = oldest)
pub struct RingView<'a> {
    slots: MutexGuard<'a, Slots>,
    total_written: &'a AtomicUsize,
}

impl RingView<'_> {
    /// Number of buffered bytes
    pub fn len(&self) -> usize {
        self.slots.count
    }

    /// Check if the view is empty
    pub fn is_empty(&self) -> bool {
        self.slots.count == 0
    }

    /// Byte at a logical index counted from the oldest retained byte
    pub fn get(&self, index: usize) -> Option<u8> {
        if index >= self.slots.count {
            return None;
        }
        Some(self.slots.storage[self.slots.physical(index)])
    }

    /// Iterate over the buffered bytes, oldest first
    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        (0..self.slots.count).map(move |i| self.slots.storage[self.slots.physical(i)])
    }

    /// Copy bytes in the logical range `[start, end)` out of the buffer
    pub fn copy_range(&self, start: usize, end: usize) -> Vec<u8> {
        let end = end.min(self.slots.count);
        (start..end)
            .map(|i| self.slots.storage[self.slots.physical(i)])
            .collect()
    }

    /// Discard the `n` oldest bytes (advances the logical tail)
    pub fn drop_front(&mut self, n: usize) -> usize {
        let n = n.min(self.slots.count);
        self.slots.count -= n;
        n
    }

    /// Discard the `n` newest bytes (moves the head back)
    pub fn drop_back(&mut self, n: usize) -> usize {
        let n = n.min(self.slots.count);
        let capacity = self.slots.capacity();
        self.slots.head = (self.slots.head + capacity - n) % capacity;
        self.slots.count -= n;
        n
    }

    /// Consumer-side append while holding the buffer
    pub fn append(&mut self, byte: u8) -> Append {
        let result = self.slots.append(byte);
        if result == Append::Stored {
            self.total_written.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    /// Consumer-side drain of the hardware source while holding the buffer
    pub fn drain_from<S: ByteSource + ?Sized>(&mut self, source: &mut S) -> FillReport {
        let report = self.slots.fill_from(source);
        self.total_written.fetch_add(report.stored, Ordering::Relaxed);
        report
    }

    /// Bytes dropped since the last reset or overrun recovery
    pub fn overrun_bytes(&self) -> usize {
        self.slots.overrun_bytes
    }

    /// Return the overrun count and zero it
    pub fn take_overrun(&mut self) -> usize {
        std::mem::take(&mut self.slots.overrun_bytes)
    }
}
