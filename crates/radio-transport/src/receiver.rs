//! Receive Producer Task
//!
//! Moves bytes from the serial port into the ring buffer on a fixed period.
//! The task never waits on the consumer: while the buffer is held it skips
//! the tick and tries again on the next one.

use ring_buffer::{ByteSource, RingBuffer, ServiceOutcome};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, trace};

/// Handle to a running receive producer
pub struct Receiver {
    running: Arc<AtomicBool>,
    handle: JoinHandle<()>,
    buffer: Arc<RingBuffer>,
}

impl Receiver {
    /// Start servicing `buffer` from `source` every `period`
    pub fn spawn<S>(buffer: Arc<RingBuffer>, mut source: S, period: Duration) -> Self
    where
        S: ByteSource + Send + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let shared = Arc::clone(&buffer);

        let handle = tokio::spawn(async move {
            info!("Starting radio receiver ({:?} period)", period);
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            while flag.load(Ordering::Acquire) {
                ticker.tick().await;
                if shared.service(&mut source) == ServiceOutcome::Skipped {
                    trace!("Receive buffer held, tick skipped");
                }
            }
            info!("Radio receiver stopped");
        });

        Self {
            running,
            handle,
            buffer,
        }
    }

    /// Ask the task to stop after its current tick
    pub fn stop(&self) {
        info!("Stopping radio receiver");
        self.running.store(false, Ordering::Release);
    }

    /// Check if the task is still servicing the buffer
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire) && !self.handle.is_finished()
    }

    /// Ticks skipped because the consumer held the buffer
    pub fn skipped_cycles(&self) -> usize {
        self.buffer.skipped_cycles()
    }

    /// Stop the task and wait for it to finish
    pub async fn shutdown(self) {
        self.stop();
        let _ = self.handle.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use radio_protocol::MockLink;

    #[tokio::test(start_paused = true)]
    async fn test_receiver_moves_bytes_into_buffer() {
        let buffer = Arc::new(RingBuffer::new(64).unwrap());
        let link = MockLink::new();
        let receiver = Receiver::spawn(Arc::clone(&buffer), link.clone(), Duration::from_millis(10));

        link.inject(b"hello");
        tokio::time::sleep(Duration::from_millis(25)).await;

        assert_eq!(buffer.len(), 5);
        assert_eq!(link.pending_rx(), 0);
        receiver.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_receiver_skips_while_held() {
        let buffer = Arc::new(RingBuffer::new(64).unwrap());
        let link = MockLink::new();
        let receiver = Receiver::spawn(Arc::clone(&buffer), link.clone(), Duration::from_millis(10));

        let hold = buffer.hold();
        link.inject(b"abc");
        tokio::time::sleep(Duration::from_millis(35)).await;
        assert!(buffer.is_empty());
        assert!(receiver.skipped_cycles() > 0);
        assert_eq!(link.pending_rx(), 3);

        drop(hold);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(buffer.len(), 3);
        receiver.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_ends_task() {
        let buffer = Arc::new(RingBuffer::new(8).unwrap());
        let receiver = Receiver::spawn(buffer, MockLink::new(), Duration::from_millis(10));
        assert!(receiver.is_running());
        receiver.stop();
        assert!(!receiver.is_running());
        receiver.shutdown().await;
    }
}
