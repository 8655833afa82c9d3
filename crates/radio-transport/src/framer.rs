//! Packet Framer
//!
//! Pulls complete `<START> payload <END>` packets out of the receive ring
//! buffer. The radio link has no length prefix or checksum, so the framer
//! resynchronises on tokens alone:
//!
//! - bytes before the first start token are garbage and are dropped
//! - when several start tokens precede an end token, only the last one
//!   begins a real packet; the earlier bytes were a truncated send
//! - an empty packet is dropped and scanning continues
//! - an incomplete packet is left in place until more bytes arrive

use ring_buffer::{RingBuffer, RingView};
use serde::Serialize;
use tracing::{debug, warn};

/// Running counters for framing activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FramerStats {
    /// Packets handed to the caller
    pub packets: u64,
    /// Bytes discarded while resynchronising
    pub dropped_bytes: u64,
    /// Start/end pairs with nothing between them
    pub empty_packets: u64,
    /// Overruns cleaned up before extraction
    pub overruns_recovered: u64,
}

/// Extracts token-delimited packets from a [`RingBuffer`]
#[derive(Debug)]
pub struct PacketFramer {
    start_token: u8,
    end_token: u8,
    stats: FramerStats,
}

impl PacketFramer {
    /// Create a framer for the given token pair
    pub fn new(start_token: u8, end_token: u8) -> Self {
        Self {
            start_token,
            end_token,
            stats: FramerStats::default(),
        }
    }

    /// Framing counters since creation
    pub fn stats(&self) -> FramerStats {
        self.stats
    }

    /// Remove and return the payload of the oldest complete packet.
    ///
    /// The buffer is held for the duration of the scan. A hold already taken
    /// by the caller is left in place. Bytes lost to an overrun since the
    /// last check first cost both dangling edges of the buffer.
    pub fn extract_next(&mut self, buffer: &RingBuffer) -> Option<Vec<u8>> {
        let hold = buffer.hold();
        let mut view = hold.view();
        self.recover_overrun_in(&mut view);

        loop {
            self.skip_to_start(&mut view);
            if view.len() < 2 {
                return None;
            }

            let end = (1..view.len()).find(|&i| view.get(i) == Some(self.end_token))?;

            // Latest start token before the end token opens the packet
            let start = (0..end)
                .rev()
                .find(|&i| view.get(i) == Some(self.start_token))
                .unwrap_or(0);
            if start > 0 {
                warn!("Dropped {} bytes of truncated radio packet", start);
                view.drop_front(start);
                self.stats.dropped_bytes += start as u64;
            }
            let end = end - start;

            if end == 1 {
                warn!("Dropped empty radio packet");
                view.drop_front(2);
                self.stats.empty_packets += 1;
                continue;
            }

            let payload = view.copy_range(1, end);
            view.drop_front(end + 1);
            self.stats.packets += 1;
            debug!("Framed radio packet: {}", String::from_utf8_lossy(&payload));
            return Some(payload);
        }
    }

    /// Discard dangling partial packets at either edge of the buffer.
    ///
    /// `clean_start` drops everything before the first start token;
    /// `clean_end` drops everything after the last end token. Returns the
    /// number of bytes removed.
    pub fn clean(&mut self, buffer: &RingBuffer, clean_start: bool, clean_end: bool) -> usize {
        let hold = buffer.hold();
        let mut view = hold.view();
        self.clean_edges(&mut view, clean_start, clean_end)
    }

    /// Clean both edges if bytes were lost since the last check.
    ///
    /// Returns the number of overrun bytes, zero when nothing was lost.
    pub fn recover_overrun(&mut self, buffer: &RingBuffer) -> usize {
        let hold = buffer.hold();
        let mut view = hold.view();
        self.recover_overrun_in(&mut view)
    }

    fn recover_overrun_in(&mut self, view: &mut RingView<'_>) -> usize {
        let overrun = view.take_overrun();
        if overrun == 0 {
            return 0;
        }

        warn!("Radio receive buffer overran, {} bytes lost", overrun);
        let dropped = self.clean_edges(view, true, true);
        debug!("Discarded {} bytes of partial packets after overrun", dropped);
        self.stats.overruns_recovered += 1;
        overrun
    }

    fn clean_edges(&mut self, view: &mut RingView<'_>, clean_start: bool, clean_end: bool) -> usize {
        let mut dropped = 0;
        if clean_start {
            dropped += self.skip_to_start(view);
        }
        if clean_end {
            let keep = (0..view.len())
                .rev()
                .find(|&i| view.get(i) == Some(self.end_token))
                .map_or(0, |i| i + 1);
            let tail = view.drop_back(view.len() - keep);
            self.stats.dropped_bytes += tail as u64;
            dropped += tail;
        }
        dropped
    }

    fn skip_to_start(&mut self, view: &mut RingView<'_>) -> usize {
        let leading = view
            .iter()
            .position(|b| b == self.start_token)
            .unwrap_or(view.len());
        if leading > 0 {
            debug!("Discarded {} bytes before start token", leading);
            view.drop_front(leading);
            self.stats.dropped_bytes += leading as u64;
        }
        leading
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use radio_protocol::{frame_payload, token};
    use ring_buffer::Append;
    use std::io;
    use std::sync::{Arc, Mutex};

    const S: u8 = token::START;
    const E: u8 = token::END;

    fn buffer_with(bytes: &[u8]) -> RingBuffer {
        let buffer = RingBuffer::new(256).unwrap();
        for &b in bytes {
            assert_eq!(buffer.append(b), Append::Stored);
        }
        buffer
    }

    /// Log output collected from a scoped subscriber
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn with_captured_logs<T>(f: impl FnOnce() -> T) -> (T, String) {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::WARN)
            .finish();
        let result = tracing::subscriber::with_default(subscriber, f);
        (result, logs.contents())
    }

    fn framer() -> PacketFramer {
        PacketFramer::new(S, E)
    }

    fn remaining(buffer: &RingBuffer) -> Vec<u8> {
        let hold = buffer.hold();
        let view = hold.view();
        let bytes = view.iter().collect();
        bytes
    }

    #[test]
    fn test_empty_buffer() {
        let buffer = RingBuffer::new(16).unwrap();
        assert_eq!(framer().extract_next(&buffer), None);
        assert!(!buffer.is_held());
    }

    #[test]
    fn test_single_packet() {
        let buffer = buffer_with(&[S, b'A', b'B', E]);
        let mut framer = framer();
        assert_eq!(framer.extract_next(&buffer), Some(b"AB".to_vec()));
        assert_eq!(framer.extract_next(&buffer), None);
        assert!(buffer.is_empty());
        assert_eq!(framer.stats().packets, 1);
    }

    #[test]
    fn test_duplicate_start_resyncs_on_latest() {
        let buffer = buffer_with(&[S, b'A', b'A', b'A', S, b'B', b'B', b'B', E]);
        let mut framer = framer();
        assert_eq!(framer.extract_next(&buffer), Some(b"BBB".to_vec()));
        assert_eq!(framer.extract_next(&buffer), None);
        assert_eq!(framer.stats().dropped_bytes, 4);
    }

    #[test]
    fn test_resync_drop_is_logged() {
        let buffer = buffer_with(&[S, b'A', b'A', b'A', S, b'B', b'B', b'B', E]);
        let mut framer = framer();
        let (payload, logs) = with_captured_logs(|| framer.extract_next(&buffer));
        assert_eq!(payload, Some(b"BBB".to_vec()));
        assert!(logs.contains("WARN"));
        assert!(logs.contains("Dropped 4 bytes of truncated radio packet"));
    }

    #[test]
    fn test_overrun_is_logged_with_byte_count() {
        let buffer = RingBuffer::new(4).unwrap();
        for &b in &[S, b'A', E, S, b'x', b'y'] {
            buffer.append(b);
        }
        let mut framer = framer();
        let (payload, logs) = with_captured_logs(|| framer.extract_next(&buffer));
        assert_eq!(payload, Some(b"A".to_vec()));
        assert!(logs.contains("Radio receive buffer overran, 2 bytes lost"));
    }

    #[test]
    fn test_empty_packet_is_skipped() {
        let buffer = buffer_with(&[S, E, S, b'X', b'Y', b'Z', E]);
        let mut framer = framer();
        assert_eq!(framer.extract_next(&buffer), Some(b"XYZ".to_vec()));
        assert_eq!(framer.extract_next(&buffer), None);
        assert_eq!(framer.stats().empty_packets, 1);
    }

    #[test]
    fn test_no_start_token_drops_everything() {
        let buffer = buffer_with(b"garbage");
        assert_eq!(framer().extract_next(&buffer), None);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_incomplete_packet_is_retained() {
        let buffer = buffer_with(&[b'x', b'y', S, b'V', b',', b'1']);
        let mut framer = framer();
        assert_eq!(framer.extract_next(&buffer), None);
        assert_eq!(remaining(&buffer), vec![S, b'V', b',', b'1']);

        for &b in &[b'2', E] {
            buffer.append(b);
        }
        assert_eq!(framer.extract_next(&buffer), Some(b"V,12".to_vec()));
    }

    #[test]
    fn test_lone_start_token_waits() {
        let buffer = buffer_with(&[S]);
        assert_eq!(framer().extract_next(&buffer), None);
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_caller_hold_is_kept() {
        let buffer = buffer_with(&[S, b'A', E]);
        let hold = buffer.hold();
        assert_eq!(framer().extract_next(&buffer), Some(b"A".to_vec()));
        assert!(buffer.is_held());
        drop(hold);
        assert!(!buffer.is_held());
    }

    #[test]
    fn test_extract_across_wrap_around() {
        let buffer = RingBuffer::new(8).unwrap();
        let mut framer = framer();
        for &b in &[S, b'1', b'2', b'3', E] {
            buffer.append(b);
        }
        assert_eq!(framer.extract_next(&buffer), Some(b"123".to_vec()));
        for &b in &[S, b'4', b'5', b'6', E] {
            buffer.append(b);
        }
        assert_eq!(framer.extract_next(&buffer), Some(b"456".to_vec()));
    }

    #[test]
    fn test_clean_edges() {
        let buffer = buffer_with(&[b'z', b'z', S, b'A', E, S, b'B']);
        let dropped = framer().clean(&buffer, true, true);
        assert_eq!(dropped, 4);
        assert_eq!(remaining(&buffer), vec![S, b'A', E]);
    }

    #[test]
    fn test_clean_only_end() {
        let buffer = buffer_with(&[b'z', S, b'A', E, b'q']);
        assert_eq!(framer().clean(&buffer, false, true), 1);
        assert_eq!(remaining(&buffer), vec![b'z', S, b'A', E]);
    }

    #[test]
    fn test_overrun_never_yields_partial_packet() {
        let buffer = RingBuffer::new(12).unwrap();
        let mut framer = framer();
        // One full packet then the start of one that will not fit
        for &b in &[S, b'O', b'K', E, S, b'P', b'A', b'R', b'T', b'I', b'A', b'L'] {
            buffer.append(b);
        }
        // Tail of the partial packet is lost
        for &b in &[b'_', b'1', E] {
            assert_eq!(buffer.append(b), Append::Overrun);
        }

        assert_eq!(framer.recover_overrun(&buffer), 3);
        assert_eq!(buffer.overrun_bytes(), 0);
        assert_eq!(framer.extract_next(&buffer), Some(b"OK".to_vec()));
        assert_eq!(framer.extract_next(&buffer), None);
        assert!(buffer.is_empty());
        assert_eq!(framer.stats().overruns_recovered, 1);
    }

    #[test]
    fn test_extraction_checks_overrun_itself() {
        let buffer = RingBuffer::new(8).unwrap();
        let mut framer = framer();
        for &b in &[S, b'O', b'K', E, S, b'P', b'A', b'R'] {
            assert_eq!(buffer.append(b), Append::Stored);
        }
        for &b in b"TIAL" {
            assert_eq!(buffer.append(b), Append::Overrun);
        }

        assert_eq!(framer.extract_next(&buffer), Some(b"OK".to_vec()));
        assert_eq!(buffer.overrun_bytes(), 0);

        // Producer refills with the end token that belonged to the lost tail
        assert_eq!(buffer.append(E), Append::Stored);
        assert_eq!(framer.extract_next(&buffer), None);
        assert!(buffer.is_empty());
        assert_eq!(framer.stats().overruns_recovered, 1);
    }

    #[test]
    fn test_overrun_between_extractions() {
        let buffer = RingBuffer::new(8).unwrap();
        let mut framer = framer();
        for &b in &[S, b'A', E, S, b'B', E, S, b'C'] {
            buffer.append(b);
        }
        assert_eq!(framer.extract_next(&buffer), Some(b"A".to_vec()));

        // Refill to full, lose the tail of the partial packet, then receive more
        for &b in &[b'C', b'C', b'C'] {
            buffer.append(b);
        }
        assert_eq!(buffer.append(b'C'), Append::Overrun);
        assert_eq!(framer.extract_next(&buffer), Some(b"B".to_vec()));
        for &b in &[E, S, b'D', E] {
            buffer.append(b);
        }

        assert_eq!(framer.extract_next(&buffer), Some(b"D".to_vec()));
        assert_eq!(framer.extract_next(&buffer), None);
    }

    #[test]
    fn test_no_overrun_is_noop() {
        let buffer = buffer_with(&[S, b'A']);
        assert_eq!(framer().recover_overrun(&buffer), 0);
        assert_eq!(buffer.len(), 2);
    }

    proptest! {
        #[test]
        fn test_back_to_back_packets_extracted_in_order(
            payloads in prop::collection::vec(
                prop::collection::vec(b'0'..=b'z', 1..20),
                0..10,
            )
        ) {
            let buffer = RingBuffer::new(512).unwrap();
            for payload in &payloads {
                for b in frame_payload(payload, S, E) {
                    prop_assert_eq!(buffer.append(b), Append::Stored);
                }
            }

            let mut framer = framer();
            for payload in &payloads {
                prop_assert_eq!(framer.extract_next(&buffer), Some(payload.clone()));
            }
            prop_assert_eq!(framer.extract_next(&buffer), None);
            prop_assert!(buffer.is_empty());
        }
    }
}
