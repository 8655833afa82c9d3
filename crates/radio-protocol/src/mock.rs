//! In-memory radio link for tests and hardware-free runs

use crate::error::LinkError;
use crate::link::SerialLink;
use ring_buffer::ByteSource;
use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

#[derive(Default)]
struct MockState {
    /// Bytes waiting to be read, as if received over the air
    rx: VecDeque<u8>,
    /// Everything written to the module
    tx: Vec<u8>,
    /// Scripted module replies: exact write -> bytes queued for reading
    responses: Vec<(Vec<u8>, Vec<u8>)>,
    flushes: usize,
    fail_writes: bool,
}

/// Scripted stand-in for a radio module on a serial port.
///
/// Clones share state, so one clone can be handed to the receive producer
/// while another is used for sending and command mode.
#[derive(Clone, Default)]
pub struct MockLink {
    state: Arc<Mutex<MockState>>,
}

impl MockLink {
    /// Create a mock link with nothing queued
    pub fn new() -> Self {
        debug!("Creating mock radio link");
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue bytes as if they had arrived over the air
    pub fn inject(&self, bytes: &[u8]) {
        self.state().rx.extend(bytes.iter().copied());
    }

    /// Reply with `response` whenever exactly `request` is written
    pub fn respond_to(&self, request: &[u8], response: &[u8]) {
        self.state()
            .responses
            .push((request.to_vec(), response.to_vec()));
    }

    /// Everything written so far
    pub fn written(&self) -> Vec<u8> {
        self.state().tx.clone()
    }

    /// Everything written so far, clearing the record
    pub fn take_written(&self) -> Vec<u8> {
        std::mem::take(&mut self.state().tx)
    }

    /// Bytes still waiting to be read
    pub fn pending_rx(&self) -> usize {
        self.state().rx.len()
    }

    /// Number of flush calls
    pub fn flush_count(&self) -> usize {
        self.state().flushes
    }

    /// Make subsequent writes fail
    pub fn fail_writes(&self, fail: bool) {
        self.state().fail_writes = fail;
    }
}

impl ByteSource for MockLink {
    fn available(&mut self) -> usize {
        self.state().rx.len()
    }

    fn read_into(&mut self, buf: &mut [u8]) -> usize {
        self.state().rx.read_into(buf)
    }

    fn discard(&mut self) -> usize {
        self.state().rx.discard()
    }
}

impl SerialLink for MockLink {
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), LinkError> {
        let mut state = self.state();
        if state.fail_writes {
            return Err(LinkError::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "mock link write failure",
            )));
        }
        state.tx.extend_from_slice(bytes);
        let replies: Vec<Vec<u8>> = state
            .responses
            .iter()
            .filter(|(request, _)| request.as_slice() == bytes)
            .map(|(_, response)| response.clone())
            .collect();
        for reply in replies {
            state.rx.extend(reply);
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), LinkError> {
        self.state().flushes += 1;
        Ok(())
    }
}
