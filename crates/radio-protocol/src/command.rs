//! AT Command-Mode Driver
//!
//! Provisioning talks to the radio module itself rather than through it. The
//! module only treats `+++` as an escape sequence when it is surrounded by
//! at least one second of line silence on both sides (the guard time);
//! otherwise the characters are sent over the air as ordinary data. After
//! `OK`, each `AT<name> [value]\r` line reads or changes a register until
//! `ATCN` returns the module to transparent mode.
//!
//! The module offers no completion signal, so every step waits a fixed time
//! and then reads whatever has arrived. A silent or confused module therefore
//! yields an error after the configured waits, never a hang.

use crate::error::CommandError;
use crate::link::SerialLink;
use ring_buffer::ByteSource;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Escape sequence that switches the module into command mode
pub const GUARD_SEQUENCE: &[u8] = b"+++";

/// Acknowledgment returned by the module
pub const ACK: &[u8] = b"OK";

/// Largest response read back from one command
const MAX_RESPONSE_LEN: usize = 64;

/// Fixed waits used by the command-mode exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandTiming {
    /// Line silence required before and after `+++` (module default is 1 s)
    pub guard_time: Duration,
    /// Wait after a write/apply command before reading its acknowledgment
    pub response_wait: Duration,
    /// Wait after a register query before reading its value
    pub query_wait: Duration,
}

impl Default for CommandTiming {
    fn default() -> Self {
        Self {
            guard_time: Duration::from_millis(1100),
            response_wait: Duration::from_millis(100),
            query_wait: Duration::from_millis(200),
        }
    }
}

/// Mesh role programmed into the module's coordinator-enable register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RadioRole {
    /// Forms the network and collects traffic from the field
    Coordinator,
    /// Battery-powered field node
    EndDevice,
}

impl RadioRole {
    /// Value written to the `CE` register
    pub fn register_value(&self) -> &'static str {
        match self {
            RadioRole::Coordinator => "1",
            RadioRole::EndDevice => "0",
        }
    }

    /// Role for a node that either is or is not the coordinator
    pub fn from_coordinator(coordinator: bool) -> Self {
        if coordinator {
            RadioRole::Coordinator
        } else {
            RadioRole::EndDevice
        }
    }
}

/// Blocking request/response driver for the module's AT command mode.
///
/// The caller must make sure no application traffic is in flight: command
/// responses are indistinguishable from data to the packet framer.
pub struct CommandModeDriver<'a, L: SerialLink> {
    link: &'a mut L,
    timing: CommandTiming,
}

impl<'a, L: SerialLink> CommandModeDriver<'a, L> {
    /// Create a driver over an idle link
    pub fn new(link: &'a mut L, timing: CommandTiming) -> Self {
        Self { link, timing }
    }

    /// Read whatever the module has sent so far
    fn read_response(&mut self) -> Vec<u8> {
        let available = self.link.available().min(MAX_RESPONSE_LEN);
        let mut response = vec![0u8; available];
        let n = self.link.read_into(&mut response);
        response.truncate(n);
        response
    }

    fn expect_ack(&mut self, stage: &'static str) -> Result<(), CommandError> {
        let response = self.read_response();
        self.link.discard();
        if response.starts_with(ACK) {
            debug!("Radio acknowledged {}", stage);
            Ok(())
        } else {
            let received = String::from_utf8_lossy(&response).trim_end().to_string();
            warn!("Radio did not acknowledge {} (got {:?})", stage, received);
            Err(CommandError::NoAcknowledgment { stage, received })
        }
    }

    fn send_command(&mut self, command: &str) -> Result<(), CommandError> {
        debug!("Radio command: {}", command);
        self.link.write_all(format!("{command}\r").as_bytes())?;
        self.link.flush()?;
        Ok(())
    }

    /// Switch the module into command mode
    pub async fn enter_command_mode(&mut self) -> Result<(), CommandError> {
        sleep(self.timing.guard_time).await;
        self.link.discard();
        self.link.write_all(GUARD_SEQUENCE)?;
        self.link.flush()?;
        sleep(self.timing.guard_time).await;
        self.expect_ack("+++")
    }

    /// Persist the current register values (`ATWR`)
    pub async fn write_settings(&mut self) -> Result<(), CommandError> {
        self.send_command("ATWR")?;
        sleep(self.timing.response_wait).await;
        self.expect_ack("ATWR")
    }

    /// Leave command mode (`ATCN`)
    pub async fn exit_command_mode(&mut self) -> Result<(), CommandError> {
        self.send_command("ATCN")?;
        sleep(self.timing.response_wait).await;
        self.expect_ack("ATCN")
    }

    /// Read one register (`AT<name>`), returning the module's reply
    pub async fn query_setting(&mut self, name: &str) -> Result<String, CommandError> {
        self.enter_command_mode().await?;
        self.send_command(&format!("AT{name}"))?;
        sleep(self.timing.query_wait).await;
        let response = self.read_response();
        let value = String::from_utf8_lossy(&response).trim().to_string();
        debug!("Radio register {} = {:?}", name, value);
        self.exit_command_mode().await?;
        Ok(value)
    }

    /// Change one register (`AT<name> <value>`), persist it and leave command mode
    pub async fn update_setting(&mut self, name: &str, value: &str) -> Result<(), CommandError> {
        self.enter_command_mode().await?;
        self.send_command(&format!("AT{name} {value}"))?;
        sleep(self.timing.response_wait).await;
        // Echo/ack of the register write is not checked, only ATWR and ATCN
        self.link.discard();

        if let Err(err) = self.write_settings().await {
            // Leave command mode even though the write failed
            let _ = self.exit_command_mode().await;
            return Err(err);
        }
        self.exit_command_mode().await
    }

    /// Join `network_id` and take on `role`.
    ///
    /// The module drops to end-device first so it never coordinates a
    /// network it is still leaving.
    pub async fn provision(&mut self, network_id: &str, role: RadioRole) -> Result<(), CommandError> {
        info!("Provisioning radio: network {} as {:?}", network_id, role);
        self.update_setting("CE", RadioRole::EndDevice.register_value()).await?;
        self.update_setting("ID", network_id).await?;
        self.update_setting("CE", role.register_value()).await?;
        info!("Radio provisioned");
        Ok(())
    }

    /// Low word of the module's 64-bit serial number (`ATSL`)
    pub async fn read_hardware_address(&mut self) -> Result<String, CommandError> {
        self.query_setting("SL").await
    }

    /// Network identifier currently programmed (`ATID`)
    pub async fn read_network_id(&mut self) -> Result<String, CommandError> {
        self.query_setting("ID").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockLink;

    fn cooperative_module() -> MockLink {
        let link = MockLink::new();
        link.respond_to(b"+++", b"OK\r");
        link.respond_to(b"ATWR\r", b"OK\r");
        link.respond_to(b"ATCN\r", b"OK\r");
        link
    }

    #[tokio::test(start_paused = true)]
    async fn test_enter_command_mode() {
        let mut link = cooperative_module();
        let mut driver = CommandModeDriver::new(&mut link, CommandTiming::default());
        driver.enter_command_mode().await.unwrap();
        assert_eq!(link.written(), b"+++");
        assert_eq!(link.pending_rx(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_enter_waits_guard_time_on_both_sides() {
        let mut link = cooperative_module();
        let timing = CommandTiming::default();
        let started = tokio::time::Instant::now();
        CommandModeDriver::new(&mut link, timing)
            .enter_command_mode()
            .await
            .unwrap();
        assert!(started.elapsed() >= timing.guard_time * 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_ack_is_reported() {
        let mut link = MockLink::new();
        link.respond_to(b"+++", b"ERROR\r");
        let mut driver = CommandModeDriver::new(&mut link, CommandTiming::default());

        let err = driver.enter_command_mode().await.unwrap_err();
        match err {
            CommandError::NoAcknowledgment { stage, received } => {
                assert_eq!(stage, "+++");
                assert_eq!(received, "ERROR");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_module_fails_without_hanging() {
        let mut link = MockLink::new();
        let mut driver = CommandModeDriver::new(&mut link, CommandTiming::default());
        let result = tokio::time::timeout(
            Duration::from_secs(10),
            driver.update_setting("ID", "ABCD"),
        )
        .await;
        assert!(matches!(result, Ok(Err(CommandError::NoAcknowledgment { .. }))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_setting_sequence() {
        let mut link = cooperative_module();
        link.respond_to(b"ATID ABCD\r", b"OK\r");
        CommandModeDriver::new(&mut link, CommandTiming::default())
            .update_setting("ID", "ABCD")
            .await
            .unwrap();
        assert_eq!(link.written(), b"+++ATID ABCD\rATWR\rATCN\r");
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_write_still_exits_command_mode() {
        let mut link = MockLink::new();
        link.respond_to(b"+++", b"OK\r");
        link.respond_to(b"ATCN\r", b"OK\r");
        let result = CommandModeDriver::new(&mut link, CommandTiming::default())
            .update_setting("ID", "ABCD")
            .await;
        assert!(matches!(
            result,
            Err(CommandError::NoAcknowledgment { stage: "ATWR", .. })
        ));
        assert!(link.written().ends_with(b"ATCN\r"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_query_setting_returns_trimmed_value() {
        let mut link = cooperative_module();
        link.respond_to(b"ATSL\r", b"40A1B2C3\r");
        let value = CommandModeDriver::new(&mut link, CommandTiming::default())
            .read_hardware_address()
            .await
            .unwrap();
        assert_eq!(value, "40A1B2C3");
    }

    #[tokio::test(start_paused = true)]
    async fn test_provision_order() {
        let mut link = cooperative_module();
        CommandModeDriver::new(&mut link, CommandTiming::default())
            .provision("BEEF", RadioRole::Coordinator)
            .await
            .unwrap();
        let written = String::from_utf8(link.written()).unwrap();
        let ce0 = written.find("ATCE 0\r").unwrap();
        let id = written.find("ATID BEEF\r").unwrap();
        let ce1 = written.find("ATCE 1\r").unwrap();
        assert!(ce0 < id && id < ce1);
        assert_eq!(written.matches("ATWR\r").count(), 3);
    }
}
