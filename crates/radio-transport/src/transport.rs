//! Radio Transport
//!
//! The consumer side of the mesh link. One [`Transport`] owns the transmit
//! handle of the serial port, the framer and the dispatcher; a [`Receiver`]
//! task owns the receive handle and feeds the shared ring buffer.
//!
//! The main loop calls [`Transport::poll`] once per iteration. Sends and
//! command-mode provisioning block the loop for fixed intervals because the
//! radio module reports neither transmission nor command completion.

use crate::collaborators::{NodeIdentity, Uplink};
use crate::config::TransportConfig;
use crate::dispatcher::{PacketDispatcher, TransportEvent};
use crate::error::TransportError;
use crate::framer::{FramerStats, PacketFramer};
use crate::receiver::Receiver;
use radio_protocol::{
    frame_payload, CommandModeDriver, DeviceConfiguration, Packet, RadioRole, RateChange,
    SensorReading, SerialLink,
};
use ring_buffer::{ByteSource, RingBuffer};
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// What one call to [`Transport::poll`] did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollReport {
    /// Bytes pulled from the link by the consumer itself
    pub drained: usize,
    /// Bytes lost to overrun since the previous poll
    pub overrun: usize,
    /// Packets framed
    pub packets: usize,
    /// Events produced and handed to the uplink
    pub events: usize,
}

/// Send path, receive dispatch and radio provisioning for one node
pub struct Transport<L, U, I>
where
    L: SerialLink,
    U: Uplink,
    I: NodeIdentity,
{
    link: L,
    buffer: Arc<RingBuffer>,
    framer: PacketFramer,
    dispatcher: PacketDispatcher,
    uplink: U,
    identity: I,
    config: TransportConfig,
}

impl<L, U, I> Transport<L, U, I>
where
    L: SerialLink,
    U: Uplink,
    I: NodeIdentity,
{
    /// Create a transport over `link` with an empty receive buffer
    pub fn new(link: L, uplink: U, identity: I, config: TransportConfig) -> Result<Self, TransportError> {
        config.validate()?;
        let buffer = Arc::new(RingBuffer::new(config.buffer_capacity)?);
        info!(
            "Radio transport ready: {} byte buffer, node {} ({})",
            config.buffer_capacity,
            identity.device_id(),
            if identity.is_coordinator() { "coordinator" } else { "leaf" }
        );

        Ok(Self {
            link,
            buffer,
            framer: PacketFramer::new(config.start_token, config.end_token),
            dispatcher: PacketDispatcher::new(),
            uplink,
            identity,
            config,
        })
    }

    /// Shared receive buffer, for the producer side
    pub fn buffer(&self) -> Arc<RingBuffer> {
        Arc::clone(&self.buffer)
    }

    /// Start a receiver task feeding this transport's buffer from `source`
    pub fn spawn_receiver<S>(&self, source: S) -> Receiver
    where
        S: ByteSource + Send + 'static,
    {
        Receiver::spawn(self.buffer(), source, self.config.read_interval())
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    pub fn identity(&self) -> &I {
        &self.identity
    }

    pub fn uplink(&self) -> &U {
        &self.uplink
    }

    pub fn uplink_mut(&mut self) -> &mut U {
        &mut self.uplink
    }

    /// Framing counters
    pub fn framer_stats(&self) -> FramerStats {
        self.framer.stats()
    }

    /// Packets dropped at dispatch as foreign or malformed
    pub fn ignored_packets(&self) -> u64 {
        self.dispatcher.ignored()
    }

    /// Frame `message` and transmit it.
    ///
    /// The framed bytes go out in one write so the module can put them in a
    /// single air frame, then the link is flushed and the post-flush delay
    /// elapses. There is no acknowledgment or retry.
    pub async fn send(&mut self, message: &[u8]) -> Result<(), TransportError> {
        let framed = frame_payload(message, self.config.start_token, self.config.end_token);
        debug!("Radio send: {}", String::from_utf8_lossy(message));
        self.link.write_all(&framed)?;
        self.link.flush()?;
        sleep(self.config.post_flush_delay()).await;
        Ok(())
    }

    /// Encode and transmit a packet
    pub async fn send_packet(&mut self, packet: &Packet) -> Result<(), TransportError> {
        self.send(&packet.encode()).await
    }

    /// Drain, frame and dispatch everything currently received
    pub fn poll(&mut self) -> PollReport {
        let mut report = PollReport::default();

        {
            let hold = self.buffer.hold();
            report.drained = hold.view().drain_from(&mut self.link).stored;
            report.overrun = self.framer.recover_overrun(&self.buffer);
        }

        while let Some(payload) = self.framer.extract_next(&self.buffer) {
            report.packets += 1;
            if let Some(event) = self.dispatcher.dispatch(&payload) {
                report.events += 1;
                self.deliver(&event);
            }
        }
        report
    }

    fn deliver(&mut self, event: &TransportEvent) -> bool {
        let (kind, delivered) = match event {
            TransportEvent::Reading(reading) => ("reading", self.uplink.submit_reading(reading)),
            TransportEvent::RateChange(change) => ("rate change", self.uplink.submit_rate_change(change)),
            TransportEvent::Configuration(configuration) => {
                ("configuration", self.uplink.submit_configuration(configuration))
            }
        };
        if !delivered {
            warn!("Uplink did not accept {} event", kind);
        }
        delivered
    }

    async fn forward(&mut self, packet: &Packet) -> bool {
        match self.send_packet(packet).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to send {} packet: {}", packet.tag().as_char(), e);
                false
            }
        }
    }

    /// Report a locally taken reading.
    ///
    /// The coordinator hands it to the uplink; a leaf sends it over the
    /// radio and then waits for the mesh to settle.
    pub async fn report_reading(&mut self, reading: SensorReading) -> bool {
        if self.identity.is_coordinator() {
            return self.deliver(&TransportEvent::Reading(reading));
        }
        let sent = self.forward(&reading.to_packet()).await;
        sleep(self.config.reading_settle()).await;
        sent
    }

    /// Report a local sampling rate change
    pub async fn report_rate_change(&mut self, change: RateChange) -> bool {
        if self.identity.is_coordinator() {
            return self.deliver(&TransportEvent::RateChange(change));
        }
        let sent = self.forward(&change.to_packet()).await;
        sleep(self.config.rate_settle()).await;
        sent
    }

    /// Report a device configuration.
    ///
    /// A leaf sends the `S` half, waits the settings gap, then sends `T`.
    pub async fn report_configuration(&mut self, configuration: DeviceConfiguration) -> bool {
        if self.identity.is_coordinator() {
            return self.deliver(&TransportEvent::Configuration(configuration));
        }
        let (identity, schedule) = configuration.split();
        let identity_sent = self.forward(&identity.to_packet()).await;
        sleep(self.config.settings_gap()).await;
        let schedule_sent = self.forward(&schedule.to_packet()).await;
        identity_sent && schedule_sent
    }

    /// Program the module to join `network_id` with `role`.
    ///
    /// The receive buffer is held for the whole exchange so the producer
    /// cannot swallow command responses. Failure is logged and reported as
    /// `false`; there is no retry.
    pub async fn configure_device(&mut self, network_id: &str, role: RadioRole) -> bool {
        let buffer = Arc::clone(&self.buffer);
        let _hold = buffer.hold();
        let result = CommandModeDriver::new(&mut self.link, self.config.command_timing())
            .provision(network_id, role)
            .await;

        match result {
            Ok(()) => true,
            Err(e) => {
                warn!("Radio configuration failed: {}", e);
                false
            }
        }
    }

    /// Provision the module from the node identity
    pub async fn provision_from_identity(&mut self) -> bool {
        let network_id = self.identity.network_id();
        let role = RadioRole::from_coordinator(self.identity.is_coordinator());
        self.configure_device(&network_id, role).await
    }

    /// Low word of the module serial number
    pub async fn read_hardware_address(&mut self) -> Result<String, TransportError> {
        let buffer = Arc::clone(&self.buffer);
        let _hold = buffer.hold();
        let address = CommandModeDriver::new(&mut self.link, self.config.command_timing())
            .read_hardware_address()
            .await?;
        Ok(address)
    }

    /// Network identifier the module is currently joined to
    pub async fn read_network_id(&mut self) -> Result<String, TransportError> {
        let buffer = Arc::clone(&self.buffer);
        let _hold = buffer.hold();
        let network_id = CommandModeDriver::new(&mut self.link, self.config.command_timing())
            .read_network_id()
            .await?;
        Ok(network_id)
    }
}
