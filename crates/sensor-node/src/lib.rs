//! Sensor Node Radio Service
//!
//! Wires the radio transport to a serial port and runs the node main loop:
//! poll the transport on a fixed period until shutdown is requested.

mod settings;
mod uplink;

pub use settings::{NodeConfig, StaticIdentity, ENV_PREFIX};
pub use uplink::{LoggingUplink, UplinkRecord};

use anyhow::{Context, Result};
use radio_protocol::{MockLink, SerialLink, SerialPortLink};
use radio_transport::{NodeIdentity, Transport, Uplink};
use ring_buffer::ByteSource;
use std::future::Future;
use tracing::{debug, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Initialize logging
pub fn init_logging(config: &NodeConfig) -> Result<()> {
    let level: Level = config
        .log_level
        .parse()
        .with_context(|| format!("Invalid log level {:?}", config.log_level))?;

    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true);
    let installed = if config.log_json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    };
    installed.context("Failed to set tracing subscriber")
}

/// Run the node until Ctrl-C
pub async fn run(config: NodeConfig) -> Result<()> {
    let identity = StaticIdentity::from_config(&config);
    let uplink = LoggingUplink::new(config.remote_server.clone());

    if config.mock_radio {
        warn!("Using in-memory radio, no serial port will be opened");
        let link = MockLink::new();
        serve(link.clone(), link, uplink, identity, &config, ctrl_c()).await?;
        return Ok(());
    }

    let link = SerialPortLink::open(&config.transport.serial)
        .context("Failed to open radio serial port")?;
    let source = link
        .try_clone()
        .context("Failed to open receive handle on radio serial port")?;
    serve(link, source, uplink, identity, &config, ctrl_c()).await?;
    Ok(())
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
    }
}

/// Poll the radio until `shutdown` completes, then hand back the stopped transport
async fn serve<L, S, U, I, F>(
    link: L,
    source: S,
    uplink: U,
    identity: I,
    config: &NodeConfig,
    shutdown: F,
) -> Result<Transport<L, U, I>>
where
    L: SerialLink,
    S: ByteSource + Send + 'static,
    U: Uplink,
    I: NodeIdentity,
    F: Future<Output = ()>,
{
    let mut transport = Transport::new(link, uplink, identity, config.transport.clone())?;

    if config.provision_on_start && !transport.provision_from_identity().await {
        warn!("Radio provisioning failed, continuing with stored module settings");
    }

    let receiver = transport.spawn_receiver(source);
    let mut ticker = tokio::time::interval(transport.config().poll_interval());
    tokio::pin!(shutdown);

    info!(
        "Node {} serving network {}",
        transport.identity().device_id(),
        transport.identity().network_id()
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let report = transport.poll();
                if report.packets > 0 || report.overrun > 0 {
                    debug!(?report, "Radio poll");
                }
            }
            _ = &mut shutdown => {
                info!("Shutdown requested");
                break;
            }
        }
    }

    let skipped = receiver.skipped_cycles();
    receiver.shutdown().await;
    let stats = transport.framer_stats();
    info!(
        "Radio stopped: {} packets, {} bytes dropped, {} overruns, {} ignored, {} receiver ticks skipped",
        stats.packets,
        stats.dropped_bytes,
        stats.overruns_recovered,
        transport.ignored_packets(),
        skipped
    );
    Ok(transport)
}
