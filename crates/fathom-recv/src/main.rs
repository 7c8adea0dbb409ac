use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use fathom_core::config::Config;
use fathom_core::monitor::TracingMonitor;
use fathom_core::net::{DatagramChannel, UdpChannel};
use fathom_core::receiver::{Receiver, ReceiverConfig};

/// Receives a file from a peer over a lossy datagram link.
#[derive(Parser)]
struct Args {
    /// Path to a TOML config file.
    config_path: PathBuf,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let config = Config::load(&args.config_path).context("loading configuration")?;
    config.validate_for_receiver()?;

    let channel = UdpChannel::bind(config.network.bind_addr, config.network.peer_addr)
        .context("binding UDP socket")?;
    let channel: Arc<dyn DatagramChannel> = Arc::new(channel);

    let receiver_config = ReceiverConfig {
        max_packet_size: config.max_packet_size,
        link_bandwidth: config.link_bandwidth,
        prop_delay_secs: config.network.prop_delay,
        write_location: config.receiver.write_location.clone().unwrap(),
        window_hint: Some(config.sender.window_size),
    };

    let receiver = Receiver::new(channel, receiver_config);
    let monitor = TracingMonitor;
    let stats = receiver.run(&monitor)?;

    tracing::info!(
        packets_delivered = stats.packets_delivered,
        duplicates = stats.duplicates,
        "transfer complete"
    );
    Ok(())
}
