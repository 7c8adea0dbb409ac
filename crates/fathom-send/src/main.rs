use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use fathom_core::config::Config;
use fathom_core::monitor::TracingMonitor;
use fathom_core::net::{DatagramChannel, UdpChannel};
use fathom_core::segmenter::Segments;
use fathom_core::sender::{Sender, SenderConfig};

/// Sends a file to a peer over a lossy datagram link.
#[derive(Parser)]
struct Args {
    /// Path to a TOML config file.
    config_path: PathBuf,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let config = Config::load(&args.config_path).context("loading configuration")?;
    config.validate_for_sender()?;

    let source_file = config.sender.source_file.clone().unwrap();
    let data = std::fs::read(&source_file)
        .with_context(|| format!("reading {}", source_file.display()))?;
    let segments = Segments::new(bytes::Bytes::from(data), config.max_packet_size as usize);

    let channel = UdpChannel::bind(config.network.bind_addr, config.network.peer_addr)
        .context("binding UDP socket")?;
    let channel: Arc<dyn DatagramChannel> = Arc::new(channel);

    let sender_config = SenderConfig {
        max_packet_size: config.max_packet_size,
        link_bandwidth: config.link_bandwidth,
        prop_delay_secs: config.network.prop_delay,
        initial_window: config.sender.window_size,
        thresh_max_factor: config.sender.thresh_max_factor,
        fast_retransmit_gap: config.sender.fast_retransmit_gap,
    };

    let sender = Sender::new(channel, sender_config);
    let monitor = TracingMonitor;
    let stats = sender.run(segments, &monitor)?;

    tracing::info!(
        packets_sent = stats.packets_sent,
        retransmissions = stats.retransmissions(),
        "transfer complete"
    );
    Ok(())
}
