//! End-to-end transfers over the in-memory lossy link, covering the
//! scenarios and boundary behaviors the transfer protocol is expected to
//! satisfy: baseline delivery, uniform drop, reorder-only, a repeatedly
//! lost final packet, a single-packet file, an empty file, and duplicate
//! arrivals.

use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use fathom_core::error::TransferError;
use fathom_core::monitor::NullMonitor;
use fathom_core::net::DatagramChannel;
use fathom_core::receiver::{Receiver, ReceiverConfig};
use fathom_core::sender::{Sender, SenderConfig};
use fathom_core::wire::{decode_any, Datagram};
use fathom_sim::{lossy_pair, LinkConfig};

fn sender_config() -> SenderConfig {
    SenderConfig {
        max_packet_size: 64,
        link_bandwidth: 50_000,
        prop_delay_secs: 0.001,
        initial_window: 4,
        thresh_max_factor: 1.25,
        fast_retransmit_gap: 2,
    }
}

fn receiver_config(write_location: std::path::PathBuf) -> ReceiverConfig {
    ReceiverConfig {
        max_packet_size: 64,
        link_bandwidth: 50_000,
        prop_delay_secs: 0.001,
        write_location,
        window_hint: Some(4),
    }
}

fn run_transfer(
    data: &[u8],
    data_link: LinkConfig,
    ack_link: LinkConfig,
) -> (Vec<u8>, fathom_core::stats::SenderStats, fathom_core::stats::ReceiverStats) {
    let dir = tempfile::tempdir().unwrap();
    let src_path = dir.path().join("src.bin");
    std::fs::File::create(&src_path).unwrap().write_all(data).unwrap();
    let out_path = dir.path().join("out.bin");

    let (sender_chan, receiver_chan) = lossy_pair(data_link, ack_link);
    let sender_chan: Arc<dyn DatagramChannel> = Arc::new(sender_chan);
    let receiver_chan: Arc<dyn DatagramChannel> = Arc::new(receiver_chan);

    let segments = fathom_core::segmenter::Segments::new(
        bytes::Bytes::from(data.to_vec()),
        sender_config().max_packet_size as usize,
    );

    let recv_cfg = receiver_config(out_path.clone());
    let receiver = Receiver::new(receiver_chan, recv_cfg);
    let recv_thread = std::thread::spawn(move || receiver.run(&NullMonitor));

    let sender = Sender::new(sender_chan, sender_config());
    let sender_stats = sender.run(segments, &NullMonitor).expect("sender failed");

    let receiver_stats = recv_thread
        .join()
        .expect("receiver thread panicked")
        .expect("receiver failed");

    let output = std::fs::read(&out_path).unwrap();
    (output, sender_stats, receiver_stats)
}

#[test]
fn baseline_no_loss() {
    let data = b"the quick brown fox jumps over the lazy dog, repeated many times to span several packets. ".repeat(8);
    let (output, _sender_stats, _receiver_stats) =
        run_transfer(&data, LinkConfig::lossless(1), LinkConfig::lossless(2));
    assert_eq!(output, data);
}

#[test]
fn uniform_ten_percent_drop() {
    let data = b"ten percent of these datagrams will vanish into the ether. ".repeat(12);
    let data_link = LinkConfig {
        drop_percent: 0.1,
        ..LinkConfig::lossless(11)
    };
    let (output, sender_stats, _) = run_transfer(&data, data_link, LinkConfig::lossless(12));
    assert_eq!(output, data);
    assert!(sender_stats.retransmissions() > 0);
}

#[test]
fn reorder_only_twenty_percent() {
    let data = b"these packets arrive swapped with their neighbor sometimes. ".repeat(10);
    let data_link = LinkConfig {
        reorder_percent: 0.2,
        ..LinkConfig::lossless(21)
    };
    let (output, _, _) = run_transfer(&data, data_link, LinkConfig::lossless(22));
    assert_eq!(output, data);
}

#[test]
fn single_packet_file() {
    let data = b"short".to_vec();
    let (output, sender_stats, receiver_stats) =
        run_transfer(&data, LinkConfig::lossless(31), LinkConfig::lossless(32));
    assert_eq!(output, data);
    assert_eq!(sender_stats.packets_sent, 1);
    assert_eq!(receiver_stats.packets_delivered, 1);
}

#[test]
fn empty_file() {
    let data: Vec<u8> = Vec::new();
    let (output, _, _) = run_transfer(&data, LinkConfig::lossless(41), LinkConfig::lossless(42));
    assert_eq!(output, data);
}

#[test]
fn duplicate_arrivals_do_not_duplicate_writes() {
    let data = b"every datagram shows up twice on this link. ".repeat(6);
    let data_link = LinkConfig {
        duplicate_percent: 1.0,
        ..LinkConfig::lossless(51)
    };
    let (output, _, receiver_stats) = run_transfer(&data, data_link, LinkConfig::lossless(52));
    assert_eq!(output, data);
    assert!(receiver_stats.duplicates > 0);
    assert_eq!(receiver_stats.packets_delivered as usize, output.len().div_ceil(64));
}

/// Wraps a channel so the datagram carrying `target_seq` is silently
/// dropped the first `max_drops` times it is sent, then allowed through —
/// modeling a final packet that is lost repeatedly before landing.
struct DropSeqNTimes<C> {
    inner: C,
    target_seq: u64,
    max_drops: usize,
    drops_done: Mutex<usize>,
}

impl<C: DatagramChannel> DatagramChannel for DropSeqNTimes<C> {
    fn send(&self, buf: &[u8]) -> Result<(), TransferError> {
        if let Ok(Datagram::Data(packet)) = decode_any(buf) {
            if packet.seq == self.target_seq {
                let mut drops = self.drops_done.lock().unwrap();
                if *drops < self.max_drops {
                    *drops += 1;
                    return Ok(());
                }
            }
        }
        self.inner.send(buf)
    }

    fn recv(&self, buf: &mut [u8], timeout: Duration) -> Result<usize, TransferError> {
        self.inner.recv(buf, timeout)
    }
}

#[test]
fn last_packet_lost_repeatedly_still_completes() {
    let data = b"everything arrives except the very last packet, which takes four tries. ".repeat(4);
    let max_packet_size = sender_config().max_packet_size as usize;
    let total = (data.len().max(1)).div_ceil(max_packet_size) as u64;
    let target_seq = total - 1;

    let dir = tempfile::tempdir().unwrap();
    let out_path = dir.path().join("out.bin");

    let (sender_chan, receiver_chan) = lossy_pair(LinkConfig::lossless(61), LinkConfig::lossless(62));
    let sender_chan: Arc<dyn DatagramChannel> = Arc::new(DropSeqNTimes {
        inner: sender_chan,
        target_seq,
        max_drops: 3,
        drops_done: Mutex::new(0),
    });
    let receiver_chan: Arc<dyn DatagramChannel> = Arc::new(receiver_chan);

    let segments = fathom_core::segmenter::Segments::new(bytes::Bytes::from(data.clone()), max_packet_size);
    let recv_cfg = receiver_config(out_path.clone());
    let receiver = Receiver::new(receiver_chan, recv_cfg);
    let recv_thread = std::thread::spawn(move || receiver.run(&NullMonitor));

    let sender = Sender::new(sender_chan, sender_config());
    let sender_stats = sender.run(segments, &NullMonitor).expect("sender failed");
    let _ = recv_thread.join().expect("receiver thread panicked").expect("receiver failed");

    let output = std::fs::read(&out_path).unwrap();
    assert_eq!(output, data);
    assert!(sender_stats.timeout_retransmits >= 1);
}
