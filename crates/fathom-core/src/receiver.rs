//! # Receiver state machine
//!
//! Two threads: a network-recv loop that decodes datagrams, deduplicates
//! and re-ACKs through a shared [`ReassemblyBuffer`], and a writer loop
//! that appends in-order runs to the output file as they become ready.
//! Decoupling network and disk I/O this way means a slow write never
//! stalls the ACK clock the sender is timing against.
//!
//! `RECEIVING → DRAINING → FINISHED`: the network loop moves to draining
//! once the reassembly buffer reports completion, continues re-ACKing
//! late duplicates for a bounded window, and finishes on the first
//! recv-timeout that spans what's left of that window.

use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossbeam_channel::{bounded, Sender as ChannelSender};
use quanta::Instant;

use crate::buffers::ReassemblyBuffer;
use crate::error::TransferError;
use crate::monitor::{Role, TransferMonitor};
use crate::net::DatagramChannel;
use crate::stats::{ReceiverStats, TransferSummary};
use crate::wire::{decode_any, Ack, Datagram, Packet};

#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    pub max_packet_size: u64,
    pub link_bandwidth: u64,
    pub prop_delay_secs: f64,
    pub write_location: PathBuf,
    /// Seeds the drain-phase duration as `window_hint * rtt_est`. `None`
    /// falls back to `3 * rtt_est`.
    pub window_hint: Option<u32>,
}

impl ReceiverConfig {
    /// `rtt_est` seed per §4.6: one packet's transmission time plus a
    /// round trip of propagation delay. This is the quantity the drain
    /// phase scales by, not the RTO derived from it.
    fn initial_rtt_est(&self) -> Duration {
        let rtt_est = (self.max_packet_size as f64 / self.link_bandwidth as f64)
            + 2.0 * self.prop_delay_secs;
        Duration::from_secs_f64(rtt_est.max(0.0))
    }

    fn initial_rto(&self) -> Duration {
        self.initial_rtt_est() * 4
    }

    fn drain_duration(&self) -> Duration {
        match self.window_hint {
            Some(hint) if hint > 0 => self.initial_rtt_est() * hint,
            _ => self.initial_rtt_est() * 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReceiverState {
    Receiving = 0,
    Draining = 1,
    Finished = 2,
}

pub struct Receiver {
    channel: Arc<dyn DatagramChannel>,
    config: ReceiverConfig,
}

impl Receiver {
    pub fn new(channel: Arc<dyn DatagramChannel>, config: ReceiverConfig) -> Self {
        Receiver { channel, config }
    }

    pub fn run(&self, monitor: &dyn TransferMonitor) -> Result<ReceiverStats, TransferError> {
        monitor.on_start(Role::Receiver, 0, 0);
        let start = Instant::now();

        let file = std::fs::File::create(&self.config.write_location)?;
        let reassembly = Arc::new(Mutex::new(ReassemblyBuffer::new()));
        let stats = Arc::new(Mutex::new(ReceiverStats::new()));
        let state = Arc::new(AtomicU8::new(ReceiverState::Receiving as u8));

        let (write_tx, write_rx) = bounded::<Vec<Packet>>(64);

        let total_bytes = std::sync::Arc::new(std::sync::atomic::AtomicU64::new(0));

        let result = std::thread::scope(|scope| -> Result<(), TransferError> {
            let writer_stats = Arc::clone(&stats);
            let writer = scope.spawn(move || -> Result<(), TransferError> {
                let mut file = file;
                for batch in write_rx {
                    for packet in batch {
                        file.write_all(&packet.payload)?;
                        writer_stats.lock().unwrap().packets_delivered += 1;
                    }
                }
                file.flush()?;
                Ok(())
            });

            let net_result = self.run_network_loop(
                &reassembly,
                &stats,
                &state,
                &write_tx,
                &total_bytes,
                monitor,
            );
            drop(write_tx);
            writer.join().expect("writer thread panicked")?;
            net_result
        });

        result?;
        state.store(ReceiverState::Finished as u8, Ordering::SeqCst);

        let final_stats = stats.lock().unwrap().clone();
        let summary = TransferSummary {
            total_bytes: total_bytes.load(Ordering::SeqCst),
            total_packets: final_stats.packets_delivered,
            elapsed_secs: start.elapsed().as_secs_f64(),
            overhead_bytes: final_stats.acks_sent * 6,
        };
        monitor.on_end(Role::Receiver, &summary);
        Ok(final_stats)
    }

    fn run_network_loop(
        &self,
        reassembly: &Arc<Mutex<ReassemblyBuffer>>,
        stats: &Arc<Mutex<ReceiverStats>>,
        state: &Arc<AtomicU8>,
        write_tx: &ChannelSender<Vec<Packet>>,
        total_bytes: &Arc<std::sync::atomic::AtomicU64>,
        _monitor: &dyn TransferMonitor,
    ) -> Result<(), TransferError> {
        let mut buf = vec![0u8; self.config.max_packet_size as usize + 64];
        let poll_timeout = self.config.initial_rto();

        loop {
            match self.channel.recv(&mut buf, poll_timeout) {
                Ok(n) => match decode_any(&buf[..n]) {
                    Ok(Datagram::Data(packet)) => {
                        {
                            let mut s = stats.lock().unwrap();
                            s.packets_received += 1;
                            s.bytes_received += packet.payload.len() as u64;
                        }
                        total_bytes.fetch_add(packet.payload.len() as u64, Ordering::SeqCst);

                        let ack = Ack::new(packet.seq, packet.total);
                        let was_duplicate = {
                            let guard = reassembly.lock().unwrap();
                            guard.is_duplicate(packet.seq)
                        };
                        if was_duplicate {
                            stats.lock().unwrap().duplicates += 1;
                        }

                        let ready = reassembly.lock().unwrap().receive(packet);
                        // Unconditional ACK, including for duplicates — helps the
                        // sender converge even when this arrival taught us nothing new.
                        self.channel.send(&ack.encode())?;
                        stats.lock().unwrap().acks_sent += 1;

                        if !ready.is_empty() {
                            write_tx
                                .send(ready)
                                .map_err(|_| TransferError::Config("writer channel closed".into()))?;
                        }

                        if reassembly.lock().unwrap().is_complete() {
                            state.store(ReceiverState::Draining as u8, Ordering::SeqCst);
                            return self.drain_phase(reassembly, stats);
                        }
                    }
                    Ok(Datagram::Ack(_)) => {
                        tracing::debug!("receiver got an ACK; ignoring");
                    }
                    Err(e) => {
                        stats.lock().unwrap().malformed += 1;
                        tracing::debug!(error = %e, "discarding malformed datagram");
                    }
                },
                Err(TransferError::TransientTimeout) | Err(TransferError::UnknownPeer(_)) => {
                    // keep waiting; nothing to advance
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn drain_phase(
        &self,
        reassembly: &Arc<Mutex<ReassemblyBuffer>>,
        stats: &Arc<Mutex<ReceiverStats>>,
    ) -> Result<(), TransferError> {
        let deadline = Instant::now() + self.config.drain_duration();
        let mut buf = vec![0u8; self.config.max_packet_size as usize + 64];

        loop {
            let now = Instant::now();
            if now >= deadline {
                return Ok(());
            }
            let remaining = deadline - now;
            match self.channel.recv(&mut buf, remaining) {
                Ok(n) => match decode_any(&buf[..n]) {
                    Ok(Datagram::Data(packet)) => {
                        let ack = Ack::new(packet.seq, packet.total);
                        {
                            let guard = reassembly.lock().unwrap();
                            if guard.is_duplicate(packet.seq) {
                                stats.lock().unwrap().duplicates += 1;
                            }
                        }
                        self.channel.send(&ack.encode())?;
                        stats.lock().unwrap().acks_sent += 1;
                    }
                    Ok(Datagram::Ack(_)) => {}
                    Err(e) => {
                        stats.lock().unwrap().malformed += 1;
                        tracing::debug!(error = %e, "discarding malformed datagram during drain");
                    }
                },
                Err(TransferError::TransientTimeout) => return Ok(()),
                Err(TransferError::UnknownPeer(_)) => continue,
                Err(e) => return Err(e),
            }
        }
    }
}
