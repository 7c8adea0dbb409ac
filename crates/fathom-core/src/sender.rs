//! # Sender state machine
//!
//! Two threads cooperating over a shared in-flight buffer: a transmit loop
//! that pushes queued packets while the window has room, and an ACK/timer
//! loop that drains acknowledgments, smooths RTT, resizes the congestion
//! window, and retransmits on fast-retransmit or timeout signals.
//!
//! `SENDING → DRAINING → FINISHED`: the transmit loop enters `Draining`
//! once its packet queue is empty, and `Finished` once the in-flight
//! buffer has drained to zero — at which point the ACK/timer loop (whose
//! own termination condition, `acked_remaining` empty, coincides exactly
//! with the in-flight buffer going empty) has also returned.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Condvar, Mutex};

use quanta::Instant;

use crate::buffers::InFlightBuffer;
use crate::congestion::{ppbw, CongestionWindow, RttEstimator};
use crate::error::TransferError;
use crate::monitor::{Role, TransferMonitor};
use crate::net::DatagramChannel;
use crate::segmenter::Segments;
use crate::stats::{SenderStats, TransferSummary};
use crate::wire::{decode_any, Datagram, SeqNo};

#[derive(Debug, Clone)]
pub struct SenderConfig {
    pub max_packet_size: u64,
    pub link_bandwidth: u64,
    pub prop_delay_secs: f64,
    pub initial_window: u32,
    pub thresh_max_factor: f64,
    pub fast_retransmit_gap: u64,
}

impl SenderConfig {
    /// `rtt_est` seed per §4.6: one packet's transmission time plus a
    /// round trip of propagation delay.
    fn initial_rtt_est(&self) -> std::time::Duration {
        let secs = (self.max_packet_size as f64 / self.link_bandwidth as f64)
            + 2.0 * self.prop_delay_secs;
        std::time::Duration::from_secs_f64(secs.max(0.0))
    }

    fn ppbw(&self) -> f64 {
        ppbw(self.max_packet_size, self.link_bandwidth)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SenderState {
    Sending = 0,
    Draining = 1,
    Finished = 2,
}

struct SharedInFlight {
    buffer: Mutex<InFlightBuffer>,
    slot_freed: Condvar,
}

pub struct Sender {
    channel: Arc<dyn DatagramChannel>,
    config: SenderConfig,
}

impl Sender {
    pub fn new(channel: Arc<dyn DatagramChannel>, config: SenderConfig) -> Self {
        Sender { channel, config }
    }

    /// Runs the transfer to completion, driving both loops, and returns
    /// the accumulated statistics. Invokes `monitor` at start and end.
    pub fn run(
        &self,
        segments: Segments,
        monitor: &dyn TransferMonitor,
    ) -> Result<SenderStats, TransferError> {
        let total = segments.total();
        let total_bytes: u64 = segments.iter().map(|(_, p)| p.len() as u64).sum();
        monitor.on_start(Role::Sender, total, total_bytes);

        let start = Instant::now();
        let shared = Arc::new(SharedInFlight {
            buffer: Mutex::new(InFlightBuffer::new()),
            slot_freed: Condvar::new(),
        });
        let window = Arc::new(Mutex::new(CongestionWindow::new(
            self.config.initial_window,
            self.config.thresh_max_factor,
        )));
        let stats = Arc::new(Mutex::new(SenderStats::new()));
        let state = Arc::new(AtomicU8::new(SenderState::Sending as u8));

        let mut queue: VecDeque<_> = segments.iter().map(|(seq, _)| seq).collect();
        let segments = Arc::new(segments);

        std::thread::scope(|scope| {
            let transmit_shared = Arc::clone(&shared);
            let transmit_window = Arc::clone(&window);
            let transmit_stats = Arc::clone(&stats);
            let transmit_state = Arc::clone(&state);
            let transmit_segments = Arc::clone(&segments);
            let transmit_channel = Arc::clone(&self.channel);

            let transmit = scope.spawn(move || {
                while let Some(seq) = queue.pop_front() {
                    loop {
                        let current_window = transmit_window.lock().unwrap().window();
                        let mut guard = transmit_shared.buffer.lock().unwrap();
                        if (guard.len() as u32) < current_window {
                            let payload = transmit_segments.get(seq).unwrap().clone();
                            let packet =
                                crate::wire::Packet::new(seq, transmit_segments.total(), payload);
                            let encoded = packet.encode();
                            drop(guard);
                            transmit_channel.send(&encoded)?;
                            let payload_len = packet.payload.len() as u64;
                            let mut guard = transmit_shared.buffer.lock().unwrap();
                            guard.push(packet, Instant::now());
                            let mut s = transmit_stats.lock().unwrap();
                            s.packets_sent += 1;
                            s.bytes_sent += payload_len;
                            break;
                        }
                        let _unused = transmit_shared
                            .slot_freed
                            .wait_timeout(guard, std::time::Duration::from_millis(20))
                            .unwrap();
                    }
                }
                transmit_state.store(SenderState::Draining as u8, Ordering::SeqCst);
                let guard = transmit_shared.buffer.lock().unwrap();
                let _finished = transmit_shared
                    .slot_freed
                    .wait_while(guard, |b| !b.is_empty())
                    .unwrap();
                transmit_state.store(SenderState::Finished as u8, Ordering::SeqCst);
                Ok::<(), TransferError>(())
            });

            let ack_shared = Arc::clone(&shared);
            let ack_window = Arc::clone(&window);
            let ack_stats = Arc::clone(&stats);
            let ack_channel = Arc::clone(&self.channel);
            let config = self.config.clone();

            let ack_loop = scope.spawn(move || {
                let mut rtt = RttEstimator::new(config.initial_rtt_est());
                let mut acked_remaining: HashSet<SeqNo> = (0..total).collect();
                let mut fast_resent: HashSet<SeqNo> = HashSet::new();
                let mut last_window_update = Instant::now();
                let mut buf = vec![0u8; config.max_packet_size as usize + 64];

                while !acked_remaining.is_empty() {
                    if last_window_update.elapsed() > rtt.rtt_est() {
                        ack_window.lock().unwrap().refresh(rtt.rtt_est(), config.ppbw());
                        last_window_update = Instant::now();
                        ack_shared.slot_freed.notify_all();
                    }

                    match ack_channel.recv(&mut buf, rtt.rto()) {
                        Ok(n) => match decode_any(&buf[..n]) {
                            Ok(Datagram::Ack(ack)) => {
                                if acked_remaining.remove(&ack.seq) {
                                    let mut guard = ack_shared.buffer.lock().unwrap();
                                    if let Some(entry) = guard.remove(ack.seq) {
                                        let age = entry.birth_time.elapsed();
                                        rtt.sample(age);
                                        ack_stats.lock().unwrap().packets_acked += 1;
                                        ack_shared.slot_freed.notify_all();
                                    }
                                    if let Some(gap) = guard.gap_from_oldest(ack.seq) {
                                        let oldest_seq = guard.peek_oldest().unwrap().packet.seq;
                                        if gap > config.fast_retransmit_gap
                                            && !fast_resent.contains(&oldest_seq)
                                        {
                                            if let Some(packet) = guard.cycle_oldest(Instant::now())
                                            {
                                                drop(guard);
                                                ack_channel.send(&packet.encode())?;
                                                fast_resent.insert(oldest_seq);
                                                ack_window.lock().unwrap().congested();
                                                ack_stats.lock().unwrap().fast_retransmits += 1;
                                            }
                                        }
                                    }
                                }
                            }
                            Ok(Datagram::Data(_)) => {
                                tracing::debug!("sender received a data packet; ignoring");
                            }
                            Err(e) => {
                                tracing::debug!(error = %e, "discarding malformed datagram");
                            }
                        },
                        Err(TransferError::TransientTimeout) | Err(TransferError::UnknownPeer(_)) => {
                            // A timeout alone does not shrink the window — only a
                            // fast-retransmit signal does (see congestion.rs docs).
                            let mut guard = ack_shared.buffer.lock().unwrap();
                            if let Some(oldest) = guard.peek_oldest() {
                                if oldest.birth_time.elapsed() > rtt.rto() {
                                    if let Some(packet) = guard.cycle_oldest(Instant::now()) {
                                        drop(guard);
                                        ack_channel.send(&packet.encode())?;
                                        ack_stats.lock().unwrap().timeout_retransmits += 1;
                                    }
                                }
                            }
                        }
                        Err(e) => return Err(e),
                    }
                }
                Ok::<(), TransferError>(())
            });

            transmit.join().expect("transmit thread panicked")?;
            ack_loop.join().expect("ack/timer thread panicked")?;
            Ok::<(), TransferError>(())
        })?;

        let final_stats = stats.lock().unwrap().clone();
        let summary = TransferSummary {
            total_bytes,
            total_packets: total,
            elapsed_secs: start.elapsed().as_secs_f64(),
            overhead_bytes: final_stats.packets_sent * 6,
        };
        monitor.on_end(Role::Sender, &summary);
        Ok(final_stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_rtt_est_matches_formula() {
        let config = SenderConfig {
            max_packet_size: 1000,
            link_bandwidth: 100_000,
            prop_delay_secs: 0.01,
            initial_window: 4,
            thresh_max_factor: 1.25,
            fast_retransmit_gap: 2,
        };
        let expected = 1000.0 / 100_000.0 + 2.0 * 0.01;
        assert!((config.initial_rtt_est().as_secs_f64() - expected).abs() < 1e-9);
    }

    #[test]
    fn sender_state_ordering() {
        assert!((SenderState::Sending as u8) < (SenderState::Draining as u8));
        assert!((SenderState::Draining as u8) < (SenderState::Finished as u8));
    }
}
