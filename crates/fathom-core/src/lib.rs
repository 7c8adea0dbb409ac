//! # fathom-core
//!
//! Reliable file transfer over a lossy, reordering, duplicating datagram
//! link: sliding-window ARQ, an EWMA RTT/RTO estimator, an AIMD congestion
//! window, timeout and fast retransmission, and a bounded post-transfer
//! drain phase.
//!
//! ## Crate structure
//!
//! - [`wire`] — `(seq,total)|payload` packet framing and ACK framing
//! - [`segmenter`] — splits a file into fixed-size fragments
//! - [`buffers`] — sender in-flight window and receiver reassembly buffer
//! - [`congestion`] — RTT/RTO smoothing and AIMD window sizing
//! - [`net`] — `DatagramChannel` trait and a blocking UDP implementation
//! - [`sender`] — transmit loop + ACK/timer loop
//! - [`receiver`] — network-recv loop + writer loop, drain phase
//! - [`monitor`] — start/end transfer telemetry hook
//! - [`config`] — TOML-backed configuration and validation
//! - [`stats`] — per-side counters and the end-of-transfer summary
//! - [`error`] — the transfer error taxonomy

pub mod buffers;
pub mod config;
pub mod congestion;
pub mod error;
pub mod monitor;
pub mod net;
pub mod receiver;
pub mod segmenter;
pub mod sender;
pub mod stats;
pub mod wire;
