//! # Transfer monitor
//!
//! Invoked at exactly two points in a transfer's life: start and end. The
//! core never records telemetry beyond what it hands to the monitor —
//! what happens to that data (logged, shipped to a dashboard, ignored) is
//! the monitor implementation's business.

use crate::stats::TransferSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Sender,
    Receiver,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Sender => write!(f, "sender"),
            Role::Receiver => write!(f, "receiver"),
        }
    }
}

pub trait TransferMonitor: Send + Sync {
    fn on_start(&self, role: Role, total_packets: u64, total_bytes: u64);
    fn on_end(&self, role: Role, summary: &TransferSummary);
}

/// Discards everything. Useful in tests that don't care about telemetry.
pub struct NullMonitor;

impl TransferMonitor for NullMonitor {
    fn on_start(&self, _role: Role, _total_packets: u64, _total_bytes: u64) {}
    fn on_end(&self, _role: Role, _summary: &TransferSummary) {}
}

/// Logs start/end events through `tracing`, with field names
/// ("Goodput", "Overhead", "Total Bytes Transmitted") stable enough for
/// a downstream log scraper to depend on.
pub struct TracingMonitor;

impl TransferMonitor for TracingMonitor {
    fn on_start(&self, role: Role, total_packets: u64, total_bytes: u64) {
        tracing::info!(%role, total_packets, total_bytes, "transfer starting");
    }

    fn on_end(&self, role: Role, summary: &TransferSummary) {
        tracing::info!(
            %role,
            goodput_bps = summary.goodput_bps(),
            overhead_bytes = summary.overhead_bytes,
            total_bytes_transmitted = summary.total_bytes + summary.overhead_bytes,
            elapsed_secs = summary.elapsed_secs,
            "transfer finished"
        );
    }
}
