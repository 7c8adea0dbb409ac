//! # Transfer statistics
//!
//! Aggregate counters for each side of a transfer, serializable for the
//! [`crate::monitor::TransferMonitor`] to log at completion.

use serde::Serialize;

/// Aggregate sender-side statistics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SenderStats {
    /// Total packets sent, including retransmissions.
    pub packets_sent: u64,
    /// Total payload bytes sent, including retransmissions.
    pub bytes_sent: u64,
    /// Packets acknowledged by the receiver.
    pub packets_acked: u64,
    /// Retransmissions triggered by fast retransmit.
    pub fast_retransmits: u64,
    /// Retransmissions triggered by a timeout.
    pub timeout_retransmits: u64,
}

impl SenderStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn retransmissions(&self) -> u64 {
        self.fast_retransmits + self.timeout_retransmits
    }

    /// Retransmission overhead ratio: retransmissions per packet sent.
    pub fn retransmit_ratio(&self) -> f64 {
        if self.packets_sent == 0 {
            0.0
        } else {
            self.retransmissions() as f64 / self.packets_sent as f64
        }
    }
}

/// Aggregate receiver-side statistics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReceiverStats {
    /// Total packets received, including duplicates.
    pub packets_received: u64,
    /// Total payload bytes received, including duplicates.
    pub bytes_received: u64,
    /// Packets delivered to the output file (unique, in order).
    pub packets_delivered: u64,
    /// Duplicate packets discarded.
    pub duplicates: u64,
    /// Malformed datagrams discarded.
    pub malformed: u64,
    /// ACKs sent, including re-ACKs during the drain phase.
    pub acks_sent: u64,
}

impl ReceiverStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Effective goodput ratio: unique bytes delivered vs. total received.
    pub fn goodput_ratio(&self) -> f64 {
        if self.packets_received == 0 {
            0.0
        } else {
            self.packets_delivered as f64 / self.packets_received as f64
        }
    }
}

/// Final summary handed to the transfer monitor at the end of a run.
#[derive(Debug, Clone, Serialize)]
pub struct TransferSummary {
    pub total_bytes: u64,
    pub total_packets: u64,
    pub elapsed_secs: f64,
    pub overhead_bytes: u64,
}

impl TransferSummary {
    /// Bytes per second of useful payload delivered, reported as
    /// "Goodput" in the completion log line.
    pub fn goodput_bps(&self) -> f64 {
        if self.elapsed_secs <= 0.0 {
            0.0
        } else {
            self.total_bytes as f64 / self.elapsed_secs
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sender_retransmit_ratio_zero_div() {
        assert_eq!(SenderStats::new().retransmit_ratio(), 0.0);
    }

    #[test]
    fn sender_retransmit_ratio_correct() {
        let mut s = SenderStats::new();
        s.packets_sent = 100;
        s.fast_retransmits = 3;
        s.timeout_retransmits = 2;
        assert!((s.retransmit_ratio() - 0.05).abs() < 1e-9);
    }

    #[test]
    fn receiver_goodput_ratio() {
        let mut r = ReceiverStats::new();
        r.packets_received = 110;
        r.packets_delivered = 100;
        assert!((r.goodput_ratio() - 100.0 / 110.0).abs() < 1e-9);
    }

    #[test]
    fn summary_goodput_bps() {
        let summary = TransferSummary {
            total_bytes: 1_000_000,
            total_packets: 1000,
            elapsed_secs: 2.0,
            overhead_bytes: 20_000,
        };
        assert!((summary.goodput_bps() - 500_000.0).abs() < 1e-6);
    }

    #[test]
    fn summary_serializes() {
        let summary = TransferSummary {
            total_bytes: 10,
            total_packets: 1,
            elapsed_secs: 1.0,
            overhead_bytes: 1,
        };
        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("\"total_bytes\":10"));
    }
}
