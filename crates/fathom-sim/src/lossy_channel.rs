//! In-memory datagram link that drops, duplicates, and reorders traffic
//! between a pair of [`DatagramChannel`] endpoints, so integration tests
//! can exercise `fathom-core`'s sender/receiver loops without a real
//! socket or an external emulator process.

use std::sync::Mutex;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use fathom_core::error::TransferError;
use fathom_core::net::DatagramChannel;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Impairment policy for one direction of a link.
#[derive(Debug, Clone, Copy)]
pub struct LinkConfig {
    pub drop_percent: f64,
    pub duplicate_percent: f64,
    pub reorder_percent: f64,
    pub seed: u64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        LinkConfig {
            drop_percent: 0.0,
            duplicate_percent: 0.0,
            reorder_percent: 0.0,
            seed: 0,
        }
    }
}

impl LinkConfig {
    pub fn lossless(seed: u64) -> Self {
        LinkConfig {
            seed,
            ..Default::default()
        }
    }
}

/// One endpoint of a lossy link: sends are impaired per `config`, receives
/// are plain FIFO reads from the peer's outbound queue.
pub struct LossyChannel {
    outbound: Sender<Vec<u8>>,
    inbound: Receiver<Vec<u8>>,
    config: LinkConfig,
    rng: Mutex<StdRng>,
    holdback: Mutex<Option<Vec<u8>>>,
}

impl LossyChannel {
    fn roll(&self, threshold: f64) -> bool {
        if threshold <= 0.0 {
            return false;
        }
        self.rng.lock().unwrap().random::<f64>() < threshold
    }
}

impl DatagramChannel for LossyChannel {
    fn send(&self, buf: &[u8]) -> Result<(), TransferError> {
        if self.roll(self.config.drop_percent) {
            return Ok(());
        }

        let deliver_now = buf.to_vec();

        // Reorder: swap this datagram with whatever is held back from the
        // previous send, so two consecutive sends can arrive inverted.
        let mut holdback = self.holdback.lock().unwrap();
        if let Some(held) = holdback.take() {
            let _ = self.outbound.send(deliver_now);
            let _ = self.outbound.send(held);
        } else if self.roll(self.config.reorder_percent) {
            *holdback = Some(deliver_now);
        } else {
            let _ = self.outbound.send(deliver_now.clone());
            if self.roll(self.config.duplicate_percent) {
                let _ = self.outbound.send(deliver_now);
            }
        }
        Ok(())
    }

    fn recv(&self, buf: &mut [u8], timeout: Duration) -> Result<usize, TransferError> {
        match self.inbound.recv_timeout(timeout) {
            Ok(datagram) => {
                let n = datagram.len().min(buf.len());
                buf[..n].copy_from_slice(&datagram[..n]);
                Ok(n)
            }
            Err(RecvTimeoutError::Timeout) => Err(TransferError::TransientTimeout),
            Err(RecvTimeoutError::Disconnected) => Err(TransferError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "peer channel disconnected",
            ))),
        }
    }
}

/// Build a connected pair of lossy endpoints, one impairment policy per
/// direction.
pub fn lossy_pair(a_to_b: LinkConfig, b_to_a: LinkConfig) -> (LossyChannel, LossyChannel) {
    let (tx_ab, rx_ab) = unbounded();
    let (tx_ba, rx_ba) = unbounded();
    let a = LossyChannel {
        outbound: tx_ab,
        inbound: rx_ba,
        rng: Mutex::new(StdRng::seed_from_u64(a_to_b.seed)),
        holdback: Mutex::new(None),
        config: a_to_b,
    };
    let b = LossyChannel {
        outbound: tx_ba,
        inbound: rx_ab,
        rng: Mutex::new(StdRng::seed_from_u64(b_to_a.seed)),
        holdback: Mutex::new(None),
        config: b_to_a,
    };
    (a, b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lossless_link_delivers_everything() {
        let (a, b) = lossy_pair(LinkConfig::lossless(1), LinkConfig::lossless(2));
        a.send(b"hello").unwrap();
        let mut buf = [0u8; 16];
        let n = b.recv(&mut buf, Duration::from_millis(100)).unwrap();
        assert_eq!(&buf[..n], b"hello");
    }

    #[test]
    fn full_drop_link_never_delivers() {
        let config = LinkConfig {
            drop_percent: 1.0,
            ..LinkConfig::lossless(1)
        };
        let (a, b) = lossy_pair(config, LinkConfig::lossless(2));
        a.send(b"gone").unwrap();
        let mut buf = [0u8; 16];
        let result = b.recv(&mut buf, Duration::from_millis(50));
        assert!(matches!(result, Err(TransferError::TransientTimeout)));
    }

    #[test]
    fn full_duplicate_link_delivers_twice() {
        let config = LinkConfig {
            duplicate_percent: 1.0,
            ..LinkConfig::lossless(1)
        };
        let (a, b) = lossy_pair(config, LinkConfig::lossless(2));
        a.send(b"x").unwrap();
        let mut buf = [0u8; 16];
        assert!(b.recv(&mut buf, Duration::from_millis(50)).is_ok());
        assert!(b.recv(&mut buf, Duration::from_millis(50)).is_ok());
    }

    #[test]
    fn full_reorder_link_swaps_neighbors() {
        let config = LinkConfig {
            reorder_percent: 1.0,
            ..LinkConfig::lossless(1)
        };
        let (a, b) = lossy_pair(config, LinkConfig::lossless(2));
        a.send(b"first").unwrap();
        a.send(b"second").unwrap();
        let mut buf = [0u8; 16];
        let n1 = b.recv(&mut buf, Duration::from_millis(50)).unwrap();
        let first_seen = buf[..n1].to_vec();
        assert_eq!(first_seen, b"second");
    }
}
