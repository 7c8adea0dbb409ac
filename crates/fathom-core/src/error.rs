//! # Error taxonomy
//!
//! Five outcomes a transfer can hit, split by how the run responds: two are
//! absorbed locally and never leave the loop that observed them
//! ([`TransferError::TransientTimeout`], [`TransferError::UnknownPeer`]), one
//! is logged and discarded ([`TransferError::MalformedPacket`]), and two are
//! fatal ([`TransferError::Io`], [`TransferError::Config`]).

use thiserror::Error;

use crate::wire::WireError;

#[derive(Debug, Error)]
pub enum TransferError {
    /// A `recv` call timed out with nothing to show for it. Not an error in
    /// the usual sense — the caller treats this as "try again" and folds
    /// the wait into its own retry/backoff accounting.
    #[error("receive timed out")]
    TransientTimeout,

    /// A datagram arrived that didn't decode as a valid packet or ACK.
    /// Logged at the call site and discarded; never propagated.
    #[error("malformed packet: {0}")]
    MalformedPacket(#[from] WireError),

    /// A datagram arrived from an address other than the configured peer.
    /// Folded into the same retry path as a timeout.
    #[error("datagram from unexpected peer {0}")]
    UnknownPeer(std::net::SocketAddr),

    /// A socket operation failed in a way that isn't recoverable locally.
    /// Fatal — ends the transfer.
    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration failed validation before any socket was opened.
    #[error("configuration error: {0}")]
    Config(String),

    /// The operator interrupted the transfer (e.g. Ctrl-C). Shuts down
    /// cleanly; no partial output is rolled back.
    #[error("transfer interrupted by user")]
    UserInterrupt,
}

impl TransferError {
    /// Whether this variant is expected to be absorbed by the caller's own
    /// retry loop rather than bubbled up.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TransferError::TransientTimeout | TransferError::UnknownPeer(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_variants_are_flagged() {
        assert!(TransferError::TransientTimeout.is_transient());
        let addr: std::net::SocketAddr = "127.0.0.1:9000".parse().unwrap();
        assert!(TransferError::UnknownPeer(addr).is_transient());
    }

    #[test]
    fn fatal_variants_are_not_flagged() {
        assert!(!TransferError::Config("bad window size".into()).is_transient());
        assert!(!TransferError::UserInterrupt.is_transient());
    }
}
