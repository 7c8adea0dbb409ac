//! # Wire codec
//!
//! A deliberately simple textual framing: `(seq,total)|payload`. The header
//! is ASCII decimal, comma-separated, parenthesized, followed by a pipe and
//! the raw payload bytes. Whitespace around either field is tolerated and
//! stripped before parsing, so `(17, 4096)|` and `(17,4096)|` both decode.
//! ACKs reuse the same header shape with a leading marker byte so a
//! datagram can be told apart from a data packet without touching the
//! payload region.
//!
//! Chosen for the same reason the reference implementation chose it: it is
//! trivially debuggable with a packet sniffer and the framing overhead is
//! irrelevant next to the payload sizes this protocol targets.

use bytes::{Bytes, BytesMut};
use thiserror::Error;

/// Sequence number. The protocol never needs more than a `u32` worth of
/// packets for a single transfer, but payload sizes are user controlled —
/// `u64` avoids an artificial ceiling on transferable file size.
pub type SeqNo = u64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    #[error("datagram shorter than the minimum header")]
    Truncated,
    #[error("header is not valid ASCII/UTF-8")]
    NotUtf8,
    #[error("missing opening '(' in header")]
    MissingOpenParen,
    #[error("missing ',' separator in header")]
    MissingComma,
    #[error("missing closing ')' in header")]
    MissingCloseParen,
    #[error("missing '|' delimiter after header")]
    MissingDelimiter,
    #[error("seq/total field is not a valid decimal integer")]
    BadInteger,
    #[error("seq {seq} is not less than total {total}")]
    SeqOutOfRange { seq: u64, total: u64 },
    #[error("leading marker byte missing or unrecognized")]
    MissingMarker,
}

/// Marker byte prefixed to a datagram's header so a receiver thread
/// demultiplexing a single socket can tell data and ACK traffic apart
/// without trying to parse the payload as a header.
const ACK_MARKER: u8 = b'A';
const DATA_MARKER: u8 = b'D';

/// A single data packet: one fragment of the file, identified by `seq` out
/// of `total` fragments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub seq: SeqNo,
    pub total: u64,
    pub payload: Bytes,
}

impl Packet {
    pub fn new(seq: SeqNo, total: u64, payload: Bytes) -> Self {
        Packet { seq, total, payload }
    }

    /// Encode as `D(seq,total)|payload`.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.payload.len() + 24);
        buf.extend_from_slice(&[DATA_MARKER]);
        buf.extend_from_slice(format!("({},{})", self.seq, self.total).as_bytes());
        buf.extend_from_slice(b"|");
        buf.extend_from_slice(&self.payload);
        buf.freeze()
    }

    pub fn decode(raw: &[u8]) -> Result<Self, WireError> {
        if raw.is_empty() {
            return Err(WireError::Truncated);
        }
        if raw[0] != DATA_MARKER {
            return Err(WireError::MissingMarker);
        }
        let (seq, total, pipe_at) = parse_header(&raw[1..])?;
        let payload_start = 1 + pipe_at + 1;
        Ok(Packet {
            seq,
            total,
            payload: Bytes::copy_from_slice(&raw[payload_start..]),
        })
    }
}

/// Acknowledgment of a single received packet. The reference protocol only
/// ever ACKs one sequence number per datagram (no SACK ranges, no
/// cumulative ACK) — `total` is carried so a receiver can report its view
/// of the transfer size even before the sender has heard anything back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack {
    pub seq: SeqNo,
    pub total: u64,
}

impl Ack {
    pub fn new(seq: SeqNo, total: u64) -> Self {
        Ack { seq, total }
    }

    /// Encode as `A(seq,total)|`.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(24);
        buf.extend_from_slice(&[ACK_MARKER]);
        buf.extend_from_slice(format!("({},{})", self.seq, self.total).as_bytes());
        buf.extend_from_slice(b"|");
        buf.freeze()
    }

    pub fn decode(raw: &[u8]) -> Result<Self, WireError> {
        if raw.is_empty() {
            return Err(WireError::Truncated);
        }
        if raw[0] != ACK_MARKER {
            return Err(WireError::MissingMarker);
        }
        let (seq, total, _) = parse_header(&raw[1..])?;
        Ok(Ack { seq, total })
    }
}

/// Tells a decoded datagram apart: data packet or ACK.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Datagram {
    Data(Packet),
    Ack(Ack),
}

pub fn decode_any(raw: &[u8]) -> Result<Datagram, WireError> {
    match raw.first() {
        Some(&DATA_MARKER) => Packet::decode(raw).map(Datagram::Data),
        Some(&ACK_MARKER) => Ack::decode(raw).map(Datagram::Ack),
        Some(_) => Err(WireError::MissingMarker),
        None => Err(WireError::Truncated),
    }
}

/// Parses `(seq,total)|...` starting at `raw[0]`. Returns `(seq, total,
/// index of the '|' byte within `raw`)`.
fn parse_header(raw: &[u8]) -> Result<(u64, u64, usize), WireError> {
    let text = std::str::from_utf8(raw).map_err(|_| WireError::NotUtf8)?;
    if !text.starts_with('(') {
        return Err(WireError::MissingOpenParen);
    }
    let close = text.find(')').ok_or(WireError::MissingCloseParen)?;
    let inner = &text[1..close];
    let comma = inner.find(',').ok_or(WireError::MissingComma)?;
    let seq: u64 = inner[..comma]
        .trim()
        .parse()
        .map_err(|_| WireError::BadInteger)?;
    let total: u64 = inner[comma + 1..]
        .trim()
        .parse()
        .map_err(|_| WireError::BadInteger)?;
    let after_close = &text[close + 1..];
    if !after_close.starts_with('|') {
        return Err(WireError::MissingDelimiter);
    }
    if seq >= total {
        return Err(WireError::SeqOutOfRange { seq, total });
    }
    Ok((seq, total, close + 1))
}
