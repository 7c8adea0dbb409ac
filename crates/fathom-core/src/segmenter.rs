//! # Segmenter
//!
//! Splits a source file's bytes into fixed-size fragments ready to be
//! wrapped as [`crate::wire::Packet`]s. The last fragment is shorter than
//! `max_packet_size` unless the file length happens to divide evenly.

use bytes::Bytes;

/// A file's bytes cut into `max_packet_size`-sized fragments.
pub struct Segments {
    chunks: Vec<Bytes>,
}

impl Segments {
    /// `max_packet_size` must be non-zero; the caller validates this at
    /// config load time, not here.
    pub fn new(data: Bytes, max_packet_size: usize) -> Self {
        assert!(max_packet_size > 0, "max_packet_size must be non-zero");
        if data.is_empty() {
            // A zero-byte file is still a one-packet transfer: a single
            // empty fragment, so the receiver has something to reassemble
            // and write out.
            return Segments {
                chunks: vec![Bytes::new()],
            };
        }
        let mut chunks = Vec::with_capacity(data.len().div_ceil(max_packet_size));
        let mut offset = 0;
        while offset < data.len() {
            let end = (offset + max_packet_size).min(data.len());
            chunks.push(data.slice(offset..end));
            offset = end;
        }
        Segments { chunks }
    }

    pub fn total(&self) -> u64 {
        self.chunks.len() as u64
    }

    pub fn get(&self, seq: u64) -> Option<&Bytes> {
        self.chunks.get(seq as usize)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u64, &Bytes)> {
        self.chunks.iter().enumerate().map(|(i, c)| (i as u64, c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_evenly() {
        let s = Segments::new(Bytes::from_static(b"aabbccdd"), 2);
        assert_eq!(s.total(), 4);
        assert_eq!(s.get(0).unwrap(), &Bytes::from_static(b"aa"));
        assert_eq!(s.get(3).unwrap(), &Bytes::from_static(b"dd"));
    }

    #[test]
    fn last_chunk_is_short() {
        let s = Segments::new(Bytes::from_static(b"aabbc"), 2);
        assert_eq!(s.total(), 3);
        assert_eq!(s.get(2).unwrap(), &Bytes::from_static(b"c"));
    }

    #[test]
    fn empty_file_is_one_empty_packet() {
        let s = Segments::new(Bytes::new(), 512);
        assert_eq!(s.total(), 1);
        assert_eq!(s.get(0).unwrap().len(), 0);
    }

    #[test]
    fn single_chunk_smaller_than_max() {
        let s = Segments::new(Bytes::from_static(b"hi"), 512);
        assert_eq!(s.total(), 1);
    }
}
