//! # In-flight and reassembly buffers
//!
//! [`InFlightBuffer`] is the sender's window of unacknowledged packets: a
//! slab for O(1) storage plus an insertion-order index, mirroring
//! `collections.OrderedDict`'s role in the original `Ack_buff` — oldest
//! unacked packet first, with a `cycle` operation that moves the current
//! head to the tail (used after a fast retransmit so the same packet isn't
//! immediately re-flagged).
//!
//! [`ReassemblyBuffer`] is the receiver's out-of-order holding area: packets
//! that arrive ahead of `next_expected` wait in a map; a `pending` set
//! prevents a duplicate arrival from being buffered twice.

use std::collections::{BTreeMap, HashSet, VecDeque};

use quanta::Instant;
use slab::Slab;

use crate::wire::{Packet, SeqNo};

/// One entry in the sender's in-flight window.
#[derive(Debug, Clone)]
pub struct InFlightEntry {
    pub packet: Packet,
    pub birth_time: Instant,
    pub retries: u32,
}

/// Handle into the in-flight buffer's backing slab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InFlightHandle(usize);

/// Ordered collection of packets awaiting acknowledgment, oldest first.
pub struct InFlightBuffer {
    entries: Slab<InFlightEntry>,
    order: VecDeque<InFlightHandle>,
    index: std::collections::HashMap<SeqNo, InFlightHandle>,
}

impl InFlightBuffer {
    pub fn new() -> Self {
        InFlightBuffer {
            entries: Slab::new(),
            order: VecDeque::new(),
            index: std::collections::HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Insert a freshly sent packet at the tail. Stamps `birth_time` to now
    /// — every send, first or retransmit, resets the age clock.
    pub fn push(&mut self, packet: Packet, now: Instant) {
        let seq = packet.seq;
        let key = self.entries.insert(InFlightEntry {
            packet,
            birth_time: now,
            retries: 0,
        });
        let handle = InFlightHandle(key);
        self.order.push_back(handle);
        self.index.insert(seq, handle);
    }

    /// Remove a packet by sequence number (it was ACKed). Returns it if it
    /// was still in flight.
    pub fn remove(&mut self, seq: SeqNo) -> Option<InFlightEntry> {
        let handle = self.index.remove(&seq)?;
        self.order.retain(|h| *h != handle);
        Some(self.entries.remove(handle.0))
    }

    /// The oldest unacknowledged packet, if any.
    pub fn peek_oldest(&self) -> Option<&InFlightEntry> {
        let handle = self.order.front()?;
        self.entries.get(handle.0)
    }

    pub fn get(&self, seq: SeqNo) -> Option<&InFlightEntry> {
        let handle = self.index.get(&seq)?;
        self.entries.get(handle.0)
    }

    /// Move the oldest entry to the tail and re-stamp it as just sent,
    /// bumping its retry count. Used for both fast and timeout-driven
    /// retransmission of the head-of-line packet.
    pub fn cycle_oldest(&mut self, now: Instant) -> Option<Packet> {
        let handle = self.order.pop_front()?;
        let entry = self.entries.get_mut(handle.0)?;
        entry.birth_time = now;
        entry.retries += 1;
        let packet = entry.packet.clone();
        self.order.push_back(handle);
        Some(packet)
    }

    /// Iterate entries oldest-to-newest without mutating order.
    pub fn iter(&self) -> impl Iterator<Item = &InFlightEntry> {
        self.order.iter().filter_map(|h| self.entries.get(h.0))
    }

    /// How many sequence numbers separate `seq` from the oldest unacked
    /// entry. Used for the fast-retransmit gap test.
    pub fn gap_from_oldest(&self, seq: SeqNo) -> Option<u64> {
        let oldest = self.peek_oldest()?;
        Some(seq.saturating_sub(oldest.packet.seq))
    }
}

impl Default for InFlightBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiver-side holding area for packets that arrive out of order, plus
/// the in-order delivery cursor.
pub struct ReassemblyBuffer {
    out_of_order: BTreeMap<SeqNo, Packet>,
    pending: HashSet<SeqNo>,
    next_expected: SeqNo,
    total: Option<u64>,
}

impl ReassemblyBuffer {
    pub fn new() -> Self {
        ReassemblyBuffer {
            out_of_order: BTreeMap::new(),
            pending: HashSet::new(),
            next_expected: 0,
            total: None,
        }
    }

    pub fn next_expected(&self) -> SeqNo {
        self.next_expected
    }

    pub fn total(&self) -> Option<u64> {
        self.total
    }

    /// True once every packet up to the announced total has been
    /// delivered in order.
    pub fn is_complete(&self) -> bool {
        matches!(self.total, Some(total) if self.next_expected >= total)
    }

    /// Whether `seq` is a duplicate: already delivered, or already
    /// buffered out of order.
    pub fn is_duplicate(&self, seq: SeqNo) -> bool {
        seq < self.next_expected || self.pending.contains(&seq)
    }

    /// Record a newly arrived packet. Returns the run of packets now
    /// deliverable in order (possibly empty if `seq` is itself out of
    /// order, possibly more than one if this fill closes a gap).
    pub fn receive(&mut self, packet: Packet) -> Vec<Packet> {
        self.total.get_or_insert(packet.total);
        if self.is_duplicate(packet.seq) {
            return Vec::new();
        }
        self.pending.insert(packet.seq);
        self.out_of_order.insert(packet.seq, packet);
        self.drain_in_order()
    }

    fn drain_in_order(&mut self) -> Vec<Packet> {
        let mut ready = Vec::new();
        while let Some(packet) = self.out_of_order.remove(&self.next_expected) {
            self.pending.remove(&packet.seq);
            self.next_expected += 1;
            ready.push(packet);
        }
        ready
    }

    /// How many packets are currently held out of order, waiting for a
    /// gap to close.
    pub fn held_count(&self) -> usize {
        self.out_of_order.len()
    }
}

impl Default for ReassemblyBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn pkt(seq: u64, total: u64) -> Packet {
        Packet::new(seq, total, Bytes::from_static(b"x"))
    }

    #[test]
    fn inflight_push_and_remove() {
        let mut buf = InFlightBuffer::new();
        let now = Instant::now();
        buf.push(pkt(0, 3), now);
        buf.push(pkt(1, 3), now);
        assert_eq!(buf.len(), 2);
        let removed = buf.remove(0).unwrap();
        assert_eq!(removed.packet.seq, 0);
        assert_eq!(buf.len(), 1);
        assert_eq!(buf.peek_oldest().unwrap().packet.seq, 1);
    }

    #[test]
    fn inflight_cycle_moves_to_tail_and_bumps_retries() {
        let mut buf = InFlightBuffer::new();
        let now = Instant::now();
        buf.push(pkt(0, 3), now);
        buf.push(pkt(1, 3), now);
        let cycled = buf.cycle_oldest(now).unwrap();
        assert_eq!(cycled.seq, 0);
        assert_eq!(buf.peek_oldest().unwrap().packet.seq, 1);
        assert_eq!(buf.get(0).unwrap().retries, 1);
    }

    #[test]
    fn inflight_gap_from_oldest() {
        let mut buf = InFlightBuffer::new();
        let now = Instant::now();
        buf.push(pkt(5, 100), now);
        assert_eq!(buf.gap_from_oldest(8), Some(3));
    }

    #[test]
    fn reassembly_in_order_delivers_immediately() {
        let mut r = ReassemblyBuffer::new();
        let ready = r.receive(pkt(0, 2));
        assert_eq!(ready.len(), 1);
        assert_eq!(r.next_expected(), 1);
    }

    #[test]
    fn reassembly_out_of_order_then_fills_gap() {
        let mut r = ReassemblyBuffer::new();
        assert!(r.receive(pkt(1, 3)).is_empty());
        assert_eq!(r.held_count(), 1);
        let ready = r.receive(pkt(0, 3));
        assert_eq!(ready.len(), 2);
        assert_eq!(ready[0].seq, 0);
        assert_eq!(ready[1].seq, 1);
        assert_eq!(r.next_expected(), 2);
    }

    #[test]
    fn reassembly_rejects_duplicates() {
        let mut r = ReassemblyBuffer::new();
        r.receive(pkt(0, 3));
        assert!(r.is_duplicate(0));
        assert!(r.receive(pkt(0, 3)).is_empty());
    }

    #[test]
    fn reassembly_rejects_duplicate_out_of_order_arrival() {
        let mut r = ReassemblyBuffer::new();
        r.receive(pkt(2, 3));
        assert!(r.receive(pkt(2, 3)).is_empty());
        assert_eq!(r.held_count(), 1);
    }

    #[test]
    fn reassembly_completion() {
        let mut r = ReassemblyBuffer::new();
        r.receive(pkt(0, 2));
        assert!(!r.is_complete());
        r.receive(pkt(1, 2));
        assert!(r.is_complete());
    }
}
