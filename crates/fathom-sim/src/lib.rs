//! In-memory lossy datagram link for exercising `fathom-core`'s sender and
//! receiver against a controlled drop/duplicate/reorder policy, standing
//! in for the external lossy-link emulator in integration tests.

pub mod lossy_channel;

pub use lossy_channel::{lossy_pair, LinkConfig, LossyChannel};
