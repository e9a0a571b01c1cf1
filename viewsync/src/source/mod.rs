//! Replication log readers.
//!
//! Decoding the source's binary replication protocol is left to [`LogReader`] implementations.
//! [`memory::MemoryLogReader`] replays events pushed by tests.

mod base;
pub mod memory;

pub use base::LogReader;
