//! Destination store abstractions.
//!
//! [`DestinationClient`] is the single connection view mutations and bootstrap statements are
//! executed on. [`mysql::MySqlDestination`] talks to a MySQL compatible server and
//! [`memory::MemoryDestination`] records everything in memory for tests.

mod base;
pub mod memory;
pub mod mysql;

pub use base::DestinationClient;
