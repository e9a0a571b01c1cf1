//! Concurrency primitives coordinating the engine workers.
//!
//! The engine runs two workers: the apply worker consuming the replication log and the destination
//! writer executing mutations over the single destination connection. The apply worker stops on the
//! [`shutdown`] signal, the writer raises it when it fails.

pub mod shutdown;
