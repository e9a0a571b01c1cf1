//! Change-data-capture engine keeping materialized views in sync with a replication log.
//!
//! Views are declared with [`views::ViewDefinition`] and registered on an [`engine::Engine`].
//! The engine compiles them into handler chains keyed by source table and event kind, optionally
//! bootstraps them inside a destination transaction paired with the current log position, and
//! then routes every row event of the log into insert, update and delete mutations executed in
//! order on the destination.

pub mod bootstrap;
pub mod concurrency;
pub mod destination;
pub mod engine;
pub mod error;
mod macros;
pub mod mutation;
pub mod registry;
pub mod router;
pub mod source;
pub mod types;
pub mod views;
pub mod workers;
