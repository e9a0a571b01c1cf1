//! Data types flowing through the engine: column values, row images, replication log events
//! and log positions.

mod cell;
mod event;
mod position;
mod row;

pub use cell::*;
pub use event::*;
pub use position::*;
pub use row::*;
