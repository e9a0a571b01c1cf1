mod base;
mod connection;
mod engine;

pub use base::*;
pub use connection::*;
pub use engine::*;
