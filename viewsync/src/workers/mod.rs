//! Worker implementations for the engine.

pub mod apply;
pub mod base;
pub mod writer;
