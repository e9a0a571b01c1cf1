//! View definitions and their compilation into handlers.
//!
//! A [`ViewDefinition`] binds a destination table to source tables. [`compile`] selects a
//! [`ViewStrategy`] per binding once, up front, and wraps it into handlers the
//! [`crate::registry::HandlerRegistry`] chains per source table and event kind.

mod compiler;
mod definition;
mod strategy;

pub use compiler::{CompiledView, compile};
pub use definition::{ComputeFn, FilterFn, SourceBinding, ViewDefinition};
pub use strategy::{Projection, ViewStrategy, changed_columns};
