//! Logging setup shared by binaries and tests embedding the view engine.

pub mod tracing;
