//! Utilities for testing log scanning and position matching without a MySQL server.
//!
//! [`memory_source::MemoryLogSource`] models a server with binary logs, relay logs and a
//! replica status, built from lists of statement texts. It counts the reads it serves so
//! tests can assert how much of a log an operation touched.

pub mod memory_source;

pub use memory_source::MemoryLogSource;
