//! MySQL helpers for reading binary and relay logs.
//!
//! This crate knows how MySQL names its log files, which `SHOW` statements expose log
//! contents and replication status on each server version, and how their result rows are
//! decoded. It has no notion of markers or matching.

pub mod replication;
pub mod version;
