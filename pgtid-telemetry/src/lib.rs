//! Telemetry setup shared by the matcher binary and the test suites.

pub mod tracing;
