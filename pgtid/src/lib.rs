pub mod cache;
pub mod cursor;
pub mod discovery;
pub mod error;
pub mod fetch;
mod macros;
pub mod matcher;
pub mod metrics;
pub mod scan;
pub mod source;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;
