//! Shared configuration types.

mod base;
mod connection;
mod marker;
mod matcher;

pub use base::ValidationError;
pub use connection::{IntoConnectOptions, MySqlConnectionConfig, TlsConfig};
pub use marker::{MarkerCacheConfig, MarkerConfig};
pub use matcher::{LogSelection, MatcherServiceConfig};
