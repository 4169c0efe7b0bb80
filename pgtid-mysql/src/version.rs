//! MySQL version constants and utilities.
//!
//! Version numbers follow MySQL's internal format: `MAJOR * 10000 + MINOR * 100 + PATCH`.
//! They select between statement spellings that changed across releases, see
//! [`crate::replication::show_primary_status`] and [`crate::replication::show_replica_status`].

use std::num::NonZeroI32;

pub const MYSQL_5_7: i32 = 50700;
pub const MYSQL_8_0: i32 = 80000;
/// First release accepting `SHOW REPLICA STATUS`.
pub const MYSQL_8_0_22: i32 = 80022;
/// First release accepting `SHOW BINARY LOG STATUS`.
pub const MYSQL_8_2: i32 = 80200;
/// First release without `SHOW MASTER STATUS` and `SHOW SLAVE STATUS`.
pub const MYSQL_8_4: i32 = 80400;

/// Returns [`true`] if the server version meets or exceeds the required version.
///
/// Unknown server versions never meet a requirement.
pub fn meets_version(server_version: Option<NonZeroI32>, required_version: i32) -> bool {
    server_version.is_some_and(|v| v.get() >= required_version)
}

/// Checks if the server version meets or exceeds the required version.
#[macro_export]
macro_rules! requires_version {
    ($server_version:expr, $required:expr) => {
        $crate::version::meets_version($server_version, $required)
    };
}

/// Checks if the server version is below the specified version.
#[macro_export]
macro_rules! below_version {
    ($server_version:expr, $required:expr) => {
        !$crate::version::meets_version($server_version, $required)
    };
}
