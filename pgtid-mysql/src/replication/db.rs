use std::num::NonZeroI32;

use pgtid_config::shared::{IntoConnectOptions, MySqlConnectionConfig};
use sqlx::mysql::MySqlPoolOptions;
use sqlx::{MySqlPool, Row};
use tracing::debug;

/// Creates a lazily connecting session pool to a MySQL server.
///
/// No connection is opened until the first statement runs. The pool holds a single
/// connection since every reader issues its statements strictly in sequence.
pub fn connect_to_server(config: &MySqlConnectionConfig) -> MySqlPool {
    debug!(host = %config.host, port = config.port, "creating lazy mysql session");

    MySqlPoolOptions::new()
        .min_connections(0)
        .max_connections(1)
        .connect_lazy_with(config.to_connect_options())
}

/// Queries and parses the server version of the connected server.
pub async fn fetch_server_version(pool: &MySqlPool) -> Result<Option<NonZeroI32>, sqlx::Error> {
    let row = sqlx::query("SELECT VERSION() AS version")
        .fetch_one(pool)
        .await?;
    let version: String = row.try_get("version")?;

    Ok(extract_server_version(version))
}

/// Extracts the MySQL server version from a version string.
///
/// Parses version strings like "8.0.35" or "5.7.44-log" into `MAJOR * 10000 + MINOR * 100 + PATCH`,
/// e.g. MySQL 8.0.35 = 80035.
///
/// Returns `None` if the version string cannot be parsed or results in zero, and for MariaDB,
/// whose numbering is unrelated to MySQL's. An unknown version selects the oldest statement
/// spellings, which MariaDB accepts.
pub fn extract_server_version(server_version_str: impl AsRef<str>) -> Option<NonZeroI32> {
    let server_version_str = server_version_str.as_ref();
    if server_version_str.contains("MariaDB") {
        return None;
    }

    let version_part = server_version_str
        .split_whitespace()
        .next()
        .unwrap_or("0.0.0");

    let version_part = version_part.split('-').next().unwrap_or("0.0.0");

    let mut components = version_part
        .split('.')
        .map(|component| component.parse::<i32>().unwrap_or(0));

    let major = components.next().unwrap_or(0);
    let minor = components.next().unwrap_or(0);
    let patch = components.next().unwrap_or(0);

    NonZeroI32::new(major * 10000 + minor * 100 + patch)
}
