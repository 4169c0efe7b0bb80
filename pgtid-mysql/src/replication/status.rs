//! Execution and decoding of the `SHOW` statements exposing log contents and positions.
//!
//! `SHOW` statements are sent through the text protocol and decoded without type checks,
//! since the column types MySQL reports for them differ between releases.

use std::num::NonZeroI32;

use sqlx::mysql::MySqlRow;
use sqlx::{MySqlPool, Row};
use tracing::trace;

use crate::below_version;
use crate::replication::statements::ShowEventsStatement;
use crate::version::{MYSQL_8_0_22, MYSQL_8_2};

/// One record of a `SHOW {BINLOG|RELAYLOG} EVENTS` result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRow {
    /// The file holding the record.
    pub log_name: String,
    /// Byte offset at which the record starts.
    pub pos: u64,
    /// Record kind, e.g. `Query`, `Xid`, `Rotate`.
    pub event_type: String,
    /// Offset reported as the end of the record.
    ///
    /// For relay logs MySQL reports the end offset in the source server's binary log.
    pub end_log_pos: u64,
    /// Statement text or a description of the record.
    pub info: String,
}

/// The current write position of a server's binary log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimaryStatusRow {
    pub file: String,
    pub position: u64,
}

/// The relay log position up to which a replica's applier has executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicaStatusRow {
    pub relay_log_file: String,
    pub relay_log_pos: u64,
}

/// Runs a bounded events read and decodes its records in offset order.
pub async fn show_events(
    pool: &MySqlPool,
    statement: &ShowEventsStatement<'_>,
) -> Result<Vec<EventRow>, sqlx::Error> {
    let sql = statement.to_string();
    trace!(%sql, "reading log events");

    let rows = sqlx::raw_sql(&sql).fetch_all(pool).await?;

    rows.iter()
        .map(|row| {
            Ok(EventRow {
                log_name: column_string(row, "Log_name")?,
                pos: column_u64(row, "Pos")?,
                event_type: column_string(row, "Event_type")?,
                end_log_pos: column_u64(row, "End_log_pos")?,
                info: column_string(row, "Info")?,
            })
        })
        .collect()
}

/// Lists the server's binary log files, oldest first.
pub async fn show_binary_logs(pool: &MySqlPool) -> Result<Vec<String>, sqlx::Error> {
    let rows = sqlx::raw_sql("SHOW BINARY LOGS").fetch_all(pool).await?;

    rows.iter()
        .map(|row| column_string(row, "Log_name"))
        .collect()
}

/// Returns the server's current binary log write position.
///
/// Returns `None` when binary logging is disabled.
pub async fn show_primary_status(
    pool: &MySqlPool,
    server_version: Option<NonZeroI32>,
) -> Result<Option<PrimaryStatusRow>, sqlx::Error> {
    let rows = sqlx::raw_sql(primary_status_statement(server_version))
        .fetch_all(pool)
        .await?;

    first_row(&rows, |row| {
        Ok(PrimaryStatusRow {
            file: column_string(row, "File")?,
            position: column_u64(row, "Position")?,
        })
    })
}

/// Returns the relay log position executed by the replica's applier.
///
/// Returns `None` when the server is not configured as a replica.
pub async fn show_replica_status(
    pool: &MySqlPool,
    server_version: Option<NonZeroI32>,
) -> Result<Option<ReplicaStatusRow>, sqlx::Error> {
    let rows = sqlx::raw_sql(replica_status_statement(server_version))
        .fetch_all(pool)
        .await?;

    first_row(&rows, |row| {
        Ok(ReplicaStatusRow {
            relay_log_file: column_string(row, "Relay_Log_File")?,
            relay_log_pos: column_u64(row, "Relay_Log_Pos")?,
        })
    })
}

fn primary_status_statement(server_version: Option<NonZeroI32>) -> &'static str {
    if below_version!(server_version, MYSQL_8_2) {
        "SHOW MASTER STATUS"
    } else {
        "SHOW BINARY LOG STATUS"
    }
}

fn replica_status_statement(server_version: Option<NonZeroI32>) -> &'static str {
    if below_version!(server_version, MYSQL_8_0_22) {
        "SHOW SLAVE STATUS"
    } else {
        "SHOW REPLICA STATUS"
    }
}

/// Decodes the single row of a status result.
///
/// Status statements return no rows at all when the feature they report on is off, so an
/// empty result is `None` rather than an error.
fn first_row<R, T>(
    rows: &[R],
    decode: impl FnOnce(&R) -> Result<T, sqlx::Error>,
) -> Result<Option<T>, sqlx::Error> {
    rows.first().map(decode).transpose()
}

fn column_string(row: &MySqlRow, column: &str) -> Result<String, sqlx::Error> {
    Ok(row
        .try_get_unchecked::<Option<String>, _>(column)?
        .unwrap_or_default())
}

fn column_u64(row: &MySqlRow, column: &str) -> Result<u64, sqlx::Error> {
    row.try_get_unchecked::<u64, _>(column)
}

#[cfg(test)]
mod tests {
    use crate::replication::extract_server_version;

    use super::*;

    #[test]
    fn status_statements_follow_mysql_renames() {
        let mysql_5_7 = extract_server_version("5.7.44-log");
        let mysql_8_0 = extract_server_version("8.0.36");
        let mysql_8_4 = extract_server_version("8.4.0");

        assert_eq!(primary_status_statement(mysql_5_7), "SHOW MASTER STATUS");
        assert_eq!(primary_status_statement(mysql_8_0), "SHOW MASTER STATUS");
        assert_eq!(primary_status_statement(mysql_8_4), "SHOW BINARY LOG STATUS");
        assert_eq!(replica_status_statement(mysql_5_7), "SHOW SLAVE STATUS");
        assert_eq!(replica_status_statement(mysql_8_0), "SHOW REPLICA STATUS");
    }

    #[test]
    fn mariadb_gets_the_oldest_status_statements() {
        let version = extract_server_version("10.6.16-MariaDB-log");

        assert_eq!(primary_status_statement(version), "SHOW MASTER STATUS");
        assert_eq!(replica_status_statement(version), "SHOW SLAVE STATUS");
    }

    fn decode_primary(row: &(&str, u64)) -> Result<PrimaryStatusRow, sqlx::Error> {
        Ok(PrimaryStatusRow {
            file: row.0.to_string(),
            position: row.1,
        })
    }

    #[test]
    fn empty_status_result_is_none() {
        let rows: Vec<(&str, u64)> = Vec::new();

        let status = first_row(&rows, decode_primary).unwrap();

        assert_eq!(status, None);
    }

    #[test]
    fn status_row_is_decoded() {
        let rows = vec![("mysql-bin.000007", 1_024)];

        let status = first_row(&rows, decode_primary).unwrap();

        assert_eq!(
            status,
            Some(PrimaryStatusRow {
                file: "mysql-bin.000007".to_string(),
                position: 1_024,
            })
        );
    }

    #[test]
    fn only_the_first_status_row_is_decoded() {
        let rows = vec![("relay-bin.000002", 4), ("relay-bin.000009", 900)];

        let status = first_row(&rows, |row| {
            Ok(ReplicaStatusRow {
                relay_log_file: row.0.to_string(),
                relay_log_pos: row.1,
            })
        })
        .unwrap();

        assert_eq!(status.map(|s| s.relay_log_file).as_deref(), Some("relay-bin.000002"));
    }

    #[test]
    fn status_decoding_errors_are_returned() {
        let rows = vec![("mysql-bin.000001", 4)];

        let err = first_row::<_, PrimaryStatusRow>(&rows, |_| {
            Err(sqlx::Error::ColumnNotFound("Position".to_string()))
        })
        .unwrap_err();

        assert!(matches!(err, sqlx::Error::ColumnNotFound(column) if column == "Position"));
    }
}
