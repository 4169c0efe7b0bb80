//! Access to the logs and replication metadata of a single server.
//!
//! Everything the scanning and matching code needs from a server goes through [`LogSource`].
//! [`MySqlLogSource`] talks to a live server; tests use the in-memory source from
//! `crate::test_utils`.

mod mysql;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{ErrorKind, PgtidResult};
use crate::pgtid_error;
use crate::types::{LogEvent, LogType, Position};
use pgtid_mysql::replication::LogFileName;

pub use mysql::MySqlLogSource;

/// A [`LogSource`] shared between cursors, discovery and the matcher.
pub type SharedLogSource = Arc<dyn LogSource>;

/// Identity of a server, rendered as `host:port`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServerKey {
    pub host: String,
    pub port: u16,
}

impl ServerKey {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for ServerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// A bounded read of records from one log file.
///
/// With `from` set, reading starts at the record beginning at that offset, otherwise at the
/// beginning of the file. The first `skip` records are then dropped and at most `limit`
/// records are returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventsRequest<'a> {
    pub file: &'a str,
    pub log_type: LogType,
    pub from: Option<u64>,
    pub skip: u64,
    pub limit: u64,
}

impl<'a> EventsRequest<'a> {
    /// Reads starting with the record at `position`.
    pub fn at(position: &'a Position, limit: u64) -> Self {
        Self {
            file: position.file(),
            log_type: position.log_type(),
            from: Some(position.offset()),
            skip: 0,
            limit,
        }
    }

    /// Reads starting with the record following the one at `position`.
    pub fn after(position: &'a Position, limit: u64) -> Self {
        Self {
            skip: 1,
            ..Self::at(position, limit)
        }
    }

    /// Reads the `page`-th window of `limit` records of a file.
    pub fn window(file: &'a str, log_type: LogType, page: u64, limit: u64) -> Self {
        Self {
            file,
            log_type,
            from: None,
            skip: page.saturating_mul(limit),
            limit,
        }
    }
}

/// Read access to one server's logs and replication status.
#[async_trait]
pub trait LogSource: fmt::Debug + Send + Sync {
    /// Returns the identity of the server.
    fn key(&self) -> &ServerKey;

    /// Reads a bounded page of records, in ascending offset order.
    ///
    /// Reading a file the server does not have fails with [`ErrorKind::LogFileNotFound`].
    async fn read_events(&self, request: &EventsRequest<'_>) -> PgtidResult<Vec<LogEvent>>;

    /// Lists the server's binary log files, oldest first.
    async fn binary_logs(&self) -> PgtidResult<Vec<String>>;

    /// Returns the log file written after `file`, or [`None`] if `file` is the one currently
    /// being written.
    async fn next_log_file(&self, file: &str, log_type: LogType) -> PgtidResult<Option<String>>;

    /// Returns the server's current binary log write position.
    async fn current_position(&self) -> PgtidResult<Position>;

    /// Returns the relay log position the replica's applier has executed up to, or [`None`]
    /// if the server is not a replica.
    async fn replica_position(&self) -> PgtidResult<Option<Position>>;
}

/// Resolves the file written after `file`.
///
/// No file follows the active one. Binary logs take the successor from the server's file
/// list; relay logs cannot be listed, so their successor is derived from the file name.
pub fn resolve_next_file(
    file: &str,
    log_type: LogType,
    active_file: &str,
    binary_logs: &[String],
) -> PgtidResult<Option<String>> {
    if file == active_file {
        return Ok(None);
    }

    match log_type {
        LogType::Primary => {
            let Some(index) = binary_logs.iter().position(|name| name == file) else {
                return Err(pgtid_error!(
                    ErrorKind::LogFileNotFound,
                    "Binary log is not listed by the server",
                    file
                ));
            };

            Ok(binary_logs.get(index + 1).cloned())
        }
        LogType::Relay => Ok(Some(LogFileName::parse(file)?.next().to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binary_logs() -> Vec<String> {
        vec![
            "mysql-bin.000007".to_string(),
            "mysql-bin.000008".to_string(),
            "mysql-bin.000009".to_string(),
        ]
    }

    #[test]
    fn test_active_file_has_no_successor() {
        let next = resolve_next_file(
            "mysql-bin.000009",
            LogType::Primary,
            "mysql-bin.000009",
            &binary_logs(),
        )
        .unwrap();

        assert_eq!(next, None);
    }

    #[test]
    fn test_binary_log_successor_comes_from_list() {
        let next = resolve_next_file(
            "mysql-bin.000007",
            LogType::Primary,
            "mysql-bin.000009",
            &binary_logs(),
        )
        .unwrap();

        assert_eq!(next.as_deref(), Some("mysql-bin.000008"));
    }

    #[test]
    fn test_unlisted_binary_log_is_not_found() {
        let err = resolve_next_file(
            "mysql-bin.000002",
            LogType::Primary,
            "mysql-bin.000009",
            &binary_logs(),
        )
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::LogFileNotFound);
    }

    #[test]
    fn test_relay_log_successor_is_derived() {
        let next =
            resolve_next_file("relay-bin.000099", LogType::Relay, "relay-bin.000101", &[]).unwrap();

        assert_eq!(next.as_deref(), Some("relay-bin.000100"));
    }

    #[test]
    fn test_events_request_constructors() {
        let position = Position::primary("mysql-bin.000001", 154);

        let at = EventsRequest::at(&position, 10);
        assert_eq!((at.from, at.skip), (Some(154), 0));

        let after = EventsRequest::after(&position, 10);
        assert_eq!((after.from, after.skip), (Some(154), 1));

        let window = EventsRequest::window("relay-bin.000002", LogType::Relay, 3, 10);
        assert_eq!((window.from, window.skip, window.limit), (None, 30, 10));
    }
}
