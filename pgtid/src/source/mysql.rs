use std::num::NonZeroI32;

use async_trait::async_trait;
use pgtid_config::shared::MySqlConnectionConfig;
use pgtid_mysql::replication::{
    ShowEventsStatement, connect_to_server, fetch_server_version, show_binary_logs, show_events,
    PrimaryStatusRow, ReplicaStatusRow, show_primary_status, show_replica_status,
};
use sqlx::MySqlPool;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::bail;
use crate::error::{ErrorKind, PgtidResult};
use crate::source::{EventsRequest, LogSource, ServerKey, resolve_next_file};
use crate::types::{LogEvent, LogType, Position};

/// [`LogSource`] reading a MySQL server through `SHOW` statements.
///
/// The session is opened on the first read. The server version, which selects between
/// statement spellings, is queried once and then reused.
#[derive(Debug)]
pub struct MySqlLogSource {
    key: ServerKey,
    pool: MySqlPool,
    server_version: OnceCell<Option<NonZeroI32>>,
}

impl MySqlLogSource {
    /// Creates a source for the configured server without connecting to it.
    pub fn new(config: &MySqlConnectionConfig) -> Self {
        Self {
            key: ServerKey::new(config.host.clone(), config.port),
            pool: connect_to_server(config),
            server_version: OnceCell::new(),
        }
    }

    async fn server_version(&self) -> PgtidResult<Option<NonZeroI32>> {
        let version = self
            .server_version
            .get_or_try_init(|| async {
                let version = fetch_server_version(&self.pool).await?;
                info!(server = %self.key, ?version, "detected mysql server version");

                Ok::<_, sqlx::Error>(version)
            })
            .await?;

        Ok(*version)
    }

    async fn active_file(&self, log_type: LogType) -> PgtidResult<String> {
        match log_type {
            LogType::Primary => Ok(self.current_position().await?.file().to_string()),
            LogType::Relay => match self.replica_position().await? {
                Some(position) => Ok(position.file().to_string()),
                None => bail!(
                    ErrorKind::InvalidState,
                    "Server is not a replica and has no relay logs",
                    self.key.to_string()
                ),
            },
        }
    }
}

#[async_trait]
impl LogSource for MySqlLogSource {
    fn key(&self) -> &ServerKey {
        &self.key
    }

    async fn read_events(&self, request: &EventsRequest<'_>) -> PgtidResult<Vec<LogEvent>> {
        let statement = ShowEventsStatement {
            kind: request.log_type.log_kind(),
            file: request.file,
            from: request.from,
            row_offset: request.skip,
            limit: request.limit,
        };

        let rows = show_events(&self.pool, &statement).await?;

        Ok(rows
            .into_iter()
            .map(|row| LogEvent::from_row(row, request.log_type))
            .collect())
    }

    async fn binary_logs(&self) -> PgtidResult<Vec<String>> {
        Ok(show_binary_logs(&self.pool).await?)
    }

    async fn next_log_file(&self, file: &str, log_type: LogType) -> PgtidResult<Option<String>> {
        let active_file = self.active_file(log_type).await?;
        let binary_logs = match log_type {
            LogType::Primary => self.binary_logs().await?,
            LogType::Relay => Vec::new(),
        };

        let next = resolve_next_file(file, log_type, &active_file, &binary_logs)?;
        debug!(server = %self.key, file, %log_type, ?next, "resolved next log file");

        Ok(next)
    }

    async fn current_position(&self) -> PgtidResult<Position> {
        let version = self.server_version().await?;
        let status = show_primary_status(&self.pool, version).await?;

        primary_position(&self.key, status)
    }

    async fn replica_position(&self) -> PgtidResult<Option<Position>> {
        let version = self.server_version().await?;
        let status = show_replica_status(&self.pool, version).await?;

        Ok(executed_relay_position(status))
    }
}

/// Maps the binary log status to the current write position.
fn primary_position(key: &ServerKey, status: Option<PrimaryStatusRow>) -> PgtidResult<Position> {
    let Some(status) = status else {
        bail!(
            ErrorKind::InvalidState,
            "Binary logging is disabled on the server",
            key.to_string()
        );
    };

    Ok(Position::primary(status.file, status.position))
}

/// Maps the replica status to the executed relay log position.
///
/// A server whose replication settings were reset still reports a status row, but with no
/// relay log file.
fn executed_relay_position(status: Option<ReplicaStatusRow>) -> Option<Position> {
    status
        .filter(|status| !status.relay_log_file.is_empty())
        .map(|status| Position::relay(status.relay_log_file, status.relay_log_pos))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> ServerKey {
        ServerKey::new("replica-1".to_string(), 3306)
    }

    #[test]
    fn missing_binary_log_status_is_invalid_state() {
        let err = primary_position(&key(), None).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert_eq!(err.detail(), Some("replica-1:3306"));
    }

    #[test]
    fn binary_log_status_becomes_primary_position() {
        let status = PrimaryStatusRow {
            file: "mysql-bin.000012".to_string(),
            position: 4_096,
        };

        let position = primary_position(&key(), Some(status)).unwrap();

        assert_eq!(position, Position::primary("mysql-bin.000012", 4_096));
    }

    #[test]
    fn missing_replica_status_is_not_a_replica() {
        assert_eq!(executed_relay_position(None), None);
    }

    #[test]
    fn reset_replica_status_is_not_a_replica() {
        let status = ReplicaStatusRow {
            relay_log_file: String::new(),
            relay_log_pos: 0,
        };

        assert_eq!(executed_relay_position(Some(status)), None);
    }

    #[test]
    fn replica_status_becomes_relay_position() {
        let status = ReplicaStatusRow {
            relay_log_file: "relay-bin.000003".to_string(),
            relay_log_pos: 811,
        };

        let position = executed_relay_position(Some(status)).unwrap();

        assert_eq!(position, Position::relay("relay-bin.000003", 811));
        assert_eq!(position.log_type(), LogType::Relay);
    }
}
