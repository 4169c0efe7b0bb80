use pgtid_mysql::replication::EventRow;
use serde::Serialize;

use crate::types::{LogType, Position};

/// A single log record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
    /// Where the record starts.
    pub position: Position,
    /// Offset reported as the end of the record.
    ///
    /// For relay logs this is the offset in the *source server's* binary log, not in the relay
    /// log, so it cannot be used to continue reading a relay log.
    pub next_position: u64,
    /// Record kind, e.g. `Query`, `Xid`, `Rotate`.
    pub kind: String,
    /// Statement text or a description of the record.
    pub info: String,
}

impl LogEvent {
    /// Builds an event from a decoded `SHOW ... EVENTS` row.
    pub fn from_row(row: EventRow, log_type: LogType) -> Self {
        Self {
            position: Position::new(row.log_name, row.pos, log_type),
            next_position: row.end_log_pos,
            kind: row.event_type,
            info: row.info,
        }
    }
}

/// A marker record found in a log, with its literal text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarkerEntry {
    pub position: Position,
    pub text: String,
}
