//! Log file naming, statements and row decoding for MySQL replication logs.

mod binlog;
mod db;
mod statements;
mod status;

pub use binlog::{LogFileName, LogFileNameError};
pub use db::{connect_to_server, extract_server_version, fetch_server_version};
pub use statements::{LogKind, ShowEventsStatement, quote_literal};
pub use status::{
    EventRow, PrimaryStatusRow, ReplicaStatusRow, show_binary_logs, show_events,
    show_primary_status, show_replica_status,
};
