use std::cmp::Ordering;
use std::fmt;

use pgtid_mysql::replication::{LogFileName, LogKind};
use serde::Serialize;

use crate::bail;
use crate::error::{ErrorKind, PgtidResult};

/// The kind of log a [`Position`] points into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogType {
    /// The server's own binary log.
    Primary,
    /// The replica's relay log, holding records copied from its current source.
    Relay,
}

impl LogType {
    /// Returns the label used for this log type in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogType::Primary => "primary",
            LogType::Relay => "relay",
        }
    }

    /// Returns the statement flavor reading this log type.
    pub fn log_kind(&self) -> LogKind {
        match self {
            LogType::Primary => LogKind::Binary,
            LogType::Relay => LogKind::Relay,
        }
    }
}

impl fmt::Display for LogType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A location in a named log file.
///
/// Positions are ordered by the numeric sequence of their file name and then by offset, see
/// [`Position::compare`]. Equality is exact and includes the log type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Position {
    file: String,
    offset: u64,
    log_type: LogType,
}

impl Position {
    pub fn new(file: impl Into<String>, offset: u64, log_type: LogType) -> Self {
        Self {
            file: file.into(),
            offset,
            log_type,
        }
    }

    /// Creates a position in a binary log.
    pub fn primary(file: impl Into<String>, offset: u64) -> Self {
        Self::new(file, offset, LogType::Primary)
    }

    /// Creates a position in a relay log.
    pub fn relay(file: impl Into<String>, offset: u64) -> Self {
        Self::new(file, offset, LogType::Relay)
    }

    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn log_type(&self) -> LogType {
        self.log_type
    }

    /// Returns the position `offset` bytes into the same file.
    pub fn with_offset(&self, offset: u64) -> Self {
        Self::new(self.file.clone(), offset, self.log_type)
    }

    /// Orders two positions of the same log type.
    ///
    /// Files are ordered by their numeric suffix, not by name. Fails when the log types
    /// differ or when a file name carries no sequence number.
    pub fn compare(&self, other: &Position) -> PgtidResult<Ordering> {
        if self.log_type != other.log_type {
            bail!(
                ErrorKind::InvalidState,
                "Positions of different log types are not comparable",
                format!("{self} ({}) vs {other} ({})", self.log_type, other.log_type)
            );
        }

        if self.file == other.file {
            return Ok(self.offset.cmp(&other.offset));
        }

        let file = LogFileName::parse(&self.file)?;
        let other_file = LogFileName::parse(&other.file)?;

        Ok(file
            .sequence()
            .cmp(&other_file.sequence())
            .then(self.offset.cmp(&other.offset)))
    }

    /// Returns [`true`] if this position comes strictly before `other`.
    pub fn smaller_than(&self, other: &Position) -> PgtidResult<bool> {
        Ok(self.compare(other)? == Ordering::Less)
    }

    /// Returns offset `0` of the file rotated out right before this position's file.
    ///
    /// Fails with [`ErrorKind::LogFileNotFound`] when this is the first file of the sequence.
    pub fn previous_file_coordinates(&self) -> PgtidResult<Position> {
        let file = LogFileName::parse(&self.file)?;
        let Some(previous) = file.previous() else {
            bail!(
                ErrorKind::LogFileNotFound,
                "No log file precedes the given one",
                self.file.clone()
            );
        };

        Ok(Position::new(previous.to_string(), 0, self.log_type))
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.offset)
    }
}
