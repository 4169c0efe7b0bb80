//! MySQL log file naming.
//!
//! Binary and relay log files are named `<basename>.<sequence>`, e.g. `mysql-bin.000123` or
//! `relay-bin.000007`. The zero-padded numeric suffix gives the rotation order, which is
//! what positions must be ordered by; comparing names lexicographically breaks once the
//! sequence outgrows its padding.

use std::fmt;

use thiserror::Error;

/// Errors that can occur while parsing a log file name.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LogFileNameError {
    #[error("Invalid log file name, missing numeric suffix: {0}")]
    MissingSequence(String),

    #[error("Failed to parse log file sequence number: {0}")]
    InvalidSequence(String),
}

/// A parsed log file name.
///
/// Ordering compares the base name first and then the numeric sequence.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LogFileName {
    basename: String,
    sequence: u64,
    width: usize,
}

impl LogFileName {
    /// Parses a log file name such as `mysql-bin.000123`.
    pub fn parse(file_name: &str) -> Result<Self, LogFileNameError> {
        let Some((basename, suffix)) = file_name.rsplit_once('.') else {
            return Err(LogFileNameError::MissingSequence(file_name.to_string()));
        };

        if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
            return Err(LogFileNameError::InvalidSequence(file_name.to_string()));
        }

        let sequence = suffix
            .parse::<u64>()
            .map_err(|_| LogFileNameError::InvalidSequence(file_name.to_string()))?;

        Ok(Self {
            basename: basename.to_string(),
            sequence,
            width: suffix.len(),
        })
    }

    /// Returns the numeric sequence of this file.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Returns the name of the file rotated in right after this one.
    pub fn next(&self) -> LogFileName {
        Self {
            basename: self.basename.clone(),
            sequence: self.sequence + 1,
            width: self.width,
        }
    }

    /// Returns the name of the file rotated out right before this one.
    ///
    /// MySQL numbers log files from `1`, so the first file has no predecessor.
    pub fn previous(&self) -> Option<LogFileName> {
        if self.sequence <= 1 {
            return None;
        }

        Some(Self {
            basename: self.basename.clone(),
            sequence: self.sequence - 1,
            width: self.width,
        })
    }
}

impl fmt::Display for LogFileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{:0width$}",
            self.basename,
            self.sequence,
            width = self.width
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_file_name() {
        let name = LogFileName::parse("mysql-bin.000123").unwrap();
        assert_eq!(name.sequence(), 123);
        assert_eq!(name.to_string(), "mysql-bin.000123");

        assert_eq!(LogFileName::parse("binlog.000456").unwrap().sequence(), 456);
        assert_eq!(LogFileName::parse("my.relay.log.001").unwrap().sequence(), 1);
    }

    #[test]
    fn test_parse_log_file_name_invalid() {
        assert!(matches!(
            LogFileName::parse("invalid"),
            Err(LogFileNameError::MissingSequence(_))
        ));
        assert!(LogFileName::parse("").is_err());
        assert!(matches!(
            LogFileName::parse("file.abc"),
            Err(LogFileNameError::InvalidSequence(_))
        ));
        assert!(LogFileName::parse("file.").is_err());
    }

    #[test]
    fn test_next_and_previous_keep_padding() {
        let name = LogFileName::parse("relay-bin.000009").unwrap();

        assert_eq!(name.next().to_string(), "relay-bin.000010");
        assert_eq!(name.previous().unwrap().to_string(), "relay-bin.000008");
    }

    #[test]
    fn test_first_file_has_no_previous() {
        let name = LogFileName::parse("relay-bin.000001").unwrap();

        assert!(name.previous().is_none());
    }

    #[test]
    fn test_ordering_follows_sequence_not_text() {
        let a = LogFileName::parse("mysql-bin.999999").unwrap();
        let b = LogFileName::parse("mysql-bin.1000000").unwrap();

        assert!(a < b);
        assert!("mysql-bin.999999" > "mysql-bin.1000000");
    }
}
