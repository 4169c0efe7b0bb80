use std::fmt;

/// The kind of log a `SHOW ... EVENTS` statement reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogKind {
    /// The server's own binary log.
    Binary,
    /// The replica's relay log.
    Relay,
}

impl LogKind {
    fn keyword(&self) -> &'static str {
        match self {
            LogKind::Binary => "BINLOG",
            LogKind::Relay => "RELAYLOG",
        }
    }
}

/// A bounded `SHOW {BINLOG|RELAYLOG} EVENTS` read.
///
/// With a `from` offset the read starts at that byte offset of the file, otherwise at the
/// beginning of the file. `row_offset` skips that many records of the result before
/// `limit` records are returned, which serves both windowed full-file scans and resuming
/// right after an already consumed record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShowEventsStatement<'a> {
    pub kind: LogKind,
    pub file: &'a str,
    pub from: Option<u64>,
    pub row_offset: u64,
    pub limit: u64,
}

impl fmt::Display for ShowEventsStatement<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SHOW {} EVENTS IN {}",
            self.kind.keyword(),
            quote_literal(self.file)
        )?;

        if let Some(from) = self.from {
            write!(f, " FROM {from}")?;
        }

        write!(f, " LIMIT {}, {}", self.row_offset, self.limit)
    }
}

/// Quotes a value as a MySQL single-quoted string literal.
pub fn quote_literal(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('\'');
    for c in value.chars() {
        match c {
            '\'' => quoted.push_str("''"),
            '\\' => quoted.push_str("\\\\"),
            c => quoted.push(c),
        }
    }
    quoted.push('\'');

    quoted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positioned_binlog_read() {
        let statement = ShowEventsStatement {
            kind: LogKind::Binary,
            file: "mysql-bin.000012",
            from: Some(4),
            row_offset: 0,
            limit: 1_000_000,
        };

        assert_eq!(
            statement.to_string(),
            "SHOW BINLOG EVENTS IN 'mysql-bin.000012' FROM 4 LIMIT 0, 1000000"
        );
    }

    #[test]
    fn test_windowed_relaylog_read() {
        let statement = ShowEventsStatement {
            kind: LogKind::Relay,
            file: "relay-bin.000003",
            from: None,
            row_offset: 2000,
            limit: 1000,
        };

        assert_eq!(
            statement.to_string(),
            "SHOW RELAYLOG EVENTS IN 'relay-bin.000003' LIMIT 2000, 1000"
        );
    }

    #[test]
    fn test_quote_literal_escapes() {
        assert_eq!(quote_literal("it's"), "'it''s'");
        assert_eq!(quote_literal(r"a\b"), r"'a\\b'");
    }
}
