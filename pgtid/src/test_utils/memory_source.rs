use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::bail;
use crate::error::{ErrorKind, PgtidResult};
use crate::source::{EventsRequest, LogSource, ServerKey, resolve_next_file};
use crate::types::{LogEvent, LogType, Position};

/// Offset of the first record in a log file, right after the file's magic number.
pub const FIRST_RECORD_OFFSET: u64 = 4;

/// Size of a record header, added to the statement length to derive record sizes.
const RECORD_HEADER_SIZE: u64 = 19;

/// Shift applied to the end offsets of relay log records.
///
/// Relay logs report end offsets in the source server's binary log, so they never line up
/// with the relay log's own offsets.
const RELAY_END_OFFSET_SHIFT: u64 = 100_000;

#[derive(Debug, Clone)]
struct LogFile {
    name: String,
    events: Vec<LogEvent>,
}

impl LogFile {
    fn build(name: &str, log_type: LogType, records: &[(&str, &str)]) -> Self {
        let mut offset = FIRST_RECORD_OFFSET;
        let mut events = Vec::with_capacity(records.len());

        for (kind, info) in records {
            let size = RECORD_HEADER_SIZE + info.len() as u64;
            let next_position = match log_type {
                LogType::Primary => offset + size,
                LogType::Relay => offset + size + RELAY_END_OFFSET_SHIFT,
            };

            events.push(LogEvent {
                position: Position::new(name, offset, log_type),
                next_position,
                kind: kind.to_string(),
                info: info.to_string(),
            });
            offset += size;
        }

        Self {
            name: name.to_string(),
            events,
        }
    }

    /// Offset right after the last record.
    fn end_offset(&self) -> u64 {
        self.events
            .last()
            .map(|event| event.position.offset() + RECORD_HEADER_SIZE + event.info.len() as u64)
            .unwrap_or(FIRST_RECORD_OFFSET)
    }
}

/// In-memory [`LogSource`] for tests.
///
/// Records get realistic, strictly increasing offsets starting at [`FIRST_RECORD_OFFSET`].
/// Positioned reads behave like MySQL: starting at an offset which is not the start of a
/// record fails, and reading a file the server does not have fails with
/// [`ErrorKind::LogFileNotFound`].
#[derive(Debug)]
pub struct MemoryLogSource {
    key: ServerKey,
    binary_logs: Vec<LogFile>,
    relay_logs: Vec<LogFile>,
    replica_position: Option<Position>,
    failing_files: HashSet<String>,
    event_reads: AtomicUsize,
    status_reads: AtomicUsize,
}

impl MemoryLogSource {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            key: ServerKey::new(host, port),
            binary_logs: Vec::new(),
            relay_logs: Vec::new(),
            replica_position: None,
            failing_files: HashSet::new(),
            event_reads: AtomicUsize::new(0),
            status_reads: AtomicUsize::new(0),
        }
    }

    /// Appends a binary log file holding one `Query` record per statement.
    pub fn with_binary_log(self, file: &str, statements: &[&str]) -> Self {
        let records = as_queries(statements);
        self.with_binary_log_records(file, &records)
    }

    /// Appends a binary log file holding `(kind, info)` records.
    pub fn with_binary_log_records(mut self, file: &str, records: &[(&str, &str)]) -> Self {
        self.binary_logs
            .push(LogFile::build(file, LogType::Primary, records));
        self
    }

    /// Appends a relay log file holding one `Query` record per statement.
    pub fn with_relay_log(mut self, file: &str, statements: &[&str]) -> Self {
        let records = as_queries(statements);
        self.relay_logs
            .push(LogFile::build(file, LogType::Relay, &records));
        self
    }

    /// Sets the relay log position executed by the replica's applier.
    ///
    /// Without it, a source with relay logs reports the end of its last relay log.
    pub fn with_replica_position(mut self, position: Position) -> Self {
        self.replica_position = Some(position);
        self
    }

    /// Sets the executed relay log position to the start of the `index`-th record of `file`.
    pub fn with_replica_position_at(self, file: &str, index: usize) -> Self {
        let position = self.events(file, LogType::Relay)[index].position.clone();
        self.with_replica_position(position)
    }

    /// Makes every read of `file` fail as if the connection dropped.
    pub fn with_failing_file(mut self, file: &str) -> Self {
        self.failing_files.insert(file.to_string());
        self
    }

    /// Returns all records of a file.
    ///
    /// # Panics
    ///
    /// Panics if the file does not exist.
    pub fn events(&self, file: &str, log_type: LogType) -> Vec<LogEvent> {
        self.file(file, log_type)
            .map(|log_file| log_file.events.clone())
            .unwrap_or_else(|| panic!("no {log_type} log named {file}"))
    }

    /// Returns the position right after the last record of a file.
    ///
    /// # Panics
    ///
    /// Panics if the file does not exist.
    pub fn end_position(&self, file: &str, log_type: LogType) -> Position {
        let log_file = self
            .file(file, log_type)
            .unwrap_or_else(|| panic!("no {log_type} log named {file}"));

        Position::new(file, log_file.end_offset(), log_type)
    }

    /// Returns the number of record reads served.
    pub fn event_reads(&self) -> usize {
        self.event_reads.load(Ordering::SeqCst)
    }

    /// Returns the number of file list and status reads served.
    pub fn status_reads(&self) -> usize {
        self.status_reads.load(Ordering::SeqCst)
    }

    /// Resets all read counters.
    pub fn reset_reads(&self) {
        self.event_reads.store(0, Ordering::SeqCst);
        self.status_reads.store(0, Ordering::SeqCst);
    }

    fn file(&self, file: &str, log_type: LogType) -> Option<&LogFile> {
        let files = match log_type {
            LogType::Primary => &self.binary_logs,
            LogType::Relay => &self.relay_logs,
        };

        files.iter().find(|log_file| log_file.name == file)
    }

    fn active_file(&self, log_type: LogType) -> Option<String> {
        match log_type {
            LogType::Primary => self.binary_logs.last().map(|file| file.name.clone()),
            LogType::Relay => self
                .replica_position
                .as_ref()
                .map(|position| position.file().to_string())
                .or_else(|| self.relay_logs.last().map(|file| file.name.clone())),
        }
    }
}

#[async_trait]
impl LogSource for MemoryLogSource {
    fn key(&self) -> &ServerKey {
        &self.key
    }

    async fn read_events(&self, request: &EventsRequest<'_>) -> PgtidResult<Vec<LogEvent>> {
        self.event_reads.fetch_add(1, Ordering::SeqCst);

        if self.failing_files.contains(request.file) {
            bail!(
                ErrorKind::SourceConnectionFailed,
                "Lost connection to MySQL server during query",
                request.file
            );
        }

        let Some(log_file) = self.file(request.file, request.log_type) else {
            bail!(
                ErrorKind::LogFileNotFound,
                "Could not find target log",
                request.file
            );
        };

        let start = match request.from {
            None => 0,
            Some(from) if from <= FIRST_RECORD_OFFSET => 0,
            Some(from) if from == log_file.end_offset() => log_file.events.len(),
            Some(from) => {
                match log_file
                    .events
                    .iter()
                    .position(|event| event.position.offset() == from)
                {
                    Some(index) => index,
                    None => bail!(
                        ErrorKind::SourceQueryFailed,
                        "Wrong offset or I/O error",
                        format!("{}:{from}", request.file)
                    ),
                }
            }
        };

        Ok(log_file
            .events
            .iter()
            .skip(start)
            .skip(request.skip as usize)
            .take(request.limit as usize)
            .cloned()
            .collect())
    }

    async fn binary_logs(&self) -> PgtidResult<Vec<String>> {
        self.status_reads.fetch_add(1, Ordering::SeqCst);

        Ok(self
            .binary_logs
            .iter()
            .map(|file| file.name.clone())
            .collect())
    }

    async fn next_log_file(&self, file: &str, log_type: LogType) -> PgtidResult<Option<String>> {
        self.status_reads.fetch_add(1, Ordering::SeqCst);

        let Some(active_file) = self.active_file(log_type) else {
            bail!(
                ErrorKind::InvalidState,
                "Server has no logs of the requested type",
                log_type.as_str()
            );
        };
        let binary_logs: Vec<String> = self
            .binary_logs
            .iter()
            .map(|file| file.name.clone())
            .collect();

        resolve_next_file(file, log_type, &active_file, &binary_logs)
    }

    async fn current_position(&self) -> PgtidResult<Position> {
        self.status_reads.fetch_add(1, Ordering::SeqCst);

        let Some(last) = self.binary_logs.last() else {
            bail!(
                ErrorKind::InvalidState,
                "Binary logging is disabled on the server",
                self.key.to_string()
            );
        };

        Ok(Position::primary(last.name.clone(), last.end_offset()))
    }

    async fn replica_position(&self) -> PgtidResult<Option<Position>> {
        self.status_reads.fetch_add(1, Ordering::SeqCst);

        if let Some(position) = &self.replica_position {
            return Ok(Some(position.clone()));
        }

        Ok(self
            .relay_logs
            .last()
            .map(|last| Position::relay(last.name.clone(), last.end_offset())))
    }
}

fn as_queries<'a>(statements: &[&'a str]) -> Vec<(&'static str, &'a str)> {
    statements
        .iter()
        .map(|statement| ("Query", *statement))
        .collect()
}
