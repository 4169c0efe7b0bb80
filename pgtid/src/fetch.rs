//! Page reads over a server's logs, continuing across file boundaries.

use std::future::Future;

use metrics::counter;
use tracing::debug;

use crate::error::PgtidResult;
use crate::metrics::{LOG_TYPE_LABEL, PGTID_LOG_PAGES_FETCHED_TOTAL};
use crate::source::{EventsRequest, SharedLogSource};
use crate::types::{LogEvent, LogType, Position};

/// Where a page read begins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadStart {
    /// With the record starting at the position.
    At(Position),
    /// With the record following the one starting at the position.
    After(Position),
}

impl ReadStart {
    pub fn position(&self) -> &Position {
        match self {
            ReadStart::At(position) | ReadStart::After(position) => position,
        }
    }

    fn request(&self, limit: u64) -> EventsRequest<'_> {
        match self {
            ReadStart::At(position) => EventsRequest::at(position, limit),
            ReadStart::After(position) => EventsRequest::after(position, limit),
        }
    }
}

/// Supplies a cursor with pages of records.
///
/// An empty page with no error means the stream has truly ended.
pub trait EventPages {
    /// Returns the next non-empty page of records starting at `start`, moving on to later
    /// files as needed.
    fn next_page(
        &self,
        start: &ReadStart,
    ) -> impl Future<Output = PgtidResult<Vec<LogEvent>>> + Send;
}

/// Reads bounded pages of records from one server.
#[derive(Debug, Clone)]
pub struct PageFetcher {
    source: SharedLogSource,
    page_size: u64,
}

impl PageFetcher {
    pub fn new(source: SharedLogSource, page_size: u64) -> Self {
        Self { source, page_size }
    }

    pub fn source(&self) -> &SharedLogSource {
        &self.source
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    /// Issues a single bounded read starting at `start`.
    pub async fn fetch_page(&self, start: &ReadStart) -> PgtidResult<Vec<LogEvent>> {
        let log_type = start.position().log_type();
        self.read(&start.request(self.page_size), log_type).await
    }

    /// Issues a single bounded read of the `page`-th window of records of `file`.
    pub async fn fetch_window(
        &self,
        file: &str,
        log_type: LogType,
        page: u64,
    ) -> PgtidResult<Vec<LogEvent>> {
        self.read(
            &EventsRequest::window(file, log_type, page, self.page_size),
            log_type,
        )
        .await
    }

    /// Reads the next page starting at `start`, rolling over to the following files while
    /// reads come back empty.
    ///
    /// Returns an empty page only once no file follows the last one read.
    pub async fn fetch_next_page(&self, start: &ReadStart) -> PgtidResult<Vec<LogEvent>> {
        let mut events = self.fetch_page(start).await?;
        let mut position = start.position().clone();

        while events.is_empty() {
            let Some(next_file) = self
                .source
                .next_log_file(position.file(), position.log_type())
                .await?
            else {
                debug!(
                    server = %self.source.key(),
                    position = %position,
                    "reached the end of the logs"
                );
                break;
            };

            debug!(
                server = %self.source.key(),
                from = position.file(),
                to = %next_file,
                "rolling over to the next log file"
            );
            position = Position::new(next_file, 0, position.log_type());
            events = self.fetch_page(&ReadStart::At(position.clone())).await?;
        }

        Ok(events)
    }

    async fn read(
        &self,
        request: &EventsRequest<'_>,
        log_type: LogType,
    ) -> PgtidResult<Vec<LogEvent>> {
        let events = self.source.read_events(request).await?;

        counter!(
            PGTID_LOG_PAGES_FETCHED_TOTAL,
            LOG_TYPE_LABEL => log_type.as_str(),
        )
        .increment(1);

        Ok(events)
    }
}

impl EventPages for PageFetcher {
    async fn next_page(&self, start: &ReadStart) -> PgtidResult<Vec<LogEvent>> {
        self.fetch_next_page(start).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::test_utils::MemoryLogSource;

    fn fetcher(source: &Arc<MemoryLogSource>, page_size: u64) -> PageFetcher {
        PageFetcher::new(source.clone(), page_size)
    }

    #[tokio::test]
    async fn test_fetch_page_is_bounded() {
        let source = Arc::new(
            MemoryLogSource::new("db-1", 3306).with_binary_log("mysql-bin.000001", &["a", "b", "c"]),
        );
        let start = ReadStart::At(Position::primary("mysql-bin.000001", 0));

        let page = fetcher(&source, 2).fetch_page(&start).await.unwrap();

        assert_eq!(
            page.iter().map(|e| e.info.as_str()).collect::<Vec<_>>(),
            vec!["a", "b"]
        );
    }

    #[tokio::test]
    async fn test_fetch_next_page_rolls_over_files() {
        let source = Arc::new(
            MemoryLogSource::new("db-1", 3306)
                .with_binary_log("mysql-bin.000001", &["a"])
                .with_binary_log("mysql-bin.000002", &[])
                .with_binary_log("mysql-bin.000003", &["b"]),
        );
        let first = source.events("mysql-bin.000001", LogType::Primary);
        let start = ReadStart::After(first[0].position.clone());

        let page = fetcher(&source, 10).fetch_next_page(&start).await.unwrap();

        assert_eq!(page.len(), 1);
        assert_eq!(page[0].info, "b");
        assert_eq!(page[0].position.file(), "mysql-bin.000003");
        assert_eq!(source.event_reads(), 3);
    }

    #[tokio::test]
    async fn test_fetch_next_page_ends_on_active_file() {
        let source = Arc::new(
            MemoryLogSource::new("db-1", 3306).with_binary_log("mysql-bin.000001", &["a"]),
        );
        let first = source.events("mysql-bin.000001", LogType::Primary);
        let start = ReadStart::After(first[0].position.clone());

        let page = fetcher(&source, 10).fetch_next_page(&start).await.unwrap();

        assert!(page.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_next_page_follows_relay_log_names() {
        let source = Arc::new(
            MemoryLogSource::new("replica-1", 3306)
                .with_relay_log("relay-bin.000004", &["x"])
                .with_relay_log("relay-bin.000005", &["y"])
                .with_replica_position(Position::relay("relay-bin.000005", 4)),
        );
        let first = source.events("relay-bin.000004", LogType::Relay);
        let start = ReadStart::After(first[0].position.clone());

        let page = fetcher(&source, 10).fetch_next_page(&start).await.unwrap();

        assert_eq!(page.len(), 1);
        assert_eq!(page[0].position.file(), "relay-bin.000005");
    }
}
