//! Windowed full-file scans for records matching a predicate.

use metrics::counter;
use tracing::debug;

use crate::error::PgtidResult;
use crate::fetch::PageFetcher;
use crate::metrics::{LOG_TYPE_LABEL, PGTID_LOG_EVENTS_SCANNED_TOTAL};
use crate::types::{LogEvent, LogType, MarkerEntry, Position};

/// When a scan of a file stops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanPolicy {
    /// Scan the whole file and keep the last matching record.
    ///
    /// With a bound, the scan stops at the first matching record not smaller than the
    /// bound; matches accepted before it stand.
    FindLast { bound: Option<Position> },
    /// Stop at the first matching record.
    FindFirst,
}

/// Scans `file` from its beginning in windows of the fetcher's page size and returns the
/// match selected by `policy`, or [`None`] if no record matches.
pub async fn scan_file<F>(
    fetcher: &PageFetcher,
    file: &str,
    log_type: LogType,
    policy: &ScanPolicy,
    matches: F,
) -> PgtidResult<Option<MarkerEntry>>
where
    F: Fn(&LogEvent) -> bool,
{
    let mut best: Option<MarkerEntry> = None;
    let mut page = 0;

    loop {
        let events = fetcher.fetch_window(file, log_type, page).await?;
        let read = events.len() as u64;

        counter!(
            PGTID_LOG_EVENTS_SCANNED_TOTAL,
            LOG_TYPE_LABEL => log_type.as_str(),
        )
        .increment(read);

        for event in events {
            if !matches(&event) {
                continue;
            }

            match policy {
                ScanPolicy::FindFirst => {
                    return Ok(Some(MarkerEntry {
                        position: event.position,
                        text: event.info,
                    }));
                }
                ScanPolicy::FindLast { bound } => {
                    if let Some(bound) = bound {
                        if !event.position.smaller_than(bound)? {
                            debug!(
                                file,
                                position = %event.position,
                                bound = %bound,
                                "scan reached its bound"
                            );
                            return Ok(best);
                        }
                    }

                    best = Some(MarkerEntry {
                        position: event.position,
                        text: event.info,
                    });
                }
            }
        }

        // A short window is the last one of the file.
        if read < fetcher.page_size() {
            return Ok(best);
        }
        page += 1;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::test_utils::MemoryLogSource;

    fn source() -> Arc<MemoryLogSource> {
        Arc::new(MemoryLogSource::new("db-1", 3306).with_binary_log(
            "mysql-bin.000001",
            &["m-1", "insert 1", "m-2", "insert 2", "m-3", "insert 3"],
        ))
    }

    fn is_marker(event: &LogEvent) -> bool {
        event.info.starts_with("m-")
    }

    #[tokio::test]
    async fn test_find_last_reads_every_window() {
        let source = source();
        let fetcher = PageFetcher::new(source.clone(), 4);

        let found = scan_file(
            &fetcher,
            "mysql-bin.000001",
            LogType::Primary,
            &ScanPolicy::FindLast { bound: None },
            is_marker,
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(found.text, "m-3");
        assert_eq!(source.event_reads(), 2);
    }

    #[tokio::test]
    async fn test_find_last_stops_at_bound() {
        let source = source();
        let events = source.events("mysql-bin.000001", LogType::Primary);
        let fetcher = PageFetcher::new(source.clone(), 100);

        let found = scan_file(
            &fetcher,
            "mysql-bin.000001",
            LogType::Primary,
            &ScanPolicy::FindLast {
                bound: Some(events[4].position.clone()),
            },
            is_marker,
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(found.text, "m-2");
        assert_eq!(found.position, events[2].position);
    }

    #[tokio::test]
    async fn test_find_first_stops_within_first_window() {
        let source = source();
        let fetcher = PageFetcher::new(source.clone(), 2);

        let found = scan_file(
            &fetcher,
            "mysql-bin.000001",
            LogType::Primary,
            &ScanPolicy::FindFirst,
            |event| event.info.starts_with("insert"),
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(found.text, "insert 1");
        assert_eq!(source.event_reads(), 1);
    }

    #[tokio::test]
    async fn test_no_match_is_none() {
        let source = source();
        let fetcher = PageFetcher::new(source.clone(), 100);

        let found = scan_file(
            &fetcher,
            "mysql-bin.000001",
            LogType::Primary,
            &ScanPolicy::FindFirst,
            |event| event.info == "absent",
        )
        .await
        .unwrap();

        assert!(found.is_none());
    }
}
