//! Lazy, restartable iteration over a server's log records.

use std::collections::{HashSet, VecDeque};

use metrics::counter;
use tracing::trace;

use crate::bail;
use crate::error::{ErrorKind, PgtidResult};
use crate::fetch::{EventPages, ReadStart};
use crate::metrics::{LOG_TYPE_LABEL, PGTID_LOG_EVENTS_SCANNED_TOTAL};
use crate::types::{LogEvent, Position};

/// Selects which records take part in matching.
///
/// Records whose kind is listed are skipped by [`LogCursor::next_real_event`]. The default
/// filter skips nothing.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    skipped_kinds: HashSet<String>,
}

impl EventFilter {
    pub fn new<I, S>(skipped_kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            skipped_kinds: skipped_kinds.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns [`true`] if the record takes part in matching.
    pub fn is_real(&self, event: &LogEvent) -> bool {
        !self.skipped_kinds.contains(&event.kind)
    }
}

/// A forward cursor over the records of one server's logs, starting at a given position.
///
/// Records are fetched lazily a page at a time. Each refill starts right after the last
/// consumed record, so continuing never relies on the end offsets a log reports. Once the
/// source reports the true end of its logs the cursor stays exhausted.
#[derive(Debug)]
pub struct LogCursor<P> {
    pages: P,
    filter: EventFilter,
    start: Position,
    buffer: VecDeque<LogEvent>,
    last_consumed: Option<LogEvent>,
    exhausted: bool,
}

impl<P> LogCursor<P>
where
    P: EventPages,
{
    pub fn new(start: Position, pages: P, filter: EventFilter) -> Self {
        Self {
            pages,
            filter,
            start,
            buffer: VecDeque::new(),
            last_consumed: None,
            exhausted: false,
        }
    }

    /// Returns the next record passing the filter, or [`None`] once the logs are exhausted.
    ///
    /// Skipped records are still consumed and move [`LogCursor::next_coordinates`] forward.
    /// Fails with [`ErrorKind::NonMonotonicPosition`] if a record does not come strictly
    /// after the previously consumed one.
    pub async fn next_real_event(&mut self) -> PgtidResult<Option<LogEvent>> {
        loop {
            if self.exhausted {
                return Ok(None);
            }

            let Some(event) = self.buffer.pop_front() else {
                self.refill().await?;
                continue;
            };

            self.check_monotonic(&event)?;
            self.last_consumed = Some(event.clone());

            counter!(
                PGTID_LOG_EVENTS_SCANNED_TOTAL,
                LOG_TYPE_LABEL => self.start.log_type().as_str(),
            )
            .increment(1);

            if self.filter.is_real(&event) {
                return Ok(Some(event));
            }

            trace!(position = %event.position, kind = %event.kind, "skipping record");
        }
    }

    /// Returns the position reading would continue from.
    ///
    /// This is the start position until a record is consumed, then the end of the last
    /// consumed record as reported by the log. It stays stable once the cursor is exhausted.
    pub fn next_coordinates(&self) -> Position {
        match &self.last_consumed {
            Some(last) => last.position.with_offset(last.next_position),
            None => self.start.clone(),
        }
    }

    /// Returns [`true`] once the logs have been read to their end.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    async fn refill(&mut self) -> PgtidResult<()> {
        let start = match &self.last_consumed {
            Some(last) => ReadStart::After(last.position.clone()),
            None => ReadStart::At(self.start.clone()),
        };

        let page = self.pages.next_page(&start).await?;
        if page.is_empty() {
            trace!(position = %start.position(), "cursor exhausted");
            self.exhausted = true;
        } else {
            self.buffer.extend(page);
        }

        Ok(())
    }

    fn check_monotonic(&self, event: &LogEvent) -> PgtidResult<()> {
        let Some(last) = &self.last_consumed else {
            return Ok(());
        };

        if !last.position.smaller_than(&event.position)? {
            bail!(
                ErrorKind::NonMonotonicPosition,
                "Log record does not follow the previously read one",
                format!("read {} after {}", event.position, last.position)
            );
        }

        Ok(())
    }
}
