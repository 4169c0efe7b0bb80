//! Finding marker entries in a server's logs.
//!
//! The newest marker of a server is searched in its binary logs, or in its relay logs up
//! to the position the replica's applier has executed. A marker's exact position on another
//! server is then found by its literal text and cached.

use metrics::counter;
use pgtid_config::shared::MarkerConfig;
use regex::Regex;
use tracing::{debug, info};

use crate::bail;
use crate::cache::MarkerCache;
use crate::error::{ErrorKind, PgtidResult};
use crate::fetch::PageFetcher;
use crate::metrics::{PGTID_MARKER_CACHE_HITS_TOTAL, PGTID_MARKER_CACHE_MISSES_TOTAL};
use crate::scan::{ScanPolicy, scan_file};
use crate::source::SharedLogSource;
use crate::types::{LogType, MarkerEntry, Position};

/// Locates marker entries in server logs.
#[derive(Debug, Clone)]
pub struct MarkerDiscovery {
    pattern: Regex,
    page_size: u64,
    cache: MarkerCache,
}

impl MarkerDiscovery {
    pub fn new(pattern: Regex, page_size: u64, cache: MarkerCache) -> Self {
        Self {
            pattern,
            page_size,
            cache,
        }
    }

    /// Builds the discovery from configuration, with a fresh cache.
    pub fn from_config(config: &MarkerConfig) -> PgtidResult<Self> {
        config.validate()?;

        Ok(Self::new(
            Regex::new(&config.pattern)?,
            config.page_size,
            MarkerCache::from_config(&config.cache),
        ))
    }

    pub fn cache(&self) -> &MarkerCache {
        &self.cache
    }

    /// Returns the last marker of one log file.
    ///
    /// With a `bound`, markers at or past it are ignored. Returns [`None`] when the file
    /// holds no marker.
    pub async fn last_marker_in_file(
        &self,
        source: &SharedLogSource,
        file: &str,
        log_type: LogType,
        bound: Option<&Position>,
    ) -> PgtidResult<Option<MarkerEntry>> {
        let fetcher = PageFetcher::new(source.clone(), self.page_size);
        let policy = ScanPolicy::FindLast {
            bound: bound.cloned(),
        };

        scan_file(&fetcher, file, log_type, &policy, |event| {
            self.pattern.is_match(&event.info)
        })
        .await
    }

    /// Returns the newest marker in the server's binary logs.
    ///
    /// Files are scanned newest first until one holds a marker.
    pub async fn last_marker_in_primary_logs(
        &self,
        source: &SharedLogSource,
    ) -> PgtidResult<MarkerEntry> {
        let binary_logs = source.binary_logs().await?;

        for file in binary_logs.iter().rev() {
            debug!(server = %source.key(), file = %file, "searching newest marker in binary log");

            if let Some(entry) = self
                .last_marker_in_file(source, file, LogType::Primary, None)
                .await?
            {
                info!(server = %source.key(), position = %entry.position, "found newest marker");
                return Ok(entry);
            }
        }

        bail!(
            ErrorKind::MarkerNotFound,
            "No marker found in the binary logs",
            source.key().to_string()
        );
    }

    /// Returns the newest marker in the server's relay logs, not past `executed`.
    ///
    /// Relay logs cannot be listed, so files are walked backwards by name from the one
    /// holding `executed`. Only that first file is bounded. The walk ends when no earlier
    /// file exists.
    pub async fn last_marker_in_relay_logs(
        &self,
        source: &SharedLogSource,
        executed: &Position,
    ) -> PgtidResult<MarkerEntry> {
        let mut current = executed.clone();
        let mut bound = Some(executed);

        loop {
            debug!(
                server = %source.key(),
                file = current.file(),
                bound = ?bound.map(ToString::to_string),
                "searching newest marker in relay log"
            );

            match self
                .last_marker_in_file(source, current.file(), LogType::Relay, bound)
                .await
            {
                Ok(Some(entry)) => {
                    info!(server = %source.key(), position = %entry.position, "found newest marker");
                    return Ok(entry);
                }
                Ok(None) => {}
                Err(err) if err.kind() == ErrorKind::LogFileNotFound => {
                    debug!(server = %source.key(), file = current.file(), "relay log does not exist");
                    break;
                }
                Err(err) => return Err(err),
            }

            bound = None;
            current = match current.previous_file_coordinates() {
                Ok(previous) => previous,
                Err(err) if err.kind() == ErrorKind::LogFileNotFound => break,
                Err(err) => return Err(err),
            };
        }

        bail!(
            ErrorKind::MarkerNotFound,
            "No marker found in the relay logs",
            source.key().to_string()
        );
    }

    /// Returns the position of the first record of `file` whose text is exactly `text`.
    pub async fn search_marker_in_log(
        &self,
        source: &SharedLogSource,
        file: &str,
        text: &str,
    ) -> PgtidResult<Position> {
        let fetcher = PageFetcher::new(source.clone(), self.page_size);

        match scan_file(&fetcher, file, LogType::Primary, &ScanPolicy::FindFirst, |event| {
            event.info == text
        })
        .await?
        {
            Some(entry) => Ok(entry.position),
            None => bail!(
                ErrorKind::MarkerNotFound,
                "Marker not found in binary log",
                format!("{file} on {}", source.key())
            ),
        }
    }

    /// Returns the position of the marker `text` in the server's binary logs.
    ///
    /// The cache is consulted first. Otherwise files are scanned newest first and the
    /// first hit is cached.
    pub async fn search_marker_on_server(
        &self,
        source: &SharedLogSource,
        text: &str,
    ) -> PgtidResult<Position> {
        if let Some(position) = self.cache.get(source.key(), text).await {
            counter!(PGTID_MARKER_CACHE_HITS_TOTAL).increment(1);
            debug!(server = %source.key(), position = %position, "marker position found in cache");
            return Ok(position);
        }
        counter!(PGTID_MARKER_CACHE_MISSES_TOTAL).increment(1);

        let binary_logs = source.binary_logs().await?;
        for file in binary_logs.iter().rev() {
            debug!(server = %source.key(), file = %file, "searching marker in binary log");

            match self.search_marker_in_log(source, file, text).await {
                Ok(position) => {
                    info!(server = %source.key(), position = %position, "located marker");
                    self.cache
                        .insert(source.key(), text, position.clone())
                        .await;
                    return Ok(position);
                }
                Err(err) if err.kind() == ErrorKind::MarkerNotFound => continue,
                Err(err) => return Err(err),
            }
        }

        bail!(
            ErrorKind::MarkerNotFound,
            "Marker not found in any binary log",
            source.key().to_string()
        );
    }
}
