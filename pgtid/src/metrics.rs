//! Metric names emitted while scanning logs and matching positions.
//!
//! Only names and labels are defined here; installing an exporter is up to the binary.

/// Label for the scanned log type (`primary` or `relay`).
pub const LOG_TYPE_LABEL: &str = "log_type";

/// Label for the outcome of a match (`matched` or `failed`).
pub const OUTCOME_LABEL: &str = "outcome";

/// Label for error kind in metrics.
pub const ERROR_KIND_LABEL: &str = "error_kind";

// Scan metrics

/// Counter for log pages read from servers.
pub const PGTID_LOG_PAGES_FETCHED_TOTAL: &str = "pgtid_log_pages_fetched_total";

/// Counter for log records consumed by scans and cursors.
pub const PGTID_LOG_EVENTS_SCANNED_TOTAL: &str = "pgtid_log_events_scanned_total";

// Cache metrics

/// Counter for marker position lookups answered from the cache.
pub const PGTID_MARKER_CACHE_HITS_TOTAL: &str = "pgtid_marker_cache_hits_total";

/// Counter for marker position lookups that required a scan.
pub const PGTID_MARKER_CACHE_MISSES_TOTAL: &str = "pgtid_marker_cache_misses_total";

// Matcher metrics

/// Counter for finished position matches.
pub const PGTID_MATCHES_TOTAL: &str = "pgtid_matches_total";

/// Histogram of the number of entry pairs compared by one match.
pub const PGTID_MATCH_STEPS: &str = "pgtid_match_steps";
