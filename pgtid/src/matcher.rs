//! Lock-step matching of two servers' logs from a shared marker.
//!
//! Given a marker position on a candidate replica (the instance) and the position of the same
//! marker on an intended source, both logs are read forward in turn, record by record. The
//! records must agree until the instance's log ends; at that point the source's cursor points
//! at where the instance would resume replicating from it.
//!
//! The instance's log ends differently per log type. A binary log must end exactly at the
//! instance's live write position. A relay log ends at the position its applier executed up to,
//! which has to be hit exactly; relay logs report end offsets in the source's coordinates, so
//! reaching the bound is the only sanity check available.

use metrics::{counter, histogram};
use pgtid_config::shared::MarkerConfig;
use tracing::{debug, info};

use crate::bail;
use crate::cursor::{EventFilter, LogCursor};
use crate::error::{ErrorKind, PgtidResult};
use crate::fetch::PageFetcher;
use crate::metrics::{ERROR_KIND_LABEL, OUTCOME_LABEL, PGTID_MATCH_STEPS, PGTID_MATCHES_TOTAL};
use crate::source::SharedLogSource;
use crate::types::{LogEvent, LogType, Position};

/// Where the instance's log ends for matching purposes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstanceLimit {
    /// The instance is read through its binary logs, which must end exactly at its current
    /// write position.
    Primary { current: Position },
    /// The instance is read through its relay logs up to the position its applier executed.
    Relay { executed: Position },
}

impl InstanceLimit {
    fn log_type(&self) -> LogType {
        match self {
            InstanceLimit::Primary { .. } => LogType::Primary,
            InstanceLimit::Relay { .. } => LogType::Relay,
        }
    }
}

/// Inputs of one match.
#[derive(Debug, Clone)]
pub struct MatchRequest {
    /// The candidate replica.
    pub instance: SharedLogSource,
    /// Position of the shared marker on the instance.
    pub instance_start: Position,
    /// Where the instance's log ends.
    pub instance_limit: InstanceLimit,
    /// The intended source.
    pub source: SharedLogSource,
    /// Position of the shared marker on the source.
    pub source_start: Position,
}

/// Translates an instance's replication position onto another server.
#[derive(Debug, Clone)]
pub struct PositionMatcher {
    page_size: u64,
    filter: EventFilter,
}

impl PositionMatcher {
    pub fn new(page_size: u64, filter: EventFilter) -> Self {
        Self { page_size, filter }
    }

    pub fn from_config(config: &MarkerConfig) -> Self {
        Self::new(
            config.page_size,
            EventFilter::new(config.skip_event_kinds.iter().cloned()),
        )
    }

    /// Returns the position on the source the instance would continue replicating from.
    ///
    /// Fails with a protocol violation when the logs disagree:
    /// - [`ErrorKind::ExhaustionPositionMismatch`] if the instance's binary logs end
    ///   anywhere but at its current write position.
    /// - [`ErrorKind::RelayBoundOvershoot`] if the relay log scan passes the executed
    ///   position without hitting it.
    /// - [`ErrorKind::OtherSideExhausted`] if the source runs out of records first, meaning
    ///   the instance is ahead of the source. Matching may succeed with the roles swapped.
    /// - [`ErrorKind::DivergentEntries`] if two corresponding records differ.
    ///
    /// Read failures are returned as they are, nothing is retried.
    pub async fn match_positions(&self, request: &MatchRequest) -> PgtidResult<Position> {
        let result = self.run(request).await;

        match &result {
            Ok(_) => {
                counter!(PGTID_MATCHES_TOTAL, OUTCOME_LABEL => "matched").increment(1);
            }
            Err(err) => {
                counter!(
                    PGTID_MATCHES_TOTAL,
                    OUTCOME_LABEL => "failed",
                    ERROR_KIND_LABEL => format!("{:?}", err.kind()),
                )
                .increment(1);
            }
        }

        result
    }

    async fn run(&self, request: &MatchRequest) -> PgtidResult<Position> {
        if request.instance_start.log_type() != request.instance_limit.log_type() {
            bail!(
                ErrorKind::InvalidState,
                "Instance start position and limit refer to different log types",
                format!(
                    "start {} is in a {} log, limit is for {} logs",
                    request.instance_start,
                    request.instance_start.log_type(),
                    request.instance_limit.log_type()
                )
            );
        }

        let mut instance_cursor = LogCursor::new(
            request.instance_start.clone(),
            PageFetcher::new(request.instance.clone(), self.page_size),
            self.filter.clone(),
        );
        let mut source_cursor = LogCursor::new(
            request.source_start.clone(),
            PageFetcher::new(request.source.clone(), self.page_size),
            self.filter.clone(),
        );

        let mut steps: u64 = 0;
        loop {
            let instance_event = instance_cursor.next_real_event().await?;

            let reached_limit = match &request.instance_limit {
                InstanceLimit::Primary { current } => {
                    if instance_event.is_none() {
                        let reached = instance_cursor.next_coordinates();
                        if reached != *current {
                            bail!(
                                ErrorKind::ExhaustionPositionMismatch,
                                "Instance binary logs did not end at its current position",
                                format!("ended at {reached}, current position is {current}")
                            );
                        }
                        true
                    } else {
                        false
                    }
                }
                InstanceLimit::Relay { executed } => {
                    reached_relay_limit(instance_event.as_ref(), executed)?
                }
            };

            if reached_limit {
                let target = source_cursor.next_coordinates();
                histogram!(PGTID_MATCH_STEPS).record(steps as f64);
                info!(
                    instance = %request.instance.key(),
                    source = %request.source.key(),
                    instance_position = %instance_cursor.next_coordinates(),
                    target = %target,
                    steps,
                    "matched instance position on source"
                );

                return Ok(target);
            }

            // A record is present whenever the limit was not reached.
            let Some(instance_event) = instance_event else {
                bail!(
                    ErrorKind::InvalidState,
                    "Instance log ended without reaching its limit"
                );
            };
            debug!(
                position = %instance_event.position,
                kind = %instance_event.kind,
                info = %instance_event.info,
                "instance >"
            );

            let Some(source_event) = source_cursor.next_real_event().await? else {
                bail!(
                    ErrorKind::OtherSideExhausted,
                    "Source logs ended before the instance logs, the instance is ahead of the source",
                    format!(
                        "source {} ended at {} while instance {} is at {}",
                        request.source.key(),
                        source_cursor.next_coordinates(),
                        request.instance.key(),
                        instance_event.position
                    )
                );
            };
            debug!(
                position = %source_event.position,
                kind = %source_event.kind,
                info = %source_event.info,
                "source <"
            );

            if instance_event.info != source_event.info {
                bail!(
                    ErrorKind::DivergentEntries,
                    "Instance and source log entries diverge",
                    format!(
                        "{} at {} <-> {} at {}",
                        instance_event.info,
                        instance_event.position,
                        source_event.info,
                        source_event.position
                    )
                );
            }

            steps += 1;
        }
    }
}

/// Decides whether a relay log scan has reached the executed position.
///
/// The scan ends when the log is exhausted or when a record starts exactly at `executed`.
fn reached_relay_limit(event: Option<&LogEvent>, executed: &Position) -> PgtidResult<bool> {
    let Some(event) = event else {
        debug!(executed = %executed, "reached the end of the relay logs");
        return Ok(true);
    };

    if event.position == *executed {
        debug!(executed = %executed, "reached the executed relay log position");
        return Ok(true);
    }

    if executed.smaller_than(&event.position)? {
        bail!(
            ErrorKind::RelayBoundOvershoot,
            "Relay log scan passed the executed position without hitting it",
            format!("read {} past executed position {executed}", event.position)
        );
    }

    Ok(false)
}
