use std::sync::Arc;

use pgtid::bail;
use pgtid::discovery::MarkerDiscovery;
use pgtid::error::{ErrorKind, PgtidResult};
use pgtid::matcher::{InstanceLimit, MatchRequest, PositionMatcher};
use pgtid::source::{MySqlLogSource, SharedLogSource};
use pgtid::types::{MarkerEntry, Position};
use pgtid_config::shared::{LogSelection, MarkerConfig, MatcherServiceConfig};
use serde::Serialize;
use tracing::info;

use crate::error::MatcherResult;

/// Outcome of a successful match, printed as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchReport {
    /// The candidate replica, as `host:port`.
    pub instance: String,
    /// The intended source, as `host:port`.
    pub source: String,
    /// Text of the marker both servers were aligned on.
    pub marker: String,
    /// Position of the marker on the candidate replica.
    pub instance_marker_position: Position,
    /// Position of the marker on the source.
    pub source_marker_position: Position,
    /// Position on the source the candidate replica would continue replicating from.
    pub target_position: Position,
}

/// Connects to both configured servers and translates the instance's position.
///
/// Never changes replication on either server.
pub async fn start_matcher_with_config(
    config: MatcherServiceConfig,
) -> MatcherResult<MatchReport> {
    info!("starting matcher");

    log_config(&config);

    let instance: SharedLogSource = Arc::new(MySqlLogSource::new(&config.instance));
    let source: SharedLogSource = Arc::new(MySqlLogSource::new(&config.source));

    let report =
        translate_position(&instance, &source, &config.marker, config.log_selection).await?;

    Ok(report)
}

/// Finds the instance's newest marker, locates it on the source and matches both logs from
/// there.
pub async fn translate_position(
    instance: &SharedLogSource,
    source: &SharedLogSource,
    marker_config: &MarkerConfig,
    log_selection: LogSelection,
) -> PgtidResult<MatchReport> {
    let discovery = MarkerDiscovery::from_config(marker_config)?;
    let sweeper = discovery.cache().spawn_sweeper();

    let result = align_and_match(
        &discovery,
        instance,
        source,
        &PositionMatcher::from_config(marker_config),
        log_selection,
    )
    .await;

    sweeper.abort();

    result
}

async fn align_and_match(
    discovery: &MarkerDiscovery,
    instance: &SharedLogSource,
    source: &SharedLogSource,
    matcher: &PositionMatcher,
    log_selection: LogSelection,
) -> PgtidResult<MatchReport> {
    let (marker, instance_limit) =
        newest_instance_marker(discovery, instance, log_selection).await?;
    info!(
        instance = %instance.key(),
        position = %marker.position,
        marker = %marker.text,
        "aligning on newest instance marker"
    );

    let source_start = discovery
        .search_marker_on_server(source, &marker.text)
        .await?;

    let request = MatchRequest {
        instance: instance.clone(),
        instance_start: marker.position.clone(),
        instance_limit,
        source: source.clone(),
        source_start: source_start.clone(),
    };
    let target = matcher.match_positions(&request).await?;

    Ok(MatchReport {
        instance: instance.key().to_string(),
        source: source.key().to_string(),
        marker: marker.text,
        instance_marker_position: marker.position,
        source_marker_position: source_start,
        target_position: target,
    })
}

/// Returns the instance's newest marker together with where its log ends.
async fn newest_instance_marker(
    discovery: &MarkerDiscovery,
    instance: &SharedLogSource,
    log_selection: LogSelection,
) -> PgtidResult<(MarkerEntry, InstanceLimit)> {
    match log_selection {
        LogSelection::Primary => newest_primary_marker(discovery, instance).await,
        LogSelection::Relay => newest_relay_marker(discovery, instance).await,
        LogSelection::Auto => match newest_primary_marker(discovery, instance).await {
            Err(err)
                if matches!(
                    err.kind(),
                    ErrorKind::MarkerNotFound | ErrorKind::InvalidState
                ) =>
            {
                info!(
                    instance = %instance.key(),
                    reason = err.description(),
                    "no usable binary log marker, falling back to relay logs"
                );
                newest_relay_marker(discovery, instance).await
            }
            result => result,
        },
    }
}

async fn newest_primary_marker(
    discovery: &MarkerDiscovery,
    instance: &SharedLogSource,
) -> PgtidResult<(MarkerEntry, InstanceLimit)> {
    // Fails when binary logging is disabled.
    let current = instance.current_position().await?;
    let marker = discovery.last_marker_in_primary_logs(instance).await?;

    Ok((marker, InstanceLimit::Primary { current }))
}

async fn newest_relay_marker(
    discovery: &MarkerDiscovery,
    instance: &SharedLogSource,
) -> PgtidResult<(MarkerEntry, InstanceLimit)> {
    let Some(executed) = instance.replica_position().await? else {
        bail!(
            ErrorKind::InvalidState,
            "Instance is not a replica and has no relay logs",
            instance.key().to_string()
        );
    };
    let marker = discovery
        .last_marker_in_relay_logs(instance, &executed)
        .await?;

    Ok((marker, InstanceLimit::Relay { executed }))
}

fn log_config(config: &MatcherServiceConfig) {
    info!(
        instance_host = config.instance.host,
        instance_port = config.instance.port,
        instance_tls_enabled = config.instance.tls.enabled,
        source_host = config.source.host,
        source_port = config.source.port,
        source_tls_enabled = config.source.tls.enabled,
        "server configuration"
    );
    info!(
        pattern = config.marker.pattern,
        skip_event_kinds = ?config.marker.skip_event_kinds,
        page_size = config.marker.page_size,
        log_selection = ?config.log_selection,
        "marker configuration"
    );
}
