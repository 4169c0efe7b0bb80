use std::sync::Arc;

use pgtid::cache::MarkerCache;
use pgtid::cursor::EventFilter;
use pgtid::discovery::MarkerDiscovery;
use pgtid::error::ErrorKind;
use pgtid::matcher::{InstanceLimit, MatchRequest, PositionMatcher};
use pgtid::source::SharedLogSource;
use pgtid::test_utils::MemoryLogSource;
use pgtid::types::LogType;
use pgtid_telemetry::tracing::init_test_tracing;
use regex::Regex;

const MARKER_PATTERN: &str = "^drop view if exists `meta`.`_pseudo_gtid_hint__";

fn marker(id: u32) -> String {
    format!("drop view if exists `meta`.`_pseudo_gtid_hint__{id}`")
}

fn insert(id: u32) -> String {
    format!("insert into orders values ({id})")
}

fn discovery() -> MarkerDiscovery {
    MarkerDiscovery::new(
        Regex::new(MARKER_PATTERN).unwrap(),
        100,
        MarkerCache::default(),
    )
}

fn source() -> Arc<MemoryLogSource> {
    let (m1, m2, m3, m4) = (marker(1), marker(2), marker(3), marker(4));
    let (i1, i2, i3) = (insert(1), insert(2), insert(3));

    Arc::new(MemoryLogSource::new("primary-1", 3306).with_binary_log(
        "mysql-bin.000007",
        &[
            m1.as_str(),
            i1.as_str(),
            m2.as_str(),
            i2.as_str(),
            m3.as_str(),
            i3.as_str(),
            m4.as_str(),
        ],
    ))
}

/// A replica without binary logs which received the source's history into two relay logs.
fn replica(executed_index: usize) -> Arc<MemoryLogSource> {
    let (m1, m2, m3) = (marker(1), marker(2), marker(3));
    let (i1, i2, i3) = (insert(1), insert(2), insert(3));

    Arc::new(
        MemoryLogSource::new("replica-1", 3306)
            .with_relay_log("relay-bin.000002", &[m1.as_str(), i1.as_str()])
            .with_relay_log(
                "relay-bin.000003",
                &[m2.as_str(), i2.as_str(), m3.as_str(), i3.as_str()],
            )
            .with_replica_position_at("relay-bin.000003", executed_index),
    )
}

async fn translate(
    replica: &SharedLogSource,
    source: &SharedLogSource,
) -> pgtid::error::PgtidResult<pgtid::types::Position> {
    let discovery = discovery();

    let err = discovery
        .last_marker_in_primary_logs(replica)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MarkerNotFound);

    let executed = replica.replica_position().await?.unwrap();
    let newest = discovery
        .last_marker_in_relay_logs(replica, &executed)
        .await?;
    let source_start = discovery
        .search_marker_on_server(source, &newest.text)
        .await?;

    let request = MatchRequest {
        instance: replica.clone(),
        instance_start: newest.position,
        instance_limit: InstanceLimit::Relay { executed },
        source: source.clone(),
        source_start,
    };

    PositionMatcher::new(100, EventFilter::default())
        .match_positions(&request)
        .await
}

#[tokio::test(flavor = "multi_thread")]
async fn executed_relay_position_is_translated_onto_source_test() {
    init_test_tracing();
    let source = source();
    let source_shared: SharedLogSource = source.clone();
    // The applier stopped right before the third marker.
    let replica_shared: SharedLogSource = replica(2);

    let target = translate(&replica_shared, &source_shared).await.unwrap();

    let expected = source.events("mysql-bin.000007", LogType::Primary)[4]
        .position
        .clone();
    assert_eq!(target, expected);
}

#[tokio::test(flavor = "multi_thread")]
async fn relay_walk_falls_back_to_previous_file_test() {
    init_test_tracing();
    let source = source();
    let source_shared: SharedLogSource = source.clone();
    // Nothing of the newest relay log was executed yet.
    let replica_shared: SharedLogSource = replica(0);

    let target = translate(&replica_shared, &source_shared).await.unwrap();

    let expected = source.events("mysql-bin.000007", LogType::Primary)[2]
        .position
        .clone();
    assert_eq!(target, expected);
}

#[tokio::test(flavor = "multi_thread")]
async fn relay_logs_without_marker_are_reported_test() {
    init_test_tracing();
    let (i1, i2) = (insert(1), insert(2));
    let replica: SharedLogSource = Arc::new(
        MemoryLogSource::new("replica-1", 3306)
            .with_relay_log("relay-bin.000002", &[i1.as_str(), i2.as_str()]),
    );
    let executed = replica.replica_position().await.unwrap().unwrap();

    let err = discovery()
        .last_marker_in_relay_logs(&replica, &executed)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::MarkerNotFound);
}
