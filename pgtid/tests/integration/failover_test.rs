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
    format!("insert into accounts values ({id})")
}

fn discovery(page_size: u64) -> MarkerDiscovery {
    MarkerDiscovery::new(
        Regex::new(MARKER_PATTERN).unwrap(),
        page_size,
        MarkerCache::default(),
    )
}

/// A source whose history spans three binary logs, and a replica that applied a prefix of it
/// into two binary logs of its own.
fn servers() -> (Arc<MemoryLogSource>, Arc<MemoryLogSource>) {
    let (m1, m2, m3, m4) = (marker(1), marker(2), marker(3), marker(4));
    let (i1, i2, i3, i4, i5) = (insert(1), insert(2), insert(3), insert(4), insert(5));

    let source = MemoryLogSource::new("primary-1", 3306)
        .with_binary_log("mysql-bin.000010", &[m1.as_str(), i1.as_str()])
        .with_binary_log(
            "mysql-bin.000011",
            &[m2.as_str(), i2.as_str(), i3.as_str(), m3.as_str()],
        )
        .with_binary_log("mysql-bin.000012", &[i4.as_str(), m4.as_str(), i5.as_str()]);

    let replica = MemoryLogSource::new("replica-1", 3306)
        .with_binary_log(
            "replica-bin.000001",
            &[m1.as_str(), i1.as_str(), m2.as_str(), i2.as_str()],
        )
        .with_binary_log("replica-bin.000002", &[i3.as_str(), m3.as_str(), i4.as_str()]);

    (Arc::new(source), Arc::new(replica))
}

#[tokio::test(flavor = "multi_thread")]
async fn replica_position_is_translated_onto_source_test() {
    init_test_tracing();
    let (source, replica) = servers();
    let source_shared: SharedLogSource = source.clone();
    let replica_shared: SharedLogSource = replica.clone();
    let discovery = discovery(2);

    let newest = discovery
        .last_marker_in_primary_logs(&replica_shared)
        .await
        .unwrap();
    assert_eq!(newest.text, marker(3));

    let source_start = discovery
        .search_marker_on_server(&source_shared, &newest.text)
        .await
        .unwrap();
    assert_eq!(source_start.file(), "mysql-bin.000011");

    let request = MatchRequest {
        instance: replica_shared.clone(),
        instance_start: newest.position.clone(),
        instance_limit: InstanceLimit::Primary {
            current: replica_shared.current_position().await.unwrap(),
        },
        source: source_shared.clone(),
        source_start,
    };
    let target = PositionMatcher::new(2, EventFilter::default())
        .match_positions(&request)
        .await
        .unwrap();

    // The replica's last record is the source's first record of its newest file.
    let expected = source.events("mysql-bin.000012", LogType::Primary)[1]
        .position
        .clone();
    assert_eq!(target, expected);
}

#[tokio::test(flavor = "multi_thread")]
async fn repeated_marker_lookup_is_served_from_cache_test() {
    init_test_tracing();
    let (source, _replica) = servers();
    let source_shared: SharedLogSource = source.clone();
    let discovery = discovery(100);

    let first = discovery
        .search_marker_on_server(&source_shared, &marker(2))
        .await
        .unwrap();
    source.reset_reads();

    let second = discovery
        .search_marker_on_server(&source_shared, &marker(2))
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(source.event_reads(), 0);
    assert_eq!(source.status_reads(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn replica_ahead_of_source_is_reported_test() {
    init_test_tracing();
    let (m1, m2) = (marker(1), marker(2));
    let (i1, i2) = (insert(1), insert(2));
    let source = Arc::new(
        MemoryLogSource::new("primary-1", 3306)
            .with_binary_log("mysql-bin.000001", &[m1.as_str(), i1.as_str()]),
    );
    let replica = Arc::new(MemoryLogSource::new("replica-1", 3306).with_binary_log(
        "replica-bin.000001",
        &[m1.as_str(), i1.as_str(), m2.as_str(), i2.as_str()],
    ));
    let source_shared: SharedLogSource = source.clone();
    let replica_shared: SharedLogSource = replica.clone();
    let discovery = discovery(100);

    // The replica's newest marker never reached the source.
    let newest = discovery
        .last_marker_in_primary_logs(&replica_shared)
        .await
        .unwrap();
    let err = discovery
        .search_marker_on_server(&source_shared, &newest.text)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MarkerNotFound);

    // Matching from an older shared marker runs out of source records first.
    let source_start = discovery
        .search_marker_on_server(&source_shared, &m1)
        .await
        .unwrap();
    let request = MatchRequest {
        instance: replica_shared.clone(),
        instance_start: replica.events("replica-bin.000001", LogType::Primary)[0]
            .position
            .clone(),
        instance_limit: InstanceLimit::Primary {
            current: replica_shared.current_position().await.unwrap(),
        },
        source: source_shared,
        source_start,
    };
    let err = PositionMatcher::new(100, EventFilter::default())
        .match_positions(&request)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::OtherSideExhausted);
}

#[tokio::test(flavor = "multi_thread")]
async fn diverged_histories_are_reported_test() {
    init_test_tracing();
    let m1 = marker(1);
    let source = Arc::new(
        MemoryLogSource::new("primary-1", 3306)
            .with_binary_log("mysql-bin.000001", &[m1.as_str(), "update accounts set n = 1"]),
    );
    let replica = Arc::new(
        MemoryLogSource::new("replica-1", 3306)
            .with_binary_log("replica-bin.000001", &[m1.as_str(), "update accounts set n = 2"]),
    );
    let source_shared: SharedLogSource = source.clone();
    let replica_shared: SharedLogSource = replica.clone();
    let discovery = discovery(100);

    let newest = discovery
        .last_marker_in_primary_logs(&replica_shared)
        .await
        .unwrap();
    let source_start = discovery
        .search_marker_on_server(&source_shared, &newest.text)
        .await
        .unwrap();
    let request = MatchRequest {
        instance: replica_shared.clone(),
        instance_start: newest.position,
        instance_limit: InstanceLimit::Primary {
            current: replica_shared.current_position().await.unwrap(),
        },
        source: source_shared,
        source_start,
    };
    let err = PositionMatcher::new(100, EventFilter::default())
        .match_positions(&request)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::DivergentEntries);
}
