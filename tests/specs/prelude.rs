// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared harness for consumer specs.

pub use dcp_client::Feed;
pub use dcp_core::test_support::{
    deletion, mutation, seqno_advanced, snapshot, stream_end, stream_end_with_error,
};
pub use dcp_core::{
    FeedConfig, FeedEvent, PartitionId, PartitionState, PrefixFilter, StartPolicy,
    StreamEndReason, StreamEvent, StreamUuid,
};
pub use dcp_store::{CheckpointStore, MemoryStore};
pub use dcp_transport::ScriptedTransport;

use std::collections::BTreeMap;
use std::time::Duration;

static TRACING: std::sync::Once = std::sync::Once::new();

/// Feed configuration tuned for fast tests: immediate checkpoints,
/// millisecond backoff.
pub fn test_config(partitions: u16) -> FeedConfig {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
    let mut config = FeedConfig::new(PartitionId::all(partitions));
    config.worker_count = 2;
    config.queue_depth = 16;
    config.checkpoint_interval_events = 1;
    config.checkpoint_interval_ms = 50;
    config.backoff_min_ms = 1;
    config.backoff_max_ms = 10;
    config.open_timeout_ms = 1_000;
    config.max_restart_attempts = 3;
    config.drain_deadline_ms = 500;
    config
}

/// Snapshot marker followed by one mutation per seq in `seqs`.
pub fn run_of_mutations(start: u64, end: u64) -> Vec<StreamEvent> {
    let mut events = vec![snapshot(start, end)];
    events.extend((start.max(1)..=end).map(|seq| mutation(seq, &format!("doc-{seq}"))));
    events
}

/// Receive exactly `n` events, acking each one.
pub async fn drain_acked(feed: &mut Feed, n: usize) -> Vec<FeedEvent> {
    let mut events = Vec::with_capacity(n);
    for _ in 0..n {
        let event = tokio::time::timeout(Duration::from_secs(2), feed.next())
            .await
            .expect("timed out waiting for feed event")
            .expect("feed closed before all events arrived");
        feed.ack(event.partition, event.seq).expect("ack failed");
        events.push(event);
    }
    events
}

/// Group received seqnos by partition, preserving arrival order.
pub fn seqs_by_partition(events: &[FeedEvent]) -> BTreeMap<u16, Vec<u64>> {
    let mut map: BTreeMap<u16, Vec<u64>> = BTreeMap::new();
    for event in events {
        map.entry(event.partition.get()).or_default().push(event.seq);
    }
    map
}

/// Assert per-partition strict seq monotonicity.
pub fn assert_partition_order(events: &[FeedEvent]) {
    for (partition, seqs) in seqs_by_partition(events) {
        for pair in seqs.windows(2) {
            assert!(
                pair[0] < pair[1],
                "partition {partition}: seq {} then {} breaks ordering",
                pair[0],
                pair[1],
            );
        }
    }
}

/// Poll `status()` until `check` passes or two seconds elapse.
pub async fn wait_for_status(feed: &Feed, check: impl Fn(&dcp_core::FeedStatus) -> bool) {
    for _ in 0..200 {
        if check(&feed.status()) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("status condition not reached: {:?}", feed.status());
}
