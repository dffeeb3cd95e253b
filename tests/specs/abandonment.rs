// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-partition abandonment with the rest of the feed intact.

use crate::prelude::*;

#[tokio::test]
async fn exhausted_restarts_abandon_one_partition_only() {
    let transport = ScriptedTransport::new();
    let p0 = PartitionId::new(0);
    let p1 = PartitionId::new(1);

    // Partition 0 is healthy; partition 1 has no script, so every open
    // fails with a disconnect.
    transport.push_deliver(p0, StreamUuid(1), run_of_mutations(0, 3));

    let mut feed = Feed::open(test_config(2), transport.clone(), MemoryStore::new()).await.unwrap();

    // Healthy partition delivers while its sibling burns restart attempts.
    let events = drain_acked(&mut feed, 3).await;
    assert!(events.iter().all(|e| e.partition == p0));

    wait_for_status(&feed, |s| s.partitions[&1].state == PartitionState::Abandoned).await;
    let status = feed.status();
    assert_eq!(status.partitions[&0].state, PartitionState::Open);
    assert!(status.partitions[&1].last_error.is_some());
    assert_eq!(status.partitions[&1].restarts, 3);
    // max_restart_attempts is 3: the initial attempt plus two retries.
    assert_eq!(transport.open_count(p1), 3);

    // The feed stays usable after the abandonment.
    assert!(feed.ack(p0, 3).is_ok());
    feed.close().await;
}

#[tokio::test]
async fn unknown_stream_end_reason_abandons_immediately() {
    let transport = ScriptedTransport::new();
    let p = PartitionId::new(0);
    transport.push_deliver(
        p,
        StreamUuid(1),
        vec![
            snapshot(0, 1),
            mutation(1, "a"),
            stream_end_with_error(StreamEndReason::Unknown(0xBEEF), "unhandled status from server"),
        ],
    );

    let mut feed = Feed::open(test_config(1), transport.clone(), MemoryStore::new()).await.unwrap();
    let _ = drain_acked(&mut feed, 1).await;

    wait_for_status(&feed, |s| s.partitions[&0].state == PartitionState::Abandoned).await;
    // No reopen for an unrecognized status; the transport's detail is
    // surfaced alongside the reason.
    assert_eq!(transport.open_count(p), 1);
    let error = feed.status().partitions[&0].last_error.clone().unwrap();
    assert!(error.contains("unknown(48879)"), "{error}");
    assert!(error.contains("unhandled status from server"), "{error}");
    feed.close().await;
}

#[tokio::test]
async fn invariant_violation_fails_the_partition() {
    let transport = ScriptedTransport::new();
    let p0 = PartitionId::new(0);
    let p1 = PartitionId::new(1);

    // Partition 0 delivers a seq outside its announced window.
    transport.push_deliver(
        p0,
        StreamUuid(1),
        vec![snapshot(0, 2), mutation(1, "ok"), mutation(9, "out-of-window")],
    );
    transport.push_deliver(p1, StreamUuid(1), run_of_mutations(0, 2));

    let mut feed = Feed::open(test_config(2), transport.clone(), MemoryStore::new()).await.unwrap();

    let mut got = Vec::new();
    for _ in 0..3 {
        let event = tokio::time::timeout(std::time::Duration::from_secs(2), feed.next())
            .await
            .unwrap()
            .unwrap();
        feed.ack(event.partition, event.seq).unwrap();
        got.push((event.partition.get(), event.seq));
    }
    got.sort_unstable();
    assert_eq!(got, vec![(0, 1), (1, 1), (1, 2)]);

    wait_for_status(&feed, |s| s.partitions[&0].state == PartitionState::Failed).await;
    let status = feed.status();
    assert!(status.partitions[&0].last_error.as_deref().unwrap_or("").contains("snapshot"));
    assert_eq!(status.partitions[&1].state, PartitionState::Open);
    feed.close().await;
}
