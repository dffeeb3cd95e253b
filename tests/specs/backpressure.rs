// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Backpressure through bounded queues: a stalled consumer never causes
//! event loss.

use crate::prelude::*;
use std::time::Duration;

#[tokio::test]
async fn stalled_consumer_loses_nothing() {
    let transport = ScriptedTransport::new();
    let store = MemoryStore::new();
    let p = PartitionId::new(0);
    transport.push_deliver(p, StreamUuid(1), run_of_mutations(0, 50));

    let mut config = test_config(1);
    config.worker_count = 1;
    config.queue_depth = 2;
    let mut feed = Feed::open(config, transport, store.clone()).await.unwrap();

    // Stall: no next(), no acks. The emitter buffer, the worker inbox, and
    // the transport's delivery all fill and wait.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let mid_status = feed.status();
    assert!(mid_status.metrics.events_emitted < 50, "everything buffered without backpressure");

    // Resume. Every event arrives exactly once, in order.
    let events = drain_acked(&mut feed, 50).await;
    assert_eq!(events.iter().map(|e| e.seq).collect::<Vec<_>>(), (1..=50).collect::<Vec<_>>());
    assert_partition_order(&events);

    let status = feed.status();
    assert_eq!(status.metrics.events_emitted, 50);
    assert_eq!(status.metrics.events_dispatched, 51, "snapshot marker plus fifty mutations");

    feed.close().await;
    assert_eq!(store.checkpoint(p).unwrap().last_seqno, 50);
}

#[tokio::test]
async fn unacked_backlog_does_not_advance_the_checkpoint() {
    let transport = ScriptedTransport::new();
    let store = MemoryStore::new();
    let p = PartitionId::new(0);
    transport.push_deliver(p, StreamUuid(1), run_of_mutations(0, 10));

    let mut feed = Feed::open(test_config(1), transport, store.clone()).await.unwrap();

    // Consume everything without acking.
    for expected in 1..=10 {
        let event = tokio::time::timeout(Duration::from_secs(2), feed.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.seq, expected);
    }
    // Give the checkpoint cadence a chance to run, then verify it held.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let persisted = store.checkpoint(p).map(|c| c.last_seqno).unwrap_or(0);
    assert_eq!(persisted, 0, "checkpoint advanced past unacked events");

    // Acks release the watermark.
    feed.ack(p, 10).unwrap();
    feed.close().await;
    assert_eq!(store.checkpoint(p).unwrap().last_seqno, 10);
}
