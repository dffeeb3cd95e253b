// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Key filtering ahead of dispatch.

use crate::prelude::*;

#[tokio::test]
async fn filtered_keys_are_dropped_but_checkpointed() {
    let transport = ScriptedTransport::new();
    let store = MemoryStore::new();
    let p = PartitionId::new(0);
    transport.push_deliver(
        p,
        StreamUuid(1),
        vec![snapshot(0, 3), mutation(1, "a"), mutation(2, "_sync:x"), mutation(3, "b")],
    );

    let config = test_config(1).with_filter(PrefixFilter::new(["_sync:"]));
    let mut feed = Feed::open(config, transport, store.clone()).await.unwrap();

    let events = drain_acked(&mut feed, 2).await;
    let keys: Vec<String> = events.iter().map(|e| e.key_lossy().into_owned()).collect();
    assert_eq!(keys, vec!["a", "b"]);

    feed.close().await;

    // The filtered seq still advanced the watermark.
    assert_eq!(store.checkpoint(p).unwrap().last_seqno, 3);
}

#[tokio::test]
async fn filtered_deletions_behave_like_filtered_mutations() {
    let transport = ScriptedTransport::new();
    let store = MemoryStore::new();
    let p = PartitionId::new(0);
    transport.push_deliver(
        p,
        StreamUuid(1),
        vec![snapshot(0, 2), deletion(1, "_sync:tombstone"), mutation(2, "kept")],
    );

    let config = test_config(1).with_filter(PrefixFilter::new(["_sync:"]));
    let mut feed = Feed::open(config, transport, store.clone()).await.unwrap();

    let events = drain_acked(&mut feed, 1).await;
    assert_eq!(events[0].key_lossy(), "kept");
    assert_eq!(events[0].seq, 2);

    feed.close().await;
    assert_eq!(store.checkpoint(p).unwrap().last_seqno, 2);
}

#[tokio::test]
async fn a_fully_filtered_stream_still_checkpoints() {
    let transport = ScriptedTransport::new();
    let store = MemoryStore::new();
    let p = PartitionId::new(0);
    transport.push_deliver(
        p,
        StreamUuid(1),
        vec![snapshot(0, 3), mutation(1, "_sync:a"), mutation(2, "_sync:b"), mutation(3, "_sync:c")],
    );

    let config = test_config(1).with_filter(PrefixFilter::new(["_sync:"]));
    let mut feed = Feed::open(config, transport, store.clone()).await.unwrap();

    wait_for_status(&feed, |s| s.metrics.events_filtered == 3).await;
    feed.close().await;

    assert_eq!(store.checkpoint(p).unwrap().last_seqno, 3);
}
