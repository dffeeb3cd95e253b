// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stream end, reopen from checkpoint, and cross-restart resumption.

use crate::prelude::*;

#[tokio::test]
async fn disconnect_resumes_from_processed_checkpoint() {
    let transport = ScriptedTransport::new();
    let store = MemoryStore::new();
    let p = PartitionId::new(0);

    // First segment dies after seq 3; the second resumes the window.
    transport.push_deliver(
        p,
        StreamUuid(1),
        vec![
            snapshot(0, 5),
            mutation(1, "a"),
            mutation(2, "b"),
            mutation(3, "c"),
            stream_end(StreamEndReason::Disconnected),
        ],
    );
    transport.push_deliver(
        p,
        StreamUuid(1),
        vec![snapshot(3, 5), mutation(4, "d"), mutation(5, "e")],
    );

    let mut feed = Feed::open(test_config(1), transport.clone(), store.clone()).await.unwrap();
    let events = drain_acked(&mut feed, 5).await;

    assert_eq!(events.iter().map(|e| e.seq).collect::<Vec<_>>(), vec![1, 2, 3, 4, 5]);
    assert_partition_order(&events);

    // The reopen asked for events strictly after the processed seqno.
    let opens = transport.opens();
    assert_eq!(opens.len(), 2);
    assert_eq!(opens[1].start_seqno, 3);
    assert_eq!(opens[1].stream_uuid, StreamUuid(1));

    feed.close().await;
    assert_eq!(store.checkpoint(p).unwrap().last_seqno, 5);
}

#[tokio::test]
async fn a_new_feed_resumes_from_the_persisted_checkpoint() {
    let transport = ScriptedTransport::new();
    let store = MemoryStore::new();
    let p = PartitionId::new(0);
    transport.push_deliver(p, StreamUuid(1), run_of_mutations(0, 3));

    // First consumer run: deliver and ack 1..=3, then shut down.
    {
        let mut feed =
            Feed::open(test_config(1), transport.clone(), store.clone()).await.unwrap();
        let events = drain_acked(&mut feed, 3).await;
        assert_eq!(events.len(), 3);
        feed.close().await;
    }
    assert_eq!(store.checkpoint(p).unwrap().last_seqno, 3);

    // Second run opens at the checkpoint and sees only new events.
    transport.push_deliver(p, StreamUuid(1), vec![snapshot(3, 5), mutation(4, "d"), mutation(5, "e")]);
    let mut feed = Feed::open(test_config(1), transport.clone(), store.clone()).await.unwrap();
    let events = drain_acked(&mut feed, 2).await;
    assert_eq!(events.iter().map(|e| e.seq).collect::<Vec<_>>(), vec![4, 5]);

    let opens = transport.opens();
    assert_eq!(opens.last().unwrap().start_seqno, 3);

    feed.close().await;
    assert_eq!(store.checkpoint(p).unwrap().last_seqno, 5);
}

#[tokio::test]
async fn unacked_events_are_redelivered_after_restart() {
    let transport = ScriptedTransport::new();
    let store = MemoryStore::new();
    let p = PartitionId::new(0);
    transport.push_deliver(p, StreamUuid(1), run_of_mutations(0, 4));

    {
        let mut feed =
            Feed::open(test_config(1), transport.clone(), store.clone()).await.unwrap();
        // Receive all four but ack only the first two.
        for expected in 1..=4 {
            let event = tokio::time::timeout(std::time::Duration::from_secs(2), feed.next())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(event.seq, expected);
            if expected <= 2 {
                feed.ack(p, event.seq).unwrap();
            }
        }
        feed.close().await;
    }
    // Only the acked prefix is durable.
    assert_eq!(store.checkpoint(p).unwrap().last_seqno, 2);

    // The next run resumes at 2: seqs 3 and 4 come again.
    transport.push_deliver(p, StreamUuid(1), vec![snapshot(2, 4), mutation(3, "c"), mutation(4, "d")]);
    let mut feed = Feed::open(test_config(1), transport.clone(), store.clone()).await.unwrap();
    let events = drain_acked(&mut feed, 2).await;
    assert_eq!(events.iter().map(|e| e.seq).collect::<Vec<_>>(), vec![3, 4]);
    feed.close().await;
}

#[tokio::test]
async fn end_seqno_reached_completes_the_partition() {
    let transport = ScriptedTransport::new();
    let p = PartitionId::new(0);
    transport.push_deliver(
        p,
        StreamUuid(1),
        vec![snapshot(0, 2), mutation(1, "a"), mutation(2, "b"), stream_end(StreamEndReason::Ok)],
    );

    let mut feed = Feed::open(test_config(1), transport.clone(), MemoryStore::new()).await.unwrap();
    let _ = drain_acked(&mut feed, 2).await;

    wait_for_status(&feed, |s| s.partitions[&0].state == PartitionState::Complete).await;
    // Terminal: no reopen was attempted.
    assert_eq!(transport.open_count(p), 1);
    feed.close().await;
}
