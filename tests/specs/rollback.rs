// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Rollback reconciliation against the failover log.

use crate::prelude::*;
use dcp_core::{Checkpoint, FailoverEntry};

const U1: StreamUuid = StreamUuid(0x1111);
const U2: StreamUuid = StreamUuid(0x2222);

#[tokio::test]
async fn rollback_truncates_and_resumes_delivery() {
    let transport = ScriptedTransport::new();
    let store = MemoryStore::new();
    let p = PartitionId::new(0);

    // Consumer state from a previous run: seq 100 on branch U1.
    store
        .save_checkpoint(
            p,
            Checkpoint { stream_uuid: U1, last_seqno: 100, snapshot_start: 100, snapshot_end: 100 },
        )
        .await
        .unwrap();
    store.append_failover(p, FailoverEntry::new(U1, 100)).await.unwrap();

    // The server history forked to U2 at 80; it rolls us back to 50 and
    // reports a log whose U1 branch is an ancestor.
    transport.set_server_failover(p, vec![FailoverEntry::new(U2, 80), FailoverEntry::new(U1, 0)]);
    transport.push_rollback(p, 50);
    transport.push_deliver_with_failover(
        p,
        vec![FailoverEntry::new(U2, 120), FailoverEntry::new(U1, 0)],
        vec![snapshot(50, 55), mutation(51, "r1"), mutation(52, "r2"), mutation(53, "r3")],
    );

    let mut feed = Feed::open(test_config(1), transport.clone(), store.clone()).await.unwrap();

    let events = drain_acked(&mut feed, 3).await;
    assert_eq!(events.iter().map(|e| e.seq).collect::<Vec<_>>(), vec![51, 52, 53]);

    // The reopen resumed at the rollback point under the shared branch.
    let opens = transport.opens();
    assert_eq!(opens.len(), 2);
    assert_eq!(opens[1].start_seqno, 50);
    assert_eq!(opens[1].stream_uuid, U1);

    feed.close().await;

    // Final checkpoint sits on the server's current branch past the
    // rollback point.
    let ckpt = store.checkpoint(p).unwrap();
    assert_eq!(ckpt.last_seqno, 53);
    assert_eq!(ckpt.stream_uuid, U2);
}

#[tokio::test]
async fn rollback_with_no_common_ancestor_restarts_from_zero() {
    let transport = ScriptedTransport::new();
    let store = MemoryStore::new();
    let p = PartitionId::new(0);

    store
        .save_checkpoint(
            p,
            Checkpoint { stream_uuid: U1, last_seqno: 40, snapshot_start: 40, snapshot_end: 40 },
        )
        .await
        .unwrap();
    store.append_failover(p, FailoverEntry::new(U1, 40)).await.unwrap();

    // Server history shares nothing with ours.
    transport.set_server_failover(p, vec![FailoverEntry::new(U2, 90)]);
    transport.push_rollback(p, 10);
    transport.push_deliver(p, U2, vec![snapshot(0, 2), mutation(1, "z1"), mutation(2, "z2")]);

    let mut feed = Feed::open(test_config(1), transport.clone(), store.clone()).await.unwrap();
    let events = drain_acked(&mut feed, 2).await;
    assert_eq!(events.iter().map(|e| e.seq).collect::<Vec<_>>(), vec![1, 2]);

    let opens = transport.opens();
    assert_eq!(opens[1].start_seqno, 0);
    assert_eq!(opens[1].stream_uuid, StreamUuid::ZERO);

    feed.close().await;
    assert_eq!(store.checkpoint(p).unwrap().last_seqno, 2);
}

#[tokio::test]
async fn rollback_checkpoint_truncation_is_persisted_before_resume() {
    let transport = ScriptedTransport::new();
    let store = MemoryStore::new();
    let p = PartitionId::new(0);

    store
        .save_checkpoint(
            p,
            Checkpoint { stream_uuid: U1, last_seqno: 100, snapshot_start: 100, snapshot_end: 100 },
        )
        .await
        .unwrap();
    store.append_failover(p, FailoverEntry::new(U1, 100)).await.unwrap();

    transport.set_server_failover(p, vec![FailoverEntry::new(U2, 80), FailoverEntry::new(U1, 0)]);
    transport.push_rollback(p, 50);
    transport.push_deliver_with_failover(
        p,
        vec![FailoverEntry::new(U2, 120), FailoverEntry::new(U1, 0)],
        vec![snapshot(50, 51), mutation(51, "after")],
    );

    let mut feed = Feed::open(test_config(1), transport, store.clone()).await.unwrap();

    // Before any post-rollback ack, the persisted seqno is the truncation
    // point, not the stale 100.
    let first = tokio::time::timeout(std::time::Duration::from_secs(2), feed.next())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.seq, 51);
    assert_eq!(store.checkpoint(p).unwrap().last_seqno, 50);

    feed.ack(p, 51).unwrap();
    feed.close().await;
    assert_eq!(store.checkpoint(p).unwrap().last_seqno, 51);
}
