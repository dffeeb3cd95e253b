// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Property checks over randomized event scripts and save interleavings.

use crate::prelude::*;
use dcp_core::{Checkpoint, FailoverEntry, FailoverLog};
use proptest::prelude::*;

#[derive(Debug, Clone, Copy)]
enum OpKind {
    Mutation,
    Deletion,
    Advance,
    FilteredMutation,
}

#[derive(Debug, Clone, Copy)]
struct Op {
    kind: OpKind,
    gap: u64,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    (
        prop_oneof![
            Just(OpKind::Mutation),
            Just(OpKind::Deletion),
            Just(OpKind::Advance),
            Just(OpKind::FilteredMutation),
        ],
        1u64..=3,
    )
        .prop_map(|(kind, gap)| Op { kind, gap })
}

/// Script one partition: ops in chunks, each chunk under its own snapshot
/// window. Returns the script and the number of deliverable events.
fn build_script(ops: &[Op]) -> (Vec<StreamEvent>, usize) {
    let mut events = Vec::new();
    let mut seq = 0u64;
    let mut deliverable = 0usize;
    for chunk in ops.chunks(4) {
        let first = seq + chunk[0].gap;
        let last = chunk.iter().map(|op| op.gap).sum::<u64>() + seq;
        events.push(snapshot(first, last));
        for op in chunk {
            seq += op.gap;
            match op.kind {
                OpKind::Mutation => {
                    deliverable += 1;
                    events.push(mutation(seq, &format!("doc-{seq}")));
                }
                OpKind::Deletion => {
                    deliverable += 1;
                    events.push(deletion(seq, &format!("doc-{seq}")));
                }
                OpKind::Advance => events.push(seqno_advanced(seq)),
                OpKind::FilteredMutation => {
                    events.push(mutation(seq, &format!("_sync:{seq}")));
                }
            }
        }
    }
    (events, deliverable)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Random scripts keep every delivery invariant: strict per-partition
    /// monotonicity, filter soundness, and a final checkpoint covering the
    /// full processed range.
    #[test]
    fn randomized_scripts_preserve_invariants(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let (script, deliverable) = build_script(&ops);
            let total_seq: u64 = ops.iter().map(|op| op.gap).sum();

            let transport = ScriptedTransport::new();
            let store = MemoryStore::new();
            let p = PartitionId::new(0);
            transport.push_deliver(p, StreamUuid(1), script);

            let config = test_config(1).with_filter(PrefixFilter::new(["_sync:"]));
            let mut feed = Feed::open(config, transport, store.clone()).await.unwrap();

            let events = drain_acked(&mut feed, deliverable).await;
            assert_partition_order(&events);
            for event in &events {
                assert!(
                    !event.key_lossy().starts_with("_sync:"),
                    "filtered key delivered: {}",
                    event.key_lossy()
                );
            }

            // Wait until every seqno (delivered or filtered) is processed.
            wait_for_status(&feed, |s| s.partitions[&0].last_seqno == total_seq).await;
            feed.close().await;

            let ckpt = store.checkpoint(p).expect("final checkpoint");
            assert_eq!(ckpt.last_seqno, total_seq);
        });
    }

    /// Persisted checkpoints are non-decreasing per stream uuid no matter
    /// how saves interleave.
    #[test]
    fn store_saves_stay_monotonic(saves in prop::collection::vec((1u64..=2, 1u64..=100), 1..30)) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let store = MemoryStore::new();
            let p = PartitionId::new(0);
            let mut expected: Option<Checkpoint> = None;

            for (uuid, seqno) in saves {
                let ckpt = Checkpoint {
                    stream_uuid: StreamUuid(uuid),
                    last_seqno: seqno,
                    snapshot_start: seqno,
                    snapshot_end: seqno,
                };
                store.save_checkpoint(p, ckpt).await.unwrap();
                match &expected {
                    Some(prior) if !ckpt.supersedes(prior) => {}
                    _ => expected = Some(ckpt),
                }
                // Same uuid never regresses.
                let current = store.checkpoint(p).unwrap();
                if let Some(prior) = &expected {
                    assert_eq!(current, *prior);
                }
            }
        });
    }

    /// A computed rollback point always shares a uuid with both logs and
    /// never exceeds the server branch bound.
    #[test]
    fn rollback_point_is_a_shared_ancestor(
        local_seqs in prop::collection::vec((1u64..=6, 1u64..=100), 0..5),
        server_seqs in prop::collection::vec((1u64..=6, 1u64..=100), 0..5),
    ) {
        let to_log = |pairs: &[(u64, u64)]| {
            FailoverLog::from_entries(
                pairs.iter().map(|&(u, s)| FailoverEntry::new(StreamUuid(u), s)).collect(),
            )
        };
        let local = to_log(&local_seqs);
        let server = to_log(&server_seqs);

        match local.rollback_point(&server) {
            Some(point) => {
                assert!(local.entries().iter().any(|e| e.uuid == point.uuid));
                assert!(server.entries().iter().any(|e| e.uuid == point.uuid));
                assert!(local
                    .entries()
                    .iter()
                    .filter(|e| e.uuid == point.uuid)
                    .any(|e| e.seqno >= point.seqno));
            }
            None => {
                let shared = local
                    .entries()
                    .iter()
                    .any(|l| server.entries().iter().any(|s| s.uuid == l.uuid));
                assert!(!shared, "shared uuid but no rollback point");
            }
        }
    }
}
