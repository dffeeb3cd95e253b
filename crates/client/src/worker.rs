// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Partition worker: single-writer ordering discipline per partition.
//!
//! One worker task serializes all partitions of its shard (`p mod W`), so
//! per-partition FIFO holds without a task per partition. Per-partition
//! state is keyed inside the worker; an invariant violation halts that
//! partition only.

use crate::error::WorkerError;
use crate::shared::{AckRegistry, Dispatch, SharedStatus};
use dcp_core::{
    Checkpoint, Clock, Deletion, FeedEvent, FeedMetrics, FeedOpcode, Mutation, PartitionId,
    SnapshotMarker, StreamEnd, StreamEvent,
};
use dcp_store::CheckpointStore;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Consecutive save failures before a partition's durability is flagged.
const DEGRADED_SAVE_THRESHOLD: u32 = 3;

/// Control-plane notice from a worker to the supervisor.
#[derive(Debug)]
pub(crate) enum WorkerNotice {
    /// A stream terminated; carries the worker's processed checkpoint for
    /// the reopen decision.
    StreamEnded { partition: PartitionId, end: StreamEnd, checkpoint: Checkpoint },
    /// Ordering or window invariant broken; the partition is halted.
    InvariantViolated { partition: PartitionId, error: WorkerError },
}

/// Worker-relevant slice of the feed configuration.
#[derive(Debug, Clone, Copy)]
pub(crate) struct WorkerConfig {
    pub checkpoint_interval_events: u32,
    pub checkpoint_interval_ms: u64,
    pub drain_deadline: Duration,
}

struct PartitionProgress {
    /// Running processed state: window plus last seqno handed downstream.
    checkpoint: Checkpoint,
    unpersisted: u32,
    last_persist: Instant,
    last_persisted: Option<Checkpoint>,
    save_failures: u32,
    failed: bool,
}

enum Flow {
    Continue,
    Stop,
}

struct EmitClosed;

pub(crate) struct Worker<S, C> {
    id: usize,
    inbox: mpsc::Receiver<Dispatch>,
    emit_tx: mpsc::Sender<FeedEvent>,
    notice_tx: mpsc::UnboundedSender<WorkerNotice>,
    store: Arc<S>,
    clock: C,
    acks: Arc<AckRegistry>,
    status: SharedStatus,
    metrics: Arc<FeedMetrics>,
    cancel: CancellationToken,
    config: WorkerConfig,
    partitions: HashMap<PartitionId, PartitionProgress>,
    draining: bool,
}

impl<S, C> Worker<S, C>
where
    S: CheckpointStore,
    C: Clock,
{
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: usize,
        inbox: mpsc::Receiver<Dispatch>,
        emit_tx: mpsc::Sender<FeedEvent>,
        notice_tx: mpsc::UnboundedSender<WorkerNotice>,
        store: Arc<S>,
        clock: C,
        acks: Arc<AckRegistry>,
        status: SharedStatus,
        metrics: Arc<FeedMetrics>,
        cancel: CancellationToken,
        config: WorkerConfig,
    ) -> Self {
        Self {
            id,
            inbox,
            emit_tx,
            notice_tx,
            store,
            clock,
            acks,
            status,
            metrics,
            cancel,
            config,
            partitions: HashMap::new(),
            draining: false,
        }
    }

    pub(crate) async fn run(mut self) {
        tracing::debug!(worker = self.id, "worker started");
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    self.drain().await;
                    break;
                }
                maybe = self.inbox.recv() => match maybe {
                    Some(dispatch) => {
                        if matches!(self.handle(dispatch).await, Flow::Stop) {
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
        self.final_flush().await;
        tracing::debug!(worker = self.id, "worker stopped");
    }

    /// Process queued events after cancellation, bounded by the drain
    /// deadline. Emission switches to non-blocking; the first full queue
    /// stops processing so no partition skips an event.
    async fn drain(&mut self) {
        self.draining = true;
        let deadline = self.clock.now() + self.config.drain_deadline;
        while self.clock.now() < deadline {
            match self.inbox.try_recv() {
                Ok(dispatch) => {
                    if matches!(self.handle(dispatch).await, Flow::Stop) {
                        return;
                    }
                }
                Err(_) => return,
            }
        }
    }

    async fn handle(&mut self, dispatch: Dispatch) -> Flow {
        match dispatch {
            Dispatch::Begin { partition, checkpoint, reset_watermark } => {
                self.handle_begin(partition, checkpoint, reset_watermark);
                Flow::Continue
            }
            Dispatch::AdoptUuid { partition, uuid } => {
                if let Some(progress) = self.partitions.get_mut(&partition) {
                    progress.checkpoint.stream_uuid = uuid;
                }
                Flow::Continue
            }
            Dispatch::Event { partition, event } => match event {
                StreamEvent::Snapshot(marker) => self.handle_snapshot(partition, marker),
                StreamEvent::Mutation(m) => self.handle_mutation(partition, m).await,
                StreamEvent::Deletion(d) => self.handle_deletion(partition, d).await,
                StreamEvent::SeqnoAdvanced { seq } => {
                    self.handle_seqno_advanced(partition, seq).await
                }
                StreamEvent::StreamEnd(end) => self.handle_stream_end(partition, end).await,
            },
        }
    }

    fn handle_begin(&mut self, p: PartitionId, checkpoint: Checkpoint, reset_watermark: bool) {
        if reset_watermark {
            // Rollback: acked seqnos above the rollback point belong to the
            // abandoned branch. Late acks for already-delivered events from
            // that branch are indistinguishable and tolerated; delivery is
            // at-least-once, not exactly-once.
            self.acks.reset(p, checkpoint.last_seqno);
        } else {
            self.acks.seed(p, checkpoint.last_seqno);
        }
        self.partitions.insert(
            p,
            PartitionProgress {
                checkpoint,
                unpersisted: 0,
                last_persist: self.clock.now(),
                last_persisted: Some(checkpoint),
                save_failures: 0,
                failed: false,
            },
        );
        self.status.update(p, |s| s.last_seqno = checkpoint.last_seqno);
    }

    fn handle_snapshot(&mut self, p: PartitionId, marker: SnapshotMarker) -> Flow {
        match self.partitions.get_mut(&p) {
            Some(progress) if !progress.failed => {
                progress.checkpoint.observe_snapshot(marker.start, marker.end);
                Flow::Continue
            }
            Some(_) => Flow::Continue,
            None => {
                tracing::warn!(partition = %p, "snapshot before stream begin; dropped");
                Flow::Continue
            }
        }
    }

    async fn handle_mutation(&mut self, p: PartitionId, m: Mutation) -> Flow {
        match self.validate(p, m.seq) {
            Ok(true) => {}
            Ok(false) => return Flow::Continue,
            Err(error) => return self.fail(p, error),
        }
        let event = FeedEvent {
            opcode: FeedOpcode::Mutation,
            partition: p,
            seq: m.seq,
            cas: m.cas,
            flags: m.flags,
            expiry: m.expiry,
            collection: m.collection,
            datatype: m.datatype,
            key: m.key,
            value: m.value,
            received_at: self.clock.epoch_ms(),
        };
        self.deliver(p, event).await
    }

    async fn handle_deletion(&mut self, p: PartitionId, d: Deletion) -> Flow {
        match self.validate(p, d.seq) {
            Ok(true) => {}
            Ok(false) => return Flow::Continue,
            Err(error) => return self.fail(p, error),
        }
        let event = FeedEvent {
            opcode: FeedOpcode::Deletion,
            partition: p,
            seq: d.seq,
            cas: d.cas,
            flags: 0,
            expiry: 0,
            collection: d.collection,
            datatype: d.datatype,
            key: d.key,
            value: d.value,
            received_at: self.clock.epoch_ms(),
        };
        self.deliver(p, event).await
    }

    /// Seqno advance: the watermark moves with no document to deliver, so
    /// the seqno is immediately checkpointable.
    async fn handle_seqno_advanced(&mut self, p: PartitionId, seq: u64) -> Flow {
        match self.partitions.get_mut(&p) {
            Some(progress) if progress.failed => return Flow::Continue,
            Some(progress) => {
                if seq <= progress.checkpoint.last_seqno {
                    let error = WorkerError::Invariant {
                        partition: p,
                        source: dcp_core::CheckpointError::NonMonotonic {
                            seqno: seq,
                            last: progress.checkpoint.last_seqno,
                        },
                    };
                    return self.fail(p, error);
                }
                // Advances may land outside the announced window; widen it
                // so the running checkpoint stays well-formed.
                progress.checkpoint.last_seqno = seq;
                progress.checkpoint.snapshot_start = progress.checkpoint.snapshot_start.min(seq);
                progress.checkpoint.snapshot_end = progress.checkpoint.snapshot_end.max(seq);
                progress.unpersisted += 1;
            }
            None => return self.fail(p, WorkerError::NotStarted { partition: p }),
        }
        self.acks.advance(p, seq);
        self.status.update(p, |s| s.last_seqno = seq);
        self.maybe_persist(p, false).await;
        Flow::Continue
    }

    async fn handle_stream_end(&mut self, p: PartitionId, end: StreamEnd) -> Flow {
        self.maybe_persist(p, true).await;
        let Some(progress) = self.partitions.remove(&p) else {
            tracing::warn!(partition = %p, "stream end for unknown partition");
            return Flow::Continue;
        };
        if progress.failed {
            return Flow::Continue;
        }
        tracing::info!(
            partition = %p,
            reason = %end.reason,
            last_seqno = progress.checkpoint.last_seqno,
            "stream ended"
        );
        let _ = self.notice_tx.send(WorkerNotice::StreamEnded {
            partition: p,
            end,
            checkpoint: progress.checkpoint,
        });
        Flow::Continue
    }

    /// Check ordering and window invariants for a document event.
    ///
    /// `Ok(true)` means deliver; `Ok(false)` means the partition is halted
    /// and the event is dropped.
    fn validate(&mut self, p: PartitionId, seq: u64) -> Result<bool, WorkerError> {
        match self.partitions.get(&p) {
            Some(progress) if progress.failed => Ok(false),
            Some(progress) => progress
                .checkpoint
                .check_seqno(seq)
                .map(|()| true)
                .map_err(|source| WorkerError::Invariant { partition: p, source }),
            None => Err(WorkerError::NotStarted { partition: p }),
        }
    }

    /// Emit a feed event, then record its seqno as processed.
    ///
    /// The checkpoint advances only after the emitter accepts the event, so
    /// a processed seqno always refers to an event handed downstream.
    async fn deliver(&mut self, p: PartitionId, event: FeedEvent) -> Flow {
        let seq = event.seq;
        if self.emit(event).await.is_err() {
            // Feed handle gone or shutdown mid-send; the event was not
            // handed downstream and the checkpoint must not cover it.
            return Flow::Stop;
        }
        self.metrics.incr_emitted();
        if let Some(progress) = self.partitions.get_mut(&p) {
            progress.checkpoint.last_seqno = seq;
            progress.unpersisted += 1;
        }
        self.status.update(p, |s| s.last_seqno = seq);
        self.maybe_persist(p, false).await;
        Flow::Continue
    }

    async fn emit(&self, event: FeedEvent) -> Result<(), EmitClosed> {
        if self.draining {
            return self.emit_tx.try_send(event).map_err(|_| EmitClosed);
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(EmitClosed),
            sent = self.emit_tx.send(event) => sent.map_err(|_| EmitClosed),
        }
    }

    fn fail(&mut self, p: PartitionId, error: WorkerError) -> Flow {
        tracing::error!(partition = %p, error = %error, "invariant violated; halting partition");
        if let Some(progress) = self.partitions.get_mut(&p) {
            progress.failed = true;
        }
        let _ = self.notice_tx.send(WorkerNotice::InvariantViolated { partition: p, error });
        Flow::Continue
    }

    /// Persist the ack-gated checkpoint when the cadence says so.
    ///
    /// The persisted `last_seqno` never exceeds the acknowledged watermark:
    /// restart redelivers anything delivered but unacked (at-least-once).
    async fn maybe_persist(&mut self, p: PartitionId, force: bool) {
        let acked = self.acks.acked(p);
        let now = self.clock.now();
        let target = {
            let Some(progress) = self.partitions.get_mut(&p) else { return };
            if progress.failed {
                return;
            }
            let elapsed = now.saturating_duration_since(progress.last_persist);
            let due = force
                || progress.unpersisted >= self.config.checkpoint_interval_events
                || (progress.unpersisted > 0
                    && elapsed >= Duration::from_millis(self.config.checkpoint_interval_ms));
            if !due {
                return;
            }
            progress.unpersisted = 0;
            progress.last_persist = now;
            let target = ack_clamped(&progress.checkpoint, acked);
            if progress.last_persisted.as_ref() == Some(&target) {
                return;
            }
            target
        };

        let result = self.store.save_checkpoint(p, target).await;
        let Some(progress) = self.partitions.get_mut(&p) else { return };
        match result {
            Ok(()) => {
                self.metrics.incr_checkpoints();
                progress.last_persisted = Some(target);
                if progress.save_failures >= DEGRADED_SAVE_THRESHOLD {
                    self.status.update(p, |s| s.degraded_durability = false);
                }
                progress.save_failures = 0;
            }
            Err(error) => {
                self.metrics.incr_checkpoint_failures();
                progress.save_failures += 1;
                // Retried on the next cadence tick; delivery continues.
                progress.unpersisted = self.config.checkpoint_interval_events;
                tracing::warn!(
                    partition = %p,
                    failures = progress.save_failures,
                    error = %error,
                    "checkpoint save failed"
                );
                if progress.save_failures == DEGRADED_SAVE_THRESHOLD {
                    self.status.update(p, |s| s.degraded_durability = true);
                }
            }
        }
    }

    /// Final checkpoint for every live partition on the way out.
    async fn final_flush(&mut self) {
        let live: Vec<PartitionId> = self.partitions.keys().copied().collect();
        for p in live {
            self.maybe_persist(p, true).await;
        }
    }
}

/// Clamp a running checkpoint to the acknowledged watermark.
fn ack_clamped(ckpt: &Checkpoint, acked: u64) -> Checkpoint {
    let last = ckpt.last_seqno.min(acked);
    if last >= ckpt.snapshot_start {
        Checkpoint {
            stream_uuid: ckpt.stream_uuid,
            last_seqno: last,
            snapshot_start: ckpt.snapshot_start,
            snapshot_end: ckpt.snapshot_end.max(last),
        }
    } else {
        // Acked watermark sits before the current window; persist it as a
        // collapsed window so the record stays well-formed.
        Checkpoint {
            stream_uuid: ckpt.stream_uuid,
            last_seqno: last,
            snapshot_start: last,
            snapshot_end: last,
        }
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
