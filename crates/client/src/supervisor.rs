// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stream supervisor: opens streams, reacts to stream ends, and decides
//! restart, rollback, or abandonment per partition.
//!
//! The supervisor is the only component talking to the transport's control
//! surface. Workers report stream ends and invariant violations over the
//! notice channel; everything else it learns from open outcomes.

use crate::shared::{Dispatch, SharedStatus};
use crate::worker::WorkerNotice;
use dcp_core::{
    Checkpoint, FailoverEntry, FailoverLog, FeedMetrics, PartitionId, PartitionState, StartPolicy,
    StreamEnd, StreamEndReason, StreamUuid,
};
use dcp_store::CheckpointStore;
use dcp_transport::{OpenOutcome, OpenParams, StreamObserver, StreamTransport};
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Supervisor-relevant slice of the feed configuration.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SupervisorConfig {
    pub start_policy: StartPolicy,
    pub backoff_min_ms: u64,
    pub backoff_max_ms: u64,
    pub open_timeout: Duration,
    pub max_restart_attempts: u32,
}

struct PartitionCtl {
    /// Current resume point; refreshed from worker notices and rollbacks.
    checkpoint: Checkpoint,
    state: PartitionState,
    /// Failed open/reopen attempts since the last successful open.
    consecutive_failures: u32,
    /// Next `Begin` must drop the ack watermark (set after rollback).
    reset_watermark: bool,
}

pub(crate) struct Supervisor<T, S> {
    transport: Arc<T>,
    store: Arc<S>,
    observer: Arc<dyn StreamObserver>,
    worker_txs: Vec<mpsc::Sender<Dispatch>>,
    notice_rx: mpsc::UnboundedReceiver<WorkerNotice>,
    cancel: CancellationToken,
    status: SharedStatus,
    metrics: Arc<FeedMetrics>,
    config: SupervisorConfig,
    assigned: Vec<PartitionId>,
    partitions: HashMap<PartitionId, PartitionCtl>,
    reopen_queue: Vec<(Instant, PartitionId)>,
}

impl<T, S> Supervisor<T, S>
where
    T: StreamTransport,
    S: CheckpointStore,
{
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        transport: Arc<T>,
        store: Arc<S>,
        observer: Arc<dyn StreamObserver>,
        worker_txs: Vec<mpsc::Sender<Dispatch>>,
        notice_rx: mpsc::UnboundedReceiver<WorkerNotice>,
        cancel: CancellationToken,
        status: SharedStatus,
        metrics: Arc<FeedMetrics>,
        config: SupervisorConfig,
        assigned: Vec<PartitionId>,
    ) -> Self {
        Self {
            transport,
            store,
            observer,
            worker_txs,
            notice_rx,
            cancel,
            status,
            metrics,
            config,
            assigned,
            partitions: HashMap::new(),
            reopen_queue: Vec::new(),
        }
    }

    /// Barrier-synchronized first open: every assigned partition gets one
    /// attempt before the feed is handed to the consumer. Failures enter
    /// the normal backoff path rather than failing the feed.
    pub(crate) async fn initial_open(&mut self) -> Result<(), dcp_store::StoreError> {
        let assigned = self.assigned.clone();
        for p in assigned {
            let checkpoint = self.resolve_start(p).await?;
            self.partitions.insert(
                p,
                PartitionCtl {
                    checkpoint,
                    state: PartitionState::Pending,
                    consecutive_failures: 0,
                    reset_watermark: false,
                },
            );
            self.try_open(p).await;
        }
        Ok(())
    }

    async fn resolve_start(&self, p: PartitionId) -> Result<Checkpoint, dcp_store::StoreError> {
        match self.config.start_policy {
            StartPolicy::FromZero => Ok(Checkpoint::zero()),
            StartPolicy::FromCheckpoint => {
                Ok(self.store.load_checkpoint(p).await?.unwrap_or_else(Checkpoint::zero))
            }
            StartPolicy::FromNow => {
                let high = match self.transport.latest_seqno(p).await {
                    Ok(high) => high,
                    Err(error) => {
                        tracing::warn!(partition = %p, error = %error, "latest seqno unavailable; starting from zero");
                        0
                    }
                };
                let uuid = self
                    .store
                    .failover_log(p)
                    .await?
                    .latest()
                    .map(|e| e.uuid)
                    .unwrap_or(StreamUuid::ZERO);
                Ok(Checkpoint {
                    stream_uuid: uuid,
                    last_seqno: high,
                    snapshot_start: high,
                    snapshot_end: high,
                })
            }
        }
    }

    pub(crate) async fn run(mut self) {
        loop {
            let next_due = self.reopen_queue.iter().map(|(due, _)| *due).min();
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                maybe = self.notice_rx.recv() => match maybe {
                    Some(notice) => self.handle_notice(notice).await,
                    None => break,
                },
                _ = wait_until(next_due) => self.reopen_due().await,
            }
        }
        self.shutdown().await;
    }

    async fn handle_notice(&mut self, notice: WorkerNotice) {
        match notice {
            WorkerNotice::StreamEnded { partition, end, checkpoint } => {
                self.handle_stream_end(partition, end, checkpoint).await;
            }
            WorkerNotice::InvariantViolated { partition, error } => {
                self.set_state(partition, PartitionState::Failed);
                self.status.update(partition, |s| s.last_error = Some(error.to_string()));
                let _ = self.transport.close_stream(partition).await;
            }
        }
    }

    async fn handle_stream_end(&mut self, p: PartitionId, end: StreamEnd, checkpoint: Checkpoint) {
        {
            let Some(ctl) = self.partitions.get_mut(&p) else { return };
            if ctl.state.is_terminal() {
                return;
            }
            ctl.checkpoint = checkpoint;
        }
        match end.reason {
            StreamEndReason::Ok => self.set_state(p, PartitionState::Complete),
            StreamEndReason::Closed => self.set_state(p, PartitionState::Closed),
            StreamEndReason::Rollback(seqno) => self.handle_rollback(p, seqno).await,
            reason if reason.is_recoverable() => self.record_failure(p, end_error(&end)).await,
            _ => self.abandon(p, end_error(&end)),
        }
    }

    async fn reopen_due(&mut self) {
        let now = Instant::now();
        let due: Vec<PartitionId> = {
            let mut due = Vec::new();
            self.reopen_queue.retain(|&(at, p)| {
                if at <= now {
                    due.push(p);
                    false
                } else {
                    true
                }
            });
            due
        };
        for p in due {
            self.try_open(p).await;
        }
    }

    /// One open attempt for `p`. `Begin` is sent to the owning worker
    /// before the transport call so it precedes any delivered event.
    async fn try_open(&mut self, p: PartitionId) {
        let (checkpoint, reset_watermark) = {
            let Some(ctl) = self.partitions.get_mut(&p) else { return };
            if ctl.state.is_terminal() {
                return;
            }
            let reset = ctl.reset_watermark;
            ctl.reset_watermark = false;
            (ctl.checkpoint, reset)
        };

        let worker = p.worker_for(self.worker_txs.len());
        let begin = Dispatch::Begin { partition: p, checkpoint, reset_watermark };
        if self.worker_txs[worker].send(begin).await.is_err() {
            // Worker exited; the feed is shutting down.
            return;
        }

        self.metrics.incr_opens();
        let params = OpenParams::from_checkpoint(p, &checkpoint);
        let open = self.transport.open_stream(params, Arc::clone(&self.observer));
        match tokio::time::timeout(self.config.open_timeout, open).await {
            Err(_) => self.record_failure(p, "stream open timed out".to_string()).await,
            Ok(Err(error)) => self.record_failure(p, error.to_string()).await,
            Ok(Ok(OpenOutcome::Rollback { seqno })) => self.handle_rollback(p, seqno).await,
            Ok(Ok(OpenOutcome::Accepted { failover_log })) => {
                self.open_accepted(p, failover_log).await;
            }
        }
    }

    async fn open_accepted(&mut self, p: PartitionId, server_log: FailoverLog) {
        if let Some(head) = server_log.latest() {
            if let Err(error) = self.store.append_failover(p, head).await {
                tracing::warn!(partition = %p, error = %error, "failover append failed");
            }
        }
        let adopted = {
            let Some(ctl) = self.partitions.get_mut(&p) else { return };
            ctl.consecutive_failures = 0;
            match server_log.latest() {
                Some(head) if head.uuid != ctl.checkpoint.stream_uuid => {
                    ctl.checkpoint.stream_uuid = head.uuid;
                    Some(head.uuid)
                }
                _ => None,
            }
        };
        if let Some(uuid) = adopted {
            let worker = p.worker_for(self.worker_txs.len());
            let _ = self.worker_txs[worker].send(Dispatch::AdoptUuid { partition: p, uuid }).await;
        }
        self.set_state(p, PartitionState::Open);
        self.status.update(p, |s| s.last_error = None);
        tracing::info!(partition = %p, "stream open");
    }

    /// Reconcile a rollback directive against the failover history.
    ///
    /// The resume point is the greatest local entry whose uuid is shared
    /// with the server history, capped at the server's rollback seqno. No
    /// common ancestor means the partition restarts from zero.
    async fn handle_rollback(&mut self, p: PartitionId, seqno: u64) {
        self.metrics.incr_rollbacks();
        let local = match self.store.failover_log(p).await {
            Ok(log) => log,
            Err(error) => {
                tracing::warn!(partition = %p, error = %error, "local failover log unavailable");
                FailoverLog::new()
            }
        };
        let server = self.transport.failover_log(p).await.unwrap_or_default();
        let ancestor = local
            .rollback_point(&server)
            .map(|e| FailoverEntry::new(e.uuid, e.seqno.min(seqno)))
            .unwrap_or_else(|| FailoverEntry::new(StreamUuid::ZERO, 0));

        tracing::warn!(
            partition = %p,
            requested = seqno,
            resume_seqno = ancestor.seqno,
            resume_uuid = %ancestor.uuid,
            "rolling back"
        );

        let Some(ctl) = self.partitions.get_mut(&p) else { return };
        let truncated = ctl.checkpoint.truncated(ancestor.seqno, ancestor.uuid);
        ctl.checkpoint = truncated;
        ctl.reset_watermark = true;

        // Persist the truncation before reopening so a crash mid-rollback
        // resumes from the rolled-back point, not the stale one.
        if let Err(error) = self.store.truncate_checkpoint(p, truncated).await {
            tracing::warn!(partition = %p, error = %error, "rollback checkpoint save failed");
        }
        if let Err(error) = self.store.truncate_failover(p, ancestor.seqno).await {
            tracing::warn!(partition = %p, error = %error, "failover truncation failed");
        }

        self.status.update(p, |s| s.last_seqno = truncated.last_seqno);
        self.record_failure(p, format!("rollback to {}", ancestor.seqno)).await;
    }

    /// Count a failed attempt; schedule a backed-off reopen or abandon.
    async fn record_failure(&mut self, p: PartitionId, error: String) {
        let failures = {
            let Some(ctl) = self.partitions.get_mut(&p) else { return };
            ctl.consecutive_failures += 1;
            ctl.consecutive_failures
        };
        self.metrics.incr_restarts();
        self.status.update(p, |s| {
            s.restarts += 1;
            s.last_error = Some(error.clone());
        });
        if failures >= self.config.max_restart_attempts {
            self.abandon(p, error);
            return;
        }
        let delay = backoff_delay(self.config.backoff_min_ms, self.config.backoff_max_ms, failures);
        tracing::info!(partition = %p, ?delay, attempt = failures, error = %error, "scheduling reopen");
        self.set_state(p, PartitionState::Backoff);
        self.reopen_queue.push((Instant::now() + delay, p));
    }

    fn abandon(&mut self, p: PartitionId, error: String) {
        tracing::error!(partition = %p, error = %error, "abandoning partition");
        self.set_state(p, PartitionState::Abandoned);
        self.status.update(p, |s| s.last_error = Some(error));
    }

    fn set_state(&mut self, p: PartitionId, state: PartitionState) {
        if let Some(ctl) = self.partitions.get_mut(&p) {
            ctl.state = state;
        }
        self.status.update(p, |s| s.state = state);
    }

    /// Close open streams and mark non-terminal partitions closed. Workers
    /// drain and write final checkpoints on their own cancellation path.
    async fn shutdown(&mut self) {
        let open: Vec<PartitionId> = self
            .partitions
            .iter()
            .filter(|(_, ctl)| !ctl.state.is_terminal())
            .map(|(&p, _)| p)
            .collect();
        for p in open {
            let _ = self.transport.close_stream(p).await;
            self.set_state(p, PartitionState::Closed);
        }
        tracing::debug!("supervisor stopped");
    }
}

/// Status line for a terminated stream, carrying the transport's error
/// detail when one was reported.
fn end_error(end: &StreamEnd) -> String {
    match &end.error {
        Some(detail) => format!("stream ended: {} ({detail})", end.reason),
        None => format!("stream ended: {}", end.reason),
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Exponential backoff with jitter: the nth failure waits somewhere in
/// `[cap/2, cap]` where `cap = min(max, min * 2^(n-1))`.
fn backoff_delay(min_ms: u64, max_ms: u64, failures: u32) -> Duration {
    let exp = failures.saturating_sub(1).min(20);
    let cap = min_ms.saturating_mul(1u64 << exp).min(max_ms).max(1);
    let half = cap / 2;
    let jitter = if half > 0 { rand::thread_rng().gen_range(0..=half) } else { 0 };
    Duration::from_millis((cap - half) + jitter)
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
