// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The downstream feed handle.
//!
//! `Feed::open` wires workers, the observer, and the supervisor, performs
//! the barrier-synchronized initial open, and returns the consumer-facing
//! handle: `next` / `ack` / `status` / `close`.

use crate::error::FeedError;
use crate::observer::FeedObserver;
use crate::shared::{AckRegistry, SharedStatus};
use crate::supervisor::{Supervisor, SupervisorConfig};
use crate::worker::{Worker, WorkerConfig};
use dcp_core::{
    Clock, FeedConfig, FeedEvent, FeedMetrics, FeedStatus, PartitionId, SystemClock,
};
use dcp_store::CheckpointStore;
use dcp_transport::{StreamObserver, StreamTransport};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A consolidated, per-partition-ordered stream of feed events.
///
/// Events from different partitions interleave; within one partition the
/// order is the stream order with strictly increasing seqnos. `ack` gates
/// checkpoint persistence, so an unacked event is redelivered after a
/// restart (at-least-once).
#[derive(Debug)]
pub struct Feed {
    events_rx: mpsc::Receiver<FeedEvent>,
    acks: Arc<AckRegistry>,
    status: SharedStatus,
    metrics: Arc<FeedMetrics>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl Feed {
    /// Open a feed over `transport`, persisting progress to `store`.
    ///
    /// Every assigned partition gets one open attempt before this returns;
    /// partitions that fail their first open keep retrying in the
    /// background under the restart policy.
    pub async fn open<T, S>(config: FeedConfig, transport: T, store: S) -> Result<Feed, FeedError>
    where
        T: StreamTransport,
        S: CheckpointStore,
    {
        Self::open_with_clock(config, transport, store, SystemClock).await
    }

    /// `open` with an injected clock, for deterministic cadence in tests.
    pub async fn open_with_clock<T, S, C>(
        config: FeedConfig,
        transport: T,
        store: S,
        clock: C,
    ) -> Result<Feed, FeedError>
    where
        T: StreamTransport,
        S: CheckpointStore,
        C: Clock,
    {
        config.validate()?;
        let cancel = CancellationToken::new();
        let metrics = Arc::new(FeedMetrics::new());
        let status = SharedStatus::new(&config.partitions);
        let acks = Arc::new(AckRegistry::new(&config.partitions));
        let store = Arc::new(store);
        let transport = Arc::new(transport);

        let (emit_tx, events_rx) = mpsc::channel(config.worker_count * config.queue_depth);
        let (notice_tx, notice_rx) = mpsc::unbounded_channel();

        let worker_config = WorkerConfig {
            checkpoint_interval_events: config.checkpoint_interval_events,
            checkpoint_interval_ms: config.checkpoint_interval_ms,
            drain_deadline: config.drain_deadline(),
        };

        let mut worker_txs = Vec::with_capacity(config.worker_count);
        let mut tasks = Vec::with_capacity(config.worker_count + 1);
        for id in 0..config.worker_count {
            let (tx, rx) = mpsc::channel(config.queue_depth);
            worker_txs.push(tx);
            let worker = Worker::new(
                id,
                rx,
                emit_tx.clone(),
                notice_tx.clone(),
                Arc::clone(&store),
                clock.clone(),
                Arc::clone(&acks),
                status.clone(),
                Arc::clone(&metrics),
                cancel.clone(),
                worker_config,
            );
            tasks.push(tokio::spawn(worker.run()));
        }
        drop(emit_tx);
        drop(notice_tx);

        let observer: Arc<dyn StreamObserver> = Arc::new(FeedObserver::new(
            Arc::clone(&config.filter),
            worker_txs.clone(),
            Arc::clone(&metrics),
        ));

        let supervisor_config = SupervisorConfig {
            start_policy: config.start_policy,
            backoff_min_ms: config.backoff_min_ms,
            backoff_max_ms: config.backoff_max_ms,
            open_timeout: config.open_timeout(),
            max_restart_attempts: config.max_restart_attempts,
        };
        let mut supervisor = Supervisor::new(
            transport,
            store,
            observer,
            worker_txs,
            notice_rx,
            cancel.clone(),
            status.clone(),
            Arc::clone(&metrics),
            supervisor_config,
            config.partitions.clone(),
        );
        if let Err(error) = supervisor.initial_open().await {
            cancel.cancel();
            return Err(error.into());
        }
        tasks.push(tokio::spawn(supervisor.run()));

        Ok(Feed { events_rx, acks, status, metrics, cancel, tasks })
    }

    /// Next feed event in worker-emit order.
    ///
    /// Returns `None` once the feed has shut down and all buffered events
    /// are consumed.
    pub async fn next(&mut self) -> Option<FeedEvent> {
        self.events_rx.recv().await
    }

    /// Mark `seq` on `partition` as durably handled downstream.
    ///
    /// Monotonic: acking below the current watermark is a no-op.
    pub fn ack(&self, partition: PartitionId, seq: u64) -> Result<(), FeedError> {
        if self.acks.advance(partition, seq) {
            Ok(())
        } else {
            Err(FeedError::UnknownPartition(partition))
        }
    }

    /// Per-partition states and counters.
    pub fn status(&self) -> FeedStatus {
        FeedStatus { partitions: self.status.snapshot(), metrics: self.metrics.snapshot() }
    }

    /// Orderly shutdown: close streams, drain workers within the drain
    /// deadline, write final checkpoints, join all tasks.
    pub async fn close(mut self) {
        self.cancel.cancel();
        for task in self.tasks.drain(..) {
            let _ = task.await;
        }
    }
}

impl Drop for Feed {
    fn drop(&mut self) {
        // A handle dropped without `close` still stops its tasks.
        self.cancel.cancel();
    }
}

#[cfg(test)]
#[path = "feed_tests.rs"]
mod tests;
