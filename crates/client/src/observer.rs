// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stream observer: classify, filter, dispatch.
//!
//! Transport callbacks land here. Each event is routed to the worker shard
//! owning its partition; the send awaits when the inbox is full, so
//! backpressure propagates into the transport's flow control.

use crate::shared::Dispatch;
use async_trait::async_trait;
use dcp_core::{
    Deletion, FeedMetrics, KeyFilter, Mutation, PartitionId, SnapshotMarker, StreamEnd,
    StreamEvent,
};
use dcp_transport::StreamObserver;
use std::sync::Arc;
use tokio::sync::mpsc;

pub(crate) struct FeedObserver {
    filter: Arc<dyn KeyFilter>,
    routes: Vec<mpsc::Sender<Dispatch>>,
    metrics: Arc<FeedMetrics>,
}

impl FeedObserver {
    pub(crate) fn new(
        filter: Arc<dyn KeyFilter>,
        routes: Vec<mpsc::Sender<Dispatch>>,
        metrics: Arc<FeedMetrics>,
    ) -> Self {
        Self { filter, routes, metrics }
    }

    async fn dispatch(&self, partition: PartitionId, event: StreamEvent) {
        let worker = partition.worker_for(self.routes.len());
        self.metrics.incr_dispatched();
        if self.routes[worker].send(Dispatch::Event { partition, event }).await.is_err() {
            // Worker gone during shutdown; the transport is being torn
            // down as well.
            tracing::debug!(partition = %partition, "dispatch after worker exit; dropped");
        }
    }
}

#[async_trait]
impl StreamObserver for FeedObserver {
    async fn snapshot_marker(&self, partition: PartitionId, marker: SnapshotMarker) {
        self.dispatch(partition, StreamEvent::Snapshot(marker)).await;
    }

    async fn mutation(&self, partition: PartitionId, mutation: Mutation) {
        if self.filter.excludes(&mutation.key) {
            self.metrics.incr_filtered();
            // The seqno must still move the watermark, or a restart would
            // re-fetch and re-filter the same events forever.
            self.dispatch(partition, StreamEvent::SeqnoAdvanced { seq: mutation.seq }).await;
            return;
        }
        self.dispatch(partition, StreamEvent::Mutation(mutation)).await;
    }

    async fn deletion(&self, partition: PartitionId, deletion: Deletion) {
        if self.filter.excludes(&deletion.key) {
            self.metrics.incr_filtered();
            self.dispatch(partition, StreamEvent::SeqnoAdvanced { seq: deletion.seq }).await;
            return;
        }
        self.dispatch(partition, StreamEvent::Deletion(deletion)).await;
    }

    async fn expiration(&self, partition: PartitionId, seq: u64) {
        // Not subscribed; a server sending these is unexpected but harmless.
        tracing::warn!(partition = %partition, seq, "unexpected expiration callback; dropped");
    }

    async fn seqno_advanced(&self, partition: PartitionId, seq: u64) {
        self.dispatch(partition, StreamEvent::SeqnoAdvanced { seq }).await;
    }

    async fn stream_end(&self, partition: PartitionId, end: StreamEnd) {
        self.dispatch(partition, StreamEvent::StreamEnd(end)).await;
    }
}

#[cfg(test)]
#[path = "observer_tests.rs"]
mod tests;
