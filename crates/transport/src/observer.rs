// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Callback contract the transport invokes.

use async_trait::async_trait;
use dcp_core::{Deletion, Mutation, PartitionId, SnapshotMarker, StreamEnd};

/// Sink for protocol callbacks.
///
/// The transport invokes these from its own tasks and awaits each call, so
/// a slow consumer propagates backpressure into the transport's flow
/// control. Implementations must be safe to call concurrently for different
/// partitions; calls for one partition arrive in protocol order.
///
/// The collection/scope and OSO callbacks exist because the protocol can
/// emit them; this consumer does not use them, so they default to no-ops
/// rather than failing the stream.
#[async_trait]
pub trait StreamObserver: Send + Sync + 'static {
    async fn snapshot_marker(&self, partition: PartitionId, marker: SnapshotMarker);

    async fn mutation(&self, partition: PartitionId, mutation: Mutation);

    async fn deletion(&self, partition: PartitionId, deletion: Deletion);

    /// Document expiry notice. The consumer does not subscribe to these.
    async fn expiration(&self, partition: PartitionId, seq: u64);

    async fn seqno_advanced(&self, partition: PartitionId, seq: u64);

    async fn stream_end(&self, partition: PartitionId, end: StreamEnd);

    async fn collection_created(&self, _partition: PartitionId, _seq: u64, _collection: u32) {}

    async fn collection_dropped(&self, _partition: PartitionId, _seq: u64, _collection: u32) {}

    async fn scope_created(&self, _partition: PartitionId, _seq: u64, _scope: u32) {}

    async fn scope_dropped(&self, _partition: PartitionId, _seq: u64, _scope: u32) {}

    /// Out-of-sequence-order snapshot boundary marker.
    async fn oso_snapshot(&self, _partition: PartitionId, _marker: u32) {}
}
