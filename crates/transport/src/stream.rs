// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stream control surface of the transport.

use crate::observer::StreamObserver;
use async_trait::async_trait;
use dcp_core::{Checkpoint, FailoverLog, PartitionId, StreamUuid};
use std::sync::Arc;
use thiserror::Error;

/// Errors from stream control operations.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("stream open timed out")]
    Timeout,
    #[error("transport disconnected: {0}")]
    Disconnected(String),
    #[error("partition {0} is not served by this connection")]
    NotMyPartition(PartitionId),
    #[error("no open stream for partition {0}")]
    NoSuchStream(PartitionId),
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Parameters for opening one partition stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenParams {
    pub partition: PartitionId,
    /// Distinguishes concurrent streams over the same partition; usually 0.
    pub stream_id: u16,
    pub stream_uuid: StreamUuid,
    /// Events strictly greater than this seqno are requested.
    pub start_seqno: u64,
    pub end_seqno: u64,
    pub snapshot_start: u64,
    pub snapshot_end: u64,
}

impl OpenParams {
    /// Stream the full history of `partition` from seqno zero.
    pub fn from_zero(partition: PartitionId) -> Self {
        Self {
            partition,
            stream_id: 0,
            stream_uuid: StreamUuid::ZERO,
            start_seqno: 0,
            end_seqno: u64::MAX,
            snapshot_start: 0,
            snapshot_end: 0,
        }
    }

    /// Resume `partition` from a persisted checkpoint.
    pub fn from_checkpoint(partition: PartitionId, ckpt: &Checkpoint) -> Self {
        Self {
            partition,
            stream_id: 0,
            stream_uuid: ckpt.stream_uuid,
            start_seqno: ckpt.last_seqno,
            end_seqno: u64::MAX,
            snapshot_start: ckpt.snapshot_start,
            snapshot_end: ckpt.snapshot_end,
        }
    }

    /// Skip history: start at the partition's current high seqno.
    pub fn from_now(partition: PartitionId, uuid: StreamUuid, high_seqno: u64) -> Self {
        Self {
            partition,
            stream_id: 0,
            stream_uuid: uuid,
            start_seqno: high_seqno,
            end_seqno: u64::MAX,
            snapshot_start: high_seqno,
            snapshot_end: high_seqno,
        }
    }
}

/// Server response to a stream open.
#[derive(Debug, Clone)]
pub enum OpenOutcome {
    /// Stream accepted; the server's failover log for reconciliation.
    Accepted { failover_log: FailoverLog },
    /// Requested history diverged; resume at or below `seqno`.
    Rollback { seqno: u64 },
}

/// Per-partition stream control offered by the transport library.
///
/// The connection is shared by all partitions and is assumed thread-safe
/// for concurrent opens and callbacks.
#[async_trait]
pub trait StreamTransport: Send + Sync + 'static {
    /// Open a stream; accepted events flow to `observer` until the stream
    /// ends or is closed.
    async fn open_stream(
        &self,
        params: OpenParams,
        observer: Arc<dyn StreamObserver>,
    ) -> Result<OpenOutcome, TransportError>;

    /// Stop delivery for `partition`. No `StreamEnd` callback follows.
    async fn close_stream(&self, partition: PartitionId) -> Result<(), TransportError>;

    /// The server's current failover log for `partition`, newest first.
    /// Used to reconcile history after a rollback directive.
    async fn failover_log(&self, partition: PartitionId) -> Result<FailoverLog, TransportError>;

    /// Current high seqno of `partition`, for `from_now` starts.
    async fn latest_seqno(&self, partition: PartitionId) -> Result<u64, TransportError>;
}
