// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the consumer.

use dcp_core::{CheckpointError, ConfigError, PartitionId};
use dcp_store::StoreError;
use thiserror::Error;

/// Errors surfaced through the `Feed` handle.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("checkpoint store: {0}")]
    Store(#[from] StoreError),

    #[error("partition {0} is not part of this feed")]
    UnknownPartition(PartitionId),
}

/// Per-partition processing failures.
///
/// These are fatal for the partition, never for the feed: the worker stops
/// processing that partition and the supervisor marks it failed.
#[derive(Debug, Clone, Error)]
pub enum WorkerError {
    #[error("partition {partition}: {source}")]
    Invariant {
        partition: PartitionId,
        #[source]
        source: CheckpointError,
    },

    #[error("partition {partition}: event arrived before stream begin")]
    NotStarted { partition: PartitionId },
}
