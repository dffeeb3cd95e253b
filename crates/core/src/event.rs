// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Protocol events and the outward feed event.
//!
//! `StreamEvent` is the internal union the observer produces from transport
//! callbacks; `FeedEvent` is the consolidated form handed to downstream
//! consumers.

use crate::partition::PartitionId;
use std::fmt;

/// Snapshot marker type reported by the upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotKind {
    Memory,
    Disk,
    Checkpoint,
    Ack,
}

/// Delimits the half-open seq window containing subsequent events.
///
/// Events between two markers satisfy `start ≤ seq ≤ end` and arrive in
/// non-decreasing seq order. Markers themselves consume no seq.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotMarker {
    pub start: u64,
    pub end: u64,
    pub kind: SnapshotKind,
}

impl SnapshotMarker {
    pub fn new(start: u64, end: u64, kind: SnapshotKind) -> Self {
        Self { start, end, kind }
    }

    pub fn contains(&self, seq: u64) -> bool {
        self.start <= seq && seq <= self.end
    }
}

/// A document write observed on a partition stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mutation {
    pub seq: u64,
    pub cas: u64,
    pub flags: u32,
    pub expiry: u32,
    pub datatype: u8,
    pub collection: u32,
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

/// A document removal observed on a partition stream.
///
/// Deletions may carry a body (extended metadata) but most have none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deletion {
    pub seq: u64,
    pub cas: u64,
    pub datatype: u8,
    pub collection: u32,
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

/// Why a stream stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEndReason {
    /// End seqno reached; the partition is complete.
    Ok,
    /// Consumer-initiated close.
    Closed,
    /// Partition state changed on the server (e.g. vbucket moved).
    StateChanged,
    /// Transport connection lost.
    Disconnected,
    /// Server requires consumption to restart at a lower seqno.
    Rollback(u64),
    /// Server rejected the stream filter.
    Filter,
    /// Consumer fell too far behind the server's flow-control window.
    TooSlow,
    /// Unrecognized status code from the transport.
    Unknown(u32),
}

impl StreamEndReason {
    /// Whether the supervisor should attempt a reopen for this reason.
    pub fn is_recoverable(self) -> bool {
        match self {
            StreamEndReason::Ok | StreamEndReason::Closed => false,
            StreamEndReason::StateChanged
            | StreamEndReason::Disconnected
            | StreamEndReason::Rollback(_)
            | StreamEndReason::Filter
            | StreamEndReason::TooSlow => true,
            StreamEndReason::Unknown(_) => false,
        }
    }
}

impl fmt::Display for StreamEndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamEndReason::Ok => write!(f, "ok"),
            StreamEndReason::Closed => write!(f, "closed"),
            StreamEndReason::StateChanged => write!(f, "state-changed"),
            StreamEndReason::Disconnected => write!(f, "disconnected"),
            StreamEndReason::Rollback(seq) => write!(f, "rollback({seq})"),
            StreamEndReason::Filter => write!(f, "filter"),
            StreamEndReason::TooSlow => write!(f, "too-slow"),
            StreamEndReason::Unknown(code) => write!(f, "unknown({code})"),
        }
    }
}

/// Stream termination notice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEnd {
    pub reason: StreamEndReason,
    pub error: Option<String>,
}

impl StreamEnd {
    pub fn new(reason: StreamEndReason) -> Self {
        Self { reason, error: None }
    }

    pub fn with_error(reason: StreamEndReason, error: impl Into<String>) -> Self {
        Self { reason, error: Some(error.into()) }
    }
}

/// Internal event union dispatched to partition workers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Snapshot(SnapshotMarker),
    Mutation(Mutation),
    Deletion(Deletion),
    /// High-watermark advance with no document to deliver.
    SeqnoAdvanced { seq: u64 },
    StreamEnd(StreamEnd),
}

impl StreamEvent {
    /// The seqno this event consumes, if any.
    pub fn seq(&self) -> Option<u64> {
        match self {
            StreamEvent::Mutation(m) => Some(m.seq),
            StreamEvent::Deletion(d) => Some(d.seq),
            StreamEvent::SeqnoAdvanced { seq } => Some(*seq),
            StreamEvent::Snapshot(_) | StreamEvent::StreamEnd(_) => None,
        }
    }

    /// Short tag for log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            StreamEvent::Snapshot(_) => "snapshot",
            StreamEvent::Mutation(_) => "mutation",
            StreamEvent::Deletion(_) => "deletion",
            StreamEvent::SeqnoAdvanced { .. } => "seqno-advanced",
            StreamEvent::StreamEnd(_) => "stream-end",
        }
    }
}

/// Which kind of write a feed event represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedOpcode {
    Mutation,
    Deletion,
}

/// Outward event delivered to downstream consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEvent {
    pub opcode: FeedOpcode,
    pub partition: PartitionId,
    pub seq: u64,
    pub cas: u64,
    pub flags: u32,
    pub expiry: u32,
    pub collection: u32,
    pub datatype: u8,
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    /// Epoch ms when the worker emitted the event.
    pub received_at: u64,
}

impl FeedEvent {
    /// Key as UTF-8 for logs and filters that work on strings.
    pub fn key_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.key)
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
