// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Builders for concise event construction in tests.

use crate::event::{
    Deletion, Mutation, SnapshotKind, SnapshotMarker, StreamEnd, StreamEndReason, StreamEvent,
};

/// Mutation with the given seq and key, empty value, zeroed metadata.
pub fn mutation(seq: u64, key: &str) -> StreamEvent {
    StreamEvent::Mutation(Mutation {
        seq,
        cas: seq * 1_000,
        flags: 0,
        expiry: 0,
        datatype: 0,
        collection: 0,
        key: key.as_bytes().to_vec(),
        value: format!("{{\"seq\":{seq}}}").into_bytes(),
    })
}

/// Deletion with the given seq and key.
pub fn deletion(seq: u64, key: &str) -> StreamEvent {
    StreamEvent::Deletion(Deletion {
        seq,
        cas: seq * 1_000,
        datatype: 0,
        collection: 0,
        key: key.as_bytes().to_vec(),
        value: Vec::new(),
    })
}

/// Disk snapshot marker covering `start..=end`.
pub fn snapshot(start: u64, end: u64) -> StreamEvent {
    StreamEvent::Snapshot(SnapshotMarker::new(start, end, SnapshotKind::Disk))
}

/// Seqno advance without a document.
pub fn seqno_advanced(seq: u64) -> StreamEvent {
    StreamEvent::SeqnoAdvanced { seq }
}

/// Stream end with the given reason and no error detail.
pub fn stream_end(reason: StreamEndReason) -> StreamEvent {
    StreamEvent::StreamEnd(StreamEnd::new(reason))
}

/// Stream end carrying the transport's error detail.
pub fn stream_end_with_error(reason: StreamEndReason, detail: &str) -> StreamEvent {
    StreamEvent::StreamEnd(StreamEnd::with_error(reason, detail))
}
