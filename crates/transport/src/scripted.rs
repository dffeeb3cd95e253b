// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scripted in-process transport for tests.
//!
//! Each partition carries a queue of segments; every `open_stream` consumes
//! one. A `Deliver` segment plays its events to the observer from a spawned
//! task, awaiting each callback so consumer backpressure reaches the script
//! exactly as it would reach a real connection.

use crate::observer::StreamObserver;
use crate::stream::{OpenOutcome, OpenParams, StreamTransport, TransportError};
use async_trait::async_trait;
use dcp_core::{FailoverEntry, FailoverLog, PartitionId, StreamEvent, StreamUuid};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

enum Segment {
    Deliver {
        failover: FailoverLog,
        events: Vec<StreamEvent>,
    },
    FailOpen {
        message: String,
    },
    Rollback {
        seqno: u64,
    },
}

#[derive(Default)]
struct ScriptState {
    segments: HashMap<PartitionId, VecDeque<Segment>>,
    opens: Vec<OpenParams>,
    active: HashMap<PartitionId, CancellationToken>,
    high_seqnos: HashMap<PartitionId, u64>,
    high_overrides: HashMap<PartitionId, u64>,
    server_failover: HashMap<PartitionId, FailoverLog>,
    closed: Vec<PartitionId>,
}

/// Transport double driven by per-partition scripts.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a segment that opens under `uuid` and plays `events`.
    ///
    /// The reported failover log is the single entry `(uuid, high seq of
    /// the segment)` unless overridden with [`push_deliver_with_failover`].
    ///
    /// [`push_deliver_with_failover`]: ScriptedTransport::push_deliver_with_failover
    pub fn push_deliver(&self, p: PartitionId, uuid: StreamUuid, events: Vec<StreamEvent>) {
        let high = events.iter().filter_map(StreamEvent::seq).max().unwrap_or(0);
        self.push_deliver_with_failover(
            p,
            vec![FailoverEntry::new(uuid, high)],
            events,
        );
    }

    /// Queue a delivery segment with an explicit server failover log
    /// (newest first).
    pub fn push_deliver_with_failover(
        &self,
        p: PartitionId,
        failover: Vec<FailoverEntry>,
        events: Vec<StreamEvent>,
    ) {
        let mut state = self.state.lock();
        let high = events.iter().filter_map(StreamEvent::seq).max().unwrap_or(0);
        let entry = state.high_seqnos.entry(p).or_default();
        *entry = (*entry).max(high);
        state.segments.entry(p).or_default().push_back(Segment::Deliver {
            failover: FailoverLog::from_entries(failover),
            events,
        });
    }

    /// Queue an open failure.
    pub fn push_fail_open(&self, p: PartitionId, message: impl Into<String>) {
        self.state
            .lock()
            .segments
            .entry(p)
            .or_default()
            .push_back(Segment::FailOpen { message: message.into() });
    }

    /// Queue a rollback response for the next open.
    pub fn push_rollback(&self, p: PartitionId, seqno: u64) {
        self.state.lock().segments.entry(p).or_default().push_back(Segment::Rollback { seqno });
    }

    /// Set the failover log the server reports for `p`, newest first.
    pub fn set_server_failover(&self, p: PartitionId, entries: Vec<FailoverEntry>) {
        self.state.lock().server_failover.insert(p, FailoverLog::from_entries(entries));
    }

    /// Pin the high seqno reported for `p`, overriding the value derived
    /// from queued segments.
    pub fn set_high_seqno(&self, p: PartitionId, seq: u64) {
        self.state.lock().high_overrides.insert(p, seq);
    }

    /// All open requests observed so far, in order.
    pub fn opens(&self) -> Vec<OpenParams> {
        self.state.lock().opens.clone()
    }

    /// Number of open requests for `p`.
    pub fn open_count(&self, p: PartitionId) -> usize {
        self.state.lock().opens.iter().filter(|o| o.partition == p).count()
    }

    /// Partitions the consumer has closed, in order.
    pub fn closes(&self) -> Vec<PartitionId> {
        self.state.lock().closed.clone()
    }
}

#[async_trait]
impl StreamTransport for ScriptedTransport {
    async fn open_stream(
        &self,
        params: OpenParams,
        observer: Arc<dyn StreamObserver>,
    ) -> Result<OpenOutcome, TransportError> {
        let p = params.partition;
        let (failover, events, token) = {
            let mut state = self.state.lock();
            state.opens.push(params);
            let segment = state.segments.get_mut(&p).and_then(VecDeque::pop_front);
            match segment {
                None => {
                    return Err(TransportError::Disconnected(format!(
                        "script exhausted for partition {p}"
                    )))
                }
                Some(Segment::FailOpen { message }) => {
                    return Err(TransportError::Disconnected(message))
                }
                Some(Segment::Rollback { seqno }) => {
                    return Ok(OpenOutcome::Rollback { seqno })
                }
                Some(Segment::Deliver { failover, events }) => {
                    tracing::debug!(partition = %p, events = events.len(), "scripted segment accepted");
                    let token = CancellationToken::new();
                    state.active.insert(p, token.clone());
                    (failover, events, token)
                }
            }
        };

        tokio::spawn(async move {
            for event in events {
                if token.is_cancelled() {
                    return;
                }
                match event {
                    StreamEvent::Snapshot(marker) => observer.snapshot_marker(p, marker).await,
                    StreamEvent::Mutation(m) => observer.mutation(p, m).await,
                    StreamEvent::Deletion(d) => observer.deletion(p, d).await,
                    StreamEvent::SeqnoAdvanced { seq } => observer.seqno_advanced(p, seq).await,
                    StreamEvent::StreamEnd(end) => {
                        observer.stream_end(p, end).await;
                        return;
                    }
                }
            }
        });

        Ok(OpenOutcome::Accepted { failover_log: failover })
    }

    async fn close_stream(&self, partition: PartitionId) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        state.closed.push(partition);
        if let Some(token) = state.active.remove(&partition) {
            token.cancel();
        }
        Ok(())
    }

    async fn failover_log(&self, partition: PartitionId) -> Result<FailoverLog, TransportError> {
        Ok(self.state.lock().server_failover.get(&partition).cloned().unwrap_or_default())
    }

    async fn latest_seqno(&self, partition: PartitionId) -> Result<u64, TransportError> {
        let state = self.state.lock();
        Ok(state
            .high_overrides
            .get(&partition)
            .or_else(|| state.high_seqnos.get(&partition))
            .copied()
            .unwrap_or(0))
    }
}

#[cfg(test)]
#[path = "scripted_tests.rs"]
mod tests;
