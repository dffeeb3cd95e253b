// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Failover log: per-partition record of stream-history identities.
//!
//! Each successful stream open appends a `(uuid, seqno)` pair. On reopen the
//! server's reported log is compared with the local copy; divergence means
//! the server history forked and consumption must roll back to the most
//! recent common ancestor.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of one branch of a partition's history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamUuid(pub u64);

impl StreamUuid {
    /// The zero uuid used when no history has been observed yet.
    pub const ZERO: StreamUuid = StreamUuid(0);

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for StreamUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// One `(uuid, seqno)` pair in a failover log.
///
/// `seqno` is the highest sequence number observed under that uuid (for
/// local entries) or the sequence at which the branch began (for entries
/// reported by the server).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailoverEntry {
    pub uuid: StreamUuid,
    pub seqno: u64,
}

impl FailoverEntry {
    pub fn new(uuid: StreamUuid, seqno: u64) -> Self {
        Self { uuid, seqno }
    }
}

/// Ordered failover entries for one partition, newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailoverLog(Vec<FailoverEntry>);

impl FailoverLog {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn from_entries(entries: Vec<FailoverEntry>) -> Self {
        Self(entries)
    }

    /// Entries newest first.
    pub fn entries(&self) -> &[FailoverEntry] {
        &self.0
    }

    pub fn latest(&self) -> Option<FailoverEntry> {
        self.0.first().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Record a newly accepted `(uuid, seqno)` pair.
    ///
    /// An append matching the current head uuid replaces the head (the
    /// branch is the same, only the observed seqno moved); anything else is
    /// prepended as a new branch.
    pub fn push(&mut self, entry: FailoverEntry) {
        match self.0.first_mut() {
            Some(head) if head.uuid == entry.uuid => {
                head.seqno = head.seqno.max(entry.seqno);
            }
            _ => self.0.insert(0, entry),
        }
    }

    /// Drop branches that start above `seqno`.
    ///
    /// Used after a rollback so the local log matches the accepted history.
    pub fn truncate_to(&mut self, seqno: u64) {
        self.0.retain(|e| e.seqno <= seqno);
    }

    /// Find the rollback point against a server-reported log.
    ///
    /// Chooses the greatest local entry whose uuid appears in the server
    /// history, clamped to that branch's upper bound on the server side
    /// (the start seqno of the next-newer server branch). `None` means no
    /// common ancestor exists and the partition must restart from zero.
    pub fn rollback_point(&self, server: &FailoverLog) -> Option<FailoverEntry> {
        let mut best: Option<FailoverEntry> = None;
        for local in &self.0 {
            if let Some(bound) = server.branch_bound(local.uuid) {
                let candidate = FailoverEntry::new(local.uuid, local.seqno.min(bound));
                if best.is_none_or(|b| candidate.seqno > b.seqno) {
                    best = Some(candidate);
                }
            }
        }
        best
    }

    /// Upper seqno bound of the branch identified by `uuid` in this log.
    ///
    /// For the newest branch the bound is open (`u64::MAX`); for older
    /// branches it is the start seqno of the next-newer branch.
    fn branch_bound(&self, uuid: StreamUuid) -> Option<u64> {
        let idx = self.0.iter().position(|e| e.uuid == uuid)?;
        if idx == 0 {
            Some(u64::MAX)
        } else {
            Some(self.0[idx - 1].seqno)
        }
    }
}

#[cfg(test)]
#[path = "failover_tests.rs"]
mod tests;
