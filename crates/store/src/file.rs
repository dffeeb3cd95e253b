// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! File-backed store: one JSON record per partition.
//!
//! Records are replaced atomically (write to a temp file, fsync, rename)
//! so a crash mid-save leaves the previous record intact. Records are a few
//! hundred bytes; writes happen at checkpoint cadence, not per event.

use crate::store::{CheckpointStore, StoreError};
use async_trait::async_trait;
use dcp_core::{Checkpoint, FailoverEntry, FailoverLog, PartitionId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Current record schema version
const RECORD_VERSION: u32 = 1;

/// On-disk layout of one partition record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct PartitionRecord {
    #[serde(rename = "v")]
    version: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    checkpoint: Option<Checkpoint>,
    failover: FailoverLog,
}

/// Store writing `partition-<p>.json` records under a root directory.
#[derive(Clone)]
pub struct FileStore {
    root: PathBuf,
    // Serializes read-modify-write cycles per partition. Writers for one
    // partition never race (single-writer rule), but checkpoint saves and
    // failover appends for the same partition can interleave.
    locks: Arc<Mutex<HashMap<PartitionId, Arc<Mutex<()>>>>>,
}

impl FileStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root, locks: Arc::new(Mutex::new(HashMap::new())) })
    }

    fn record_path(&self, p: PartitionId) -> PathBuf {
        self.root.join(format!("partition-{}.json", p.get()))
    }

    fn partition_lock(&self, p: PartitionId) -> Arc<Mutex<()>> {
        self.locks.lock().entry(p).or_default().clone()
    }

    fn read_record(&self, p: PartitionId) -> Result<PartitionRecord, StoreError> {
        let path = self.record_path(p);
        if !path.exists() {
            return Ok(PartitionRecord { version: RECORD_VERSION, ..Default::default() });
        }
        let data = fs::read(&path)?;
        let record: PartitionRecord = serde_json::from_slice(&data).map_err(|e| {
            StoreError::Corrupt { partition: p, detail: e.to_string() }
        })?;
        if record.version != RECORD_VERSION {
            return Err(StoreError::Corrupt {
                partition: p,
                detail: format!("unsupported record version {}", record.version),
            });
        }
        Ok(record)
    }

    fn write_record(&self, p: PartitionId, record: &PartitionRecord) -> Result<(), StoreError> {
        let path = self.record_path(p);
        let tmp = path.with_extension("json.tmp");
        let data = serde_json::to_vec_pretty(record)?;
        {
            let mut file = File::create(&tmp)?;
            file.write_all(&data)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &path)?;
        sync_dir(&self.root);
        Ok(())
    }

    fn update_record(
        &self,
        p: PartitionId,
        update: impl FnOnce(&mut PartitionRecord),
    ) -> Result<(), StoreError> {
        let lock = self.partition_lock(p);
        let _guard = lock.lock();
        let mut record = self.read_record(p)?;
        update(&mut record);
        self.write_record(p, &record)
    }
}

/// Fsync the directory so the rename itself is durable.
fn sync_dir(dir: &Path) {
    if let Ok(handle) = File::open(dir) {
        let _ = handle.sync_all();
    }
}

#[async_trait]
impl CheckpointStore for FileStore {
    async fn load_checkpoint(&self, p: PartitionId) -> Result<Option<Checkpoint>, StoreError> {
        Ok(self.read_record(p)?.checkpoint)
    }

    async fn save_checkpoint(&self, p: PartitionId, ckpt: Checkpoint) -> Result<(), StoreError> {
        self.update_record(p, |record| match &record.checkpoint {
            Some(prior) if !ckpt.supersedes(prior) => {
                tracing::debug!(partition = %p, last_seqno = ckpt.last_seqno, "stale checkpoint save dropped");
            }
            _ => record.checkpoint = Some(ckpt),
        })
    }

    async fn truncate_checkpoint(
        &self,
        p: PartitionId,
        ckpt: Checkpoint,
    ) -> Result<(), StoreError> {
        self.update_record(p, |record| record.checkpoint = Some(ckpt))
    }

    async fn append_failover(
        &self,
        p: PartitionId,
        entry: FailoverEntry,
    ) -> Result<(), StoreError> {
        self.update_record(p, |record| record.failover.push(entry))
    }

    async fn truncate_failover(&self, p: PartitionId, seqno: u64) -> Result<(), StoreError> {
        self.update_record(p, |record| record.failover.truncate_to(seqno))
    }

    async fn failover_log(&self, p: PartitionId) -> Result<FailoverLog, StoreError> {
        Ok(self.read_record(p)?.failover)
    }
}

#[cfg(test)]
#[path = "file_tests.rs"]
mod tests;
