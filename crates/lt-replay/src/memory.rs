//! # In-Memory Replay Store
//!
//! Single-process backend. The check and the write of [`ReplayStore::consume`]
//! happen under one [`parking_lot::Mutex`] guard, which is the whole
//! atomicity argument. Expired records are swept lazily every
//! [`PURGE_INTERVAL`] operations so the map stays bounded by live tokens.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use lt_core::Timestamp;
use parking_lot::Mutex;

use crate::error::ReplayStoreError;
use crate::store::ReplayStore;
use crate::token::{ConsumeOutcome, ReplayKey};

/// Operations between two opportunistic sweeps of expired records.
pub const PURGE_INTERVAL: u64 = 1024;

/// Replay store backed by a mutex-guarded `HashMap`.
#[derive(Debug, Default)]
pub struct MemoryReplayStore {
    entries: Mutex<HashMap<ReplayKey, Timestamp>>,
    ops: AtomicU64,
}

impl MemoryReplayStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently held, expired or not.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    fn sweep(map: &mut HashMap<ReplayKey, Timestamp>, now: Timestamp) -> u64 {
        let before = map.len();
        map.retain(|_, expires_at| *expires_at > now);
        (before - map.len()) as u64
    }

    fn tick(&self) -> bool {
        self.ops.fetch_add(1, Ordering::Relaxed) % PURGE_INTERVAL == PURGE_INTERVAL - 1
    }
}

#[async_trait]
impl ReplayStore for MemoryReplayStore {
    async fn consume(
        &self,
        key: &ReplayKey,
        expires_at: Timestamp,
        now: Timestamp,
    ) -> Result<ConsumeOutcome, ReplayStoreError> {
        let sweep = self.tick();
        let mut map = self.entries.lock();
        if sweep {
            Self::sweep(&mut map, now);
        }
        match map.get(key) {
            Some(existing) if *existing > now => Ok(ConsumeOutcome::Rejected {
                expires_at: Some(*existing),
            }),
            _ => {
                map.insert(key.clone(), expires_at);
                Ok(ConsumeOutcome::Accepted { expires_at })
            }
        }
    }

    async fn get(
        &self,
        key: &ReplayKey,
        now: Timestamp,
    ) -> Result<Option<Timestamp>, ReplayStoreError> {
        Ok(self
            .entries
            .lock()
            .get(key)
            .copied()
            .filter(|expires_at| *expires_at > now))
    }

    async fn put(&self, key: &ReplayKey, expires_at: Timestamp) -> Result<(), ReplayStoreError> {
        self.entries.lock().insert(key.clone(), expires_at);
        Ok(())
    }

    async fn release(
        &self,
        key: &ReplayKey,
        expires_at: Timestamp,
    ) -> Result<bool, ReplayStoreError> {
        let mut map = self.entries.lock();
        if map.get(key) == Some(&expires_at) {
            map.remove(key);
            return Ok(true);
        }
        Ok(false)
    }

    async fn purge_expired(&self, now: Timestamp) -> Result<u64, ReplayStoreError> {
        Ok(Self::sweep(&mut self.entries.lock(), now))
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
