// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Writer registry (§4.4 "Writer registry and replacement"): tracks the one
//! active writer per host id and implements the replacement protocol —
//! collect the displaced handle under the lock, release the lock, then stop
//! and join it outside the lock so a slow writer never blocks unrelated
//! registry operations.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use pxecfg_core::HostId;
use tracing::warn;

/// Bound on how long `replace`/`remove` wait for a displaced writer to stop
/// and join before giving up and abandoning it (§4.4 "bounded wait").
pub const STOP_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Capability a registered writer handle must provide so the registry can
/// drive its shutdown without depending on the concrete writer type.
#[async_trait]
pub trait WriterHandle: Send + Sync {
    /// Signal the writer to stop; must not block.
    fn request_stop(&self);
    /// Wait for the writer task to actually finish.
    async fn join(&self);
}

/// Tracks the single active writer per host.
pub struct WriterRegistry<H: WriterHandle> {
    writers: Mutex<HashMap<HostId, Arc<H>>>,
}

impl<H: WriterHandle> Default for WriterRegistry<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: WriterHandle> WriterRegistry<H> {
    pub fn new() -> Self {
        Self { writers: Mutex::new(HashMap::new()) }
    }

    /// Register a freshly started writer for a host with no prior writer.
    /// Returns the prior handle, if any, without stopping it — use
    /// [`Self::replace`] when a displaced writer must be torn down.
    pub fn insert(&self, host_id: HostId, handle: Arc<H>) -> Option<Arc<H>> {
        self.writers.lock().insert(host_id, handle)
    }

    pub fn for_host(&self, host_id: &HostId) -> Option<Arc<H>> {
        self.writers.lock().get(host_id).cloned()
    }

    /// Remove `host_id`'s entry without stopping or joining it, for a writer
    /// detaching itself from the registry on its own completion path (§4.6
    /// step 1) where stopping/joining would deadlock against its own task.
    pub fn forget(&self, host_id: &HostId) -> Option<Arc<H>> {
        self.writers.lock().remove(host_id)
    }

    /// Remove and fully tear down any writer for `host_id`.
    pub async fn remove(&self, host_id: &HostId) -> Option<Arc<H>> {
        let removed = self.writers.lock().remove(host_id);
        if let Some(handle) = &removed {
            stop_and_join(handle).await;
        }
        removed
    }

    /// Install `new_handle` as the writer for `host_id`, stopping and
    /// joining any writer it displaces.
    pub async fn replace(&self, host_id: HostId, new_handle: Arc<H>) -> Option<Arc<H>> {
        let displaced = { self.writers.lock().insert(host_id, new_handle) };
        if let Some(handle) = &displaced {
            stop_and_join(handle).await;
        }
        displaced
    }

    pub fn len(&self) -> usize {
        self.writers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.writers.lock().is_empty()
    }

    /// A point-in-time copy of all registered (host id, handle) pairs, used
    /// by the `status` command (§4.7).
    pub fn snapshot(&self) -> Vec<(HostId, Arc<H>)> {
        self.writers.lock().iter().map(|(id, handle)| (id.clone(), handle.clone())).collect()
    }

    /// Stop and join every registered writer, draining the registry. Used by
    /// daemon shutdown (§4.9).
    pub async fn drain(&self) {
        let handles: Vec<Arc<H>> = {
            let mut writers = self.writers.lock();
            writers.drain().map(|(_, handle)| handle).collect()
        };
        for handle in handles {
            stop_and_join(&handle).await;
        }
    }
}

async fn stop_and_join<H: WriterHandle + ?Sized>(handle: &H) {
    handle.request_stop();
    if tokio::time::timeout(STOP_JOIN_TIMEOUT, handle.join()).await.is_err() {
        warn!("writer did not join within {:?}; abandoning", STOP_JOIN_TIMEOUT);
    }
}

#[cfg(test)]
#[path = "writer_registry_tests.rs"]
mod tests;
