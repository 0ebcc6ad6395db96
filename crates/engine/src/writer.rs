// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! PXE writer worker (§4.3): owns the lifetime of one client's boot
//! configuration files on disk, from creation through the moment the boot
//! loader reads them, to their removal.
//!
//! State machine: `Active` (files on disk, waiting for a read) ->
//! `Firing` (a read was observed, completion callback runs) -> `Cleanup`
//! (every file unlinked) -> `Done`. A `stop()` request or a file-creation
//! error skips straight from `Active` to `Cleanup`, bypassing `Firing` so
//! the completion callback never runs for work that was abandoned rather
//! than delivered.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use notify::event::{AccessKind, AccessMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tracing::warn;

use pxecfg_core::{AppendMap, HostId, LicenseFlags};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    Active,
    Firing,
    Cleanup,
    Done,
}

#[derive(Debug, thiserror::Error)]
pub enum WriterError {
    #[error("failed to write boot configuration file {path}: {source}")]
    Create { path: PathBuf, source: std::io::Error },
    #[error("failed to set ownership of boot configuration file {path}: {source}")]
    Chown { path: PathBuf, source: nix::Error },
}

/// Invoked once, from the writer's own task, when a boot configuration file
/// has been read by the client (§4.6). Owned by the update pipeline, which
/// re-fetches and updates the corresponding `ProductOnClient`.
#[async_trait]
pub trait CompletionCallback: Send + Sync {
    async fn on_written(&self, host_id: &HostId, product_id: &str);
}

pub struct PxeWriterParams {
    pub host_id: HostId,
    pub product_id: String,
    pub pxe_files: Vec<PathBuf>,
    pub content: String,
    pub append: AppendMap,
    pub flags: LicenseFlags,
    pub admin_group_id: u32,
    pub watch_poll_interval: std::time::Duration,
}

/// One client's in-flight boot configuration (§3 `PxeWriter`).
pub struct PxeWriter {
    host_id: HostId,
    product_id: String,
    pxe_files: Vec<PathBuf>,
    content: String,
    append: AppendMap,
    flags: LicenseFlags,
    started_at: SystemTime,
    admin_group_id: u32,
    watch_poll_interval: std::time::Duration,
    state: Mutex<WriterState>,
    stop_requested: AtomicBool,
    done_tx: watch::Sender<bool>,
    done_rx: watch::Receiver<bool>,
}

impl PxeWriter {
    fn new(params: PxeWriterParams) -> Self {
        let (done_tx, done_rx) = watch::channel(false);
        Self {
            host_id: params.host_id,
            product_id: params.product_id,
            pxe_files: params.pxe_files,
            content: params.content,
            append: params.append,
            flags: params.flags,
            started_at: SystemTime::now(),
            admin_group_id: params.admin_group_id,
            watch_poll_interval: params.watch_poll_interval,
            state: Mutex::new(WriterState::Active),
            stop_requested: AtomicBool::new(false),
            done_tx,
            done_rx,
        }
    }

    pub fn host_id(&self) -> &HostId {
        &self.host_id
    }

    pub fn product_id(&self) -> &str {
        &self.product_id
    }

    pub fn pxe_files(&self) -> &[PathBuf] {
        &self.pxe_files
    }

    pub fn append(&self) -> &AppendMap {
        &self.append
    }

    pub fn flags(&self) -> LicenseFlags {
        self.flags
    }

    pub fn started_at(&self) -> SystemTime {
        self.started_at
    }

    pub fn state(&self) -> WriterState {
        *self.state.lock()
    }

    fn create_files(&self) -> Result<(), WriterError> {
        for path in &self.pxe_files {
            std::fs::write(path, &self.content)
                .map_err(|source| WriterError::Create { path: path.clone(), source })?;
            set_file_mode(path, 0o644)
                .map_err(|source| WriterError::Create { path: path.clone(), source })?;
            chown_group(path, self.admin_group_id)
                .map_err(|source| WriterError::Chown { path: path.clone(), source })?;
        }
        Ok(())
    }

    fn cleanup_files(&self) {
        for path in &self.pxe_files {
            if path.exists() {
                if let Err(err) = std::fs::remove_file(path) {
                    warn!(path = %path.display(), error = %err, "failed to remove boot configuration file");
                }
            }
        }
    }

    async fn run(self: Arc<Self>, completion: Arc<dyn CompletionCallback>) {
        if let Err(err) = self.create_files() {
            warn!(host_id = %self.host_id, error = %err, "failed to materialize boot configuration");
            self.cleanup_files();
            self.finish();
            return;
        }

        let (tx, mut rx) = mpsc::channel::<PathBuf>(self.pxe_files.len().max(1));
        let watcher = match spawn_watcher(&self.pxe_files, tx) {
            Ok(watcher) => Some(watcher),
            Err(err) => {
                warn!(host_id = %self.host_id, error = %err, "failed to watch boot configuration files");
                None
            }
        };

        let fired = if watcher.is_some() {
            loop {
                if self.stop_requested.load(Ordering::SeqCst) {
                    break false;
                }
                match tokio::time::timeout(self.watch_poll_interval, rx.recv()).await {
                    Ok(Some(_path)) => break true,
                    Ok(None) => break false,
                    Err(_elapsed) => continue,
                }
            }
        } else {
            false
        };
        drop(watcher);

        if fired {
            *self.state.lock() = WriterState::Firing;
            completion.on_written(&self.host_id, &self.product_id).await;
        }

        *self.state.lock() = WriterState::Cleanup;
        self.cleanup_files();
        self.finish();
    }

    fn finish(&self) {
        *self.state.lock() = WriterState::Done;
        let _ = self.done_tx.send(true);
    }
}

/// Spawn a writer's background task and return a handle to it. The task
/// runs until it reaches `Done`, via `stop()`, a file read, or a watch
/// failure.
pub fn spawn(params: PxeWriterParams, completion: Arc<dyn CompletionCallback>) -> Arc<PxeWriter> {
    let writer = Arc::new(PxeWriter::new(params));
    let task_writer = writer.clone();
    tokio::spawn(async move {
        task_writer.run(completion).await;
    });
    writer
}

#[async_trait]
impl pxecfg_storage::WriterHandle for PxeWriter {
    fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
    }

    async fn join(&self) {
        let mut rx = self.done_rx.clone();
        while !*rx.borrow() {
            if rx.changed().await.is_err() {
                break;
            }
        }
    }
}

fn spawn_watcher(paths: &[PathBuf], tx: mpsc::Sender<PathBuf>) -> notify::Result<RecommendedWatcher> {
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
        let Ok(event) = res else { return };
        if !matches!(event.kind, EventKind::Access(AccessKind::Close(AccessMode::Read))) {
            return;
        }
        for path in event.paths {
            let _ = tx.blocking_send(path);
        }
    })?;
    for path in paths {
        watcher.watch(path, RecursiveMode::NonRecursive)?;
    }
    Ok(watcher)
}

#[cfg(unix)]
fn set_file_mode(path: &Path, mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = std::fs::metadata(path)?.permissions();
    perms.set_mode(mode);
    std::fs::set_permissions(path, perms)
}

#[cfg(unix)]
fn chown_group(path: &Path, group_id: u32) -> Result<(), nix::Error> {
    nix::unistd::chown(path, None, Some(nix::unistd::Gid::from_raw(group_id)))
}

#[cfg(test)]
#[path = "writer_tests.rs"]
mod tests;
