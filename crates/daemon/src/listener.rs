// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Control server (C6) and connection registry (C7) wiring (§4.7): binds the
//! local stream socket, accepts connections with a short bounded timeout so
//! shutdown is observed promptly, and dispatches one command per connection.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::net::{UnixListener, UnixStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use pxecfg_adapters::ServiceClient;
use pxecfg_core::{Config, LicenseFlags};
use pxecfg_engine::{update_boot_configuration, PxeWriter};
use pxecfg_storage::{ConnectionRegistry, WriterRegistry};
use pxecfg_wire::{read_request, write_response, Command, Reply};

/// Bound on a single `accept()` call, so the loop wakes up often enough to
/// observe a shutdown request (§4.7 "≈ 100 ms").
const ACCEPT_POLL_TIMEOUT: Duration = Duration::from_millis(100);
/// Bound on receiving a connection's command line (§5 "Control-connection
/// receive uses a 2 s timeout") — tighter than `pxecfg_wire::IO_TIMEOUT`,
/// which exists to bound pathological transports in general, not this
/// daemon's expectation of a prompt, short command.
const RECEIVE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, thiserror::Error)]
pub enum ListenError {
    #[error("failed to remove stale control socket {path}: {source}")]
    Unlink { path: PathBuf, source: std::io::Error },
    #[error("failed to bind control socket {path}: {source}")]
    Bind { path: PathBuf, source: std::io::Error },
    #[error("failed to set permissions on {path}: {source}")]
    Permissions { path: PathBuf, source: std::io::Error },
    #[error("failed to set ownership of {path}: {source}")]
    Chown { path: PathBuf, source: nix::Error },
}

/// Shared state every control-socket connection handler needs.
pub struct ListenCtx {
    pub config: Arc<Config>,
    pub service: Arc<dyn ServiceClient>,
    pub writers: Arc<WriterRegistry<PxeWriter>>,
    pub connections: Arc<ConnectionRegistry>,
    pub license: Arc<RwLock<LicenseFlags>>,
    /// Cancelled by a `stop` command or an external shutdown signal; the
    /// accept loop exits and lifecycle shutdown proceeds (§4.9).
    pub shutdown: CancellationToken,
}

impl ListenCtx {
    fn pipeline_ctx(&self) -> pxecfg_engine::PipelineCtx {
        pxecfg_engine::PipelineCtx {
            config: self.config.clone(),
            service: self.service.clone(),
            writers: self.writers.clone(),
            license: self.license.clone(),
        }
    }
}

/// An accepting control socket, wrapping a bound [`UnixListener`].
pub struct Listener {
    inner: UnixListener,
    ctx: Arc<ListenCtx>,
}

impl Listener {
    /// Bind the control socket at `ctx.config.socket_path` (§4.7): unlink any
    /// prior socket file, then `chmod 0660`/`chown` the socket (and, if its
    /// parent directory is named `opsipxeconfd`, the parent too).
    pub fn bind(ctx: Arc<ListenCtx>) -> Result<Self, ListenError> {
        let path = ctx.config.socket_path.clone();
        if path.exists() {
            std::fs::remove_file(&path).map_err(|source| ListenError::Unlink { path: path.clone(), source })?;
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ListenError::Bind { path: path.clone(), source })?;
        }

        let inner = UnixListener::bind(&path).map_err(|source| ListenError::Bind { path: path.clone(), source })?;
        set_socket_permissions(&path, ctx.config.admin_group_id)?;

        if let Some(parent) = path.parent() {
            if parent.file_name().and_then(|name| name.to_str()) == Some("opsipxeconfd") {
                set_socket_permissions(parent, ctx.config.admin_group_id)?;
            }
        }

        info!(path = %path.display(), "control socket bound");
        Ok(Self { inner, ctx })
    }

    /// Accept connections until `ctx.shutdown` is cancelled. Each connection
    /// is handled on its own task so a slow peer never blocks others.
    pub async fn run(self) {
        loop {
            if self.ctx.shutdown.is_cancelled() {
                break;
            }
            match tokio::time::timeout(ACCEPT_POLL_TIMEOUT, self.inner.accept()).await {
                Ok(Ok((stream, _addr))) => {
                    let ctx = self.ctx.clone();
                    tokio::spawn(async move {
                        handle_connection(stream, ctx).await;
                    });
                }
                Ok(Err(err)) => {
                    error!(%err, "control socket accept failed");
                }
                Err(_elapsed) => continue,
            }
        }
        info!("control socket accept loop stopped");
    }
}

fn set_socket_permissions(path: &Path, group_id: u32) -> Result<(), ListenError> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = std::fs::metadata(path)
        .map_err(|source| ListenError::Permissions { path: path.to_path_buf(), source })?
        .permissions();
    perms.set_mode(0o660);
    std::fs::set_permissions(path, perms).map_err(|source| ListenError::Permissions { path: path.to_path_buf(), source })?;
    nix::unistd::chown(path, None, Some(nix::unistd::Gid::from_raw(group_id)))
        .map_err(|source| ListenError::Chown { path: path.to_path_buf(), source })?;
    Ok(())
}

async fn handle_connection(mut stream: UnixStream, ctx: Arc<ListenCtx>) {
    if ctx.connections.count() >= ctx.config.limits.max_connections {
        warn!(limit = ctx.config.limits.max_connections, "rejecting control connection: limit reached");
        let reply = Reply::error("too many control connections");
        if let Err(err) = write_response(&mut stream, &reply).await {
            warn!(%err, "failed to write control socket reply");
        }
        return;
    }

    let conn_id = ctx.connections.register();

    let reply = match tokio::time::timeout(RECEIVE_TIMEOUT, read_request(&mut stream)).await {
        Ok(Ok(line)) => dispatch(&line, &ctx).await,
        Ok(Err(err)) => {
            debug!(%err, "control socket read failed");
            Reply::error(err.to_string())
        }
        Err(_elapsed) => {
            warn!("control connection timed out waiting for a command");
            Reply::error("timed out waiting for a command")
        }
    };

    if let Err(err) = write_response(&mut stream, &reply).await {
        warn!(%err, "failed to write control socket reply");
    }
    ctx.connections.remove(conn_id);
}

/// Parse and run one command line, producing the reply to send back (§4.7:
/// "any exception from the command handler is caught and returned as an
/// `(ERROR)` reply" — here, every fallible path already returns a `Reply`
/// rather than propagating, so there is nothing left to catch).
async fn dispatch(line: &str, ctx: &ListenCtx) -> Reply {
    let command = match Command::parse(line) {
        Ok(command) => command,
        Err(err) => return Reply::error(err.to_string()),
    };

    match command {
        Command::Stop => {
            info!("stop command received");
            ctx.shutdown.cancel();
            Reply::ok("opsipxeconfd is going down")
        }
        Command::Status => {
            debug!("status command received");
            Reply::ok(crate::status::render(ctx))
        }
        Command::Update { host_id, cache_file } => {
            info!(%host_id, "update command received");
            let cache = cache_file.as_deref().and_then(pxecfg_engine::pipeline::load_cache);
            match update_boot_configuration(&ctx.pipeline_ctx(), host_id.clone(), cache).await {
                Ok(message) => Reply::ok(message),
                Err(err) => {
                    warn!(%host_id, %err, "update command failed");
                    Reply::error(err.to_string())
                }
            }
        }
        Command::Remove { host_id } => {
            info!(%host_id, "remove command received");
            ctx.writers.remove(&host_id).await;
            Reply::ok("Boot configuration removed")
        }
    }
}

#[cfg(test)]
#[path = "listener_tests.rs"]
mod tests;
