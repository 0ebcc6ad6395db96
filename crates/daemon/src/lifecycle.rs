// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle (C9, §4.9): owns startup/reload/shutdown ordering,
//! socket creation, signal wiring, and drains all workers on stop.
//!
//! Startup order: parse/snapshot config -> init logging -> acquire pid file
//! -> optionally daemonize -> install signal handlers -> connect the
//! configuration service with retry -> start the startup task (C8) -> bind
//! the control socket (C6) -> enter the accept loop. Reload re-reads
//! config, refreshes licensing, and recreates the socket in place. Shutdown
//! stops the startup task, drains every writer, closes the socket,
//! disconnects the service client, and releases the pid file.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use pxecfg_adapters::{HttpServiceClient, ServiceClient, ServiceClientError};
use pxecfg_core::{Config, LicenseFlags};
use pxecfg_engine::{run_startup_task, PipelineCtx, PxeWriter};
use pxecfg_storage::{ConnectionRegistry, WriterRegistry};

use crate::cli_args::{Args, ConfigLoadError};
use crate::listener::{ListenCtx, Listener, ListenError};
use crate::logging;
use crate::pidfile::{PidFile, PidFileError};

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Config(#[from] ConfigLoadError),
    #[error("failed to initialize logging: {0}")]
    Logging(#[source] std::io::Error),
    #[error(transparent)]
    PidFile(#[from] PidFileError),
    #[error("failed to connect to the configuration service: {0}")]
    ServiceConnect(#[source] ServiceClientError),
    #[error(transparent)]
    Listen(#[from] ListenError),
    #[error("failed to install signal handler: {0}")]
    Signal(#[source] std::io::Error),
    #[error("failed to daemonize: {0}")]
    Daemonize(#[from] daemonize::Error),
}

/// Parse CLI args, run the full daemon lifecycle to completion, and return
/// once a clean shutdown has finished. The only caller is `main`.
pub async fn run(args: Args) -> Result<(), LifecycleError> {
    let config = args.load_config()?;
    let mut logging_guard = logging::init(&config.log_path).map_err(LifecycleError::Logging)?;

    let mut pid_file = PidFile::acquire(&config.pid_path)?;

    if !args.foreground {
        // Pid-file acquisition is handled entirely by `PidFile` above, so
        // the builder here is deliberately not given `.pid_file(..)`: that
        // option makes `daemonize` open and flock the same path itself,
        // which would contend with the lock this process already holds.
        daemonize::Daemonize::new().working_directory("/").start()?;
        // The pid recorded pre-fork belongs to the parent; re-stamp it with
        // the child's pid now that the fork has happened (§4.9 "acquire pid
        // file ... optionally daemonize").
        pid_file.rewrite_pid()?;
        // Logging's non-blocking writer thread does not survive fork; start
        // it fresh in the child.
        drop(logging_guard);
        logging_guard = logging::init(&config.log_path).map_err(LifecycleError::Logging)?;
    }

    let shutdown = CancellationToken::new();
    let mut sighup = install_signal_handlers(shutdown.clone())?;

    let service: Arc<dyn ServiceClient> =
        Arc::new(HttpServiceClient::new(config.service_url.clone(), config.ca_cert_path.as_ref())?);
    service.connect().await.map_err(LifecycleError::ServiceConnect)?;

    let licensing = service.licensing_info().await.unwrap_or_default();
    let license = Arc::new(RwLock::new(LicenseFlags::from_modules(&licensing.available_modules)));

    let config = Arc::new(config);
    let writers: Arc<WriterRegistry<PxeWriter>> = Arc::new(WriterRegistry::new());
    let connections = Arc::new(ConnectionRegistry::new());

    let pipeline_ctx = Arc::new(PipelineCtx {
        config: config.clone(),
        service: service.clone(),
        writers: writers.clone(),
        license: license.clone(),
    });

    let startup_stop = CancellationToken::new();
    let startup_task = tokio::spawn(run_startup_task(pipeline_ctx.clone(), startup_stop.clone()));

    info!("opsipxeconfd ready");
    run_accept_loop(&args, config, service.clone(), writers.clone(), connections, license, shutdown, &mut sighup)
        .await?;

    shutdown_sequence(startup_stop, startup_task, writers, service).await;

    drop(pid_file);
    drop(logging_guard);
    Ok(())
}

/// Bind the control socket and accept connections until `shutdown` fires,
/// rebinding in place on every `SIGHUP` (§4.9 "Reload": "re-read config,
/// replace the snapshot, re-init logging, refresh licensing info from C1,
/// recreate the socket"). The accept loop for one generation runs as its
/// own task so a reload can abort it without racing the real shutdown
/// signal, which instead lets the loop return on its own.
#[allow(clippy::too_many_arguments)]
async fn run_accept_loop(
    args: &Args,
    mut config: Arc<Config>,
    service: Arc<dyn ServiceClient>,
    writers: Arc<WriterRegistry<PxeWriter>>,
    connections: Arc<ConnectionRegistry>,
    license: Arc<RwLock<LicenseFlags>>,
    shutdown: CancellationToken,
    sighup: &mut tokio::signal::unix::Signal,
) -> Result<(), LifecycleError> {
    loop {
        let listen_ctx = Arc::new(ListenCtx {
            config: config.clone(),
            service: service.clone(),
            writers: writers.clone(),
            connections: connections.clone(),
            license: license.clone(),
            shutdown: shutdown.clone(),
        });
        let listener = Listener::bind(listen_ctx)?;
        let mut run_handle = tokio::spawn(listener.run());

        tokio::select! {
            _ = &mut run_handle => return Ok(()),
            _ = sighup.recv() => {
                info!("received SIGHUP, reloading");
                run_handle.abort();
                match reload(args, &service, &license).await {
                    Ok(new_config) => config = new_config,
                    Err(err) => warn!(%err, "reload failed, keeping previous configuration"),
                }
            }
        }
    }
}

/// Re-read the configuration file and refresh licensing flags in place.
///
/// `tracing`'s global subscriber can only be installed once per process, so
/// unlike the other reload steps this does not re-run `logging::init` —
/// there is no swappable layer to point at a new log path. A log path
/// change is picked up on the next full restart instead.
async fn reload(
    args: &Args,
    service: &Arc<dyn ServiceClient>,
    license: &Arc<RwLock<LicenseFlags>>,
) -> Result<Arc<Config>, LifecycleError> {
    let config = args.load_config()?;
    match service.licensing_info().await {
        Ok(info) => *license.write() = LicenseFlags::from_modules(&info.available_modules),
        Err(err) => warn!(%err, "failed to refresh licensing info during reload"),
    }
    Ok(Arc::new(config))
}

/// §4.9 "Shutdown": stop C8, drain every writer, disconnect the service
/// client. The socket is already closed by the time this runs, since
/// `Listener::run` only returns after observing `shutdown`.
async fn shutdown_sequence(
    startup_stop: CancellationToken,
    startup_task: tokio::task::JoinHandle<()>,
    writers: Arc<WriterRegistry<PxeWriter>>,
    service: Arc<dyn ServiceClient>,
) {
    info!("shutting down");
    startup_stop.cancel();
    if tokio::time::timeout(std::time::Duration::from_secs(5), startup_task).await.is_err() {
        warn!("startup task did not stop promptly; abandoning it");
    }

    writers.drain().await;

    if let Err(err) = service.disconnect().await {
        warn!(%err, "error disconnecting from configuration service during shutdown");
    }

    info!("shutdown complete");
}

/// Wire `SIGTERM`/`SIGINT` to cancel `shutdown`, unblocking the accept loop
/// the same way a `stop` control command does (§4.9 "Shutdown (signal or
/// `stop` command)"). Returns the registered `SIGHUP` stream, which the
/// accept loop selects on directly to drive reload (§4.9 "Reload").
fn install_signal_handlers(
    shutdown: CancellationToken,
) -> Result<tokio::signal::unix::Signal, LifecycleError> {
    let mut sigterm = signal(SignalKind::terminate()).map_err(LifecycleError::Signal)?;
    let mut sigint = signal(SignalKind::interrupt()).map_err(LifecycleError::Signal)?;
    let sighup = signal(SignalKind::hangup()).map_err(LifecycleError::Signal)?;

    tokio::spawn(async move {
        tokio::select! {
            _ = sigterm.recv() => info!("received SIGTERM"),
            _ = sigint.recv() => info!("received SIGINT"),
        }
        shutdown.cancel();
    });

    Ok(sighup)
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
