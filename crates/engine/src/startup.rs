// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Startup task (§4.8 "Startup reconciliation"): on daemon start, enumerate
//! every client assigned to the local depot, find which of them have a
//! pending netboot action, and drive the update pipeline for each — so a
//! restart picks up any action requests that arrived while the daemon was
//! down, without waiting for the authoritative service to push an `update`
//! command.

use std::collections::HashSet;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use pxecfg_core::HostId;

use crate::pipeline::{update_boot_configuration, PipelineCtx};

/// Enumerate the local depot's clients, fetch their pending netboot actions,
/// and run the update pipeline for each distinct client that has one.
///
/// Per-client failures are logged and do not abort the remaining clients
/// (§4.8 "log and continue"). Checked for cancellation between clients so a
/// shutdown racing startup does not have to wait for the whole depot to
/// drain first.
pub async fn run_startup_task(ctx: Arc<PipelineCtx>, stop: CancellationToken) {
    let client_ids = match ctx.service.client_ids_for_depot(&ctx.config.local_depot_id).await {
        Ok(ids) => ids,
        Err(err) => {
            error!(depot_id = %ctx.config.local_depot_id, %err, "startup: failed to enumerate depot clients");
            return;
        }
    };
    if client_ids.is_empty() {
        info!(depot_id = %ctx.config.local_depot_id, "startup: no clients assigned to local depot");
        return;
    }

    let pending = match ctx.service.netboot_actions(&client_ids).await {
        Ok(pocs) => pocs,
        Err(err) => {
            error!(%err, "startup: failed to fetch pending netboot actions");
            return;
        }
    };

    let mut seen = HashSet::new();
    let mut hosts: Vec<HostId> = Vec::new();
    for poc in pending {
        if !poc.action_request.is_pending() {
            continue;
        }
        if seen.insert(poc.client_id.clone()) {
            hosts.push(poc.client_id);
        }
    }

    info!(count = hosts.len(), "startup: reconciling clients with pending actions");

    for host_id in hosts {
        if stop.is_cancelled() {
            warn!("startup: cancelled before all pending clients were reconciled");
            return;
        }
        match update_boot_configuration(&ctx, host_id.clone(), None).await {
            Ok(_) => {}
            Err(err) => {
                warn!(%host_id, %err, "startup: failed to reconcile client, continuing");
            }
        }
    }
}

#[cfg(test)]
#[path = "startup_tests.rs"]
mod tests;
