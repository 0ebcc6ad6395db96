// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Update pipeline (§4.5): given a host id, collects state from the
//! configuration service, renders a template, replaces any prior writer for
//! that host, and starts a new one. Also the writer completion callback
//! (§4.6), which re-fetches and updates remote action state once a boot
//! configuration file has been read.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Deserialize;
use tracing::{info, warn};

use pxecfg_adapters::{hash_boot_image_password, normalize_service_address, PasswordHashError, ServiceClient, ServiceClientError};
use pxecfg_core::append::parse_bootimage_parameter;
use pxecfg_core::{
    ActionRequest, AppendMap, Config, Host, HostId, LicenseFlags, Product, ProductOnClient,
    ProductOnDepot, KEY_BOOTIMAGE_ROOT_PASSWORD, KEY_PCKEY, KEY_PWH,
};
use pxecfg_storage::WriterRegistry;

use crate::render::{render, RenderError};
use crate::writer::{self, CompletionCallback, PxeWriter, PxeWriterParams};

/// Key of the config object carrying extra kernel command-line parameters
/// (§4.5 step 11).
const BOOTIMAGE_APPEND_CONFIG_ID: &str = "opsi-linux-bootimage.append";
/// Key of the config object hinting at elilo x86 vs x64 template selection,
/// consumed only when a product sets no explicit template (§4.5.1 supplement).
const DHCPD_FILENAME_CONFIG_ID: &str = "clientconfig.dhcpd.filename";

const OBSOLETE_TEMPLATE_ALIASES: [&str; 2] = ["install-x64", "install3264"];

/// Everything the update pipeline needs that outlives a single call:
/// configuration, the service client, the writer registry, and the
/// currently-licensed feature set (refreshed by the daemon on reload,
/// snapshotted into each writer at construction — §9).
pub struct PipelineCtx {
    pub config: Arc<Config>,
    pub service: Arc<dyn ServiceClient>,
    pub writers: Arc<WriterRegistry<PxeWriter>>,
    pub license: Arc<RwLock<LicenseFlags>>,
}

impl PipelineCtx {
    fn license_flags(&self) -> LicenseFlags {
        *self.license.read()
    }
}

/// Error produced by a single update-pipeline run. Every "absent" case in
/// §4.5's steps is handled as a no-op success before this type is ever
/// constructed; only genuine failures reach here.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("configuration service error: {0}")]
    Service(#[from] ServiceClientError),
    #[error("rendering boot configuration: {0}")]
    Render(#[from] RenderError),
    #[error("hashing boot-image root password: {0}")]
    Password(#[from] PasswordHashError),
    #[error("reading template {path}: {source}")]
    TemplateIo { path: PathBuf, source: std::io::Error },
    #[error("host '{0}' has neither a system UUID, a MAC address, nor an IP address")]
    NoAddress(HostId),
    #[error(
        "boot configuration file {path} for host '{host_id}' collides with an existing \
         writer for a different host ('{other_host}'); likely address reuse"
    )]
    AddressCollision { path: PathBuf, host_id: HostId, other_host: HostId },
    #[error("writer registry is at its configured limit of {0} active boot configurations")]
    WriterLimitReached(usize),
}

/// A pre-fetched scratch payload a control-socket `update` command may pass
/// alongside the host id, written by the configuration service's own event
/// hooks and consumed (and deleted) by the pipeline as a latency
/// optimization. Absence or a read/parse failure simply falls back to
/// fetching everything over RPC as usual.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CachedUpdate {
    pub host: Option<Host>,
    pub product_on_client: Option<ProductOnClient>,
    pub product_on_depot: Option<ProductOnDepot>,
    pub product: Option<Product>,
    pub property_values: Option<HashMap<String, String>>,
}

/// Load a cache file, deleting it whether or not it parsed so a stale or
/// malformed scratch file never shadows a future update.
pub fn load_cache(path: &Path) -> Option<CachedUpdate> {
    let text = std::fs::read_to_string(path).ok();
    let _ = std::fs::remove_file(path);
    let text = text?;
    match serde_json::from_str(&text) {
        Ok(cache) => Some(cache),
        Err(err) => {
            warn!(path = %path.display(), %err, "ignoring unreadable update cache file");
            None
        }
    }
}

/// Run the update pipeline for `host_id` (§4.5 steps 1–14). `host_id` is
/// assumed already validated by the caller (§3 "Validated on entry to the
/// public surface").
pub async fn update_boot_configuration(
    ctx: &PipelineCtx,
    host_id: HostId,
    cache: Option<CachedUpdate>,
) -> Result<String, PipelineError> {
    const DONE: &str = "Boot configuration updated";

    // Step 2: replace any prior writer for this host before anything else,
    // so stale file names are freed before the collision check below.
    ctx.writers.remove(&host_id).await;

    // Step 3.
    let host = if let Some(host) = cache.as_ref().and_then(|c| c.host.clone()) {
        host
    } else {
        match ctx.service.host(&host_id).await? {
            Some(host) => host,
            None => return Ok(DONE.to_string()),
        }
    };

    // Step 4.
    let poc = match cache.as_ref().and_then(|c| c.product_on_client.clone()) {
        Some(poc) => poc,
        None => {
            let pocs = match ctx.service.netboot_actions(std::slice::from_ref(&host_id)).await {
                Ok(pocs) => pocs,
                Err(ServiceClientError::NotFound) => Vec::new(),
                Err(err) => return Err(err.into()),
            };
            match select_highest_priority(pocs) {
                Some(poc) => poc,
                None => return Ok(DONE.to_string()),
            }
        }
    };

    // Step 5.
    let pod = match cache.as_ref().and_then(|c| c.product_on_depot.clone()) {
        Some(pod) => pod,
        None => match ctx.service.product_on_depot(&poc.product_id, &ctx.config.local_depot_id).await? {
            Some(pod) => pod,
            None => {
                warn!(host_id = %host_id, product_id = %poc.product_id, "no product-on-depot entry for local depot");
                return Ok(DONE.to_string());
            }
        },
    };

    // Step 6.
    let product = match cache.as_ref().and_then(|c| c.product.clone()) {
        Some(product) => product,
        None => match ctx.service.product(&pod.product_id, &pod.product_version, &pod.package_version).await? {
            Some(product) => product,
            None => {
                tracing::error!(
                    host_id = %host_id,
                    product_id = %pod.product_id,
                    product_version = %pod.product_version,
                    package_version = %pod.package_version,
                    "product version referenced by product-on-depot no longer exists"
                );
                return Ok(DONE.to_string());
            }
        },
    };

    // Step 7.
    let dhcpd_filename_hint = if product.pxe_config_template.is_none() {
        fetch_config_value(ctx, &host_id, DHCPD_FILENAME_CONFIG_ID).await?.and_then(|v| v.into_iter().next())
    } else {
        None
    };
    let template_path = select_template_path(&product, &ctx.config, dhcpd_filename_hint.as_deref());
    let template_text = std::fs::read_to_string(&template_path)
        .map_err(|source| PipelineError::TemplateIo { path: template_path.clone(), source })?;

    // Step 8.
    let pxe_files = compute_output_paths(&host, &ctx.config)?;

    // Step 9.
    check_cross_host_collisions(&ctx.writers, &host_id, &pxe_files)?;

    // §3 "Configuration snapshot" `limits.max_writers`: the prior writer for
    // this host was already removed in step 2, so the registry's current
    // size is exactly the count of *other* hosts' writers this one would add
    // to.
    if ctx.writers.len() >= ctx.config.limits.max_writers {
        return Err(PipelineError::WriterLimitReached(ctx.config.limits.max_writers));
    }

    // Step 10.
    let service_address = normalize_service_address(&ctx.config.service_url);

    // Step 11.
    let mut append = AppendMap::new();
    if let Some(key) = &host.opsi_host_key {
        append.insert(KEY_PCKEY, key.clone());
    }
    append.insert("hn", host_id.short_name());
    append.insert("dn", host_id.domain());
    append.insert("product", product.id.clone());
    if let Some(mac) = &host.hardware_address {
        append.insert("macaddress", mac.as_str());
    }
    append.insert("service", service_address);
    if let Some(values) = fetch_config_value(ctx, &host_id, BOOTIMAGE_APPEND_CONFIG_ID).await? {
        for option in values {
            let (key, value) = parse_bootimage_parameter(&option);
            append.insert(key, value);
        }
    }

    // Register pckey with the redactor and strip it before rendering (§9
    // "Secrets"); the renderer itself never sees it.
    if let Some(pckey) = append.remove(KEY_PCKEY) {
        pxecfg_core::redactor::global().register(pckey);
    }
    prepare_password(&mut append)?;

    // Step 12.
    let property_map = ctx.clone_property_values(&cache, &product, &host_id).await?;

    let flags = ctx.license_flags();
    let content = render(&template_text, &property_map, &append, flags)?;

    // Step 13.
    let completion: Arc<dyn CompletionCallback> =
        Arc::new(PipelineCompletion { service: ctx.service.clone(), writers: ctx.writers.clone() });
    let params = PxeWriterParams {
        host_id: host_id.clone(),
        product_id: product.id.clone(),
        pxe_files,
        content,
        append,
        flags,
        admin_group_id: ctx.config.admin_group_id,
        watch_poll_interval: ctx.config.watch_poll_interval,
    };
    let handle = writer::spawn(params, completion);
    ctx.writers.replace(host_id.clone(), handle).await;

    info!(host_id = %host_id, product_id = %product.id, "boot configuration updated");
    Ok(DONE.to_string())
}

impl PipelineCtx {
    async fn clone_property_values(
        &self,
        cache: &Option<CachedUpdate>,
        product: &Product,
        host_id: &HostId,
    ) -> Result<pxecfg_core::PropertyStateMap, PipelineError> {
        if let Some(values) = cache.as_ref().and_then(|c| c.property_values.clone()) {
            return Ok(values.into_iter().collect());
        }
        let values = self
            .service
            .product_property_values(std::slice::from_ref(&product.id), std::slice::from_ref(host_id))
            .await?;
        Ok(values.into_iter().collect())
    }
}

async fn fetch_config_value(
    ctx: &PipelineCtx,
    host_id: &HostId,
    config_id: &str,
) -> Result<Option<Vec<String>>, PipelineError> {
    let config_ids = vec![config_id.to_string()];
    let object_ids = std::slice::from_ref(host_id);
    let values = ctx.service.config_values(&config_ids, object_ids).await?;
    Ok(values.get(host_id).and_then(|m| m.get(config_id)).cloned())
}

/// Rewrite `bootimagerootpassword` into a hashed `pwh`, or escape an
/// already-hashed `pwh` in place, so `$` survives the bootloader's
/// line-oriented variable expansion (§3, §9 "Password handling").
fn prepare_password(append: &mut AppendMap) -> Result<(), PipelineError> {
    if let Some(password) = append.remove(KEY_BOOTIMAGE_ROOT_PASSWORD) {
        let hash = hash_boot_image_password(&password)?;
        append.insert(KEY_PWH, hash);
    } else if let Some(pwh) = append.get(KEY_PWH).map(str::to_string) {
        append.insert(KEY_PWH, pwh.replace('$', "\\$"));
    }
    Ok(())
}

/// Pick the pending action with the highest priority, per the order listed
/// in §4.1's `netboot_actions` (`setup` first, `custom` last).
fn select_highest_priority(pocs: Vec<ProductOnClient>) -> Option<ProductOnClient> {
    pocs.into_iter()
        .filter(|poc| poc.action_request.is_pending())
        .min_by_key(|poc| priority_rank(poc.action_request))
}

fn priority_rank(action: ActionRequest) -> usize {
    ActionRequest::PENDING.iter().position(|a| *a == action).unwrap_or(usize::MAX)
}

/// Template selection (§4.5.1, plus the elilo x86/x64 hint supplement).
fn select_template_path(product: &Product, config: &Config, dhcpd_filename: Option<&str>) -> PathBuf {
    if let Some(template) = &product.pxe_config_template {
        if !OBSOLETE_TEMPLATE_ALIASES.contains(&template.as_str()) {
            let path = PathBuf::from(template);
            return if path.is_absolute() {
                path
            } else {
                config
                    .default_template_path
                    .parent()
                    .map(|dir| dir.join(&path))
                    .unwrap_or(path)
            };
        }
        warn!(alias = %template, "obsolete pxeConfigTemplate alias, falling back to default template");
    }

    if let Some(filename) = dhcpd_filename {
        let lower = filename.to_ascii_lowercase();
        if lower.contains("x64") {
            if let Some(path) = &config.uefi_template_x64 {
                return path.clone();
            }
        } else if lower.contains("x86") || lower.contains("elilo") {
            if let Some(path) = &config.uefi_template_x86 {
                return path.clone();
            }
        }
    }

    config.default_template_path.clone()
}

/// Output file names (§4.5.2, plus the IP-hex fallback supplement).
fn compute_output_paths(host: &Host, config: &Config) -> Result<Vec<PathBuf>, PipelineError> {
    let mut files = Vec::new();
    if let Some(uuid) = host.system_uuid {
        files.push(config.pxe_directory.join(uuid.to_string()));
    }
    if let Some(mac) = &host.hardware_address {
        files.push(config.pxe_directory.join(format!("01-{}", mac.dash_form())));
    }
    if files.is_empty() {
        if let Some(ip) = host.ip_address {
            let octets = ip.octets();
            files.push(
                config
                    .pxe_directory
                    .join(format!("{:02X}{:02X}{:02X}{:02X}", octets[0], octets[1], octets[2], octets[3])),
            );
        }
    }
    if files.is_empty() {
        return Err(PipelineError::NoAddress(host.id.clone()));
    }
    Ok(files)
}

/// Cross-host collision check (§4.5 step 9, §3 "Path disjointness across
/// hosts"). Same-host writers were already stopped and joined in step 2, so
/// any remaining overlap belongs to a different host and is fatal.
fn check_cross_host_collisions(
    writers: &WriterRegistry<PxeWriter>,
    host_id: &HostId,
    pxe_files: &[PathBuf],
) -> Result<(), PipelineError> {
    for (other_id, handle) in writers.snapshot() {
        if &other_id == host_id {
            continue;
        }
        for existing_path in handle.pxe_files() {
            if pxe_files.contains(existing_path) {
                return Err(PipelineError::AddressCollision {
                    path: existing_path.clone(),
                    host_id: host_id.clone(),
                    other_host: other_id,
                });
            }
        }
    }
    Ok(())
}

/// Writer completion callback (§4.6), closing over the writer registry and
/// service client rather than reaching back into the daemon by name (§9
/// "Back-references between writer and daemon").
struct PipelineCompletion {
    service: Arc<dyn ServiceClient>,
    writers: Arc<WriterRegistry<PxeWriter>>,
}

#[async_trait]
impl CompletionCallback for PipelineCompletion {
    async fn on_written(&self, host_id: &HostId, product_id: &str) {
        // Detach without stopping/joining: this callback runs on the
        // writer's own task, and the registry's stop+join path would
        // deadlock against it.
        self.writers.forget(host_id);

        let pocs = match self.service.netboot_actions(std::slice::from_ref(host_id)).await {
            Ok(pocs) => pocs,
            Err(err) => {
                warn!(%host_id, %err, "failed to re-fetch product-on-client after boot read");
                return;
            }
        };

        let Some(mut poc) =
            pocs.into_iter().filter(|p| p.product_id == product_id).max_by_key(|p| p.modified_at_ms)
        else {
            warn!(%host_id, product_id, "no matching product-on-client found after boot read");
            return;
        };

        poc.action_progress = Some("pxe boot configuration read".to_string());
        if poc.action_request != ActionRequest::Always {
            poc.action_request = ActionRequest::None;
        }

        if let Err(err) = self.service.update_product_on_client(&poc).await {
            warn!(%host_id, %err, "failed to publish product-on-client after boot read");
        }
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
