// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Immutable configuration snapshot (§3 "Configuration snapshot", §4.9
//! "Reload"). Replaced atomically on reload; readers capture a reference at
//! operation start rather than re-reading shared mutable state mid-operation.

use std::path::PathBuf;
use std::time::Duration;

/// Resource limits enforced by the control server and writer registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    pub max_connections: usize,
    pub max_writers: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self { max_connections: 64, max_writers: 512 }
    }
}

/// A point-in-time snapshot of daemon configuration, cheap to clone and safe
/// to hold across an entire operation even if a reload races it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Directory PXE/UEFI firmware reads its config files from.
    pub pxe_directory: PathBuf,
    /// Template used when a product has no `pxe_config_template` override.
    pub default_template_path: PathBuf,
    /// Local stream socket path for the control server.
    pub socket_path: PathBuf,
    /// This host's depot id, used to resolve `ProductOnDepot` records.
    pub local_depot_id: String,
    pub limits: Limits,
    /// Unix group that owns PXE output files and the control socket.
    pub admin_group_id: u32,
    pub log_path: PathBuf,
    pub pid_path: PathBuf,
    /// Base URL of the authoritative configuration service.
    pub service_url: String,
    pub ca_cert_path: Option<PathBuf>,
    /// Bound on a writer's read-detection poll loop (§4.3, "≈ 3 s").
    pub watch_poll_interval: Duration,
    /// UEFI x86 template, used as an elilo-hint fallback when a product sets
    /// no explicit template (§4.5.1 supplement).
    pub uefi_template_x86: Option<PathBuf>,
    /// UEFI x64 template, same role as [`Self::uefi_template_x86`].
    pub uefi_template_x64: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a TOML file, applying defaults for anything
    /// the file omits.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml::from_str(text).map_err(ConfigError::Parse)?;
        raw.into_config()
    }
}

#[derive(Debug, serde::Deserialize)]
struct RawConfig {
    pxe_directory: PathBuf,
    #[serde(default = "default_template_path")]
    default_template_path: PathBuf,
    #[serde(default = "default_socket_path")]
    socket_path: PathBuf,
    local_depot_id: String,
    #[serde(default)]
    max_connections: Option<usize>,
    #[serde(default)]
    max_writers: Option<usize>,
    admin_group_id: u32,
    #[serde(default = "default_log_path")]
    log_path: PathBuf,
    #[serde(default = "default_pid_path")]
    pid_path: PathBuf,
    service_url: String,
    #[serde(default)]
    ca_cert_path: Option<PathBuf>,
    #[serde(default = "default_watch_poll_ms")]
    watch_poll_interval_ms: u64,
    #[serde(default)]
    uefi_template_x86: Option<PathBuf>,
    #[serde(default)]
    uefi_template_x64: Option<PathBuf>,
}

fn default_template_path() -> PathBuf {
    PathBuf::from("/etc/opsi/pxeboot/pxeinstall.template")
}

fn default_socket_path() -> PathBuf {
    PathBuf::from("/var/run/opsipxeconfd/opsipxeconfd.socket")
}

fn default_log_path() -> PathBuf {
    PathBuf::from("/var/log/opsi/opsipxeconfd.log")
}

fn default_pid_path() -> PathBuf {
    PathBuf::from("/var/run/opsipxeconfd/opsipxeconfd.pid")
}

fn default_watch_poll_ms() -> u64 {
    3_000
}

impl RawConfig {
    fn into_config(self) -> Result<Config, ConfigError> {
        if self.local_depot_id.trim().is_empty() {
            return Err(ConfigError::MissingField("local_depot_id"));
        }
        if self.service_url.trim().is_empty() {
            return Err(ConfigError::MissingField("service_url"));
        }
        let defaults = Limits::default();
        Ok(Config {
            pxe_directory: self.pxe_directory,
            default_template_path: self.default_template_path,
            socket_path: self.socket_path,
            local_depot_id: self.local_depot_id,
            limits: Limits {
                max_connections: self.max_connections.unwrap_or(defaults.max_connections),
                max_writers: self.max_writers.unwrap_or(defaults.max_writers),
            },
            admin_group_id: self.admin_group_id,
            log_path: self.log_path,
            pid_path: self.pid_path,
            service_url: self.service_url,
            ca_cert_path: self.ca_cert_path,
            watch_poll_interval: Duration::from_millis(self.watch_poll_interval_ms),
            uefi_template_x86: self.uefi_template_x86,
            uefi_template_x64: self.uefi_template_x64,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid configuration file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("missing required field: {0}")]
    MissingField(&'static str),
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
