// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shapes of the authoritative configuration service's objects that this
//! daemon reads and writes (§3 "Data model", §4.1).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::HostId;

/// A client or depot host record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    pub id: HostId,
    pub system_uuid: Option<Uuid>,
    pub hardware_address: Option<MacAddress>,
    pub ip_address: Option<std::net::Ipv4Addr>,
    pub opsi_host_key: Option<String>,
}

/// A MAC-48 address, stored as its canonical colon-separated form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacAddress(String);

impl MacAddress {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The PXE file-name form: colons replaced with dashes.
    pub fn dash_form(&self) -> String {
        self.0.replace(':', "-")
    }
}

/// The subset of action requests this daemon drives boot configuration for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionRequest {
    Setup,
    Uninstall,
    Update,
    Always,
    Once,
    Custom,
    None,
}

impl ActionRequest {
    /// The subset of requests the pipeline treats as "pending" (§4.1
    /// `netboot_actions`, §4.5 step 4).
    pub const PENDING: [ActionRequest; 6] = [
        ActionRequest::Setup,
        ActionRequest::Uninstall,
        ActionRequest::Update,
        ActionRequest::Always,
        ActionRequest::Once,
        ActionRequest::Custom,
    ];

    pub fn is_pending(self) -> bool {
        Self::PENDING.contains(&self)
    }
}

/// The authoritative service's record of a pending netboot action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductOnClient {
    pub client_id: HostId,
    pub product_id: String,
    pub product_version: String,
    pub package_version: String,
    pub action_request: ActionRequest,
    pub action_progress: Option<String>,
    /// Epoch milliseconds; used to pick the most recent record in §4.6 step 2.
    pub modified_at_ms: u64,
}

/// A product's availability on a given depot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductOnDepot {
    pub product_id: String,
    pub depot_id: String,
    pub product_version: String,
    pub package_version: String,
}

/// A netboot product at an exact version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub product_version: String,
    pub package_version: String,
    /// Explicit template path/name, if the product overrides the default.
    pub pxe_config_template: Option<String>,
}

/// Product property values resolved for a given client, comma-joined as §3
/// requires ("Product property state map").
pub type PropertyStateMap = BTreeMap<String, String>;

/// Flags resolved from `licensing_info()` (§4.1) snapshotted at writer
/// construction time (§9 "Licensing flags as construction-time snapshot").
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LicenseFlags {
    pub uefi_enabled: bool,
    pub secure_boot_enabled: bool,
}

impl LicenseFlags {
    pub fn from_modules(modules: &std::collections::HashSet<String>) -> Self {
        Self {
            uefi_enabled: modules.contains("uefi"),
            secure_boot_enabled: modules.contains("secureboot"),
        }
    }
}

#[cfg(test)]
#[path = "model_tests.rs"]
mod tests;
