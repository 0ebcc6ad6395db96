// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::config::Limits;
use crate::{ActionRequest, Config, Host, HostId, MacAddress, ProductOnClient};

/// A `pc01.lab.example` host with a MAC address and no system UUID, the
/// common fixture for "fresh update with MAC only" style tests.
pub fn host_fixture(fqdn: &str) -> Host {
    Host {
        id: HostId::parse(fqdn).expect("test fixture fqdn must be valid"),
        system_uuid: None,
        hardware_address: Some(MacAddress::new("aa:bb:cc:dd:ee:ff")),
        ip_address: None,
        opsi_host_key: Some("deadbeefcafebabe0011223344556677".to_string()),
    }
}

pub fn product_on_client_fixture(client_id: &str, product_id: &str, action: ActionRequest) -> ProductOnClient {
    ProductOnClient {
        client_id: HostId::parse(client_id).expect("test fixture client_id must be valid"),
        product_id: product_id.to_string(),
        product_version: "1.0".to_string(),
        package_version: "1".to_string(),
        action_request: action,
        action_progress: None,
        modified_at_ms: 1_700_000_000_000,
    }
}

/// A minimal but complete configuration snapshot for tests, rooted under a
/// caller-supplied temp directory.
pub fn config_fixture(root: &std::path::Path) -> Config {
    Config {
        pxe_directory: root.join("pxe"),
        default_template_path: root.join("pxeinstall.template"),
        socket_path: root.join("opsipxeconfd.socket"),
        local_depot_id: "depot.lab.example".to_string(),
        limits: Limits { max_connections: 8, max_writers: 8 },
        admin_group_id: 0,
        log_path: root.join("opsipxeconfd.log"),
        pid_path: root.join("opsipxeconfd.pid"),
        service_url: "https://config.lab.example:4447/rpc".to_string(),
        ca_cert_path: None,
        watch_poll_interval: std::time::Duration::from_millis(50),
        uefi_template_x86: None,
        uefi_template_x64: None,
    }
}
