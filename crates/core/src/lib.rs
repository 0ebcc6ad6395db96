// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code and in the test_support fixtures.
#![cfg_attr(any(test, feature = "test-support"), allow(clippy::panic))]
#![cfg_attr(any(test, feature = "test-support"), allow(clippy::unwrap_used))]
#![cfg_attr(any(test, feature = "test-support"), allow(clippy::expect_used))]

//! pxecfg-core: shared domain types for the PXE/UEFI netboot configuration
//! daemon — host identity, object shapes, the configuration snapshot, and
//! secret redaction.

pub mod append;
pub mod config;
pub mod host_id;
pub mod model;
pub mod redactor;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use append::{AppendMap, KEY_BOOTIMAGE_ROOT_PASSWORD, KEY_PCKEY, KEY_PWH};
pub use config::{Config, ConfigError, Limits};
pub use host_id::{HostId, HostIdError};
pub use model::{
    ActionRequest, Host, LicenseFlags, MacAddress, Product, ProductOnClient, ProductOnDepot,
    PropertyStateMap,
};
pub use redactor::Redactor;
