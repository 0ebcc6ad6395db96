// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed facade over the authoritative configuration service (§4.1).

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use pxecfg_core::{Host, HostId, Product, ProductOnClient, ProductOnDepot};

/// Result of a single service-client call, distinguishing "nothing found"
/// from transport failures so callers can apply the §4.1 error policy.
#[derive(Debug, thiserror::Error)]
pub enum ServiceClientError {
    /// A selector yielded nothing. Treated by the update pipeline as
    /// "nothing to do", never propagated as an error to the caller.
    #[error("not found")]
    NotFound,
    /// A retryable failure (network blip, timeout).
    #[error("transient service error: {0}")]
    Transient(String),
    /// A non-retryable failure (auth, certificate, malformed response).
    /// Terminates the current update.
    #[error("fatal service error: {0}")]
    Fatal(String),
}

pub type ServiceResult<T> = Result<T, ServiceClientError>;

/// Licensing state reported by the configuration service, snapshotted into
/// each writer at construction time (§9 "Licensing flags as
/// construction-time snapshot").
#[derive(Debug, Clone, Default)]
pub struct LicensingInfo {
    pub available_modules: HashSet<String>,
}

/// The set of calls the daemon's core needs from the authoritative
/// configuration service (§4.1). Implementations decide their own transport,
/// retry policy, and serialization.
#[async_trait]
pub trait ServiceClient: Send + Sync {
    /// Establish a connection, retrying transient failures up to an
    /// implementation-defined bound. Fails fatally on auth/certificate
    /// errors without retrying.
    async fn connect(&self) -> ServiceResult<()>;

    async fn disconnect(&self) -> ServiceResult<()>;

    async fn licensing_info(&self) -> ServiceResult<LicensingInfo>;

    async fn client_ids_for_depot(&self, depot_id: &str) -> ServiceResult<Vec<HostId>>;

    /// Pending netboot actions for the given clients, restricted to the
    /// action kinds the pipeline treats as actionable (§4.1).
    async fn netboot_actions(&self, client_ids: &[HostId]) -> ServiceResult<Vec<ProductOnClient>>;

    async fn host(&self, host_id: &HostId) -> ServiceResult<Option<Host>>;

    async fn product_on_depot(
        &self,
        product_id: &str,
        depot_id: &str,
    ) -> ServiceResult<Option<ProductOnDepot>>;

    async fn product(
        &self,
        id: &str,
        product_version: &str,
        package_version: &str,
    ) -> ServiceResult<Option<Product>>;

    /// `property_id -> comma-joined value list` for the given products and
    /// object ids (§3 "Product property state map").
    async fn product_property_values(
        &self,
        product_ids: &[String],
        object_ids: &[HostId],
    ) -> ServiceResult<HashMap<String, String>>;

    /// `object_id -> { config_id -> values }`, keyed consistently by
    /// `object_id` (§9, resolving the source's keying ambiguity).
    async fn config_values(
        &self,
        config_ids: &[String],
        object_ids: &[HostId],
    ) -> ServiceResult<HashMap<HostId, HashMap<String, Vec<String>>>>;

    async fn update_product_on_client(&self, poc: &ProductOnClient) -> ServiceResult<()>;
}

#[cfg(test)]
#[path = "service_client_tests.rs"]
mod tests;
