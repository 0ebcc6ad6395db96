// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! An in-memory [`ServiceClient`] for engine/daemon tests.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use pxecfg_core::{Host, HostId, Product, ProductOnClient, ProductOnDepot};

use crate::service_client::{LicensingInfo, ServiceClient, ServiceClientError, ServiceResult};

/// Pre-seeded fixtures and call-count bookkeeping for a fake configuration
/// service. Every field is public so tests can shape scenarios directly.
#[derive(Default)]
pub struct FakeServiceClient {
    pub licensing: Mutex<LicensingInfo>,
    pub depot_clients: Mutex<HashMap<String, Vec<HostId>>>,
    pub netboot_actions_by_client: Mutex<HashMap<HostId, Vec<ProductOnClient>>>,
    pub hosts: Mutex<HashMap<HostId, Host>>,
    pub products_on_depot: Mutex<HashMap<(String, String), ProductOnDepot>>,
    pub products: Mutex<HashMap<(String, String, String), Product>>,
    pub property_values: Mutex<HashMap<String, String>>,
    pub config_values: Mutex<HashMap<HostId, HashMap<String, Vec<String>>>>,
    pub published: Mutex<Vec<ProductOnClient>>,
    pub connected: Mutex<bool>,
}

impl FakeServiceClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_host(&self, host: Host) {
        self.hosts.lock().insert(host.id.clone(), host);
    }

    pub fn seed_depot_clients(&self, depot_id: impl Into<String>, clients: Vec<HostId>) {
        self.depot_clients.lock().insert(depot_id.into(), clients);
    }

    pub fn seed_netboot_action(&self, poc: ProductOnClient) {
        self.netboot_actions_by_client.lock().entry(poc.client_id.clone()).or_default().push(poc);
    }

    pub fn seed_product_on_depot(&self, pod: ProductOnDepot) {
        self.products_on_depot.lock().insert((pod.product_id.clone(), pod.depot_id.clone()), pod);
    }

    pub fn seed_product(&self, product: Product) {
        self.products.lock().insert(
            (product.id.clone(), product.product_version.clone(), product.package_version.clone()),
            product,
        );
    }

    pub fn seed_available_module(&self, module: impl Into<String>) {
        self.licensing.lock().available_modules.insert(module.into());
    }

    pub fn published_updates(&self) -> Vec<ProductOnClient> {
        self.published.lock().clone()
    }
}

#[async_trait]
impl ServiceClient for FakeServiceClient {
    async fn connect(&self) -> ServiceResult<()> {
        *self.connected.lock() = true;
        Ok(())
    }

    async fn disconnect(&self) -> ServiceResult<()> {
        *self.connected.lock() = false;
        Ok(())
    }

    async fn licensing_info(&self) -> ServiceResult<LicensingInfo> {
        Ok(self.licensing.lock().clone())
    }

    async fn client_ids_for_depot(&self, depot_id: &str) -> ServiceResult<Vec<HostId>> {
        Ok(self.depot_clients.lock().get(depot_id).cloned().unwrap_or_default())
    }

    async fn netboot_actions(&self, client_ids: &[HostId]) -> ServiceResult<Vec<ProductOnClient>> {
        let by_client = self.netboot_actions_by_client.lock();
        Ok(client_ids.iter().filter_map(|id| by_client.get(id)).flatten().cloned().collect())
    }

    async fn host(&self, host_id: &HostId) -> ServiceResult<Option<Host>> {
        Ok(self.hosts.lock().get(host_id).cloned())
    }

    async fn product_on_depot(
        &self,
        product_id: &str,
        depot_id: &str,
    ) -> ServiceResult<Option<ProductOnDepot>> {
        Ok(self.products_on_depot.lock().get(&(product_id.to_string(), depot_id.to_string())).cloned())
    }

    async fn product(
        &self,
        id: &str,
        product_version: &str,
        package_version: &str,
    ) -> ServiceResult<Option<Product>> {
        Ok(self
            .products
            .lock()
            .get(&(id.to_string(), product_version.to_string(), package_version.to_string()))
            .cloned())
    }

    async fn product_property_values(
        &self,
        _product_ids: &[String],
        _object_ids: &[HostId],
    ) -> ServiceResult<HashMap<String, String>> {
        Ok(self.property_values.lock().clone())
    }

    async fn config_values(
        &self,
        _config_ids: &[String],
        object_ids: &[HostId],
    ) -> ServiceResult<HashMap<HostId, HashMap<String, Vec<String>>>> {
        let config_values = self.config_values.lock();
        Ok(object_ids
            .iter()
            .filter_map(|id| config_values.get(id).map(|v| (id.clone(), v.clone())))
            .collect())
    }

    async fn update_product_on_client(&self, poc: &ProductOnClient) -> ServiceResult<()> {
        self.published.lock().push(poc.clone());
        Ok(())
    }
}

/// A [`ServiceClient`] whose every call fails fatally, for exercising the
/// update pipeline's error paths.
pub struct FailingServiceClient;

#[async_trait]
impl ServiceClient for FailingServiceClient {
    async fn connect(&self) -> ServiceResult<()> {
        Err(ServiceClientError::Fatal("connect refused in test".to_string()))
    }

    async fn disconnect(&self) -> ServiceResult<()> {
        Ok(())
    }

    async fn licensing_info(&self) -> ServiceResult<LicensingInfo> {
        Err(ServiceClientError::Fatal("unreachable".to_string()))
    }

    async fn client_ids_for_depot(&self, _depot_id: &str) -> ServiceResult<Vec<HostId>> {
        Err(ServiceClientError::Fatal("unreachable".to_string()))
    }

    async fn netboot_actions(&self, _client_ids: &[HostId]) -> ServiceResult<Vec<ProductOnClient>> {
        Err(ServiceClientError::Fatal("unreachable".to_string()))
    }

    async fn host(&self, _host_id: &HostId) -> ServiceResult<Option<Host>> {
        Err(ServiceClientError::Fatal("unreachable".to_string()))
    }

    async fn product_on_depot(
        &self,
        _product_id: &str,
        _depot_id: &str,
    ) -> ServiceResult<Option<ProductOnDepot>> {
        Err(ServiceClientError::Fatal("unreachable".to_string()))
    }

    async fn product(
        &self,
        _id: &str,
        _product_version: &str,
        _package_version: &str,
    ) -> ServiceResult<Option<Product>> {
        Err(ServiceClientError::Fatal("unreachable".to_string()))
    }

    async fn product_property_values(
        &self,
        _product_ids: &[String],
        _object_ids: &[HostId],
    ) -> ServiceResult<HashMap<String, String>> {
        Err(ServiceClientError::Fatal("unreachable".to_string()))
    }

    async fn config_values(
        &self,
        _config_ids: &[String],
        _object_ids: &[HostId],
    ) -> ServiceResult<HashMap<HostId, HashMap<String, Vec<String>>>> {
        Err(ServiceClientError::Fatal("unreachable".to_string()))
    }

    async fn update_product_on_client(&self, _poc: &ProductOnClient) -> ServiceResult<()> {
        Err(ServiceClientError::Fatal("unreachable".to_string()))
    }
}

#[cfg(test)]
#[path = "fake_service_client_tests.rs"]
mod tests;
