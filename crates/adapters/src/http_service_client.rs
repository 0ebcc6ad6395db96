// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSON-RPC transport for [`ServiceClient`] (§4.1, §6 "the RPC transport
//! itself" is an external collaborator — this module is the thin client
//! that speaks it).

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use pxecfg_core::{Host, HostId, Product, ProductOnClient, ProductOnDepot};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::service_client::{LicensingInfo, ServiceClient, ServiceClientError, ServiceResult};

/// Number of connect attempts before giving up with a fatal error (§4.1
/// `connect()`, "retries on transient errors up to N=3 attempts").
const CONNECT_ATTEMPTS: u32 = 3;
const CONNECT_RETRY_SPACING: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u32,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    message: String,
    #[serde(default)]
    code: i64,
}

/// Talks JSON-RPC to the authoritative configuration service over HTTPS.
pub struct HttpServiceClient {
    http: Client,
    base_url: String,
}

impl HttpServiceClient {
    pub fn new(base_url: impl Into<String>, ca_cert_path: Option<&PathBuf>) -> Result<Self, ServiceClientError> {
        let mut builder = Client::builder();
        if let Some(path) = ca_cert_path {
            let pem = std::fs::read(path)
                .map_err(|e| ServiceClientError::Fatal(format!("reading CA certificate: {e}")))?;
            let cert = reqwest::Certificate::from_pem(&pem)
                .map_err(|e| ServiceClientError::Fatal(format!("parsing CA certificate: {e}")))?;
            builder = builder.add_root_certificate(cert);
        }
        let http = builder
            .build()
            .map_err(|e| ServiceClientError::Fatal(format!("building HTTP client: {e}")))?;
        Ok(Self { http, base_url: base_url.into() })
    }

    async fn call(&self, method: &str, params: Value) -> ServiceResult<Value> {
        let request = RpcRequest { jsonrpc: "2.0", id: 1, method, params };
        let response = self
            .http
            .post(&self.base_url)
            .json(&request)
            .send()
            .await
            .map_err(classify_transport_error)?;

        if response.status().is_client_error() && response.status().as_u16() == 401 {
            return Err(ServiceClientError::Fatal("authentication rejected".to_string()));
        }

        let body: RpcResponse = response.json().await.map_err(|e| {
            ServiceClientError::Transient(format!("decoding response for {method}: {e}"))
        })?;

        if let Some(error) = body.error {
            return Err(ServiceClientError::Fatal(format!("{method} ({}): {}", error.code, error.message)));
        }

        body.result.ok_or(ServiceClientError::NotFound)
    }

    async fn call_typed<T: for<'de> Deserialize<'de>>(
        &self,
        method: &str,
        params: Value,
    ) -> ServiceResult<T> {
        let value = self.call(method, params).await?;
        serde_json::from_value(value)
            .map_err(|e| ServiceClientError::Fatal(format!("decoding {method} result: {e}")))
    }
}

fn classify_transport_error(err: reqwest::Error) -> ServiceClientError {
    if err.is_connect() || err.is_timeout() {
        ServiceClientError::Transient(err.to_string())
    } else if err.is_builder() || err.to_string().to_lowercase().contains("certificate") {
        ServiceClientError::Fatal(err.to_string())
    } else {
        ServiceClientError::Transient(err.to_string())
    }
}

#[async_trait]
impl ServiceClient for HttpServiceClient {
    async fn connect(&self) -> ServiceResult<()> {
        let mut last_err = None;
        for attempt in 1..=CONNECT_ATTEMPTS {
            match self.call("backend_info", Value::Array(vec![])).await {
                Ok(_) => return Ok(()),
                Err(ServiceClientError::Fatal(msg)) => {
                    return Err(ServiceClientError::Fatal(msg));
                }
                Err(err) => {
                    warn!(attempt, "connect attempt failed: {err}");
                    last_err = Some(err);
                    if attempt < CONNECT_ATTEMPTS {
                        tokio::time::sleep(CONNECT_RETRY_SPACING).await;
                    }
                }
            }
        }
        Err(last_err.unwrap_or(ServiceClientError::Fatal("connect failed".to_string())))
    }

    async fn disconnect(&self) -> ServiceResult<()> {
        Ok(())
    }

    async fn licensing_info(&self) -> ServiceResult<LicensingInfo> {
        let modules: HashSet<String> =
            self.call_typed("backend_getLicensingInfo", Value::Array(vec![])).await?;
        Ok(LicensingInfo { available_modules: modules })
    }

    async fn client_ids_for_depot(&self, depot_id: &str) -> ServiceResult<Vec<HostId>> {
        let ids: Vec<String> = self
            .call_typed(
                "host_getObjects",
                serde_json::json!([["id"], { "type": "OpsiClient", "depotId": depot_id }]),
            )
            .await?;
        ids.into_iter()
            .map(|id| HostId::parse(id).map_err(|e| ServiceClientError::Fatal(e.to_string())))
            .collect()
    }

    async fn netboot_actions(&self, client_ids: &[HostId]) -> ServiceResult<Vec<ProductOnClient>> {
        let ids: Vec<&str> = client_ids.iter().map(HostId::as_str).collect();
        self.call_typed(
            "productOnClient_getObjects",
            serde_json::json!([{}, { "clientId": ids, "actionRequest": ["setup", "uninstall", "update", "always", "once", "custom"] }]),
        )
        .await
    }

    async fn host(&self, host_id: &HostId) -> ServiceResult<Option<Host>> {
        match self
            .call_typed::<Vec<Host>>("host_getObjects", serde_json::json!([{}, { "id": host_id.as_str() }]))
            .await
        {
            Ok(hosts) => Ok(hosts.into_iter().next()),
            Err(ServiceClientError::NotFound) => Ok(None),
            Err(other) => Err(other),
        }
    }

    async fn product_on_depot(
        &self,
        product_id: &str,
        depot_id: &str,
    ) -> ServiceResult<Option<ProductOnDepot>> {
        match self
            .call_typed::<Vec<ProductOnDepot>>(
                "productOnDepot_getObjects",
                serde_json::json!([{}, { "productId": product_id, "depotId": depot_id }]),
            )
            .await
        {
            Ok(items) => Ok(items.into_iter().next()),
            Err(ServiceClientError::NotFound) => Ok(None),
            Err(other) => Err(other),
        }
    }

    async fn product(
        &self,
        id: &str,
        product_version: &str,
        package_version: &str,
    ) -> ServiceResult<Option<Product>> {
        match self
            .call_typed::<Vec<Product>>(
                "product_getObjects",
                serde_json::json!([{}, {
                    "id": id,
                    "productVersion": product_version,
                    "packageVersion": package_version,
                }]),
            )
            .await
        {
            Ok(items) => Ok(items.into_iter().next()),
            Err(ServiceClientError::NotFound) => Ok(None),
            Err(other) => Err(other),
        }
    }

    async fn product_property_values(
        &self,
        product_ids: &[String],
        object_ids: &[HostId],
    ) -> ServiceResult<HashMap<String, String>> {
        let ids: Vec<&str> = object_ids.iter().map(HostId::as_str).collect();
        let raw: HashMap<String, Vec<String>> = self
            .call_typed(
                "productPropertyState_getValues",
                serde_json::json!({ "productIds": product_ids, "objectIds": ids }),
            )
            .await?;
        Ok(raw.into_iter().map(|(k, v)| (k, v.join(","))).collect())
    }

    async fn config_values(
        &self,
        config_ids: &[String],
        object_ids: &[HostId],
    ) -> ServiceResult<HashMap<HostId, HashMap<String, Vec<String>>>> {
        let ids: Vec<&str> = object_ids.iter().map(HostId::as_str).collect();
        let raw: HashMap<String, HashMap<String, Vec<String>>> = self
            .call_typed(
                "configState_getValues",
                serde_json::json!({ "configIds": config_ids, "objectIds": ids }),
            )
            .await?;
        raw.into_iter()
            .map(|(id, values)| {
                HostId::parse(&id).map(|host_id| (host_id, values)).map_err(|e| {
                    ServiceClientError::Fatal(format!("config_values returned invalid object id: {e}"))
                })
            })
            .collect()
    }

    async fn update_product_on_client(&self, poc: &ProductOnClient) -> ServiceResult<()> {
        self.call("productOnClient_updateObjects", serde_json::json!([poc])).await?;
        Ok(())
    }
}

/// Format the service address the way `%service%` substitution expects
/// (§4.5 step 10, "ensure it ends with `/rpc`").
pub fn normalize_service_address(base_url: &str) -> String {
    if base_url.ends_with("/rpc") {
        base_url.to_string()
    } else {
        format!("{}/rpc", base_url.trim_end_matches('/'))
    }
}

#[cfg(test)]
#[path = "http_service_client_tests.rs"]
mod tests;
