// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fixtures shared by the workspace-level end-to-end specs: a hand-rolled
//! JSON-RPC stub standing in for the authoritative configuration service,
//! and a harness that spawns the real `pxeconfd` binary against it.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use assert_cmd::Command;
use serde_json::{json, Value};

/// A minimal JSON-RPC-over-HTTP stub matching the subset of the
/// authoritative configuration service's surface this daemon calls (the
/// method/parameter contract lives in `pxecfg_adapters::HttpServiceClient`).
pub struct MockService {
    addr: std::net::SocketAddr,
    state: Arc<Mutex<State>>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

#[derive(Default)]
struct State {
    hosts: std::collections::HashMap<String, Value>,
    product_on_clients: Vec<Value>,
    products_on_depot: Vec<Value>,
    products: Vec<Value>,
    updated_product_on_clients: Vec<Value>,
}

impl MockService {
    /// Bind an ephemeral local port and start serving in a background
    /// thread. Every fixture starts empty; seed what a given scenario needs.
    pub fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind mock service listener");
        listener.set_nonblocking(true).expect("set listener nonblocking");
        let addr = listener.local_addr().expect("mock service local addr");

        let state = Arc::new(Mutex::new(State::default()));
        let stop = Arc::new(AtomicBool::new(false));
        let thread_state = state.clone();
        let thread_stop = stop.clone();

        let handle = std::thread::spawn(move || {
            while !thread_stop.load(Ordering::Relaxed) {
                match listener.accept() {
                    Ok((stream, _)) => handle_connection(stream, &thread_state),
                    Err(ref err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                        std::thread::sleep(Duration::from_millis(10));
                    }
                    Err(_) => break,
                }
            }
        });

        Self { addr, state, stop, handle: Some(handle) }
    }

    /// The `service_url` this daemon should be pointed at.
    pub fn service_url_with_rpc(&self) -> String {
        format!("http://{}/rpc", self.addr)
    }

    /// Seed a host with a MAC address only, one pending `setup` action for
    /// `product_id`, and a matching product-on-depot/product pair with no
    /// explicit template — the common "fresh update" fixture set.
    pub fn seed_default_fixtures(&self, host_fqdn: &str, product_id: &str) {
        self.seed_host_fixtures(host_fqdn, product_id, None, Some("aa:bb:cc:dd:ee:ff"));
    }

    /// Seed a host with both a system UUID and a MAC address (§8 scenario 2
    /// "UUID + MAC"), plus the same pending `setup` action / product fixtures
    /// as [`Self::seed_default_fixtures`].
    pub fn seed_host_fixtures(
        &self,
        host_fqdn: &str,
        product_id: &str,
        system_uuid: Option<&str>,
        hardware_address: Option<&str>,
    ) {
        let mut state = self.state.lock().expect("mock service state lock");
        state.hosts.insert(
            host_fqdn.to_string(),
            json!({
                "id": host_fqdn,
                "system_uuid": system_uuid,
                "hardware_address": hardware_address,
                "ip_address": null,
                "opsi_host_key": "deadbeefcafebabe0011223344556677",
            }),
        );
        state.product_on_clients.push(json!({
            "client_id": host_fqdn,
            "product_id": product_id,
            "product_version": "1.0",
            "package_version": "1",
            "action_request": "setup",
            "action_progress": null,
            "modified_at_ms": 1_700_000_000_000u64,
        }));
        state.products_on_depot.push(json!({
            "product_id": product_id,
            "depot_id": "depot.lab.example",
            "product_version": "1.0",
            "package_version": "1",
        }));
        state.products.push(json!({
            "id": product_id,
            "product_version": "1.0",
            "package_version": "1",
            "pxe_config_template": null,
        }));
    }

    /// Every `ProductOnClient` the daemon has published back via
    /// `productOnClient_updateObjects`, most recent last — used to assert
    /// the completion callback flipped `action_request` (§8 scenario 5).
    pub fn updated_product_on_clients(&self) -> Vec<Value> {
        self.state.lock().expect("mock service state lock").updated_product_on_clients.clone()
    }
}

impl Drop for MockService {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn handle_connection(mut stream: TcpStream, state: &Arc<Mutex<State>>) {
    stream.set_read_timeout(Some(Duration::from_secs(5))).ok();
    let mut reader = BufReader::new(stream.try_clone().expect("clone mock service stream"));

    let mut request_line = String::new();
    if reader.read_line(&mut request_line).unwrap_or(0) == 0 {
        return;
    }

    let mut content_length = 0usize;
    loop {
        let mut header = String::new();
        if reader.read_line(&mut header).unwrap_or(0) == 0 {
            return;
        }
        let header = header.trim_end();
        if header.is_empty() {
            break;
        }
        if let Some(value) = header.to_ascii_lowercase().strip_prefix("content-length:").map(str::trim) {
            content_length = value.parse().unwrap_or(0);
        }
    }

    let mut body = vec![0u8; content_length];
    if reader.read_exact(&mut body).is_err() {
        return;
    }

    let request: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(_) => return,
    };
    let method = request.get("method").and_then(Value::as_str).unwrap_or_default();
    let params = request.get("params").cloned().unwrap_or(Value::Null);

    let response = {
        let mut state = state.lock().expect("mock service state lock");
        dispatch(method, &params, &mut state)
    };

    let body = serde_json::to_vec(&response).expect("encode mock service response");
    let mut reply = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    )
    .into_bytes();
    reply.extend_from_slice(&body);
    let _ = stream.write_all(&reply);
    let _ = stream.flush();
}

fn dispatch(method: &str, params: &Value, state: &mut State) -> Value {
    match method {
        "backend_info" => json!({ "jsonrpc": "2.0", "id": 1, "result": {} }),
        "backend_getLicensingInfo" => json!({ "jsonrpc": "2.0", "id": 1, "result": [] }),
        "host_getObjects" => {
            let filter = params.get(1).cloned().unwrap_or(Value::Null);
            if filter.get("depotId").is_some() {
                // Tests drive updates explicitly; never auto-enumerate the
                // depot so the startup task stays a no-op.
                json!({ "jsonrpc": "2.0", "id": 1, "result": [] })
            } else if let Some(id) = filter.get("id").and_then(Value::as_str) {
                match state.hosts.get(id) {
                    Some(host) => json!({ "jsonrpc": "2.0", "id": 1, "result": [host] }),
                    None => json!({ "jsonrpc": "2.0", "id": 1, "result": [] }),
                }
            } else {
                json!({ "jsonrpc": "2.0", "id": 1, "result": [] })
            }
        }
        "productOnClient_getObjects" => {
            let filter = params.get(1).cloned().unwrap_or(Value::Null);
            let client_ids: Vec<String> = filter
                .get("clientId")
                .and_then(Value::as_array)
                .map(|values| values.iter().filter_map(|v| v.as_str().map(String::from)).collect())
                .unwrap_or_default();
            let matches: Vec<&Value> = state
                .product_on_clients
                .iter()
                .filter(|poc| {
                    poc.get("client_id")
                        .and_then(Value::as_str)
                        .map(|id| client_ids.iter().any(|wanted| wanted == id))
                        .unwrap_or(false)
                })
                .collect();
            json!({ "jsonrpc": "2.0", "id": 1, "result": matches })
        }
        "productOnDepot_getObjects" => {
            let filter = params.get(1).cloned().unwrap_or(Value::Null);
            let product_id = filter.get("productId").and_then(Value::as_str);
            let depot_id = filter.get("depotId").and_then(Value::as_str);
            let matches: Vec<&Value> = state
                .products_on_depot
                .iter()
                .filter(|pod| {
                    pod.get("product_id").and_then(Value::as_str) == product_id
                        && pod.get("depot_id").and_then(Value::as_str) == depot_id
                })
                .collect();
            json!({ "jsonrpc": "2.0", "id": 1, "result": matches })
        }
        "product_getObjects" => {
            let filter = params.get(1).cloned().unwrap_or(Value::Null);
            let id = filter.get("id").and_then(Value::as_str);
            let product_version = filter.get("productVersion").and_then(Value::as_str);
            let package_version = filter.get("packageVersion").and_then(Value::as_str);
            let matches: Vec<&Value> = state
                .products
                .iter()
                .filter(|product| {
                    product.get("id").and_then(Value::as_str) == id
                        && product.get("product_version").and_then(Value::as_str) == product_version
                        && product.get("package_version").and_then(Value::as_str) == package_version
                })
                .collect();
            json!({ "jsonrpc": "2.0", "id": 1, "result": matches })
        }
        "productPropertyState_getValues" => json!({ "jsonrpc": "2.0", "id": 1, "result": {} }),
        "configState_getValues" => json!({ "jsonrpc": "2.0", "id": 1, "result": {} }),
        "productOnClient_updateObjects" => {
            if let Some(poc) = params.get(0).cloned() {
                let client_id = poc.get("client_id").and_then(Value::as_str).map(String::from);
                let product_id = poc.get("product_id").and_then(Value::as_str).map(String::from);
                if let Some(existing) = state.product_on_clients.iter_mut().find(|existing| {
                    existing.get("client_id").and_then(Value::as_str) == client_id.as_deref()
                        && existing.get("product_id").and_then(Value::as_str) == product_id.as_deref()
                }) {
                    *existing = poc.clone();
                }
                state.updated_product_on_clients.push(poc);
            }
            json!({ "jsonrpc": "2.0", "id": 1, "result": null })
        }
        other => json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": { "code": -1, "message": format!("mock service: unhandled method '{other}'") }
        }),
    }
}

/// A spawned `pxeconfd` process talking to a [`MockService`], plus the
/// configuration it was started with.
pub struct TestDaemon {
    _root: tempfile::TempDir,
    pub config_path: PathBuf,
    pub config: pxecfg_core::Config,
    child: Option<std::process::Child>,
}

impl TestDaemon {
    /// Write a fresh configuration pointed at `mock`, spawn `pxeconfd
    /// --foreground` against it, and wait for the control socket to appear.
    pub fn start(mock: &MockService) -> Self {
        let root = tempfile::tempdir().expect("create daemon test root");
        let pxe_directory = root.path().join("pxe");
        let default_template_path = root.path().join("pxeinstall.template");
        let socket_path = root.path().join("opsipxeconfd.socket");
        let log_path = root.path().join("opsipxeconfd.log");
        let pid_path = root.path().join("opsipxeconfd.pid");

        std::fs::create_dir_all(&pxe_directory).expect("create pxe directory");
        std::fs::write(&default_template_path, "DEFAULT pxelinux\n  append initrd=pxelinux.0\n")
            .expect("write default template");

        let config_text = format!(
            "pxe_directory = {pxe_directory:?}\n\
             default_template_path = {default_template_path:?}\n\
             socket_path = {socket_path:?}\n\
             local_depot_id = \"depot.lab.example\"\n\
             admin_group_id = 0\n\
             log_path = {log_path:?}\n\
             pid_path = {pid_path:?}\n\
             service_url = \"{service_url}\"\n\
             watch_poll_interval_ms = 50\n",
            service_url = mock.service_url_with_rpc(),
        );
        let config_path = root.path().join("opsipxeconfd.conf");
        std::fs::write(&config_path, &config_text).expect("write daemon config");
        let config = pxecfg_core::Config::from_toml_str(&config_text).expect("parse daemon config fixture");

        let child = Command::cargo_bin("pxeconfd")
            .expect("locate pxeconfd binary")
            .arg("--config")
            .arg(&config_path)
            .arg("--foreground")
            .spawn()
            .expect("spawn pxeconfd");

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while !socket_path.exists() {
            if std::time::Instant::now() >= deadline {
                panic!("pxeconfd did not bind its control socket in time");
            }
            std::thread::sleep(Duration::from_millis(20));
        }

        Self { _root: root, config_path, config, child: Some(child) }
    }

    /// Ask the daemon to stop over its own control socket and wait for the
    /// process to exit, falling back to killing it if it doesn't.
    pub fn stop(mut self) {
        let _ = Command::cargo_bin("pxeconfdctl")
            .expect("locate pxeconfdctl binary")
            .arg("--config")
            .arg(&self.config_path)
            .arg("stop")
            .output();

        if let Some(mut child) = self.child.take() {
            let deadline = std::time::Instant::now() + Duration::from_secs(5);
            loop {
                match child.try_wait() {
                    Ok(Some(_)) => break,
                    Ok(None) if std::time::Instant::now() < deadline => {
                        std::thread::sleep(Duration::from_millis(20));
                    }
                    _ => {
                        let _ = child.kill();
                        let _ = child.wait();
                        break;
                    }
                }
            }
        }
    }
}

impl Drop for TestDaemon {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}
