// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use parking_lot::RwLock;
use pxecfg_adapters::FakeServiceClient;
use pxecfg_core::test_support::{config_fixture, host_fixture, product_on_client_fixture};
use pxecfg_core::{ActionRequest, Host, LicenseFlags, Product, ProductOnDepot};
use pxecfg_storage::{ConnectionRegistry, WriterRegistry};
use tempfile::tempdir;
use tokio_util::sync::CancellationToken;

use super::*;

const TEMPLATE_TEXT: &str = "DEFAULT pxelinux\nLABEL pxelinux\n  append initrd=initrd.img\n";

fn fixture_ctx(root: &std::path::Path) -> (Arc<FakeServiceClient>, Arc<ListenCtx>) {
    let service = Arc::new(FakeServiceClient::new());
    let mut config = config_fixture(root);
    std::fs::create_dir_all(&config.pxe_directory).unwrap();
    std::fs::write(&config.default_template_path, TEMPLATE_TEXT).unwrap();

    let ctx = Arc::new(ListenCtx {
        config: Arc::new(config),
        service: service.clone(),
        writers: Arc::new(WriterRegistry::<PxeWriter>::new()),
        connections: Arc::new(ConnectionRegistry::new()),
        license: Arc::new(RwLock::new(LicenseFlags::default())),
        shutdown: CancellationToken::new(),
    });
    (service, ctx)
}

fn seed_netboot(service: &FakeServiceClient, host: &Host, product_id: &str) {
    service.seed_host(host.clone());
    service.seed_netboot_action(product_on_client_fixture(host.id.as_str(), product_id, ActionRequest::Setup));
    service.seed_product_on_depot(ProductOnDepot {
        product_id: product_id.to_string(),
        depot_id: "depot.lab.example".to_string(),
        product_version: "1.0".to_string(),
        package_version: "1".to_string(),
    });
    service.seed_product(Product {
        id: product_id.to_string(),
        product_version: "1.0".to_string(),
        package_version: "1".to_string(),
        pxe_config_template: None,
    });
}

#[tokio::test]
async fn unknown_command_replies_with_the_error_prefix() {
    let dir = tempdir().unwrap();
    let (_service, ctx) = fixture_ctx(dir.path());

    let reply = dispatch("frobnicate", &ctx).await;
    assert!(reply.is_error());
    assert!(format!("{reply}").starts_with("(ERROR)"));
}

#[tokio::test]
async fn stop_command_cancels_the_shutdown_token_and_replies_ok() {
    let dir = tempdir().unwrap();
    let (_service, ctx) = fixture_ctx(dir.path());

    let reply = dispatch("stop", &ctx).await;
    assert!(!reply.is_error());
    assert!(ctx.shutdown.is_cancelled());
}

#[tokio::test]
async fn status_command_replies_with_rendered_status_text() {
    let dir = tempdir().unwrap();
    let (_service, ctx) = fixture_ctx(dir.path());

    let reply = dispatch("status", &ctx).await;
    let Reply::Ok(text) = reply else { panic!("expected an Ok reply") };
    assert!(text.starts_with("opsipxeconfd status:\n"));
}

#[tokio::test]
async fn update_command_drives_the_pipeline_and_replies_ok() {
    let dir = tempdir().unwrap();
    let (service, ctx) = fixture_ctx(dir.path());
    let host = host_fixture("pc40.lab.example");
    seed_netboot(&service, &host, "win10");

    let reply = dispatch(&format!("update {}", host.id), &ctx).await;
    assert_eq!(reply, Reply::ok("Boot configuration updated"));
    assert_eq!(ctx.writers.len(), 1);

    ctx.writers.remove(&host.id).await;
}

#[tokio::test]
async fn update_command_with_an_invalid_host_id_replies_with_an_error() {
    let dir = tempdir().unwrap();
    let (_service, ctx) = fixture_ctx(dir.path());

    let reply = dispatch("update NOT_A_VALID_FQDN!!", &ctx).await;
    assert!(reply.is_error());
}

#[tokio::test]
async fn remove_command_tears_down_any_writer_for_the_host_and_replies_ok() {
    let dir = tempdir().unwrap();
    let (service, ctx) = fixture_ctx(dir.path());
    let host = host_fixture("pc41.lab.example");
    seed_netboot(&service, &host, "win10");

    dispatch(&format!("update {}", host.id), &ctx).await;
    assert_eq!(ctx.writers.len(), 1);

    let reply = dispatch(&format!("remove {}", host.id), &ctx).await;
    assert_eq!(reply, Reply::ok("Boot configuration removed"));
    assert_eq!(ctx.writers.len(), 0);
}

#[tokio::test]
async fn bind_creates_the_socket_with_group_readable_writable_permissions() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().unwrap();
    let (_service, ctx) = fixture_ctx(dir.path());

    let listener = Listener::bind(ctx.clone()).unwrap();
    let metadata = std::fs::metadata(&ctx.config.socket_path).unwrap();
    assert_eq!(metadata.permissions().mode() & 0o777, 0o660);
    drop(listener);
}

#[tokio::test]
async fn bind_unlinks_a_stale_socket_file_left_over_from_a_prior_run() {
    let dir = tempdir().unwrap();
    let (_service, ctx) = fixture_ctx(dir.path());
    std::fs::write(&ctx.config.socket_path, b"not a socket").unwrap();

    let listener = Listener::bind(ctx.clone()).unwrap();
    drop(listener);
}

#[tokio::test]
async fn handle_connection_rejects_once_max_connections_is_reached() {
    let dir = tempdir().unwrap();
    let (_service, mut ctx) = fixture_ctx(dir.path());
    Arc::get_mut(&mut ctx).unwrap().config = Arc::new({
        let mut config = config_fixture(dir.path());
        std::fs::create_dir_all(&config.pxe_directory).unwrap();
        std::fs::write(&config.default_template_path, TEMPLATE_TEXT).unwrap();
        config.limits.max_connections = 0;
        config
    });

    let (mut client, server) = tokio::net::UnixStream::pair().unwrap();
    handle_connection(server, ctx.clone()).await;

    assert_eq!(ctx.connections.count(), 0, "a rejected connection must never be registered");

    let mut reply = Vec::new();
    use tokio::io::AsyncReadExt;
    client.read_to_end(&mut reply).await.unwrap();
    assert!(String::from_utf8_lossy(&reply).starts_with("(ERROR)"));
}

#[tokio::test]
async fn run_stops_accepting_once_the_shutdown_token_is_cancelled() {
    let dir = tempdir().unwrap();
    let (_service, ctx) = fixture_ctx(dir.path());

    let listener = Listener::bind(ctx.clone()).unwrap();
    ctx.shutdown.cancel();

    tokio::time::timeout(std::time::Duration::from_secs(1), listener.run())
        .await
        .expect("accept loop should exit promptly once shutdown is cancelled");
}
