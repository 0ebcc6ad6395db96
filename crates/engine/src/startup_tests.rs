// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use parking_lot::RwLock;
use pxecfg_adapters::FakeServiceClient;
use pxecfg_core::test_support::{config_fixture, host_fixture, product_on_client_fixture};
use pxecfg_core::{ActionRequest, LicenseFlags, Product, ProductOnDepot};
use pxecfg_storage::WriterRegistry;
use tempfile::tempdir;
use tokio_util::sync::CancellationToken;

use super::*;
use crate::writer::PxeWriter;

const TEMPLATE_TEXT: &str = "DEFAULT pxelinux\nLABEL pxelinux\n  append initrd=initrd.img\n";

fn fixture_ctx(root: &std::path::Path) -> (Arc<FakeServiceClient>, Arc<PipelineCtx>) {
    let service = Arc::new(FakeServiceClient::new());
    let mut config = config_fixture(root);
    std::fs::create_dir_all(&config.pxe_directory).unwrap();
    std::fs::write(&config.default_template_path, TEMPLATE_TEXT).unwrap();
    config.local_depot_id = "depot.lab.example".to_string();

    let ctx = Arc::new(PipelineCtx {
        config: Arc::new(config),
        service: service.clone(),
        writers: Arc::new(WriterRegistry::<PxeWriter>::new()),
        license: Arc::new(RwLock::new(LicenseFlags::default())),
    });
    (service, ctx)
}

fn seed_product(service: &FakeServiceClient, product_id: &str) {
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
async fn reconciles_every_pending_client_on_the_local_depot() {
    let dir = tempdir().unwrap();
    let (service, ctx) = fixture_ctx(dir.path());

    let mut host_a = host_fixture("pc20.lab.example");
    let mut host_b = host_fixture("pc21.lab.example");
    host_a.hardware_address = Some(pxecfg_core::MacAddress::new("aa:bb:cc:dd:ee:01"));
    host_b.hardware_address = Some(pxecfg_core::MacAddress::new("aa:bb:cc:dd:ee:02"));
    service.seed_host(host_a.clone());
    service.seed_host(host_b.clone());
    service.seed_depot_clients("depot.lab.example", vec![host_a.id.clone(), host_b.id.clone()]);
    service.seed_netboot_action(product_on_client_fixture(host_a.id.as_str(), "win10", ActionRequest::Setup));
    service.seed_netboot_action(product_on_client_fixture(host_b.id.as_str(), "win10", ActionRequest::Update));
    seed_product(&service, "win10");

    run_startup_task(ctx.clone(), CancellationToken::new()).await;

    assert!(ctx.writers.for_host(&host_a.id).is_some());
    assert!(ctx.writers.for_host(&host_b.id).is_some());

    ctx.writers.drain().await;
}

#[tokio::test]
async fn clients_with_no_pending_action_are_skipped() {
    let dir = tempdir().unwrap();
    let (service, ctx) = fixture_ctx(dir.path());

    let idle = host_fixture("pc22.lab.example");
    service.seed_host(idle.clone());
    service.seed_depot_clients("depot.lab.example", vec![idle.id.clone()]);
    service.seed_netboot_action(product_on_client_fixture(idle.id.as_str(), "win10", ActionRequest::None));
    seed_product(&service, "win10");

    run_startup_task(ctx.clone(), CancellationToken::new()).await;

    assert!(ctx.writers.for_host(&idle.id).is_none());
}

#[tokio::test]
async fn duplicate_pending_actions_for_one_client_only_run_once() {
    let dir = tempdir().unwrap();
    let (service, ctx) = fixture_ctx(dir.path());

    let host = host_fixture("pc23.lab.example");
    service.seed_host(host.clone());
    service.seed_depot_clients("depot.lab.example", vec![host.id.clone()]);
    service.seed_netboot_action(product_on_client_fixture(host.id.as_str(), "win10", ActionRequest::Setup));
    service.seed_netboot_action(product_on_client_fixture(host.id.as_str(), "office", ActionRequest::Update));
    seed_product(&service, "win10");
    seed_product(&service, "office");

    run_startup_task(ctx.clone(), CancellationToken::new()).await;

    assert_eq!(ctx.writers.len(), 1, "only the first pending action per client should start a writer");

    ctx.writers.drain().await;
}

#[tokio::test]
async fn empty_depot_is_a_no_op() {
    let dir = tempdir().unwrap();
    let (service, ctx) = fixture_ctx(dir.path());
    service.seed_depot_clients("depot.lab.example", vec![]);

    run_startup_task(ctx.clone(), CancellationToken::new()).await;

    assert!(ctx.writers.is_empty());
}

#[tokio::test]
async fn cancellation_stops_reconciliation_before_remaining_clients_run() {
    let dir = tempdir().unwrap();
    let (service, ctx) = fixture_ctx(dir.path());

    let host_a = host_fixture("pc24.lab.example");
    let host_b = host_fixture("pc25.lab.example");
    service.seed_host(host_a.clone());
    service.seed_host(host_b.clone());
    service.seed_depot_clients("depot.lab.example", vec![host_a.id.clone(), host_b.id.clone()]);
    service.seed_netboot_action(product_on_client_fixture(host_a.id.as_str(), "win10", ActionRequest::Setup));
    service.seed_netboot_action(product_on_client_fixture(host_b.id.as_str(), "win10", ActionRequest::Setup));
    seed_product(&service, "win10");

    let stop = CancellationToken::new();
    stop.cancel();
    run_startup_task(ctx.clone(), stop).await;

    assert!(ctx.writers.is_empty(), "a pre-cancelled token must prevent any reconciliation");
}

#[tokio::test]
async fn depot_enumeration_failure_is_logged_and_returns() {
    let dir = tempdir().unwrap();
    let (_service, ctx) = fixture_ctx(dir.path());
    // No depot_clients seeded for "depot.lab.example": the fake returns an
    // empty list rather than an error, so this simply exercises the
    // empty-depot path without panicking.
    run_startup_task(ctx.clone(), CancellationToken::new()).await;
    assert!(ctx.writers.is_empty());
}
