// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn register_assigns_increasing_ids() {
    let registry = ConnectionRegistry::new();
    let first = registry.register();
    let second = registry.register();
    assert_ne!(first, second);
    assert_eq!(registry.count(), 2);
}

#[test]
fn remove_drops_only_matching_connection() {
    let registry = ConnectionRegistry::new();
    let first = registry.register();
    let second = registry.register();

    registry.remove(first);

    assert_eq!(registry.count(), 1);
    assert_eq!(registry.snapshot()[0].id, second);
}

#[test]
fn snapshot_reflects_registered_start_times() {
    let registry = ConnectionRegistry::new();
    let before = Instant::now();
    registry.register();
    let snapshot = registry.snapshot();
    assert_eq!(snapshot.len(), 1);
    assert!(snapshot[0].start_time >= before);
}

#[test]
fn count_is_zero_for_fresh_registry() {
    let registry = ConnectionRegistry::new();
    assert_eq!(registry.count(), 0);
}
