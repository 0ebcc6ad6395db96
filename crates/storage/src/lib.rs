// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process registries backing the PXE/UEFI netboot configuration daemon:
//! the active writer per host, and the set of open control-socket
//! connections.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod connection_registry;
mod writer_registry;

pub use connection_registry::{ConnectionHandle, ConnectionRegistry};
pub use writer_registry::{WriterHandle, WriterRegistry, STOP_JOIN_TIMEOUT};
