// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Control-socket wire protocol for the PXE/UEFI netboot configuration
//! daemon.
//!
//! Framing: one command per connection, plain UTF-8, no length prefix.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod command;
mod framing;
mod reply;

pub use command::{Command, CommandError};
pub use framing::{read_request, write_response, ProtocolError, IO_TIMEOUT, MAX_REQUEST_BYTES};
pub use reply::Reply;
