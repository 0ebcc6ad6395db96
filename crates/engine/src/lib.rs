// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Core engine for the PXE/UEFI netboot configuration daemon: the template
//! renderer (C2), the per-host writer worker (C3), the update pipeline and
//! its completion callback (C5, §4.6), and the startup task (C8).

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod pipeline;
pub mod render;
pub mod startup;
pub mod writer;

pub use pipeline::{update_boot_configuration, CachedUpdate, PipelineCtx, PipelineError};
pub use render::{render as render_template, RenderError};
pub use startup::run_startup_task;
pub use writer::{spawn as spawn_writer, CompletionCallback, PxeWriter, PxeWriterParams, WriterError, WriterState};
