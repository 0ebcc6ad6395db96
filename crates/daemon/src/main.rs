// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `pxeconfd`: entry point for the PXE/UEFI netboot configuration daemon.

use clap::Parser;
use pxecfg_daemon::Args;

fn main() -> std::process::ExitCode {
    let args = Args::parse();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("opsipxeconfd: failed to start async runtime: {err}");
            return std::process::ExitCode::FAILURE;
        }
    };

    match runtime.block_on(pxecfg_daemon::run(args)) {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("opsipxeconfd: {err}");
            std::process::ExitCode::FAILURE
        }
    }
}
