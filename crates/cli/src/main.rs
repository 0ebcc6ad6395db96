// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `pxeconfdctl`: the operator-facing CLI (§6 "CLI surface"). `start` runs
//! the daemon in this process; every other sub-command opens the control
//! socket, relays its arguments as a single command line, and prints the
//! reply — exiting 0 on an `Ok` reply or 1 on an `(ERROR)` reply or a
//! transport failure.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;

const DEFAULT_CONFIG_PATH: &str = "/etc/opsi/opsipxeconfd.conf";
const SOCKET_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Parser)]
#[command(
    name = "pxeconfdctl",
    about = "Control client for the PXE/UEFI netboot configuration daemon",
    version = concat!(env!("CARGO_PKG_VERSION"), "+", env!("BUILD_GIT_HASH"))
)]
struct Cli {
    /// Path to the TOML configuration file, used to find the control socket.
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH, global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the daemon in the foreground or background in this process.
    Start {
        #[arg(short, long)]
        foreground: bool,
    },
    /// Ask the daemon to shut down.
    Stop,
    /// Print the daemon's current status.
    Status,
    /// Regenerate a host's boot configuration.
    Update {
        host_id: String,
        /// Optional pre-fetched update cache file (an optimization only;
        /// omit unless paired with the service's own event hooks).
        cache_file: Option<PathBuf>,
    },
    /// Remove a host's boot configuration, if any.
    Remove { host_id: String },
    /// One-shot initial installation and permission setup.
    Setup,
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Command::Start { foreground } => run_daemon(&cli.config, foreground),
        Command::Stop => run_control_command(&cli.config, "stop".to_string()),
        Command::Status => run_control_command(&cli.config, "status".to_string()),
        Command::Update { host_id, cache_file } => {
            let mut line = format!("update {host_id}");
            if let Some(path) = cache_file {
                line.push(' ');
                line.push_str(&path.display().to_string());
            }
            run_control_command(&cli.config, line)
        }
        Command::Remove { host_id } => run_control_command(&cli.config, format!("remove {host_id}")),
        Command::Setup => {
            // Out of scope (§1 "the one-shot `setup` sub-command"): initial
            // directory/permission provisioning is an installer concern,
            // not something this daemon's core performs at runtime.
            eprintln!("pxeconfdctl: `setup` is performed by the package installer, not this binary");
            std::process::ExitCode::FAILURE
        }
    }
}

fn run_daemon(config_path: &std::path::Path, foreground: bool) -> std::process::ExitCode {
    let args = pxecfg_daemon::Args::parse_from([
        "pxeconfd".to_string(),
        "--config".to_string(),
        config_path.display().to_string(),
    ]);
    let args = pxecfg_daemon::Args { foreground, ..args };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("pxeconfdctl: failed to start async runtime: {err}");
            return std::process::ExitCode::FAILURE;
        }
    };

    match runtime.block_on(pxecfg_daemon::run(args)) {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("pxeconfdctl: {err}");
            std::process::ExitCode::FAILURE
        }
    }
}

fn run_control_command(config_path: &std::path::Path, command_line: String) -> std::process::ExitCode {
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("pxeconfdctl: failed to start async runtime: {err}");
            return std::process::ExitCode::FAILURE;
        }
    };
    runtime.block_on(send_command(config_path, command_line))
}

async fn send_command(config_path: &std::path::Path, command_line: String) -> std::process::ExitCode {
    let socket_path = match socket_path_from_config(config_path) {
        Ok(path) => path,
        Err(err) => {
            eprintln!("pxeconfdctl: {err}");
            return std::process::ExitCode::FAILURE;
        }
    };

    let reply = match tokio::time::timeout(SOCKET_TIMEOUT, exchange(&socket_path, &command_line)).await {
        Ok(Ok(reply)) => reply,
        Ok(Err(err)) => {
            eprintln!("pxeconfdctl: {err}");
            return std::process::ExitCode::FAILURE;
        }
        Err(_elapsed) => {
            eprintln!("pxeconfdctl: timed out talking to the control socket");
            return std::process::ExitCode::FAILURE;
        }
    };

    println!("{reply}");
    if reply.is_error() {
        std::process::ExitCode::FAILURE
    } else {
        std::process::ExitCode::SUCCESS
    }
}

async fn exchange(socket_path: &std::path::Path, command_line: &str) -> std::io::Result<pxecfg_wire::Reply> {
    let mut stream = UnixStream::connect(socket_path).await?;
    stream.write_all(command_line.as_bytes()).await?;
    stream.write_all(b"\n").await?;
    stream.shutdown().await?;

    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await?;
    let text = String::from_utf8_lossy(&buf);
    Ok(pxecfg_wire::Reply::parse(text.trim_end()))
}

fn socket_path_from_config(config_path: &std::path::Path) -> anyhow::Result<PathBuf> {
    let text = std::fs::read_to_string(config_path)
        .with_context(|| format!("reading configuration file {}", config_path.display()))?;
    let config = pxecfg_core::Config::from_toml_str(&text)
        .with_context(|| format!("invalid configuration file {}", config_path.display()))?;
    Ok(config.socket_path)
}
