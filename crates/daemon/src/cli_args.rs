// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command-line argument parsing for the `pxeconfd` binary (§4.9
//! "parse/snapshot config").

use std::path::PathBuf;

use clap::Parser;
use pxecfg_core::{Config, ConfigError};

const DEFAULT_CONFIG_PATH: &str = "/etc/opsi/opsipxeconfd.conf";

#[derive(Debug, Parser)]
#[command(name = "pxeconfd", about = "PXE/UEFI netboot configuration daemon")]
pub struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Stay attached to the controlling terminal instead of daemonizing.
    #[arg(short, long)]
    pub foreground: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("reading configuration file {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl Args {
    pub fn load_config(&self) -> Result<Config, ConfigLoadError> {
        let text = std::fs::read_to_string(&self.config)
            .map_err(|source| ConfigLoadError::Io { path: self.config.clone(), source })?;
        Ok(Config::from_toml_str(&text)?)
    }
}

#[cfg(test)]
#[path = "cli_args_tests.rs"]
mod tests;
