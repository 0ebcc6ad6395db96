// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Control-socket command grammar (§4.7): one command per connection,
//! whitespace-separated, shell-quoting honored for paths with spaces.

use std::path::PathBuf;

use pxecfg_core::{HostId, HostIdError};

/// A parsed control-socket command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Stop,
    Status,
    Update { host_id: HostId, cache_file: Option<PathBuf> },
    Remove { host_id: HostId },
}

/// Error parsing a raw command line into a [`Command`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("empty command")]
    Empty,
    #[error("unterminated quote in command line")]
    UnterminatedQuote,
    #[error("unknown command '{0}'")]
    Unknown(String),
    #[error("'{0}' requires a host id argument")]
    MissingHostId(&'static str),
    #[error("'{0}' takes at most one argument after the host id")]
    TooManyArguments(&'static str),
    #[error("invalid host id: {0}")]
    InvalidHostId(#[from] HostIdError),
}

impl Command {
    /// Parse one line of control-socket input.
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let tokens = shlex::split(line.trim()).ok_or(CommandError::UnterminatedQuote)?;
        let mut tokens = tokens.into_iter();
        let verb = tokens.next().ok_or(CommandError::Empty)?;

        match verb.as_str() {
            "stop" => Ok(Command::Stop),
            "status" => Ok(Command::Status),
            "update" => {
                let host_id = tokens.next().ok_or(CommandError::MissingHostId("update"))?;
                let host_id = HostId::parse(host_id)?;
                let cache_file = tokens.next().map(PathBuf::from);
                if tokens.next().is_some() {
                    return Err(CommandError::TooManyArguments("update"));
                }
                Ok(Command::Update { host_id, cache_file })
            }
            "remove" => {
                let host_id = tokens.next().ok_or(CommandError::MissingHostId("remove"))?;
                let host_id = HostId::parse(host_id)?;
                if tokens.next().is_some() {
                    return Err(CommandError::TooManyArguments("remove"));
                }
                Ok(Command::Remove { host_id })
            }
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;
