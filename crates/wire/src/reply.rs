// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Control-socket reply shape (§4.7, §5 "Control socket"): replies are
//! plain UTF-8 text; errors are prefixed with the literal `(ERROR)`.

use std::fmt;

const ERROR_PREFIX: &str = "(ERROR)";

/// A reply sent back over the control socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Ok(String),
    Error(String),
}

impl Reply {
    pub fn ok(message: impl Into<String>) -> Self {
        Reply::Ok(message.into())
    }

    pub fn error(message: impl Into<String>) -> Self {
        Reply::Error(message.into())
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Reply::Error(_))
    }

    /// Parse wire text back into a reply, recognizing the `(ERROR)` prefix.
    /// Used by the operator-side CLI to decide its process exit code.
    pub fn parse(text: &str) -> Self {
        match text.strip_prefix(ERROR_PREFIX) {
            Some(rest) => Reply::Error(rest.trim_start().to_string()),
            None => Reply::Ok(text.to_string()),
        }
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Ok(message) => write!(f, "{message}"),
            Reply::Error(message) => write!(f, "{ERROR_PREFIX} {message}"),
        }
    }
}

#[cfg(test)]
#[path = "reply_tests.rs"]
mod tests;
