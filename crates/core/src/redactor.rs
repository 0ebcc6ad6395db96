// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-global secret registry for log and error-message redaction
//! (§9 "Secrets": opsi host keys and boot-image root passwords must never
//! reach logs or control-socket error text in clear).

use parking_lot::RwLock;
use std::sync::{Arc, OnceLock};

const MASK: &str = "***";

/// Holds the set of clear-text secrets observed during this run so they can
/// be scrubbed from any string before it is logged or echoed back to a
/// control-socket client.
#[derive(Default)]
pub struct Redactor {
    secrets: RwLock<Vec<String>>,
}

impl Redactor {
    fn new() -> Self {
        Self { secrets: RwLock::new(Vec::new()) }
    }

    /// Register a clear-text secret value. A no-op for empty strings, since
    /// masking those would corrupt unrelated text.
    pub fn register(&self, secret: impl Into<String>) {
        let secret = secret.into();
        if secret.is_empty() {
            return;
        }
        let mut secrets = self.secrets.write();
        if !secrets.iter().any(|s| s == &secret) {
            secrets.push(secret);
        }
    }

    /// Replace every occurrence of every registered secret in `text` with a
    /// fixed-width mask. Longest secrets are applied first so a short secret
    /// that happens to be a substring of a longer one can't leave a partial
    /// match behind.
    pub fn redact(&self, text: &str) -> String {
        let secrets = self.secrets.read();
        let mut ordered: Vec<&String> = secrets.iter().collect();
        ordered.sort_by_key(|s| std::cmp::Reverse(s.len()));

        let mut out = text.to_string();
        for secret in ordered {
            if !out.contains(secret.as_str()) {
                continue;
            }
            out = out.replace(secret.as_str(), MASK);
        }
        out
    }
}

static GLOBAL: OnceLock<Arc<Redactor>> = OnceLock::new();

/// The process-wide redactor instance, created on first access.
pub fn global() -> Arc<Redactor> {
    GLOBAL.get_or_init(|| Arc::new(Redactor::new())).clone()
}

#[cfg(test)]
#[path = "redactor_tests.rs"]
mod tests;
