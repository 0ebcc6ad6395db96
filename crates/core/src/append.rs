// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The append map: kernel command-line parameters merged into a rendered
//! boot menu's `append`/`linux`/`kernel` directive.

use indexmap::IndexMap;

/// Name of the secret key carrying the client's opsi host key.
///
/// Removed from the map before rendering and registered with the process
/// secret redactor by the caller.
pub const KEY_PCKEY: &str = "pckey";
/// Clear-text boot-image root password; rewritten to [`KEY_PWH`] before rendering.
pub const KEY_BOOTIMAGE_ROOT_PASSWORD: &str = "bootimagerootpassword";
/// Pre-hashed boot-image root password (crypt-style).
pub const KEY_PWH: &str = "pwh";

/// Mapping from lowercase parameter name to value string.
///
/// Keys with an empty value render as a bare token (no `=`). Preserves
/// insertion order so newly merged keys land at the end of a rendered line,
/// matching the renderer's §4.2 merge rule.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppendMap(IndexMap<String, String>);

impl AppendMap {
    pub fn new() -> Self {
        Self(IndexMap::new())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into().to_ascii_lowercase(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.shift_remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl FromIterator<(String, String)> for AppendMap {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        let mut map = IndexMap::new();
        for (k, v) in iter {
            map.insert(k.to_ascii_lowercase(), v);
        }
        Self(map)
    }
}

/// Parse one `key=value` or bare `key` kernel-parameter token, lower-casing
/// only the key.
pub fn parse_bootimage_parameter(option: &str) -> (String, String) {
    match option.split_once('=') {
        Some((key, value)) => (key.trim().to_ascii_lowercase(), value.trim().to_string()),
        None => (option.trim().to_ascii_lowercase(), String::new()),
    }
}

#[cfg(test)]
#[path = "append_tests.rs"]
mod tests;
