// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Template renderer (§4.2): a pure function from template text, property
//! map, and append map to rendered boot-menu text. Performs no I/O and no
//! locking.
//!
//! Whether a template is a UEFI one is discovered from its own syntax, not
//! declared up front: a quoted `append="..."` line or a `linux`/`kernel`
//! line marks the template as UEFI. Only once that's discovered is it
//! checked against the licensing flag snapshotted on the writer.

use pxecfg_core::{AppendMap, LicenseFlags, PropertyStateMap};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RenderError {
    #[error("template line {0} requires a UEFI license, which is not present")]
    MissingUefiLicense(usize),
}

enum LineClass<'a> {
    /// Quoted `append="..."` form (elilo/UEFI). Requires a UEFI license.
    AppendQuoted(&'a str),
    /// Plain `append ...` form (BIOS/isolinux). No license requirement.
    AppendPlain(&'a str),
    /// `linux ...` (UEFI GRUB). Requires a UEFI license.
    Linux(&'a str),
    /// `kernel ...` (UEFI GRUB, legacy chainload form). Requires a UEFI license.
    Kernel(&'a str),
    Verbatim,
}

fn classify(line: &str) -> LineClass<'_> {
    let trimmed = line.trim_start();
    if let Some(rest) = trimmed.strip_prefix("append=") {
        return LineClass::AppendQuoted(rest.trim().trim_matches('"'));
    }
    if let Some(rest) = trimmed.strip_prefix("append") {
        if rest.is_empty() || rest.starts_with(char::is_whitespace) {
            return LineClass::AppendPlain(rest.trim());
        }
    }
    if let Some(rest) = trimmed.strip_prefix("linux") {
        if rest.is_empty() || rest.starts_with(char::is_whitespace) {
            return LineClass::Linux(rest.trim());
        }
    }
    if let Some(rest) = trimmed.strip_prefix("kernel") {
        if rest.is_empty() || rest.starts_with(char::is_whitespace) {
            return LineClass::Kernel(rest.trim());
        }
    }
    LineClass::Verbatim
}

/// Parse a whitespace-separated parameter tail into an ordered list of
/// `(key, value)` pairs, lower-casing keys exactly as
/// [`pxecfg_core::append::parse_bootimage_parameter`] does (§4.2 step 1/4).
fn parse_params(tail: &str) -> Vec<(String, String)> {
    tail.split_whitespace().map(pxecfg_core::append::parse_bootimage_parameter).collect()
}

/// Merge the append map into the template's own parameters, overwriting
/// values for keys the template already set and appending new keys at the
/// end in the append map's insertion order (§4.2 step 4).
fn merge_params(existing: Vec<(String, String)>, append: &AppendMap) -> Vec<(String, String)> {
    let mut merged = existing;
    for (key, value) in append.iter() {
        match merged.iter_mut().find(|(k, _)| k == key) {
            Some(slot) => slot.1 = value.to_string(),
            None => merged.push((key.to_string(), value.to_string())),
        }
    }
    merged
}

fn format_params(params: &[(String, String)]) -> String {
    params
        .iter()
        .map(|(k, v)| if v.is_empty() { k.clone() } else { format!("{k}={v}") })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Render `template` into final boot-menu text.
pub fn render(
    template: &str,
    properties: &PropertyStateMap,
    append: &AppendMap,
    flags: LicenseFlags,
) -> Result<String, RenderError> {
    let mut out = String::new();

    for (idx, raw_line) in template.lines().enumerate() {
        let line = raw_line.trim_end();
        let mut substituted = line.to_string();
        for (prop_id, value) in properties {
            let sentinel = format!("%{prop_id}%");
            if substituted.contains(&sentinel) {
                substituted = substituted.replace(&sentinel, value);
            }
        }

        match classify(&substituted) {
            LineClass::AppendQuoted(tail) => {
                if !flags.uefi_enabled {
                    return Err(RenderError::MissingUefiLicense(idx + 1));
                }
                let merged = merge_params(parse_params(tail), append);
                out.push_str(&format!("append=\"{}\"\n", format_params(&merged)));
            }
            LineClass::AppendPlain(tail) => {
                let merged = merge_params(parse_params(tail), append);
                out.push_str(&format!("  append {}\n", format_params(&merged)));
            }
            LineClass::Linux(tail) => {
                if !flags.uefi_enabled {
                    return Err(RenderError::MissingUefiLicense(idx + 1));
                }
                let merged = merge_params(parse_params(tail), append);
                out.push_str(&format!("linux {}\n", format_params(&merged)));
            }
            LineClass::Kernel(tail) => {
                if !flags.uefi_enabled {
                    return Err(RenderError::MissingUefiLicense(idx + 1));
                }
                let merged = merge_params(parse_params(tail), append);
                out.push_str(&format!("kernel {}\n", format_params(&merged)));
            }
            LineClass::Verbatim => {
                out.push_str(&substituted);
                out.push('\n');
            }
        }
    }

    Ok(out)
}

#[cfg(test)]
#[path = "render_tests.rs"]
mod tests;
