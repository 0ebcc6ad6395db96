// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Boot-image root password hashing (§3 `bootimagerootpassword` → `pwh`).
//!
//! The daemon itself never ships a clear-text password into a rendered
//! template: `bootimagerootpassword` is hashed into a crypt-style `pwh`
//! value before the append map reaches the renderer.

use sha_crypt::{sha512_simple, CryptError, Sha512Params};

#[derive(Debug, thiserror::Error)]
#[error("failed to hash boot-image root password")]
pub struct PasswordHashError(#[from] CryptError);

/// Hash a clear-text boot-image root password into its crypt-style SHA-512
/// form, with every `$` backslash-escaped so the value survives the
/// template's line-oriented substitution unscathed (§3 `pwh`).
pub fn hash_boot_image_password(password: &str) -> Result<String, PasswordHashError> {
    let params = Sha512Params::default();
    let hash = sha512_simple(password, &params)?;
    Ok(escape_dollar(&hash))
}

fn escape_dollar(value: &str) -> String {
    value.replace('$', "\\$")
}

#[cfg(test)]
#[path = "password_tests.rs"]
mod tests;
