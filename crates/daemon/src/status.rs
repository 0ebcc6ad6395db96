// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Status text rendering (§4.7.1), returned verbatim as the reply to the
//! `status` control command.

use chrono::{DateTime, Local};

use crate::listener::ListenCtx;

const ASCTIME_FORMAT: &str = "%a %b %e %H:%M:%S %Y";

/// Render the full status text for the current connection/writer state.
pub fn render(ctx: &ListenCtx) -> String {
    let connections = ctx.connections.snapshot();
    let writers = ctx.writers.snapshot();

    let mut text = String::from("opsipxeconfd status:\n");
    text.push_str(&format!("{} control connection(s) established\n", connections.len()));
    for (index, conn) in connections.iter().enumerate() {
        text.push_str(&format!(
            "    Connection {} established at: {}\n",
            index + 1,
            format_asctime(conn.established_at)
        ));
    }

    text.push('\n');
    text.push_str(&format!("{} boot configuration(s) set\n", writers.len()));
    for (host_id, writer) in &writers {
        let files = writer
            .pxe_files()
            .iter()
            .map(|path| path.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        let append = writer
            .append()
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join(" ");
        text.push_str(&format!(
            "Boot config for client '{host_id}' (path: {files}; configuration: {append}) set since {}\n",
            format_asctime(writer.started_at())
        ));
    }

    text
}

fn format_asctime(time: std::time::SystemTime) -> String {
    DateTime::<Local>::from(time).format(ASCTIME_FORMAT).to_string()
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
