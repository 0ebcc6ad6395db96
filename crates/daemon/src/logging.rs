// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Logging setup (§4.9 "init logging" / reload's "re-init logging"): a
//! `tracing-appender` rotating file writer wrapped so every line is passed
//! through the process-global secret redactor (§9 "Secrets") before it
//! reaches disk.

use std::io;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

/// Held for the process lifetime; dropping it stops the log-writer thread.
pub struct LoggingGuard {
    _appender_guard: WorkerGuard,
}

/// Initialize the global `tracing` subscriber, writing to `log_path` with
/// every line redacted.
pub fn init(log_path: &Path) -> io::Result<LoggingGuard> {
    let directory = log_path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(directory)?;
    let file_name = log_path.file_name().map(|n| n.to_owned()).unwrap_or_else(|| "opsipxeconfd.log".into());
    let appender = tracing_appender::rolling::never(directory, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_env("OPSIPXECONFD_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(RedactingMakeWriter { inner: non_blocking })
        .with_ansi(false)
        .try_init()
        .map_err(|err| io::Error::other(err.to_string()))?;

    Ok(LoggingGuard { _appender_guard: guard })
}

#[derive(Clone)]
struct RedactingMakeWriter<W> {
    inner: W,
}

impl<'a, W> MakeWriter<'a> for RedactingMakeWriter<W>
where
    W: MakeWriter<'a>,
{
    type Writer = RedactingWriter<W::Writer>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter { inner: self.inner.make_writer() }
    }
}

struct RedactingWriter<W> {
    inner: W,
}

impl<W: io::Write> io::Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let text = String::from_utf8_lossy(buf);
        let redacted = pxecfg_core::redactor::global().redact(&text);
        self.inner.write_all(redacted.as_bytes())?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
#[path = "logging_tests.rs"]
mod tests;
