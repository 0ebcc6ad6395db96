// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Control-socket framing: one command per connection, plain UTF-8, no
//! length prefix (§4.7, §5 "Control socket"). Bounded in both size and time
//! so a stalled or hostile peer can't pin a connection slot forever.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;

use crate::Reply;

/// Maximum accepted request size, matching the control protocol's expectation
/// of a single short command line.
pub const MAX_REQUEST_BYTES: usize = 4096;

/// Bound on how long a connection may take to send its command or receive
/// its reply before it is dropped.
pub const IO_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("request exceeded {MAX_REQUEST_BYTES} bytes")]
    RequestTooLarge,
    #[error("request was not valid UTF-8")]
    InvalidUtf8,
    #[error("timed out waiting for I/O")]
    Timeout,
    #[error("connection closed before a command was received")]
    ConnectionClosed,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Read a single command line from the peer: everything up to EOF or a
/// newline, whichever comes first, bounded by [`MAX_REQUEST_BYTES`] and
/// [`IO_TIMEOUT`].
pub async fn read_request<R: AsyncRead + Unpin>(reader: &mut R) -> Result<String, ProtocolError> {
    let mut buf = Vec::new();
    let mut byte = [0u8; 1];

    let read_fut = async {
        loop {
            let n = reader.read(&mut byte).await?;
            if n == 0 {
                break;
            }
            if byte[0] == b'\n' {
                break;
            }
            buf.push(byte[0]);
            if buf.len() > MAX_REQUEST_BYTES {
                return Err(ProtocolError::RequestTooLarge);
            }
        }
        Ok(())
    };

    timeout(IO_TIMEOUT, read_fut).await.map_err(|_| ProtocolError::Timeout)??;

    if buf.is_empty() {
        return Err(ProtocolError::ConnectionClosed);
    }

    String::from_utf8(buf).map_err(|_| ProtocolError::InvalidUtf8)
}

/// Write a reply to the peer, terminated with a newline, then shut the
/// write half down so the peer observes EOF (§3 "One command, one reply,
/// one close").
pub async fn write_response<W: AsyncWrite + Unpin>(
    writer: &mut W,
    reply: &Reply,
) -> Result<(), ProtocolError> {
    let text = format!("{reply}\n");
    timeout(IO_TIMEOUT, writer.write_all(text.as_bytes()))
        .await
        .map_err(|_| ProtocolError::Timeout)??;
    timeout(IO_TIMEOUT, writer.shutdown()).await.map_err(|_| ProtocolError::Timeout)??;
    Ok(())
}

#[cfg(test)]
#[path = "framing_tests.rs"]
mod tests;
