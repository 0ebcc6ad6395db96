// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::io::Cursor;

#[tokio::test]
async fn reads_request_up_to_newline() {
    let mut input = Cursor::new(b"status\nextra-ignored".to_vec());
    let line = read_request(&mut input).await.unwrap();
    assert_eq!(line, "status");
}

#[tokio::test]
async fn reads_request_terminated_by_eof() {
    let mut input = Cursor::new(b"stop".to_vec());
    let line = read_request(&mut input).await.unwrap();
    assert_eq!(line, "stop");
}

#[tokio::test]
async fn rejects_empty_connection() {
    let mut input = Cursor::new(Vec::new());
    let err = read_request(&mut input).await.unwrap_err();
    assert!(matches!(err, ProtocolError::ConnectionClosed));
}

#[tokio::test]
async fn rejects_oversized_request() {
    let mut input = Cursor::new(vec![b'a'; MAX_REQUEST_BYTES + 1]);
    let err = read_request(&mut input).await.unwrap_err();
    assert!(matches!(err, ProtocolError::RequestTooLarge));
}

#[tokio::test]
async fn rejects_invalid_utf8() {
    let mut input = Cursor::new(vec![0xff, 0xfe, b'\n']);
    let err = read_request(&mut input).await.unwrap_err();
    assert!(matches!(err, ProtocolError::InvalidUtf8));
}

#[tokio::test]
async fn writes_reply_with_trailing_newline() {
    let mut output = Vec::new();
    write_response(&mut output, &Reply::ok("Boot configuration updated")).await.unwrap();
    assert_eq!(output, b"Boot configuration updated\n");
}

#[tokio::test]
async fn writes_error_reply_with_prefix() {
    let mut output = Vec::new();
    write_response(&mut output, &Reply::error("host not found")).await.unwrap();
    assert_eq!(output, b"(ERROR) host not found\n");
}
