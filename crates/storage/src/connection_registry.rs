// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Connection registry (§4.7, entity **ClientConnection** in §3): tracks
//! live control-socket connections, unkeyed, for the `status` reply's
//! "N control connection(s) established" line.

use std::time::{Instant, SystemTime};

use parking_lot::Mutex;

/// A lightweight record of one open control-socket connection.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionHandle {
    pub id: u64,
    pub start_time: Instant,
    /// Wall-clock establishment time, for the `status` reply's
    /// "established at: <local asctime>" line (§4.7.1).
    pub established_at: SystemTime,
}

/// Tracks currently open control-socket connections.
#[derive(Default)]
pub struct ConnectionRegistry {
    next_id: Mutex<u64>,
    connections: Mutex<Vec<ConnectionHandle>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a newly accepted connection and return its id, used to
    /// remove it again once the connection closes.
    pub fn register(&self) -> u64 {
        let id = {
            let mut next_id = self.next_id.lock();
            let id = *next_id;
            *next_id += 1;
            id
        };
        self.connections.lock().push(ConnectionHandle {
            id,
            start_time: Instant::now(),
            established_at: SystemTime::now(),
        });
        id
    }

    pub fn remove(&self, id: u64) {
        self.connections.lock().retain(|conn| conn.id != id);
    }

    pub fn count(&self) -> usize {
        self.connections.lock().len()
    }

    pub fn snapshot(&self) -> Vec<ConnectionHandle> {
        self.connections.lock().clone()
    }
}

#[cfg(test)]
#[path = "connection_registry_tests.rs"]
mod tests;
