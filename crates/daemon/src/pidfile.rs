// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pid-file acquisition (§4.9 "acquire pid file... refuse to start if
//! another instance is alive", §6 "Pid file"): an exclusive `flock` on the
//! file doubles as the liveness check, since the lock is released by the
//! kernel the moment the holding process exits or dies. The recorded pid is
//! read back only for a more informative error message.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;

#[derive(Debug, thiserror::Error)]
pub enum PidFileError {
    #[error("another pxeconfd instance is already running (pid {0})")]
    AlreadyRunning(i32),
    #[error("failed to acquire pid file lock at {path}: {source}")]
    Lock { path: PathBuf, source: std::io::Error },
    #[error("I/O error on pid file {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
}

/// An acquired, exclusively-locked pid file. Unlocked and deleted on drop.
pub struct PidFile {
    path: PathBuf,
    file: File,
}

impl PidFile {
    /// Re-stamp the file with the calling process's current pid. Used after
    /// daemonizing (§4.9 "acquire pid file ... optionally daemonize"), since
    /// the pid recorded at `acquire` time is the pre-fork pid and the lock
    /// itself (not the recorded number) is what actually excludes a second
    /// instance.
    pub fn rewrite_pid(&mut self) -> Result<(), PidFileError> {
        self.file.set_len(0).map_err(|source| PidFileError::Io { path: self.path.clone(), source })?;
        self.file
            .seek(SeekFrom::Start(0))
            .map_err(|source| PidFileError::Io { path: self.path.clone(), source })?;
        writeln!(self.file, "{}", std::process::id())
            .map_err(|source| PidFileError::Io { path: self.path.clone(), source })?;
        self.file.flush().map_err(|source| PidFileError::Io { path: self.path.clone(), source })
    }

    /// Acquire the pid file at `path`, refusing to start if it is currently
    /// locked by a live process.
    pub fn acquire(path: &Path) -> Result<Self, PidFileError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|source| PidFileError::Io { path: path.to_path_buf(), source })?;
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|source| PidFileError::Io { path: path.to_path_buf(), source })?;

        if let Err(source) = file.try_lock_exclusive() {
            return Err(match read_pid(&mut file) {
                Some(pid) if process_is_alive(pid) => PidFileError::AlreadyRunning(pid),
                _ => PidFileError::Lock { path: path.to_path_buf(), source },
            });
        }

        file.set_len(0).map_err(|source| PidFileError::Io { path: path.to_path_buf(), source })?;
        file.seek(SeekFrom::Start(0)).map_err(|source| PidFileError::Io { path: path.to_path_buf(), source })?;
        writeln!(file, "{}", std::process::id())
            .map_err(|source| PidFileError::Io { path: path.to_path_buf(), source })?;
        file.flush().map_err(|source| PidFileError::Io { path: path.to_path_buf(), source })?;

        Ok(Self { path: path.to_path_buf(), file })
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
        let _ = std::fs::remove_file(&self.path);
    }
}

fn read_pid(file: &mut File) -> Option<i32> {
    file.seek(SeekFrom::Start(0)).ok()?;
    let mut contents = String::new();
    file.read_to_string(&mut contents).ok()?;
    contents.trim().parse().ok()
}

fn process_is_alive(pid: i32) -> bool {
    nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid), None).is_ok()
}

#[cfg(test)]
#[path = "pidfile_tests.rs"]
mod tests;
