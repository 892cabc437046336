// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! xpm-connectors: the filesystem/process boundary
//!
//! A connector abstracts a host: resolving paths, manipulating files, taking
//! advisory locks, and spawning or reattaching to processes. Local and SSH
//! implementations are provided.

pub mod local;
pub mod process;
pub mod ssh;

pub use local::LocalConnector;
pub use process::{Process, ProcessBuilder, Redirect};
pub use ssh::SshConnector;

use async_trait::async_trait;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use xpm_core::HostPath;

/// Errors from connector operations
#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
    #[error("lock error: {0}")]
    Lock(String),
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
    #[error("unsupported: {0}")]
    Unsupported(String),
    #[error(transparent)]
    Path(#[from] xpm_core::ValueError),
}

impl ConnectorError {
    /// Wrap an io::Error with an operation description.
    pub fn io(context: impl Into<String>) -> impl FnOnce(io::Error) -> ConnectorError {
        let context = context.into();
        move |source| ConnectorError::Io { context, source }
    }
}

/// What a path points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Unexisting,
    File,
    Directory,
    Pipe,
    Other,
}

/// Access to a host: filesystem operations and process creation.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Map a logical path to a string usable on this host.
    fn resolve(&self, path: &HostPath) -> Result<String, ConnectorError>;

    async fn set_executable(&self, path: &HostPath, flag: bool) -> Result<(), ConnectorError>;

    /// Create a directory. Idempotent unless `error_if_exists`; creates
    /// parents on demand; fails when the path exists and is not a directory.
    async fn mkdirs(
        &self,
        path: &HostPath,
        create_parents: bool,
        error_if_exists: bool,
    ) -> Result<(), ConnectorError>;

    /// Single-level create; fails when the path exists.
    async fn mkdir(&self, path: &HostPath) -> Result<(), ConnectorError>;

    async fn file_type(&self, path: &HostPath) -> Result<FileType, ConnectorError>;

    /// Open for write-truncate and write the full contents.
    async fn write_file(&self, path: &HostPath, contents: &str) -> Result<(), ConnectorError>;

    async fn read_file(&self, path: &HostPath) -> Result<String, ConnectorError>;

    /// Create an empty file.
    async fn create_file(&self, path: &HostPath, error_if_exists: bool)
        -> Result<(), ConnectorError>;

    async fn remove(&self, path: &HostPath, recursive: bool) -> Result<(), ConnectorError>;

    /// Take an exclusive advisory lock backed by an O_CREAT|O_EXCL file.
    ///
    /// Contended locks wait for the holder to delete the file. A zero
    /// timeout blocks indefinitely; otherwise the attempt fails with a
    /// lock error once the timeout elapses.
    async fn lock(
        self: Arc<Self>,
        path: &HostPath,
        timeout: Duration,
    ) -> Result<FileLock, ConnectorError>;

    /// Spawn a process described by a builder.
    async fn spawn(&self, builder: ProcessBuilder) -> Result<Box<dyn Process>, ConnectorError>;

    /// Reattach to an externally running process by pid. Its exit code is
    /// obtained by polling liveness until the pid is gone, then reading the
    /// job's exit-code state file.
    async fn get_process(
        &self,
        exit_code_path: &HostPath,
        pid: i32,
    ) -> Result<Box<dyn Process>, ConnectorError>;
}

/// RAII guard over a lock file; dropping it removes the file unless the
/// guard was detached.
pub struct FileLock {
    path: HostPath,
    connector: Arc<dyn Connector>,
    detached: bool,
}

impl FileLock {
    pub(crate) fn new(connector: Arc<dyn Connector>, path: HostPath) -> Self {
        Self {
            path,
            connector,
            detached: false,
        }
    }

    pub fn path(&self) -> &HostPath {
        &self.path
    }

    /// Leave the lock file in place on drop; ownership of removal has been
    /// handed to someone else.
    pub fn detach(&mut self) {
        self.detached = true;
    }

    /// Remove the lock file now.
    pub async fn release(mut self) -> Result<(), ConnectorError> {
        self.detached = true;
        self.connector.remove(&self.path, false).await
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if self.detached {
            return;
        }
        if let Ok(local) = self.path.local_path() {
            if let Err(e) = std::fs::remove_file(local) {
                tracing::warn!(path = %self.path, error = %e, "failed to remove lock file");
            }
            return;
        }
        // Remote removal needs the connector; hand it to the runtime.
        let connector = self.connector.clone();
        let path = self.path.clone();
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                if let Err(e) = connector.remove(&path, false).await {
                    tracing::warn!(path = %path, error = %e, "failed to remove lock file");
                }
            });
        } else {
            tracing::warn!(path = %path, "lock file leaked: no runtime for remote removal");
        }
    }
}
