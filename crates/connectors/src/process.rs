// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process abstraction: builders, redirections and the process handle

use crate::{Connector, ConnectorError};
use async_trait::async_trait;
use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;
use xpm_core::HostPath;

/// Maximum pipe frame delivered to a [`Redirect::Pipe`] callback.
pub const PIPE_CHUNK_SIZE: usize = 8192;

/// Callback receiving chunks of at most [`PIPE_CHUNK_SIZE`] bytes.
pub type PipeCallback = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// Redirection of one standard stream.
#[derive(Clone, Default)]
pub enum Redirect {
    #[default]
    Inherit,
    File(HostPath),
    Pipe(PipeCallback),
    Null,
}

impl Redirect {
    pub fn file(path: HostPath) -> Self {
        Redirect::File(path)
    }

    pub fn pipe(callback: impl Fn(&[u8]) + Send + Sync + 'static) -> Self {
        Redirect::Pipe(Arc::new(callback))
    }
}

impl fmt::Debug for Redirect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Redirect::Inherit => write!(f, "Inherit"),
            Redirect::File(path) => write!(f, "File({})", path),
            Redirect::Pipe(_) => write!(f, "Pipe(..)"),
            Redirect::Null => write!(f, "Null"),
        }
    }
}

/// A handle on a spawned or reattached process.
#[async_trait]
pub trait Process: Send + Sync {
    async fn is_running(&self) -> bool;

    /// Block until the process exits and return its exit code.
    ///
    /// Returns -1 when the process could not be observed, -2 when it was
    /// terminated by a signal, -3 when it was stopped.
    async fn exit_code(&self) -> i32;

    /// Best-effort termination: SIGTERM when `force`, SIGINT otherwise.
    async fn kill(&self, force: bool);

    /// Write to the process stdin; returns the byte count or -1 on a write
    /// failure. Fails on processes without an attached stdin.
    async fn write(&self, data: &[u8]) -> Result<i64, ConnectorError>;

    /// Close the process stdin.
    async fn eof(&self) -> Result<(), ConnectorError>;
}

/// Describes a process to spawn on a connector's host.
pub struct ProcessBuilder {
    connector: Arc<dyn Connector>,
    pub working_directory: Option<HostPath>,
    pub command: Vec<String>,
    pub environment: IndexMap<String, String>,
    pub stdin: Redirect,
    pub stdout: Redirect,
    pub stderr: Redirect,
    /// Run the process in its own process group.
    pub detach: bool,
}

impl fmt::Debug for ProcessBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessBuilder")
            .field("working_directory", &self.working_directory)
            .field("command", &self.command)
            .field("detach", &self.detach)
            .finish_non_exhaustive()
    }
}

impl ProcessBuilder {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            working_directory: None,
            command: Vec::new(),
            environment: IndexMap::new(),
            stdin: Redirect::Null,
            stdout: Redirect::Inherit,
            stderr: Redirect::Inherit,
            detach: true,
        }
    }

    /// Spawn the process through the builder's connector.
    pub async fn start(self) -> Result<Box<dyn Process>, ConnectorError> {
        let connector = self.connector.clone();
        connector.spawn(self).await
    }
}
