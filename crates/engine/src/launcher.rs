// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Launchers: how a job's script is started on a connector

use crate::scriptbuilder::ShScriptBuilder;
use async_trait::async_trait;
use indexmap::IndexMap;
use std::sync::Arc;
use xpm_connectors::{Connector, ConnectorError, FileType, Process, ProcessBuilder};
use xpm_core::HostPath;

/// Strategy pairing a connector with a script builder.
#[async_trait]
pub trait Launcher: Send + Sync {
    fn connector(&self) -> Arc<dyn Connector>;

    /// Environment exported to every job.
    fn environment(&self) -> IndexMap<String, String>;

    /// Base URL for job progress notifications.
    fn notification_url(&self) -> Option<String>;

    /// A process builder pre-loaded with the launcher environment.
    fn process_builder(&self) -> ProcessBuilder {
        let mut builder = ProcessBuilder::new(self.connector());
        builder.environment = self.environment();
        builder
    }

    /// A script builder carrying the launcher environment and notification
    /// URL.
    fn script_builder(&self) -> ShScriptBuilder {
        let mut builder = ShScriptBuilder::new();
        builder.environment = self.environment();
        builder.notification_url = self.notification_url();
        builder
    }

    /// Reattach to a previously started job through its pid file. Returns
    /// `None` when no pid file exists.
    async fn check(
        &self,
        job_dir: &HostPath,
        name: &str,
    ) -> Result<Option<Box<dyn Process>>, ConnectorError> {
        let connector = self.connector();
        let pid_path = job_dir.resolve(&[&format!("{}.pid", name)]);
        if connector.file_type(&pid_path).await? != FileType::File {
            return Ok(None);
        }
        let contents = connector.read_file(&pid_path).await?;
        let pid = contents.lines().next().and_then(|l| l.trim().parse().ok());
        let Some(pid) = pid else {
            tracing::warn!(path = %pid_path, "unreadable pid file");
            return Ok(None);
        };
        let exit_code_path = job_dir.resolve(&[&format!("{}.exit_code", name)]);
        Ok(Some(connector.get_process(&exit_code_path, pid).await?))
    }
}

/// Runs scripts directly on the connector's host.
pub struct DirectLauncher {
    connector: Arc<dyn Connector>,
    environment: IndexMap<String, String>,
    notification_url: Option<String>,
}

impl DirectLauncher {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            environment: IndexMap::new(),
            notification_url: None,
        }
    }

    pub fn set_env(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.environment.insert(key.into(), value.into());
    }

    pub fn set_notification_url(&mut self, url: impl Into<String>) {
        self.notification_url = Some(url.into());
    }
}

#[async_trait]
impl Launcher for DirectLauncher {
    fn connector(&self) -> Arc<dyn Connector> {
        self.connector.clone()
    }

    fn environment(&self) -> IndexMap<String, String> {
        self.environment.clone()
    }

    fn notification_url(&self) -> Option<String> {
        self.notification_url.clone()
    }
}

#[cfg(test)]
#[path = "launcher_tests.rs"]
mod tests;
