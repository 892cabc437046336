// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for engine tests

use crate::job::{Job, JobState};
use crate::launcher::{DirectLauncher, Launcher};
use crate::workspace::Workspace;
use parking_lot::RwLock;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use xpm_connectors::LocalConnector;
use xpm_core::HostPath;
use xpm_registry::Registry;

pub(crate) struct Fixture {
    pub dir: TempDir,
    pub connector: Arc<LocalConnector>,
    pub workspace: Arc<Workspace>,
    pub registry: Arc<RwLock<Registry>>,
    pub launcher: Arc<dyn Launcher>,
}

impl Fixture {
    pub fn base(&self) -> HostPath {
        HostPath::local(self.dir.path().display().to_string())
    }
}

pub(crate) fn fixture() -> Fixture {
    let dir = TempDir::new().expect("tempdir");
    let connector = LocalConnector::new();
    let base = HostPath::local(dir.path().display().to_string());
    let workspace = Workspace::open(base, None).expect("workspace");

    let mut registry = Registry::new();
    registry
        .load_json(&json!({
            "types": {
                "test.Echo": {
                    "arguments": {
                        "message": "string",
                        "out": { "type": "path", "generator": { "type": "path", "name": "out" } },
                    }
                }
            },
            "tasks": {
                "test.echo": {
                    "type": "test.Echo",
                    "command": [ "echo", { "type": "parameters" } ]
                }
            }
        }))
        .expect("registry document");

    let launcher: Arc<dyn Launcher> = Arc::new(DirectLauncher::new(connector.clone()));
    Fixture {
        dir,
        connector,
        workspace,
        registry: Arc::new(RwLock::new(registry)),
        launcher,
    }
}

/// Poll a job until it reaches a state or the timeout elapses.
pub(crate) async fn wait_for_state(job: &Arc<Job>, state: JobState, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if job.state() == state {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
