//! Shared fixtures for the behavioral specs

use parking_lot::RwLock;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use xpm_connectors::LocalConnector;
use xpm_core::{HostPath, Typename, Value};
use xpm_engine::{DirectLauncher, Job, JobState, Launcher, Workspace};
use xpm_registry::Registry;

pub struct TestBed {
    pub dir: TempDir,
    pub connector: Arc<LocalConnector>,
    pub workspace: Arc<Workspace>,
    pub registry: Arc<RwLock<Registry>>,
    pub launcher: Arc<dyn Launcher>,
}

impl TestBed {
    pub fn base(&self) -> HostPath {
        HostPath::local(self.dir.path().display().to_string())
    }

    /// A second workspace over the same directory tree, as another process
    /// would open it.
    pub fn reopen_workspace(&self) -> Arc<Workspace> {
        Workspace::open(self.base(), None).expect("reopen workspace")
    }

    pub fn build(&self, doc: serde_json::Value) -> Value {
        self.registry.write().build(&doc).expect("build value")
    }

    pub async fn submit(&self, task: &str, value: Value) -> Arc<Job> {
        self.submit_to(&self.workspace, task, value).await
    }

    pub async fn submit_to(
        &self,
        workspace: &Arc<Workspace>,
        task: &str,
        value: Value,
    ) -> Arc<Job> {
        xpm_engine::submit_task(
            workspace,
            self.registry.clone(),
            self.launcher.clone(),
            &Typename::new(task),
            value,
        )
        .await
        .expect("submit task")
    }
}

/// The registry document shared by the specs: a few tiny tasks exercising
/// the run protocol.
fn registry_doc() -> serde_json::Value {
    json!({
        "types": {
            "test.Echo": {
                "arguments": {
                    "message": "string",
                    "extra": { "type": "integer", "default": 2 },
                    "out": { "type": "path", "generator": { "type": "path", "name": "out" } },
                }
            },
            "test.Sleeper": {
                "arguments": {
                    "seed": "integer",
                }
            },
            "test.Out": {
                "arguments": {
                    "tag": { "type": "string", "required": false },
                }
            },
            "test.Consume": {
                "arguments": {
                    "input": "test.Out",
                }
            },
            "test.Wait": {
                "arguments": {
                    "seed": { "type": "integer", "default": 1 },
                }
            },
        },
        "tasks": {
            "test.echo": {
                "type": "test.Echo",
                "command": [ "echo", { "type": "parameters" } ]
            },
            "test.sleeper": {
                "type": "test.Sleeper",
                "command": [ "date +%s.%N > started; sleep 0.5; date +%s.%N > finished" ]
            },
            "test.produce": {
                "type": "test.Out",
                "command": [ "sleep 0.3" ]
            },
            "test.consume": {
                "type": "test.Consume",
                "command": [ "true", { "type": "parameters" } ]
            },
            "test.wait": {
                "type": "test.Wait",
                "command": [ "while [ ! -f wake ]; do sleep 0.1; done" ]
            },
        }
    })
}

pub fn testbed() -> TestBed {
    let dir = TempDir::new().expect("tempdir");
    let connector = LocalConnector::new();
    let base = HostPath::local(dir.path().display().to_string());
    let workspace = Workspace::open(base, None).expect("workspace");
    let mut registry = Registry::new();
    registry.load_json(&registry_doc()).expect("registry doc");
    let launcher: Arc<dyn Launcher> = Arc::new(DirectLauncher::new(connector.clone()));
    TestBed {
        dir,
        connector,
        workspace,
        registry: Arc::new(RwLock::new(registry)),
        launcher,
    }
}

/// Poll a job until it reaches a state or the timeout elapses.
pub async fn wait_for(job: &Arc<Job>, state: JobState, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if job.state() == state {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}
