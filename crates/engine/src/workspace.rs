// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The workspace: owner of jobs and resources
//!
//! Enforces at most one live job per locator, hands out monotonic resource
//! ids, carries the namespaced variable map used by command rendering, and
//! journals submissions and state transitions.

use crate::error::EngineError;
use crate::job::{spawn_run, Job, JobState};
use crate::journal::{Journal, JournalEvent};
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use xpm_core::HostPath;

struct WorkspaceInner {
    jobs: IndexMap<HostPath, Arc<Job>>,
    next_resource_id: u64,
}

/// Root of a set of jobs sharing one job-directory tree.
pub struct Workspace {
    base_dir: HostPath,
    experiment: Option<String>,
    inner: Mutex<WorkspaceInner>,
    variables: Mutex<IndexMap<String, String>>,
    journal: Mutex<Option<Journal>>,
}

impl Workspace {
    /// Open a workspace rooted at `base_dir`, replaying the journal for
    /// the resource-id watermark. A non-local base directory gets no
    /// journal; the per-job state files still drive restart behavior.
    pub fn open(base_dir: HostPath, experiment: Option<String>) -> Result<Arc<Workspace>, EngineError> {
        let (journal, next_resource_id) = match base_dir.local_path() {
            Ok(local) => {
                std::fs::create_dir_all(local)?;
                let (journal, next) = Journal::open(&Path::new(local).join("state.jsonl"))
                    .map_err(|e| EngineError::Assertion(format!("cannot open journal: {}", e)))?;
                (Some(journal), next)
            }
            Err(_) => {
                tracing::warn!(base = %base_dir, "workspace base is not local, journaling disabled");
                (None, 0)
            }
        };
        Ok(Arc::new(Workspace {
            base_dir,
            experiment,
            inner: Mutex::new(WorkspaceInner {
                jobs: IndexMap::new(),
                next_resource_id,
            }),
            variables: Mutex::new(IndexMap::new()),
            journal: Mutex::new(journal),
        }))
    }

    pub fn base_dir(&self) -> &HostPath {
        &self.base_dir
    }

    pub fn experiment(&self) -> Option<&str> {
        self.experiment.as_deref()
    }

    /// Where job directories live.
    pub fn jobs_dir(&self) -> HostPath {
        self.base_dir.resolve(&["jobs"])
    }

    /// Set a variable.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.variables.lock().insert(key.into(), value.into());
    }

    /// Set a variable under a namespace (`ns.key`).
    pub fn set_ns(&self, ns: &str, key: &str, value: impl Into<String>) {
        self.variables
            .lock()
            .insert(format!("{}.{}", ns, key), value.into());
    }

    /// Look up a variable with namespace fallback: `a.b.name` is tried as
    /// `a.b.name`, then `a.name`, then `name`.
    pub fn get(&self, key: &str) -> Option<String> {
        let variables = self.variables.lock();
        let name = key.rsplit('.').next().unwrap_or(key);
        if name.len() == key.len() {
            return variables.get(name).cloned();
        }
        let mut namespace = &key[..key.len() - name.len() - 1];
        loop {
            let candidate = format!("{}.{}", namespace, name);
            if let Some(value) = variables.get(candidate.as_str()) {
                return Some(value.clone());
            }
            match namespace.rfind('.') {
                Some(i) => namespace = &namespace[..i],
                None => break,
            }
        }
        variables.get(name).cloned()
    }

    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// The job registered under a locator, if any.
    pub fn job(&self, locator: &HostPath) -> Option<Arc<Job>> {
        self.inner.lock().jobs.get(locator).cloned()
    }

    /// All registered jobs, in submission order.
    pub fn jobs(&self) -> Vec<Arc<Job>> {
        self.inner.lock().jobs.values().cloned().collect()
    }

    pub(crate) fn record_state(&self, locator: &HostPath, state: JobState) {
        let mut journal = self.journal.lock();
        if let Some(journal) = journal.as_mut() {
            let event = JournalEvent::StateChanged {
                locator: locator.to_string(),
                state,
            };
            if let Err(e) = journal.record(&event) {
                tracing::warn!(error = %e, "could not journal state change");
            }
        }
    }

    /// Register and, when ready, start a job. Submitting the same locator
    /// twice leaves the existing job in place.
    pub async fn submit(self: &Arc<Self>, job: Arc<Job>) -> Result<(), EngineError> {
        let resource_id = {
            let mut inner = self.inner.lock();
            if inner.jobs.contains_key(job.locator()) {
                tracing::warn!(
                    job = %job.locator(),
                    "job with this locator already exists - skipping new submission"
                );
                return Ok(());
            }
            let resource_id = inner.next_resource_id;
            inner.next_resource_id += 1;
            let now = SystemTime::now();
            job.attach(self, resource_id, now);
            inner.jobs.insert(job.locator().clone(), job.clone());
            resource_id
        };

        let time_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        {
            let mut journal = self.journal.lock();
            if let Some(journal) = journal.as_mut() {
                let event = JournalEvent::Submitted {
                    locator: job.locator().to_string(),
                    resource_id,
                    time_ms,
                };
                if let Err(e) = journal.record(&event) {
                    tracing::warn!(error = %e, "could not journal submission");
                }
            }
        }

        tracing::info!(job = %job.locator(), resource_id, "submitted job");
        if job.ready() {
            job.run().await?;
        }
        Ok(())
    }

    /// Re-run every registered job whose state files may have settled while
    /// this process was away (restart reattach).
    pub fn reattach_all(self: &Arc<Self>) {
        for job in self.jobs() {
            if !job.state().is_terminal() {
                spawn_run(job);
            }
        }
    }
}

#[cfg(test)]
#[path = "workspace_tests.rs"]
mod tests;
