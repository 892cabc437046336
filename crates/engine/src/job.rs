// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The job state machine
//!
//! A job is a resource bound to a locator (its directory on disk plus base
//! name). Readiness is driven by its dependencies; running materializes the
//! command into a shell script whose state files (`pid`, `exit_code`,
//! `done`) are the authoritative record, surviving the driving process.

use crate::dependency::{Dependency, DependencyOrigin};
use crate::error::EngineError;
use crate::launcher::Launcher;
use crate::token::CounterToken;
use crate::workspace::Workspace;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::{Duration, SystemTime};
use xpm_connectors::{FileType, Process, Redirect};
use xpm_core::{HostPath, Value};
use xpm_registry::{CommandLine, Registry};

/// How long a run waits for the job directory lock.
pub const JOB_LOCK_TIMEOUT: Duration = Duration::from_secs(60);

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Waiting for dependencies to be satisfied.
    Waiting,
    /// All dependencies satisfied, not yet dispatched.
    Ready,
    Running,
    /// Parked by an operator.
    OnHold,
    Error,
    Done,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Done | JobState::Error)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobState::Waiting => "waiting",
            JobState::Ready => "ready",
            JobState::Running => "running",
            JobState::OnHold => "on_hold",
            JobState::Error => "error",
            JobState::Done => "done",
        };
        write!(f, "{}", name)
    }
}

struct JobInner {
    state: JobState,
    unsatisfied: usize,
    /// Single-flight latch: one run() per readiness edge.
    launching: bool,
    tokens_held: bool,
}

/// A command-line job owned by a workspace.
pub struct Job {
    locator: HostPath,
    launcher: Arc<dyn Launcher>,
    command: CommandLine,
    params: Mutex<Option<Value>>,
    registry: Arc<RwLock<Registry>>,
    inner: Mutex<JobInner>,
    dependencies: Mutex<Vec<Arc<Dependency>>>,
    dependents: Mutex<Vec<Weak<Dependency>>>,
    workspace: Mutex<Weak<Workspace>>,
    resource_id: Mutex<Option<u64>>,
    submission_time: Mutex<Option<SystemTime>>,
    process: tokio::sync::Mutex<Option<Arc<dyn Process>>>,
}

impl Job {
    pub fn new(
        locator: HostPath,
        launcher: Arc<dyn Launcher>,
        command: CommandLine,
        params: Option<Value>,
        registry: Arc<RwLock<Registry>>,
    ) -> Arc<Job> {
        Arc::new(Job {
            locator,
            launcher,
            command,
            params: Mutex::new(params),
            registry,
            inner: Mutex::new(JobInner {
                state: JobState::Waiting,
                unsatisfied: 0,
                launching: false,
                tokens_held: false,
            }),
            dependencies: Mutex::new(Vec::new()),
            dependents: Mutex::new(Vec::new()),
            workspace: Mutex::new(Weak::new()),
            resource_id: Mutex::new(None),
            submission_time: Mutex::new(None),
            process: tokio::sync::Mutex::new(None),
        })
    }

    pub fn locator(&self) -> &HostPath {
        &self.locator
    }

    /// The job directory.
    pub fn directory(&self) -> HostPath {
        self.locator.parent()
    }

    /// The base name for state files.
    pub fn name(&self) -> &str {
        self.locator.name()
    }

    pub fn command(&self) -> &CommandLine {
        &self.command
    }

    pub fn registry(&self) -> &Arc<RwLock<Registry>> {
        &self.registry
    }

    /// A clone of the job's configured parameter value.
    pub fn parameters(&self) -> Option<Value> {
        self.params.lock().clone()
    }

    pub fn resource_id(&self) -> Option<u64> {
        *self.resource_id.lock()
    }

    pub fn submission_time(&self) -> Option<SystemTime> {
        *self.submission_time.lock()
    }

    pub fn state(&self) -> JobState {
        self.inner.lock().state
    }

    pub fn unsatisfied(&self) -> usize {
        self.inner.lock().unsatisfied
    }

    /// True when the job can be dispatched.
    pub fn ready(&self) -> bool {
        let inner = self.inner.lock();
        inner.unsatisfied == 0 && matches!(inner.state, JobState::Waiting | JobState::Ready)
    }

    fn state_file(&self, ext: &str) -> HostPath {
        self.directory()
            .resolve(&[&format!("{}.{}", self.name(), ext)])
    }

    pub fn pid_path(&self) -> HostPath {
        self.state_file("pid")
    }

    pub fn exit_code_path(&self) -> HostPath {
        self.state_file("exit_code")
    }

    pub fn done_path(&self) -> HostPath {
        self.state_file("done")
    }

    pub fn lock_path(&self) -> HostPath {
        self.state_file("lock")
    }

    pub fn start_lock_path(&self) -> HostPath {
        self.state_file("lock.start")
    }

    pub fn script_path(&self) -> HostPath {
        self.state_file("sh")
    }

    pub fn out_path(&self) -> HostPath {
        self.state_file("out")
    }

    pub fn err_path(&self) -> HostPath {
        self.state_file("err")
    }

    /// A dependency on this job's successful completion.
    pub fn create_dependency(self: &Arc<Self>) -> Arc<Dependency> {
        Dependency::on_job(self.clone())
    }

    /// Wire a dependency: set the target, count it unsatisfied, then check
    /// it so the counters settle during setup. Running is the submitter's
    /// decision, not wiring's.
    pub fn add_dependency(self: &Arc<Self>, dependency: Arc<Dependency>) {
        dependency.set_target(self);
        self.dependencies.lock().push(dependency.clone());
        self.inner.lock().unsatisfied += 1;
        let _ = dependency.check();
    }

    pub(crate) fn add_dependent(&self, dependency: &Arc<Dependency>) {
        self.dependents.lock().push(Arc::downgrade(dependency));
    }

    /// Re-check every dependent; returns jobs that became ready. Expired
    /// entries are pruned during iteration.
    pub(crate) fn notify_dependents(&self) -> Vec<Arc<Job>> {
        let mut ready = Vec::new();
        let mut dependents = self.dependents.lock();
        dependents.retain(|weak| match weak.upgrade() {
            None => false,
            Some(dependency) => {
                if let Some(job) = dependency.check() {
                    ready.push(job);
                }
                true
            }
        });
        ready
    }

    /// Adjust the unsatisfied count for one dependency edge. Returns true
    /// when the job became (or stays) ready to dispatch.
    pub(crate) fn apply_dependency_change(&self, satisfied: bool) -> bool {
        let mut inner = self.inner.lock();
        if satisfied {
            inner.unsatisfied = inner.unsatisfied.saturating_sub(1);
        } else {
            inner.unsatisfied += 1;
        }
        if !satisfied {
            if inner.state == JobState::Ready {
                inner.state = JobState::Waiting;
            }
            return false;
        }
        if inner.unsatisfied == 0 && inner.state == JobState::Waiting {
            inner.state = JobState::Ready;
        }
        inner.unsatisfied == 0 && inner.state == JobState::Ready
    }

    pub(crate) fn attach(&self, workspace: &Arc<Workspace>, resource_id: u64, time: SystemTime) {
        *self.workspace.lock() = Arc::downgrade(workspace);
        *self.resource_id.lock() = Some(resource_id);
        *self.submission_time.lock() = Some(time);
    }

    fn record_state(&self, state: JobState) {
        if let Some(workspace) = self.workspace.lock().upgrade() {
            workspace.record_state(&self.locator, state);
        }
    }

    fn transition(&self, to: JobState) {
        {
            let mut inner = self.inner.lock();
            if inner.state == to {
                return;
            }
            tracing::info!(job = %self.locator, from = %inner.state, to = %to, "job state");
            inner.state = to;
        }
        self.record_state(to);
    }

    fn transition_if(&self, from: &[JobState], to: JobState) -> bool {
        {
            let mut inner = self.inner.lock();
            if !from.contains(&inner.state) {
                return false;
            }
            tracing::info!(job = %self.locator, from = %inner.state, to = %to, "job state");
            inner.state = to;
        }
        self.record_state(to);
        true
    }

    /// Park a waiting or ready job.
    pub fn hold(&self) -> bool {
        self.transition_if(&[JobState::Waiting, JobState::Ready], JobState::OnHold)
    }

    /// Release a parked job and re-evaluate readiness.
    pub async fn release_hold(self: &Arc<Self>) -> Result<bool, EngineError> {
        {
            let mut inner = self.inner.lock();
            if inner.state != JobState::OnHold {
                return Ok(false);
            }
            inner.state = if inner.unsatisfied == 0 {
                JobState::Ready
            } else {
                JobState::Waiting
            };
        }
        self.record_state(self.state());
        if self.ready() {
            self.clone().run().await?;
        }
        Ok(true)
    }

    /// Signal the job's process: SIGTERM when `force`, SIGINT otherwise.
    pub async fn kill(&self, force: bool) {
        let process = self.process.lock().await.clone();
        if let Some(process) = process {
            process.kill(force).await;
        }
    }

    /// Clear the state files of a finished job and make it eligible again.
    pub async fn resubmit(self: &Arc<Self>) -> Result<(), EngineError> {
        if !self.state().is_terminal() {
            return Ok(());
        }
        let connector = self.launcher.connector();
        for path in [
            self.pid_path(),
            self.exit_code_path(),
            self.done_path(),
            self.start_lock_path(),
        ] {
            if connector.file_type(&path).await? == FileType::File {
                connector.remove(&path, false).await?;
            }
        }
        {
            let dependencies = self.dependencies.lock().clone();
            let unsatisfied = dependencies.iter().filter(|d| !d.reset()).count();
            let mut inner = self.inner.lock();
            inner.unsatisfied = unsatisfied;
            inner.state = if unsatisfied == 0 {
                JobState::Ready
            } else {
                JobState::Waiting
            };
        }
        self.record_state(self.state());
        if self.ready() {
            self.clone().run().await?;
        }
        Ok(())
    }

    /// Claim the slots of every counter dependency, all or nothing.
    fn reserve_tokens(&self) -> bool {
        let dependencies = self.dependencies.lock().clone();
        let mut reserved: Vec<(Arc<CounterToken>, u32)> = Vec::new();
        for dependency in &dependencies {
            if let DependencyOrigin::Counter { token, count } = dependency.origin() {
                if token.try_reserve(*count) {
                    reserved.push((token.clone(), *count));
                } else {
                    for (token, count) in reserved {
                        token.release(count);
                        for job in token.notify_dependents() {
                            spawn_run(job);
                        }
                    }
                    return false;
                }
            }
        }
        self.inner.lock().tokens_held = true;
        // Our reservation may have unsatisfied other dependents; let their
        // counters settle.
        for (token, _) in &reserved {
            for job in token.notify_dependents() {
                spawn_run(job);
            }
        }
        true
    }

    /// Claim slots for a process that is already running (reattach).
    fn reserve_tokens_forced(&self) {
        let dependencies = self.dependencies.lock().clone();
        for dependency in &dependencies {
            if let DependencyOrigin::Counter { token, count } = dependency.origin() {
                token.reserve(*count);
                for job in token.notify_dependents() {
                    spawn_run(job);
                }
            }
        }
        self.inner.lock().tokens_held = true;
    }

    fn release_tokens(&self) {
        {
            let mut inner = self.inner.lock();
            if !inner.tokens_held {
                return;
            }
            inner.tokens_held = false;
        }
        let dependencies = self.dependencies.lock().clone();
        for dependency in &dependencies {
            if let DependencyOrigin::Counter { token, count } = dependency.origin() {
                token.release(*count);
                for job in token.notify_dependents() {
                    spawn_run(job);
                }
            }
        }
    }

    /// Settle into a terminal state and notify dependents on success.
    /// Errors do not propagate: downstream jobs keep waiting.
    fn finalize(&self, code: i32, done_file: bool) {
        let state = if code == 0 && done_file {
            JobState::Done
        } else {
            JobState::Error
        };
        self.transition(state);
        if state == JobState::Done {
            for job in self.notify_dependents() {
                spawn_run(job);
            }
        }
    }

    async fn adopt(
        self: &Arc<Self>,
        process: Arc<dyn Process>,
        reattached: bool,
    ) -> Result<(), EngineError> {
        if reattached {
            tracing::info!(job = %self.locator, "reattached to running process");
            self.reserve_tokens_forced();
        }
        *self.process.lock().await = Some(process.clone());
        self.transition(JobState::Running);
        let job = self.clone();
        tokio::spawn(async move {
            job.watch(process).await;
        });
        Ok(())
    }

    /// Watch the process until exit and settle the job's final state.
    async fn watch(self: Arc<Self>, process: Arc<dyn Process>) {
        let code = process.exit_code().await;
        tracing::info!(job = %self.locator, code, "job finished");
        let connector = self.launcher.connector();
        let done_file = matches!(
            connector.file_type(&self.done_path()).await,
            Ok(FileType::File)
        );
        self.release_tokens();
        self.finalize(code, done_file);
        *self.process.lock().await = None;
    }

    /// Dispatch the job: prepare its directory, write the script, spawn the
    /// process and watch it. Reuses prior on-disk state: a done file means
    /// DONE, a live pid means reattach, a stale exit-code file settles the
    /// state without a spawn.
    pub async fn run(self: Arc<Self>) -> Result<(), EngineError> {
        {
            let mut inner = self.inner.lock();
            if inner.launching
                || inner.state == JobState::Running
                || inner.unsatisfied != 0
                || !matches!(inner.state, JobState::Waiting | JobState::Ready)
            {
                return Ok(());
            }
            inner.launching = true;
        }
        let result = self.run_inner().await;
        self.inner.lock().launching = false;
        if result.is_err() {
            self.transition(JobState::Error);
        }
        result
    }

    async fn run_inner(self: &Arc<Self>) -> Result<(), EngineError> {
        let connector = self.launcher.connector();
        let directory = self.directory();
        connector.mkdirs(&directory, true, false).await?;

        if connector.file_type(&self.done_path()).await? == FileType::File {
            self.finalize(0, true);
            return Ok(());
        }
        if let Some(process) = self.launcher.check(&directory, self.name()).await? {
            if process.is_running().await {
                return self.adopt(Arc::from(process), true).await;
            }
        }
        if connector.file_type(&self.exit_code_path()).await? == FileType::File {
            let code = connector
                .read_file(&self.exit_code_path())
                .await?
                .trim()
                .parse()
                .unwrap_or(-1);
            let done_file = connector.file_type(&self.done_path()).await? == FileType::File;
            self.finalize(code, done_file);
            return Ok(());
        }

        let mut lock = connector
            .clone()
            .lock(&self.lock_path(), JOB_LOCK_TIMEOUT)
            .await?;

        // The lock may have been held by another workspace instance that
        // completed or started this job in the meantime.
        if connector.file_type(&self.done_path()).await? == FileType::File {
            lock.release().await?;
            self.finalize(0, true);
            return Ok(());
        }
        if let Some(process) = self.launcher.check(&directory, self.name()).await? {
            if process.is_running().await {
                lock.release().await?;
                return self.adopt(Arc::from(process), true).await;
            }
        }

        if !self.reserve_tokens() {
            // Out of capacity; the token release will re-trigger us.
            lock.release().await?;
            return Ok(());
        }

        let workspace = self.workspace.lock().upgrade();
        let Some(workspace) = workspace else {
            self.release_tokens();
            lock.release().await?;
            return Err(EngineError::Assertion(
                "job is not attached to a workspace".to_string(),
            ));
        };

        // Render synchronously so no registry guard is held across I/O.
        let rendered = {
            let mut builder = self.launcher.script_builder();
            builder.lock_files.push(self.lock_path());
            let registry = self.registry.read();
            builder.render(&workspace, &connector, &registry, &self.locator, self)
        };
        let prepared: Result<HostPath, EngineError> = match rendered {
            Ok(rendered) => {
                async {
                    // A stale start-lock from a crashed run is truncated,
                    // not an error: we hold the job lock.
                    connector.create_file(&self.start_lock_path(), false).await?;
                    for (path, contents) in &rendered.files {
                        connector.write_file(path, contents).await?;
                    }
                    connector
                        .write_file(&rendered.script_path, &rendered.script)
                        .await?;
                    connector.set_executable(&rendered.script_path, true).await?;
                    Ok(rendered.script_path.clone())
                }
                .await
            }
            Err(e) => Err(e),
        };
        let script = match prepared {
            Ok(script) => script,
            Err(e) => {
                self.release_tokens();
                let _ = connector.remove(&self.start_lock_path(), false).await;
                let _ = lock.release().await;
                return Err(e);
            }
        };

        let mut process_builder = self.launcher.process_builder();
        process_builder.command.push(connector.resolve(&script)?);
        process_builder.working_directory = Some(directory.clone());
        process_builder.stdout = Redirect::file(self.out_path());
        process_builder.stderr = Redirect::file(self.err_path());

        tracing::info!(job = %self.locator, "starting job");
        match process_builder.start().await {
            Ok(process) => {
                // The script's cleanup trap owns the lock file now.
                lock.detach();
                self.adopt(Arc::from(process), false).await
            }
            Err(e) => {
                self.release_tokens();
                let _ = connector.remove(&self.start_lock_path(), false).await;
                let _ = lock.release().await;
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
impl Job {
    pub(crate) fn force_state(&self, state: JobState) {
        self.inner.lock().state = state;
    }
}

/// Run a job on the runtime, logging failures (the job itself settles to
/// ERROR).
pub(crate) fn spawn_run(job: Arc<Job>) {
    tokio::spawn(async move {
        let locator = job.locator().clone();
        if let Err(e) = job.run().await {
            tracing::error!(job = %locator, error = %e, "job run failed");
        }
    });
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
