// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task submission
//!
//! Binds a task onto a parameter value, derives the job locator from the
//! value's digest, validates and configures the value, harvests
//! dependencies from produced values, and hands the job to the workspace.

use crate::error::EngineError;
use crate::job::Job;
use crate::launcher::Launcher;
use crate::workspace::Workspace;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use xpm_core::{Generator, JobToken, Typename, Value, ValueError};
use xpm_registry::{CommandComponent, GeneratorContext, Registry};

/// Set while a task body executes in this process; progress reporting uses
/// it to avoid feedback loops.
static TASK_RUNNING: AtomicBool = AtomicBool::new(false);

pub fn task_running() -> bool {
    TASK_RUNNING.load(Ordering::SeqCst)
}

/// Marks the process as executing a task body for its lifetime.
pub struct RunningTaskGuard(());

impl RunningTaskGuard {
    pub fn new() -> Self {
        TASK_RUNNING.store(true, Ordering::SeqCst);
        Self(())
    }
}

impl Default for RunningTaskGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RunningTaskGuard {
    fn drop(&mut self) {
        TASK_RUNNING.store(false, Ordering::SeqCst);
    }
}

/// Submit a task over a parameter value.
///
/// The value is bound to the task, its locator is derived from the digest
/// (`jobs_dir/task-id/unique-id/local-name`), it is validated, configured
/// (generated and sealed) and registered with the workspace. Dependencies
/// on producing jobs are harvested when the command references its
/// parameters.
pub async fn submit_task(
    workspace: &Arc<Workspace>,
    registry: Arc<RwLock<Registry>>,
    launcher: Arc<dyn Launcher>,
    task_id: &Typename,
    value: Value,
) -> Result<Arc<Job>, EngineError> {
    submit_task_with(workspace, registry, launcher, task_id, value, Vec::new()).await
}

/// [`submit_task`] with additional dependencies (typically counter tokens)
/// wired before the workspace sees the job.
pub async fn submit_task_with(
    workspace: &Arc<Workspace>,
    registry: Arc<RwLock<Registry>>,
    launcher: Arc<dyn Launcher>,
    task_id: &Typename,
    mut value: Value,
    dependencies: Vec<Arc<crate::dependency::Dependency>>,
) -> Result<Arc<Job>, EngineError> {
    tracing::info!(task = %task_id, "preparing job");
    let task = {
        let registry = registry.read();
        registry
            .get_task(task_id)
            .cloned()
            .ok_or_else(|| ValueError::Argument(format!("{} is not a task", task_id)))?
    };

    {
        let map = value.as_map_mut().ok_or_else(|| {
            ValueError::Argument("task parameters must be a map".to_string())
        })?;
        map.task = Some(task.identifier.clone());
        if map.type_name.as_str() == "any" {
            map.type_name = task.output_type.clone();
        }
    }

    let ctx = GeneratorContext::for_root(workspace.jobs_dir(), &value);
    let Generator::Path { name } = task.path_generator();
    let locator = ctx.generate_path(&name);

    {
        let registry = registry.read();
        registry.validate(&mut value)?;
        registry.configure(&mut value, &ctx)?;
    }

    // The back-reference is job metadata, not content: it bypasses sealing
    // and stays out of the digest.
    if let Some(map) = value.as_map_mut() {
        map.job = Some(JobToken {
            locator: locator.clone(),
        });
    }

    let job = Job::new(
        locator,
        launcher,
        task.command_line.clone(),
        Some(value),
        registry.clone(),
    );

    for dependency in dependencies {
        job.add_dependency(dependency);
    }

    let references_parameters = task.command_line.commands.iter().any(|command| {
        command
            .components
            .iter()
            .any(|c| matches!(c, CommandComponent::Parameters))
    });
    if references_parameters {
        if let Some(parameters) = job.parameters() {
            add_parameter_dependencies(workspace, &job, &parameters);
        }
    }

    workspace.submit(job.clone()).await?;
    Ok(job)
}

/// Walk a parameter tree and depend on every producing job it references.
///
/// Ignorable values contribute nothing; a produced value is depended on as
/// a whole, without descending into it.
fn add_parameter_dependencies(workspace: &Arc<Workspace>, job: &Arc<Job>, value: &Value) {
    if value.can_ignore() {
        return;
    }
    if let Value::Map(map) = value {
        if let Some(token) = &map.job {
            if &token.locator != job.locator() {
                match workspace.job(&token.locator) {
                    Some(origin) => {
                        tracing::info!(origin = %token.locator, "found dependency resource");
                        job.add_dependency(origin.create_dependency());
                    }
                    None => {
                        tracing::warn!(origin = %token.locator, "parameter references an unknown job");
                    }
                }
                return;
            }
        }
    }
    value.for_each_child(&mut |child| add_parameter_dependencies(workspace, job, child));
}

#[cfg(test)]
#[path = "submit_tests.rs"]
mod tests;
