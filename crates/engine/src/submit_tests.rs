// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::job::JobState;
use crate::test_support::{fixture, wait_for_state};
use serde_json::json;
use std::time::Duration;
use xpm_connectors::{Connector, FileType};
use xpm_core::Typename;

#[tokio::test]
async fn a_trivial_job_runs_to_done() {
    let fx = fixture();
    let value = {
        let mut registry = fx.registry.write();
        registry
            .build(&json!({ "$type": "test.Echo", "message": "hello" }))
            .unwrap()
    };
    let job = submit_task(
        &fx.workspace,
        fx.registry.clone(),
        fx.launcher.clone(),
        &Typename::new("test.echo"),
        value,
    )
    .await
    .unwrap();

    assert!(wait_for_state(&job, JobState::Done, Duration::from_secs(10)).await);

    let connector: std::sync::Arc<dyn Connector> = fx.connector.clone();
    assert_eq!(
        connector.file_type(&job.done_path()).await.unwrap(),
        FileType::File
    );
    let exit_code = connector.read_file(&job.exit_code_path()).await.unwrap();
    assert_eq!(exit_code.trim(), "0");
    // cleanup removed the transient files
    assert_eq!(
        connector.file_type(&job.start_lock_path()).await.unwrap(),
        FileType::Unexisting
    );
    assert_eq!(
        connector.file_type(&job.pid_path()).await.unwrap(),
        FileType::Unexisting
    );
    // parameters were materialized next to the script
    let params_path = job
        .directory()
        .resolve(&[&format!("{}_01.params.json", job.name())]);
    assert_eq!(
        connector.file_type(&params_path).await.unwrap(),
        FileType::File
    );
}

#[tokio::test]
async fn the_locator_derives_from_task_and_digest() {
    let fx = fixture();
    let value = {
        let mut registry = fx.registry.write();
        registry
            .build(&json!({ "$type": "test.Echo", "message": "hello" }))
            .unwrap()
    };
    let job = submit_task(
        &fx.workspace,
        fx.registry.clone(),
        fx.launcher.clone(),
        &Typename::new("test.echo"),
        value,
    )
    .await
    .unwrap();

    let jobs_dir = fx.workspace.jobs_dir();
    let locator = job.locator().raw();
    assert!(locator.starts_with(&format!("{}/test.echo/", jobs_dir.raw())));
    assert_eq!(job.name(), "echo");
    // the unique-id path segment is 40 hex chars
    let segment = locator
        .trim_start_matches(&format!("{}/test.echo/", jobs_dir.raw()))
        .trim_end_matches("/echo");
    assert_eq!(segment.len(), 40);

    assert!(wait_for_state(&job, JobState::Done, Duration::from_secs(10)).await);
}

#[tokio::test]
async fn equal_parameters_resubmit_to_the_same_job() {
    let fx = fixture();
    let build = |registry: &std::sync::Arc<parking_lot::RwLock<xpm_registry::Registry>>| {
        registry
            .write()
            .build(&json!({ "$type": "test.Echo", "message": "same" }))
            .unwrap()
    };
    let first = submit_task(
        &fx.workspace,
        fx.registry.clone(),
        fx.launcher.clone(),
        &Typename::new("test.echo"),
        build(&fx.registry),
    )
    .await
    .unwrap();
    let second = submit_task(
        &fx.workspace,
        fx.registry.clone(),
        fx.launcher.clone(),
        &Typename::new("test.echo"),
        build(&fx.registry),
    )
    .await
    .unwrap();

    assert_eq!(first.locator(), second.locator());
    assert_eq!(fx.workspace.jobs().len(), 1);
}

#[tokio::test]
async fn unknown_task_is_rejected() {
    let fx = fixture();
    let value = {
        let mut registry = fx.registry.write();
        registry.build(&json!({})).unwrap()
    };
    let err = submit_task(
        &fx.workspace,
        fx.registry.clone(),
        fx.launcher.clone(),
        &Typename::new("test.missing"),
        value,
    )
    .await;
    assert!(err.is_err());
}

#[tokio::test]
async fn invalid_parameters_abort_submission() {
    let fx = fixture();
    let value = {
        let mut registry = fx.registry.write();
        // message is required
        registry.build(&json!({ "$type": "test.Echo" })).unwrap()
    };
    let err = submit_task(
        &fx.workspace,
        fx.registry.clone(),
        fx.launcher.clone(),
        &Typename::new("test.echo"),
        value,
    )
    .await;
    assert!(err.is_err());
    assert!(fx.workspace.jobs().is_empty());
}

#[test]
fn running_guard_toggles_the_flag() {
    assert!(!task_running());
    {
        let _guard = RunningTaskGuard::new();
        assert!(task_running());
    }
    assert!(!task_running());
}
