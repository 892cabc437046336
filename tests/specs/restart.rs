//! Crash/restart semantics: reattaching to live processes through the
//! on-disk state files.

use crate::prelude::*;
use serde_json::json;
use std::time::Duration;
use xpm_connectors::{Connector, FileType};
use xpm_engine::JobState;

#[tokio::test]
async fn a_second_workspace_reattaches_to_a_running_job() {
    let bed = testbed();

    // first workspace: a job that blocks on a wake-up file
    let first = bed
        .submit("test.wait", bed.build(json!({ "$type": "test.Wait" })))
        .await;
    assert!(
        wait_for(&first, JobState::Running, Duration::from_secs(10)).await,
        "first job never started"
    );
    // RUNNING is observed at spawn; give the script a moment to write its
    // pid file before the second workspace looks for it
    let connector: std::sync::Arc<dyn Connector> = bed.connector.clone();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while connector.file_type(&first.pid_path()).await.unwrap() != FileType::File {
        assert!(
            tokio::time::Instant::now() < deadline,
            "pid file never appeared"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    let original_pid = connector.read_file(&first.pid_path()).await.unwrap();

    // a second workspace over the same directory submits the identical job
    let second_workspace = bed.reopen_workspace();
    let second = bed
        .submit_to(
            &second_workspace,
            "test.wait",
            bed.build(json!({ "$type": "test.Wait" })),
        )
        .await;
    assert_eq!(second.locator(), first.locator());
    assert!(
        wait_for(&second, JobState::Running, Duration::from_secs(10)).await,
        "second workspace did not reattach"
    );
    // reattach, not a second spawn: the pid file is untouched
    assert_eq!(
        connector.read_file(&first.pid_path()).await.unwrap(),
        original_pid
    );

    // wake the job up; both views settle to DONE
    connector
        .write_file(&first.directory().resolve(&["wake"]), "")
        .await
        .unwrap();
    assert!(
        wait_for(&first, JobState::Done, Duration::from_secs(10)).await,
        "first workspace job did not finish"
    );
    assert!(
        wait_for(&second, JobState::Done, Duration::from_secs(10)).await,
        "second workspace job did not observe completion"
    );
    assert_eq!(
        connector.file_type(&first.done_path()).await.unwrap(),
        FileType::File
    );
}

#[tokio::test]
async fn a_completed_directory_short_circuits_to_done() {
    let bed = testbed();
    let first = bed
        .submit(
            "test.echo",
            bed.build(json!({ "$type": "test.Echo", "message": "precomputed" })),
        )
        .await;
    assert!(wait_for(&first, JobState::Done, Duration::from_secs(10)).await);
    let script_mtime = std::fs::metadata(
        first
            .script_path()
            .local_path()
            .unwrap(),
    )
    .unwrap()
    .modified()
    .unwrap();

    // resubmitting the same parameters in a fresh workspace reuses the
    // completed directory without spawning anything
    let second_workspace = bed.reopen_workspace();
    let second = bed
        .submit_to(
            &second_workspace,
            "test.echo",
            bed.build(json!({ "$type": "test.Echo", "message": "precomputed" })),
        )
        .await;
    assert!(wait_for(&second, JobState::Done, Duration::from_secs(5)).await);
    let after = std::fs::metadata(second.script_path().local_path().unwrap())
        .unwrap()
        .modified()
        .unwrap();
    assert_eq!(script_mtime, after, "the script was rewritten");
}

#[tokio::test]
async fn a_stale_error_exit_code_settles_to_error() {
    let bed = testbed();
    let connector: std::sync::Arc<dyn Connector> = bed.connector.clone();

    // fabricate a job directory from a crashed previous run
    let value = bed.build(json!({ "$type": "test.Echo", "message": "crashed" }));
    let id = xpm_core::digest::unique_identifier(&{
        let mut v = value.clone();
        v.as_map_mut().unwrap().task = Some(xpm_core::Typename::new("test.echo"));
        v
    });
    let dir = bed.workspace.jobs_dir().resolve(&["test.echo", &id]);
    connector.mkdirs(&dir, true, false).await.unwrap();
    connector
        .write_file(&dir.resolve(&["echo.exit_code"]), "9\n")
        .await
        .unwrap();

    let job = bed.submit("test.echo", value).await;
    assert_eq!(job.directory(), dir);
    assert!(
        wait_for(&job, JobState::Error, Duration::from_secs(5)).await,
        "stale exit code was not observed: {:?}",
        job.state()
    );
}

#[tokio::test]
async fn resubmission_clears_state_files_and_reruns() {
    let bed = testbed();
    bed.registry
        .write()
        .load_json(&json!({
            "tasks": {
                "test.flaky": { "type": "test.Out", "command": [ "test -f succeed" ] }
            }
        }))
        .unwrap();

    let job = bed
        .submit("test.flaky", bed.build(json!({ "$type": "test.Out", "tag": "flaky" })))
        .await;
    assert!(wait_for(&job, JobState::Error, Duration::from_secs(10)).await);

    // make the next attempt succeed, then resubmit
    let connector: std::sync::Arc<dyn Connector> = bed.connector.clone();
    connector
        .write_file(&job.directory().resolve(&["succeed"]), "")
        .await
        .unwrap();
    job.resubmit().await.unwrap();
    assert!(
        wait_for(&job, JobState::Done, Duration::from_secs(10)).await,
        "resubmitted job did not rerun: {:?}",
        job.state()
    );
}
