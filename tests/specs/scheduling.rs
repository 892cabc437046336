//! Dependencies, counter tokens and run ordering

use crate::prelude::*;
use serde_json::json;
use std::time::Duration;
use xpm_connectors::Connector;
use xpm_core::Scalar;
use xpm_engine::{CounterToken, JobState};

#[tokio::test]
async fn jobs_sharing_one_token_run_in_disjoint_intervals() {
    let bed = testbed();
    let token = CounterToken::new(1);

    let mut jobs = Vec::new();
    for seed in 0..2 {
        let value = bed.build(json!({ "$type": "test.Sleeper", "seed": seed }));
        let job = xpm_engine::submit_task_with(
            &bed.workspace,
            bed.registry.clone(),
            bed.launcher.clone(),
            &xpm_core::Typename::new("test.sleeper"),
            value,
            vec![token.create_dependency(1)],
        )
        .await
        .unwrap();
        jobs.push(job);
    }

    for job in &jobs {
        assert!(
            wait_for(job, JobState::Done, Duration::from_secs(20)).await,
            "job {} did not finish: {:?}",
            job.locator(),
            job.state()
        );
    }

    // read the [start, end] stamps each job wrote
    let connector: std::sync::Arc<dyn Connector> = bed.connector.clone();
    let mut intervals = Vec::new();
    for job in &jobs {
        let started: f64 = connector
            .read_file(&job.directory().resolve(&["started"]))
            .await
            .unwrap()
            .trim()
            .parse()
            .unwrap();
        let finished: f64 = connector
            .read_file(&job.directory().resolve(&["finished"]))
            .await
            .unwrap()
            .trim()
            .parse()
            .unwrap();
        assert!(finished > started);
        intervals.push((started, finished));
    }
    intervals.sort_by(|a, b| a.0.total_cmp(&b.0));
    assert!(
        intervals[0].1 <= intervals[1].0,
        "intervals overlap: {:?}",
        intervals
    );
}

#[tokio::test]
async fn consumers_wait_for_their_producer() {
    let bed = testbed();
    let producer = bed
        .submit("test.produce", bed.build(json!({ "$type": "test.Out", "tag": "p1" })))
        .await;

    let consumer_value = bed.build(json!({
        "$type": "test.Consume",
        "input": {
            "$type": "test.Out",
            "tag": "p1",
            "$job": { "locator": producer.locator().to_string() },
        },
    }));
    let consumer = bed.submit("test.consume", consumer_value).await;

    // the producer sleeps; the consumer must not outrun it
    if producer.state() != JobState::Done {
        assert!(
            !consumer.state().is_terminal(),
            "consumer finished before its producer"
        );
    }

    assert!(wait_for(&producer, JobState::Done, Duration::from_secs(10)).await);
    assert!(wait_for(&consumer, JobState::Done, Duration::from_secs(10)).await);

    // the parameter file reifies the producer's job metadata
    let params = bed
        .connector
        .read_file(
            &consumer
                .directory()
                .resolve(&[&format!("{}_01.params.json", consumer.name())]),
        )
        .await
        .unwrap();
    let params: serde_json::Value = serde_json::from_str(&params).unwrap();
    assert_eq!(
        params["input"]["$job"]["locator"],
        producer.locator().to_string()
    );
}

#[tokio::test]
async fn failing_jobs_do_not_release_their_dependents() {
    let bed = testbed();
    bed.registry
        .write()
        .load_json(&json!({
            "tasks": {
                "test.fail": { "type": "test.Out", "command": [ "exit 3" ] }
            }
        }))
        .unwrap();

    let producer = bed
        .submit("test.fail", bed.build(json!({ "$type": "test.Out", "tag": "will-fail" })))
        .await;

    let consumer_value = bed.build(json!({
        "$type": "test.Consume",
        "input": {
            "$type": "test.Out",
            "tag": "will-fail",
            "$job": { "locator": producer.locator().to_string() },
        },
    }));
    let consumer = bed.submit("test.consume", consumer_value).await;

    assert!(wait_for(&producer, JobState::Error, Duration::from_secs(10)).await);
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(consumer.state(), JobState::Waiting);
    assert_eq!(consumer.unsatisfied(), 1);

    // the exact code depends on the shell's PIPESTATUS support; it is
    // nonzero either way
    let code = bed
        .connector
        .read_file(&producer.exit_code_path())
        .await
        .unwrap();
    assert_ne!(code.trim(), "0");
}

#[tokio::test]
async fn parameters_embed_resolved_output_paths() {
    let bed = testbed();
    let job = bed
        .submit(
            "test.echo",
            bed.build(json!({ "$type": "test.Echo", "message": "with-path" })),
        )
        .await;
    assert!(wait_for(&job, JobState::Done, Duration::from_secs(10)).await);

    let params = job.parameters().unwrap();
    let out = params.as_map().unwrap().get("out").unwrap();
    assert!(matches!(
        &out.as_scalar().unwrap().scalar,
        Scalar::Path(p) if p.raw().starts_with(bed.workspace.jobs_dir().raw())
    ));
}
