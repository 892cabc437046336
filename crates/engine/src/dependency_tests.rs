// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::launcher::DirectLauncher;
use crate::token::CounterToken;
use parking_lot::RwLock;
use xpm_connectors::LocalConnector;
use xpm_core::HostPath;
use xpm_registry::{CommandLine, Registry};

fn test_job(name: &str) -> Arc<Job> {
    let launcher = Arc::new(DirectLauncher::new(LocalConnector::new()));
    Job::new(
        HostPath::local(format!("/tmp/xpm-test/{}/x", name)),
        launcher,
        CommandLine::new(),
        None,
        Arc::new(RwLock::new(Registry::new())),
    )
}

#[test]
fn job_dependency_is_satisfied_by_done_only() {
    let origin = test_job("origin");
    let dependency = origin.create_dependency();
    for state in [
        JobState::Waiting,
        JobState::Ready,
        JobState::Running,
        JobState::Error,
    ] {
        origin.force_state(state);
        assert!(!dependency.satisfied(), "{:?} must not satisfy", state);
    }
    origin.force_state(JobState::Done);
    assert!(dependency.satisfied());
}

#[test]
fn check_reports_the_target_once_ready() {
    let origin = test_job("origin");
    let target = test_job("target");
    let dependency = origin.create_dependency();
    target.add_dependency(dependency.clone());
    assert_eq!(target.unsatisfied(), 1);
    assert_eq!(target.state(), JobState::Waiting);

    // no change: still unsatisfied
    assert!(dependency.check().is_none());

    origin.force_state(JobState::Done);
    let ready = dependency.check();
    assert!(ready.is_some());
    assert_eq!(target.unsatisfied(), 0);
    assert_eq!(target.state(), JobState::Ready);

    // the cached flag absorbs repeated checks
    assert!(dependency.check().is_none());
    assert_eq!(target.unsatisfied(), 0);
}

#[test]
fn wiring_settles_an_already_satisfied_dependency() {
    let origin = test_job("origin");
    origin.force_state(JobState::Done);
    let target = test_job("target");
    target.add_dependency(origin.create_dependency());
    assert_eq!(target.unsatisfied(), 0);
    assert!(target.ready());
}

#[test]
fn unsatisfying_a_ready_job_parks_it() {
    let token = CounterToken::new(1);
    let target = test_job("target");
    target.add_dependency(token.create_dependency(1));
    assert!(target.ready());

    // capacity stolen: the notification re-parks the target
    assert!(token.try_reserve(1));
    let ready = token.notify_dependents();
    assert!(ready.is_empty());
    assert_eq!(target.state(), JobState::Waiting);
    assert_eq!(target.unsatisfied(), 1);

    token.release(1);
    let ready = token.notify_dependents();
    assert_eq!(ready.len(), 1);
    assert_eq!(target.state(), JobState::Ready);
}

#[test]
fn reset_refreshes_the_cached_flag_without_notifying() {
    let origin = test_job("origin");
    let target = test_job("target");
    let dependency = origin.create_dependency();
    target.add_dependency(dependency.clone());
    assert_eq!(target.unsatisfied(), 1);

    origin.force_state(JobState::Done);
    assert!(dependency.reset());
    // the target's counter was not touched
    assert_eq!(target.unsatisfied(), 1);
    // and the refreshed flag absorbs the next check
    assert!(dependency.check().is_none());
    assert_eq!(target.unsatisfied(), 1);

    origin.force_state(JobState::Error);
    assert!(!dependency.reset());
}

#[test]
fn dropped_dependencies_are_pruned_from_the_origin() {
    let origin = test_job("origin");
    {
        let target = test_job("target");
        target.add_dependency(origin.create_dependency());
    }
    // target and its dependencies dropped; notification prunes the edge
    origin.force_state(JobState::Done);
    assert!(origin.notify_dependents().is_empty());
}
