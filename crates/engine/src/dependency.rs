// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dependencies: edges of the readiness DAG
//!
//! A dependency joins an origin resource to a target job with a
//! satisfiability predicate. `check()` compares the predicate against the
//! cached flag under the dependency's mutex and forwards a change to the
//! target; the caller runs any job that became ready.

use crate::job::{Job, JobState};
use crate::token::CounterToken;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};

/// The resource a dependency waits on.
pub enum DependencyOrigin {
    Job(Arc<Job>),
    Counter { token: Arc<CounterToken>, count: u32 },
}

/// An edge `origin → target` in the readiness DAG.
pub struct Dependency {
    origin: DependencyOrigin,
    target: Mutex<Weak<Job>>,
    old_satisfied: Mutex<bool>,
}

impl Dependency {
    /// Satisfied when the origin job is DONE.
    pub fn on_job(origin: Arc<Job>) -> Arc<Dependency> {
        let dependency = Arc::new(Dependency {
            origin: DependencyOrigin::Job(origin.clone()),
            target: Mutex::new(Weak::new()),
            old_satisfied: Mutex::new(false),
        });
        origin.add_dependent(&dependency);
        dependency
    }

    /// Satisfied when `count` more slots fit in the token.
    pub fn on_counter(token: Arc<CounterToken>, count: u32) -> Arc<Dependency> {
        let dependency = Arc::new(Dependency {
            origin: DependencyOrigin::Counter {
                token: token.clone(),
                count,
            },
            target: Mutex::new(Weak::new()),
            old_satisfied: Mutex::new(false),
        });
        token.add_dependent(&dependency);
        dependency
    }

    pub fn origin(&self) -> &DependencyOrigin {
        &self.origin
    }

    pub(crate) fn set_target(&self, job: &Arc<Job>) {
        *self.target.lock() = Arc::downgrade(job);
    }

    /// Current satisfiability of the predicate.
    pub fn satisfied(&self) -> bool {
        match &self.origin {
            DependencyOrigin::Job(job) => job.state() == JobState::Done,
            DependencyOrigin::Counter { token, count } => token.satisfied_with(*count),
        }
    }

    /// Re-evaluate the predicate and overwrite the cached flag without
    /// notifying the target. Returns the new satisfiability.
    ///
    /// Resubmission rebuilds the target's counters wholesale, so the
    /// per-edge notification would double-count.
    pub fn reset(&self) -> bool {
        let now = self.satisfied();
        *self.old_satisfied.lock() = now;
        now
    }

    /// Re-evaluate the predicate; on change, update the cached flag and
    /// notify the target. Returns the target when it became ready.
    pub fn check(self: &Arc<Self>) -> Option<Arc<Job>> {
        let mut old = self.old_satisfied.lock();
        let now = self.satisfied();
        if now == *old {
            return None;
        }
        *old = now;
        drop(old);

        let target = self.target.lock().upgrade()?;
        if target.apply_dependency_change(now) {
            Some(target)
        } else {
            None
        }
    }
}

#[cfg(test)]
#[path = "dependency_tests.rs"]
mod tests;
