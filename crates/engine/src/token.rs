// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Counter tokens: capacity-limited resources
//!
//! Handing out a dependency does not reserve tokens; reservation happens
//! when a job enters RUN and is released on its terminal transition.

use crate::dependency::Dependency;
use crate::job::Job;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};

struct TokenInner {
    limit: u32,
    used: u32,
}

/// A token with a fixed number of slots.
pub struct CounterToken {
    inner: Mutex<TokenInner>,
    dependents: Mutex<Vec<Weak<Dependency>>>,
}

impl CounterToken {
    pub fn new(limit: u32) -> Arc<CounterToken> {
        Arc::new(CounterToken {
            inner: Mutex::new(TokenInner { limit, used: 0 }),
            dependents: Mutex::new(Vec::new()),
        })
    }

    pub fn set_limit(&self, limit: u32) {
        self.inner.lock().limit = limit;
    }

    pub fn used(&self) -> u32 {
        self.inner.lock().used
    }

    /// A dependency claiming `count` slots of this token.
    pub fn create_dependency(self: &Arc<Self>, count: u32) -> Arc<Dependency> {
        Dependency::on_counter(self.clone(), count)
    }

    /// Whether `count` more slots fit right now.
    pub(crate) fn satisfied_with(&self, count: u32) -> bool {
        let inner = self.inner.lock();
        inner.used + count <= inner.limit
    }

    /// Atomically claim `count` slots if they fit.
    pub(crate) fn try_reserve(&self, count: u32) -> bool {
        let mut inner = self.inner.lock();
        if inner.used + count > inner.limit {
            return false;
        }
        inner.used += count;
        true
    }

    /// Claim `count` slots unconditionally (reattach to a process that is
    /// already running and holds them de facto).
    pub(crate) fn reserve(&self, count: u32) {
        let mut inner = self.inner.lock();
        inner.used += count;
        if inner.used > inner.limit {
            tracing::warn!(
                used = inner.used,
                limit = inner.limit,
                "token over-committed by reattached job"
            );
        }
    }

    pub(crate) fn release(&self, count: u32) {
        let mut inner = self.inner.lock();
        inner.used = inner.used.saturating_sub(count);
    }

    pub(crate) fn add_dependent(&self, dependency: &Arc<Dependency>) {
        self.dependents.lock().push(Arc::downgrade(dependency));
    }

    /// Re-check every dependent; returns the jobs that became ready.
    /// Expired entries are pruned during iteration.
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
}

#[cfg(test)]
#[path = "token_tests.rs"]
mod tests;
