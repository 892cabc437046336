// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task-side progress reporting
//!
//! A dedicated notifier thread sleeps up to the tick interval or until an
//! update crosses the transmit threshold, then issues
//! `GET <url>?progress=<fraction>` with a short connect timeout. Transport
//! failures are logged and ignored.

use parking_lot::{Condvar, Mutex};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

/// Maximum silence between transmissions.
const TICK_INTERVAL: Duration = Duration::from_secs(5);

/// Change that triggers an immediate transmission (1% of full scale).
const TRANSMIT_THRESHOLD: f64 = 0.01;

/// Change that triggers a log line (5% of full scale).
const LOG_THRESHOLD: f64 = 0.05;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(1);

struct ProgressState {
    current: f64,
    last_sent: Option<f64>,
    last_logged: f64,
    shutdown: bool,
}

struct Shared {
    state: Mutex<ProgressState>,
    wake: Condvar,
}

/// Whether a tick should transmit: the change exceeds the threshold, or
/// the tick interval elapsed since the last transmission.
fn should_transmit(current: f64, last_sent: Option<f64>, since_last: Duration) -> bool {
    match last_sent {
        None => true,
        Some(last) => (current - last).abs() > TRANSMIT_THRESHOLD || since_last >= TICK_INTERVAL,
    }
}

/// Reports job progress to the workspace notification endpoint.
pub struct ProgressReporter {
    shared: Arc<Shared>,
}

impl ProgressReporter {
    pub fn new(url: impl Into<String>) -> Self {
        let shared = Arc::new(Shared {
            state: Mutex::new(ProgressState {
                current: 0.0,
                last_sent: None,
                last_logged: 0.0,
                shutdown: false,
            }),
            wake: Condvar::new(),
        });
        let url = url.into();
        let thread_shared = shared.clone();
        let spawned = std::thread::Builder::new()
            .name("xpm-progress".to_string())
            .spawn(move || notifier_loop(thread_shared, url));
        if let Err(e) = spawned {
            tracing::warn!(error = %e, "could not start progress notifier thread");
        }
        Self { shared }
    }

    /// Reporter configured from `XPM_NOTIFICATION_URL`, if set.
    pub fn from_env() -> Option<Self> {
        match std::env::var("XPM_NOTIFICATION_URL") {
            Ok(url) if !url.is_empty() => Some(Self::new(url)),
            _ => {
                tracing::warn!("XPM_NOTIFICATION_URL environment variable is not defined");
                None
            }
        }
    }

    /// Store a new progress fraction, clamped to [0, 1]. Wakes the notifier
    /// when the change crosses the transmit threshold.
    pub fn update(&self, progress: f64) {
        let progress = progress.clamp(0.0, 1.0);
        let mut state = self.shared.state.lock();
        state.current = progress;
        if (progress - state.last_logged).abs() >= LOG_THRESHOLD {
            tracing::info!(progress, "task progress");
            state.last_logged = progress;
        }
        let crossed = match state.last_sent {
            None => true,
            Some(last) => (progress - last).abs() > TRANSMIT_THRESHOLD,
        };
        if crossed {
            self.shared.wake.notify_all();
        }
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        self.shared.state.lock().shutdown = true;
        self.shared.wake.notify_all();
    }
}

fn notifier_loop(shared: Arc<Shared>, url: String) {
    let client = match reqwest::blocking::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(Duration::from_secs(2))
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            tracing::warn!(error = %e, "could not build notification client");
            return;
        }
    };

    let notify = |value: f64| {
        let target = format!("{}?progress={}", url, value);
        tracing::debug!(progress = value, "notifying progress");
        if let Err(e) = client.get(&target).send() {
            tracing::warn!(error = %e, "progress notification failed");
        }
    };

    // First notification announces the job is alive.
    notify(0.0);
    let mut last_transmission = Instant::now();

    loop {
        let value = {
            let mut state = shared.state.lock();
            let _ = shared.wake.wait_for(&mut state, TICK_INTERVAL);
            if state.shutdown {
                return;
            }
            let current = state.current;
            if !should_transmit(current, state.last_sent, last_transmission.elapsed()) {
                continue;
            }
            state.last_sent = Some(current);
            current
        };
        notify(value);
        last_transmission = Instant::now();
    }
}

/// Report progress of the current task, lazily wiring the reporter from
/// the environment.
pub fn progress(value: f64) {
    static GLOBAL: OnceLock<Option<ProgressReporter>> = OnceLock::new();
    if let Some(reporter) = GLOBAL.get_or_init(ProgressReporter::from_env) {
        reporter.update(value);
    }
}

#[cfg(test)]
#[path = "progress_tests.rs"]
mod tests;
