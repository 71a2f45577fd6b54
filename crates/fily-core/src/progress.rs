// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Progress tracker: per-job conversion state shared between the dispatcher
// (writer) and status-polling callers (readers).
//
// Locking is two-level. The map lock is held only long enough to find or
// insert an entry; each entry carries its own mutex, so a slow update to one
// job never blocks another. Readers clone the whole state under the entry
// lock and therefore never observe a half-applied update.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::types::JobId;

/// Lifecycle phase of a conversion job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Initializing,
    Converting,
    Completed,
    Failed,
}

impl Phase {
    /// Completed and Failed are final; nothing moves a job out of them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Snapshot of one job's progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressState {
    pub job_id: JobId,
    /// 0..=100
    pub percent: u8,
    pub phase: Phase,
    pub message: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl ProgressState {
    fn new(job_id: JobId) -> Self {
        Self {
            job_id,
            percent: 0,
            phase: Phase::Initializing,
            message: "Starting conversion...".into(),
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    /// Time spent so far, or in total once the job has ended.
    pub fn duration(&self) -> Duration {
        let end = self.ended_at.unwrap_or_else(Utc::now);
        (end - self.started_at).to_std().unwrap_or_default()
    }

    fn apply(&mut self, percent: u8, phase: Phase, message: String) {
        self.phase = phase;
        self.message = message;
        if phase.is_terminal() {
            self.percent = 100;
            self.ended_at = Some(Utc::now());
        } else {
            self.percent = percent.min(100);
        }
    }
}

type Entry = Arc<Mutex<ProgressState>>;

/// Cloneable handle onto the shared progress registry.
#[derive(Clone, Default)]
pub struct ProgressTracker {
    entries: Arc<RwLock<HashMap<JobId, Entry>>>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job in the `initializing` phase at 0%.
    ///
    /// Starting an id that already exists resets its entry.
    pub fn start(&self, job_id: JobId) {
        let entry = self.entry(job_id);
        let mut state = entry.lock().unwrap_or_else(PoisonError::into_inner);
        *state = ProgressState::new(job_id);
        debug!(%job_id, "progress started");
    }

    /// Record a phase transition.
    ///
    /// Unknown jobs are created on first update. Updates to a job that has
    /// already reached a terminal phase are dropped.
    pub fn update(&self, job_id: JobId, percent: u8, phase: Phase, message: impl Into<String>) {
        let entry = self.entry(job_id);
        let mut state = entry.lock().unwrap_or_else(PoisonError::into_inner);
        if state.phase.is_terminal() {
            warn!(%job_id, current = ?state.phase, requested = ?phase, "ignoring update to finished job");
            return;
        }
        state.apply(percent, phase, message.into());
        debug!(%job_id, percent = state.percent, phase = ?state.phase, "progress updated");
    }

    /// Move a job to `completed` or `failed` at 100%.
    pub fn complete(&self, job_id: JobId, success: bool, message: impl Into<String>) {
        let phase = if success { Phase::Completed } else { Phase::Failed };
        self.update(job_id, 100, phase, message);
    }

    /// Snapshot of a job's state, if tracked.
    pub fn get(&self, job_id: JobId) -> Option<ProgressState> {
        let entry = {
            let map = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            map.get(&job_id).cloned()
        }?;
        let state = entry.lock().unwrap_or_else(PoisonError::into_inner);
        Some(state.clone())
    }

    /// Drop a job's entry. Retention policy belongs to the caller.
    pub fn remove(&self, job_id: JobId) -> Option<ProgressState> {
        let entry = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&job_id)?;
        let state = entry.lock().unwrap_or_else(PoisonError::into_inner);
        Some(state.clone())
    }

    /// Snapshots of every job that has not reached a terminal phase.
    pub fn active_jobs(&self) -> Vec<ProgressState> {
        let entries: Vec<Entry> = {
            let map = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            map.values().cloned().collect()
        };
        entries
            .iter()
            .map(|entry| entry.lock().unwrap_or_else(PoisonError::into_inner).clone())
            .filter(|state| !state.phase.is_terminal())
            .collect()
    }

    /// Number of tracked jobs, finished ones included.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entry(&self, job_id: JobId) -> Entry {
        if let Some(entry) = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&job_id)
        {
            return Arc::clone(entry);
        }
        let mut map = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            map.entry(job_id)
                .or_insert_with(|| Arc::new(Mutex::new(ProgressState::new(job_id)))),
        )
    }
}

/// Record progress for a job on the given tracker.
pub fn set_progress(
    tracker: &ProgressTracker,
    job_id: JobId,
    percent: u8,
    phase: Phase,
    message: impl Into<String>,
) {
    tracker.update(job_id, percent, phase, message);
}

/// Read a job's progress from the given tracker.
pub fn get_progress(tracker: &ProgressTracker, job_id: JobId) -> Option<ProgressState> {
    tracker.get(job_id)
}
