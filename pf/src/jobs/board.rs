//! Job board - the client-facing status surface
//!
//! Value snapshots out, closure updates in. There is no subscription
//! machinery: clients poll, and every read is a clone taken under the lock.
//! Terminal states are final; updates against a finished record are refused.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::warn;

use crate::domain::{BatchJob, Job};

#[derive(Default)]
struct BoardInner {
    jobs: HashMap<String, Job>,
    batches: HashMap<String, BatchJob>,
}

/// Shared registry of jobs and batch jobs
#[derive(Clone, Default)]
pub struct JobBoard {
    inner: Arc<Mutex<BoardInner>>,
}

impl JobBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_job(&self, job: Job) {
        self.lock().jobs.insert(job.id.clone(), job);
    }

    /// Snapshot of one job, if known
    pub fn job(&self, id: &str) -> Option<Job> {
        self.lock().jobs.get(id).cloned()
    }

    /// Apply an update to a job. Returns false (and leaves the record
    /// untouched) when the job is unknown or already terminal.
    pub fn update_job(&self, id: &str, update: impl FnOnce(&mut Job)) -> bool {
        let mut inner = self.lock();
        match inner.jobs.get_mut(id) {
            Some(job) if job.status.is_terminal() => {
                warn!(%id, status = %job.status, "Refusing update to terminal job");
                false
            }
            Some(job) => {
                update(job);
                job.touch();
                true
            }
            None => {
                warn!(%id, "Update for unknown job");
                false
            }
        }
    }

    pub fn insert_batch(&self, batch: BatchJob) {
        self.lock().batches.insert(batch.id.clone(), batch);
    }

    pub fn batch(&self, id: &str) -> Option<BatchJob> {
        self.lock().batches.get(id).cloned()
    }

    pub fn update_batch(&self, id: &str, update: impl FnOnce(&mut BatchJob)) -> bool {
        let mut inner = self.lock();
        match inner.batches.get_mut(id) {
            Some(batch) if batch.status.is_terminal() => {
                warn!(%id, status = %batch.status, "Refusing update to terminal batch");
                false
            }
            Some(batch) => {
                update(batch);
                batch.touch();
                true
            }
            None => {
                warn!(%id, "Update for unknown batch");
                false
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, BoardInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
