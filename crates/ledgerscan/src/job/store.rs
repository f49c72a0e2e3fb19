//! Job record store: the single writer surface for job lifecycle updates.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::WorkerError;
use crate::job::record::{JobStatus, OcrJob};

/// Durable-record collaborator for OCR jobs. The pipeline only ever appends
/// status/field updates; records are never deleted by this subsystem except
/// for queued-job cancellation.
pub trait JobStore: Send + Sync {
    /// Inserts a new job and assigns its internal record id.
    fn insert(&self, job: OcrJob) -> OcrJob;

    /// Tenant-scoped lookup by external job id.
    fn get(&self, job_id: &str, organization_id: &str) -> Option<OcrJob>;

    /// Applies a mutation to the stored job under the store's lock.
    fn update(
        &self,
        job_id: &str,
        f: &mut dyn FnMut(&mut OcrJob) -> Result<(), WorkerError>,
    ) -> Result<OcrJob, WorkerError>;

    /// Removes the job if it is still pending. Returns whether a record was
    /// removed. Used for queued-job cancellation only.
    fn remove_if_pending(&self, job_id: &str, organization_id: &str) -> bool;
}

/// In-memory store. Production deployments put a database behind the
/// `JobStore` trait; this implementation backs tests and single-node use.
pub struct MemoryJobStore {
    inner: RwLock<Inner>,
}

struct Inner {
    jobs: HashMap<String, OcrJob>,
    next_record_id: i64,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                jobs: HashMap::new(),
                next_record_id: 1,
            }),
        }
    }

    /// Number of stored jobs, regardless of status.
    pub fn len(&self) -> usize {
        self.inner.read().map(|g| g.jobs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All jobs for one organization, newest record first.
    pub fn list(&self, organization_id: &str) -> Vec<OcrJob> {
        let guard = match self.inner.read() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut jobs: Vec<OcrJob> = guard
            .jobs
            .values()
            .filter(|job| job.organization_id == organization_id)
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.record_id.cmp(&a.record_id));
        jobs
    }
}

impl Default for MemoryJobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl JobStore for MemoryJobStore {
    fn insert(&self, mut job: OcrJob) -> OcrJob {
        let mut guard = match self.inner.write() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        job.record_id = guard.next_record_id;
        guard.next_record_id += 1;
        guard.jobs.insert(job.job_id.clone(), job.clone());
        job
    }

    fn get(&self, job_id: &str, organization_id: &str) -> Option<OcrJob> {
        let guard = match self.inner.read() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard
            .jobs
            .get(job_id)
            .filter(|job| job.organization_id == organization_id)
            .cloned()
    }

    fn update(
        &self,
        job_id: &str,
        f: &mut dyn FnMut(&mut OcrJob) -> Result<(), WorkerError>,
    ) -> Result<OcrJob, WorkerError> {
        let mut guard = match self.inner.write() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        let job = guard
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| WorkerError::JobNotFound(job_id.to_string()))?;
        f(job)?;
        Ok(job.clone())
    }

    fn remove_if_pending(&self, job_id: &str, organization_id: &str) -> bool {
        let mut guard = match self.inner.write() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        let removable = guard
            .jobs
            .get(job_id)
            .map(|job| job.organization_id == organization_id && job.status == JobStatus::Pending)
            .unwrap_or(false);
        if removable {
            guard.jobs.remove(job_id);
        }
        removable
    }
}
