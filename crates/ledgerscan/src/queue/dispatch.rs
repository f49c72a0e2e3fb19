use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use log::{info, warn};

use crate::error::{LedgerscanError, QueueError};
use crate::job::{JobStore, OcrJob};
use crate::queue::{JobMessage, MessageBroker};
use crate::storage::ObjectStorage;

/// How long the service waits before re-probing an unreachable broker.
const REPROBE_INTERVAL: Duration = Duration::from_secs(30);

/// Storage folder uploaded documents land in.
const UPLOAD_FOLDER: &str = "ocr";

/// Front door of the pipeline: accepts a file, creates the job record and
/// publishes the queue message. Also the read surface for status polling and
/// queued-job cancellation.
pub struct DispatchService {
    store: Arc<dyn JobStore>,
    storage: Arc<dyn ObjectStorage>,
    broker: Arc<dyn MessageBroker>,
    /// Broker reachability, probed at startup and re-probed on a fixed
    /// interval while unreachable. Publish attempts fail fast when false.
    broker_reachable: AtomicBool,
    last_probe: Mutex<Instant>,
    reprobe_interval: Duration,
}

impl DispatchService {
    pub fn new(
        store: Arc<dyn JobStore>,
        storage: Arc<dyn ObjectStorage>,
        broker: Arc<dyn MessageBroker>,
    ) -> Self {
        let reachable = broker.probe();
        if !reachable {
            warn!("Message broker unreachable at startup");
        }
        Self {
            store,
            storage,
            broker,
            broker_reachable: AtomicBool::new(reachable),
            last_probe: Mutex::new(Instant::now()),
            reprobe_interval: REPROBE_INTERVAL,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_reprobe_interval(mut self, interval: Duration) -> Self {
        self.reprobe_interval = interval;
        self
    }

    pub fn broker_reachable(&self) -> bool {
        self.broker_reachable.load(Ordering::Relaxed)
    }

    /// Uploads the file, creates a pending job and publishes its message.
    ///
    /// A publish failure transitions the job to failed before the error is
    /// returned, so no record is ever left silently stuck in pending.
    pub fn enqueue(
        &self,
        bytes: &[u8],
        filename: &str,
        mime_type: Option<String>,
        organization_id: &str,
        user_id: Option<String>,
    ) -> Result<OcrJob, LedgerscanError> {
        let _span = tracing::info_span!("dispatch.enqueue",
            organization_id = %organization_id,
            filename = %filename,
        )
        .entered();

        self.ensure_reachable()?;

        let stored = self
            .storage
            .upload(bytes, organization_id, UPLOAD_FOLDER, filename)?;

        let job = OcrJob::new(
            organization_id.to_string(),
            user_id,
            filename.to_string(),
            stored.key.clone(),
            mime_type,
            stored.size,
        );
        let job = self.store.insert(job);

        let message = JobMessage {
            job_id: job.job_id.clone(),
            organization_id: job.organization_id.clone(),
            storage_key: job.storage_key.clone(),
            filename: job.filename.clone(),
            mime_type: job.mime_type.clone(),
        };

        if let Err(e) = self.broker.publish(message) {
            self.broker_reachable.store(false, Ordering::Relaxed);
            let reason = format!("Failed to publish OCR job to queue: {e}");
            // Best effort: the record may already be gone; the publish error
            // is what the caller needs either way.
            let _ = self
                .store
                .update(&job.job_id, &mut |j| j.mark_failed(reason.clone()));
            warn!("Job {} failed at publish: {}", job.job_id, e);
            return Err(LedgerscanError::Queue(e));
        }

        info!(
            "Enqueued OCR job {} for organization {} ({} bytes)",
            job.job_id, organization_id, stored.size
        );

        self.store
            .get(&job.job_id, organization_id)
            .ok_or_else(|| {
                LedgerscanError::Worker(crate::error::WorkerError::JobNotFound(job.job_id.clone()))
            })
    }

    /// Read-only, tenant-scoped status lookup.
    pub fn get_status(&self, job_id: &str, organization_id: &str) -> Option<OcrJob> {
        self.store.get(job_id, organization_id)
    }

    /// Removes a job that has not been picked up yet. Returns false when the
    /// job is unknown, belongs to another tenant, or is already in flight.
    pub fn cancel(&self, job_id: &str, organization_id: &str) -> bool {
        let removed = self.store.remove_if_pending(job_id, organization_id);
        if removed {
            info!("Cancelled queued job {}", job_id);
        }
        removed
    }

    /// Fails fast while the broker is unreachable, re-probing at most once
    /// per interval so a recovered broker is picked up without blocking
    /// every caller on a network check.
    fn ensure_reachable(&self) -> Result<(), QueueError> {
        if self.broker_reachable.load(Ordering::Relaxed) {
            return Ok(());
        }

        let due = {
            let mut last = match self.last_probe.lock() {
                Ok(g) => g,
                Err(poisoned) => poisoned.into_inner(),
            };
            if last.elapsed() >= self.reprobe_interval {
                *last = Instant::now();
                true
            } else {
                false
            }
        };

        if due && self.broker.probe() {
            info!("Message broker reachable again");
            self.broker_reachable.store(true, Ordering::Relaxed);
            return Ok(());
        }

        Err(QueueError::BrokerUnreachable { retryable: true })
    }
}
