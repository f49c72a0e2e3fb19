use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use log::{debug, info};

use crate::queue::JobMessage;
use crate::worker::JobProcessor;

/// Poll interval so workers notice the shutdown flag between messages.
const RECV_TIMEOUT: Duration = Duration::from_millis(100);

/// Fixed-size pool of consumer threads sharing one message channel.
///
/// Workers drain until the channel disconnects or shutdown is requested;
/// a message already picked up is always finished before the thread exits.
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl WorkerPool {
    pub fn start(
        worker_count: usize,
        receiver: Receiver<JobMessage>,
        processor: Arc<JobProcessor>,
    ) -> Self {
        let worker_count = worker_count.max(1);
        let shutdown = Arc::new(AtomicBool::new(false));
        let mut handles = Vec::with_capacity(worker_count);

        for index in 0..worker_count {
            let receiver = receiver.clone();
            let processor = processor.clone();
            let shutdown = shutdown.clone();

            let handle = std::thread::Builder::new()
                .name(format!("ocr-worker-{index}"))
                .spawn(move || {
                    debug!("Worker {} started", index);
                    loop {
                        if shutdown.load(Ordering::Relaxed) {
                            break;
                        }
                        match receiver.recv_timeout(RECV_TIMEOUT) {
                            Ok(message) => processor.process(&message),
                            Err(RecvTimeoutError::Timeout) => continue,
                            Err(RecvTimeoutError::Disconnected) => break,
                        }
                    }
                    debug!("Worker {} stopped", index);
                })
                .expect("failed to spawn worker thread");
            handles.push(handle);
        }

        info!("Started {} OCR worker(s)", worker_count);
        Self { handles, shutdown }
    }

    pub fn worker_count(&self) -> usize {
        self.handles.len()
    }

    /// Signals shutdown and joins every worker. In-flight jobs finish first.
    pub fn shutdown(self) {
        self.shutdown.store(true, Ordering::Relaxed);
        for handle in self.handles {
            let _ = handle.join();
        }
        info!("Worker pool stopped");
    }
}
