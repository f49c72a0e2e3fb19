use std::sync::Arc;

use log::{info, warn};

use crate::categorize::CategorySuggestor;
use crate::config::Config;
use crate::error::ProcessError;
use crate::extract::{ExtractionResult, FieldExtractor};
use crate::job::{JobStore, OcrJob};
use crate::ocr::{Extraction, OcrEngine, OcrInput};
use crate::queue::JobMessage;
use crate::raster::{DocumentRasterizer, RasterOutcome};
use crate::select::select_invoice_page;
use crate::storage::ObjectStorage;

/// Reliability attached to embedded PDF text, which skipped OCR entirely.
const EMBEDDED_TEXT_CONFIDENCE: f32 = 0.6;

/// Cap on the raw-text excerpt kept in diagnostics.
const RAW_TEXT_DIAGNOSTIC_LEN: usize = 400;

/// Progress checkpoints reported over a job's lifetime. Picked-up jobs start
/// at 10 (set by `mark_processing`) and completion pins 100.
const PROGRESS_FETCHED: u8 = 30;
const PROGRESS_TEXT_READY: u8 = 60;
const PROGRESS_EXTRACTED: u8 = 90;

/// Runs one OCR job from message to terminal state.
///
/// Processing is deliberately total: every failure path marks the job failed
/// with a reason instead of leaving it stuck in processing, and redelivered
/// messages for finished jobs are skipped without side effects.
pub struct JobProcessor {
    store: Arc<dyn JobStore>,
    storage: Arc<dyn ObjectStorage>,
    engine: OcrEngine,
    rasterizer: DocumentRasterizer,
    extractor: FieldExtractor,
    suggestor: CategorySuggestor,
}

impl JobProcessor {
    pub fn new(
        store: Arc<dyn JobStore>,
        storage: Arc<dyn ObjectStorage>,
        engine: OcrEngine,
        rasterizer: DocumentRasterizer,
        extractor: FieldExtractor,
        suggestor: CategorySuggestor,
    ) -> Self {
        Self {
            store,
            storage,
            engine,
            rasterizer,
            extractor,
            suggestor,
        }
    }

    /// Convenience constructor wiring every stage from configuration.
    pub fn from_config(
        config: &Config,
        store: Arc<dyn JobStore>,
        storage: Arc<dyn ObjectStorage>,
        suggestor: CategorySuggestor,
    ) -> Self {
        let mut rasterizer = DocumentRasterizer::from_config(&config.raster);
        if let Some(ref dir) = config.artifact_directory {
            rasterizer = rasterizer.with_artifacts(crate::storage::ArtifactStore::new(dir));
        }

        Self::new(
            store,
            storage,
            OcrEngine::from_config(&config.ocr),
            rasterizer,
            FieldExtractor::new(config.default_vat_rate),
            suggestor,
        )
    }

    /// Processes one queue message. Errors returned here are operational
    /// (store inconsistencies); document-level failures end up on the job
    /// record instead.
    pub fn process(&self, message: &JobMessage) {
        let _span = tracing::info_span!("worker.process", job_id = %message.job_id).entered();

        let Some(job) = self.store.get(&message.job_id, &message.organization_id) else {
            // Cancelled between publish and pickup.
            info!("Job {} no longer exists, dropping message", message.job_id);
            return;
        };

        if job.status.is_terminal() {
            info!(
                "Job {} already {}, skipping redelivery",
                job.job_id,
                job.status.as_str()
            );
            return;
        }

        if let Err(e) = self
            .store
            .update(&message.job_id, &mut |j| j.mark_processing())
        {
            // Another worker holds the job; the message is a duplicate.
            warn!("Job {} not picked up: {}", message.job_id, e);
            return;
        }

        match self.run(&job) {
            Ok(result) => {
                let outcome = self
                    .store
                    .update(&job.job_id, &mut |j| j.mark_completed(result.clone()));
                match outcome {
                    Ok(_) => info!("Job {} completed", job.job_id),
                    Err(e) => warn!("Job {} finished but could not be recorded: {}", job.job_id, e),
                }
            }
            Err(e) => {
                warn!("Job {} failed: {}", job.job_id, e);
                let reason = e.to_string();
                if let Err(e) = self
                    .store
                    .update(&job.job_id, &mut |j| j.mark_failed(reason.clone()))
                {
                    warn!("Job {} failure could not be recorded: {}", job.job_id, e);
                }
            }
        }
    }

    fn run(&self, job: &OcrJob) -> Result<ExtractionResult, ProcessError> {
        let bytes = self
            .storage
            .download(&job.storage_key)
            .map_err(|e| ProcessError::OcrFailed(format!("Failed to fetch document: {e}")))?;
        self.report_progress(&job.job_id, PROGRESS_FETCHED);

        let mime_type = job.mime_type.as_deref().unwrap_or("");

        let (extraction, page_diagnostics) = if job.is_pdf() {
            self.extract_from_pdf(job, &bytes)?
        } else if mime_type.starts_with("image/") {
            let extraction = self.engine.extract(&OcrInput {
                bytes: &bytes,
                mime_type,
                filename: &job.filename,
            });
            (extraction, Vec::new())
        } else {
            return Err(ProcessError::UnsupportedType(
                job.mime_type.clone().unwrap_or_else(|| "unknown".to_string()),
            ));
        };
        self.report_progress(&job.job_id, PROGRESS_TEXT_READY);

        if extraction.text.trim().is_empty() {
            return Err(ProcessError::NoText(job.filename.clone()));
        }

        let mut result = self.extractor.extract(&extraction.text);
        self.report_progress(&job.job_id, PROGRESS_EXTRACTED);

        result.confidence = extraction.confidence;
        result.suggested_category = self
            .suggestor
            .suggest(&job.organization_id, &extraction.text);

        result
            .diagnostics
            .insert("provider".to_string(), extraction.provider.to_string());
        result.diagnostics.insert(
            "rawText".to_string(),
            truncated(&extraction.text, RAW_TEXT_DIAGNOSTIC_LEN),
        );
        for (key, value) in page_diagnostics {
            result.diagnostics.insert(key, value);
        }

        Ok(result)
    }

    /// PDF path: embedded text short-circuits OCR; scanned documents are
    /// rasterized, OCRed page by page, and reduced to the invoice page.
    fn extract_from_pdf(
        &self,
        job: &OcrJob,
        bytes: &[u8],
    ) -> Result<(Extraction, Vec<(String, String)>), ProcessError> {
        match self.rasterizer.rasterize(&job.job_id, bytes)? {
            RasterOutcome::EmbeddedText(text) => Ok((
                Extraction {
                    text,
                    confidence: EMBEDDED_TEXT_CONFIDENCE,
                    provider: "embedded-text",
                },
                vec![("pageCount".to_string(), "1".to_string())],
            )),
            RasterOutcome::Pages(pages) => {
                let mut page_texts: Vec<(u32, String)> = Vec::with_capacity(pages.len());
                let mut provider = self.engine.primary_name();
                let mut confidence = 0.0f32;

                for page in &pages {
                    // Blank pages skip OCR but stay in the page set.
                    if page.blank {
                        page_texts.push((page.page_number, String::new()));
                        continue;
                    }
                    let extraction = self.engine.extract(&OcrInput {
                        bytes: &page.png,
                        mime_type: "image/png",
                        filename: &job.filename,
                    });
                    provider = extraction.provider;
                    confidence = confidence.max(extraction.confidence);
                    page_texts.push((page.page_number, extraction.text));
                }

                let borrowed: Vec<(u32, &str)> = page_texts
                    .iter()
                    .map(|(n, t)| (*n, t.as_str()))
                    .collect();
                let selection = select_invoice_page(&borrowed);

                let text = page_texts
                    .iter()
                    .find(|(n, _)| *n == selection.page_number)
                    .map(|(_, t)| t.clone())
                    .unwrap_or_default();

                let scores = selection
                    .scores
                    .iter()
                    .map(|s| format!("{}:{}", s.page_number, s.score))
                    .collect::<Vec<_>>()
                    .join(",");

                Ok((
                    Extraction {
                        text,
                        confidence,
                        provider,
                    },
                    vec![
                        ("pageCount".to_string(), pages.len().to_string()),
                        ("selectedPage".to_string(), selection.page_number.to_string()),
                        ("pageScores".to_string(), scores),
                    ],
                ))
            }
        }
    }

    fn report_progress(&self, job_id: &str, progress: u8) {
        let _ = self.store.update(job_id, &mut |j| {
            j.report_progress(progress);
            Ok(())
        });
    }
}

fn truncated(text: &str, max_len: usize) -> String {
    if text.len() <= max_len {
        return text.to_string();
    }
    let mut cut = max_len;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…", &text[..cut])
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use crate::error::StorageError;
    use crate::storage::{ObjectStorage, StoredObject};

    /// Map-backed storage for exercising workers without a filesystem.
    pub(crate) struct MemoryStorage {
        objects: Mutex<HashMap<String, Vec<u8>>>,
    }

    impl MemoryStorage {
        pub(crate) fn new() -> Self {
            Self {
                objects: Mutex::new(HashMap::new()),
            }
        }

        pub(crate) fn put(&self, key: &str, bytes: &[u8]) {
            self.objects
                .lock()
                .unwrap()
                .insert(key.to_string(), bytes.to_vec());
        }
    }

    impl ObjectStorage for MemoryStorage {
        fn upload(
            &self,
            bytes: &[u8],
            organization_id: &str,
            folder: &str,
            filename: &str,
        ) -> Result<StoredObject, StorageError> {
            let key = format!("{organization_id}/{folder}/{filename}");
            self.put(&key, bytes);
            Ok(StoredObject {
                url: format!("mem://{key}"),
                key,
                size: bytes.len() as u64,
            })
        }

        fn download(&self, key: &str) -> Result<Vec<u8>, StorageError> {
            self.objects
                .lock()
                .unwrap()
                .get(key)
                .cloned()
                .ok_or_else(|| StorageError::NotFound(key.to_string()))
        }

        fn delete(&self, key: &str) -> Result<(), StorageError> {
            self.objects.lock().unwrap().remove(key);
            Ok(())
        }
    }
}
