//! End-to-end pipeline test: enqueue through dispatch, consume with the
//! worker pool, and read the completed job back with its extracted fields.

use std::sync::Arc;
use std::time::{Duration, Instant};

use lopdf::{dictionary, Document, Object, Stream};

use ledgerscan::categorize::{CategorySuggestor, StaticCategorySource};
use ledgerscan::ocr::RetryPolicy;
use ledgerscan::{
    ChannelBroker, DispatchService, DocumentRasterizer, FieldExtractor, FsObjectStorage,
    JobProcessor, JobStatus, MemoryJobStore, OcrEngine, WorkerPool,
};

/// Minimal single-page PDF with one line of text per entry.
fn invoice_pdf(lines: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut content = String::from("BT /F1 12 Tf 50 700 Td ");
    for (i, line) in lines.iter().enumerate() {
        if i > 0 {
            content.push_str("0 -14 Td ");
        }
        let escaped = line.replace('\\', r"\\").replace('(', r"\(").replace(')', r"\)");
        content.push_str(&format!("({escaped}) Tj "));
    }
    content.push_str("ET");

    let content_id = doc.add_object(Object::Stream(Stream::new(
        dictionary! {},
        content.into_bytes(),
    )));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        "Resources" => resources_id,
        "Contents" => content_id,
    });

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("serialize test PDF");
    bytes
}

struct Harness {
    dispatch: DispatchService,
    pool: Option<WorkerPool>,
    _root: tempfile::TempDir,
}

impl Harness {
    fn start() -> Self {
        ledgerscan::logging::init();

        let root = tempfile::tempdir().expect("create temp dir");
        let store: Arc<MemoryJobStore> = Arc::new(MemoryJobStore::new());
        let storage = Arc::new(FsObjectStorage::new(root.path()));
        let (broker, receiver) = ChannelBroker::new(16);

        let dispatch = DispatchService::new(store.clone(), storage.clone(), Arc::new(broker));

        let processor = Arc::new(JobProcessor::new(
            store,
            storage,
            OcrEngine::with_provider(None, RetryPolicy::new(1, Duration::from_millis(1))),
            DocumentRasterizer::new(vec![], 5),
            FieldExtractor::new(0.05),
            CategorySuggestor::new(Box::new(StaticCategorySource::default_set())),
        ));
        let pool = WorkerPool::start(2, receiver, processor);

        Self {
            dispatch,
            pool: Some(pool),
            _root: root,
        }
    }

    fn wait_terminal(&self, job_id: &str, organization_id: &str) -> ledgerscan::OcrJob {
        let deadline = Instant::now() + Duration::from_secs(10);
        while Instant::now() < deadline {
            if let Some(job) = self.dispatch.get_status(job_id, organization_id) {
                if job.status.is_terminal() {
                    return job;
                }
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        panic!("job {job_id} did not reach a terminal state");
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.take() {
            pool.shutdown();
        }
    }
}

#[test]
fn born_digital_invoice_completes_with_fields() {
    let harness = Harness::start();

    let pdf = invoice_pdf(&[
        "Gulf Coast Supplies LLC",
        "TRN: 100234567800003",
        "Tax Invoice",
        "Invoice No: INV-2024-0042",
        "Date: October 1, 2024",
        "Office chairs x 4",
        "Subtotal: AED 1,000.00",
        "VAT 5%: AED 50.00",
        "Grand Total: AED 1,250.00",
    ]);

    let job = harness
        .dispatch
        .enqueue(&pdf, "invoice.pdf", None, "org-1", Some("u-1".to_string()))
        .expect("enqueue");
    assert_eq!(job.mime_type.as_deref(), Some("application/pdf"));

    let done = harness.wait_terminal(&job.job_id, "org-1");
    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.progress, 100);
    assert!(done.error.is_none());

    let result = done.result.expect("extraction result");
    assert_eq!(result.vendor_name.as_deref(), Some("Gulf Coast Supplies LLC"));
    assert_eq!(result.tax_registration_number.as_deref(), Some("100234567800003"));
    assert_eq!(result.invoice_number.as_deref(), Some("INV-2024-0042"));
    assert_eq!(result.amount, Some(1250.0));
    assert_eq!(
        result.expense_date,
        chrono::NaiveDate::from_ymd_opt(2024, 10, 1)
    );
    let vat = result.vat.expect("vat");
    assert_eq!(vat.value, 62.5);
    assert!(!vat.estimated);
    assert_eq!(
        result.diagnostics.get("provider").map(String::as_str),
        Some("embedded-text")
    );
}

#[test]
fn unsupported_upload_fails_with_reason() {
    let harness = Harness::start();

    let job = harness
        .dispatch
        .enqueue(b"hello", "notes.txt", None, "org-1", None)
        .expect("enqueue");

    let done = harness.wait_terminal(&job.job_id, "org-1");
    assert_eq!(done.status, JobStatus::Failed);
    assert!(done.error.as_deref().unwrap().contains("Unsupported"));
    assert!(done.result.is_none());
}

#[test]
fn status_lookups_are_tenant_scoped() {
    let harness = Harness::start();

    let pdf = invoice_pdf(&["Tax Invoice", "Total 75.00", "embedded text body long enough here"]);
    let job = harness
        .dispatch
        .enqueue(&pdf, "a.pdf", None, "org-1", None)
        .expect("enqueue");

    harness.wait_terminal(&job.job_id, "org-1");
    assert!(harness.dispatch.get_status(&job.job_id, "org-2").is_none());
}

#[test]
fn image_upload_falls_back_to_filename_guess() {
    let harness = Harness::start();

    // Undecodable image bytes: the local extractor falls back to a guess
    // derived from the filename, with a correspondingly low confidence.
    let job = harness
        .dispatch
        .enqueue(b"\xff\xd8\xff\x00", "fuel_receipt.jpg", None, "org-1", None)
        .expect("enqueue");

    let done = harness.wait_terminal(&job.job_id, "org-1");
    assert_eq!(done.status, JobStatus::Completed);

    let result = done.result.expect("result");
    assert!(result.confidence <= 0.2);
    assert_eq!(result.suggested_category.as_deref(), Some("Fuel"));
}
