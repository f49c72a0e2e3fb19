//! PDF rasterization with an ordered chain of strategies.
//!
//! Born-digital PDFs short-circuit the chain entirely: when enough embedded
//! text survives noise stripping, the text is returned directly and no page
//! is ever rendered.

mod pdfium;
mod pdftoppm;

pub use pdfium::PdfiumStrategy;
pub use pdftoppm::PdftoppmStrategy;

use log::{debug, warn};
use regex::Regex;

use crate::config::RasterConfig;
use crate::error::ProcessError;
use crate::storage::ArtifactStore;

/// Minimum characters of noise-stripped embedded text for a PDF to count as
/// born-digital.
const MIN_EMBEDDED_TEXT_CHARS: usize = 50;

/// Minimum percentage of alphanumeric characters before embedded text is
/// trusted; below this the text is treated as garbled font output.
const MIN_ALPHANUMERIC_PERCENT: usize = 10;

/// Side length of the pixel window sampled for blank-page detection.
const BLANK_SAMPLE_WINDOW: u32 = 100;

/// Channel floor under which a sampled pixel deviates from white.
const WHITE_TOLERANCE: u8 = 245;

/// One rendered page.
#[derive(Debug, Clone)]
pub struct PageImage {
    /// 1-indexed page number.
    pub page_number: u32,
    pub png: Vec<u8>,
    /// Set when blank-page sampling found no non-white pixel. Blank pages
    /// stay in the page set; downstream OCR must tolerate empty text.
    pub blank: bool,
}

/// Result of the rasterization front door.
#[derive(Debug)]
pub enum RasterOutcome {
    /// The PDF carried usable embedded text; no rasterization happened.
    EmbeddedText(String),
    /// Rendered page images, in page order, capped at the configured maximum.
    Pages(Vec<PageImage>),
}

/// One way of turning PDF bytes into page images. Strategies are attempted
/// in order; an unavailable strategy is skipped without counting as failure.
pub trait RasterStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether the strategy can run at all in this environment (CLI tool on
    /// PATH, renderer library bindable).
    fn available(&self) -> bool;

    fn rasterize(&self, pdf_bytes: &[u8], max_pages: usize)
        -> Result<Vec<PageImage>, ProcessError>;
}

pub struct DocumentRasterizer {
    strategies: Vec<Box<dyn RasterStrategy>>,
    max_pages: usize,
    artifacts: Option<ArtifactStore>,
    page_marker: Regex,
    numeric_line: Regex,
}

impl DocumentRasterizer {
    pub fn new(strategies: Vec<Box<dyn RasterStrategy>>, max_pages: usize) -> Self {
        Self {
            strategies,
            max_pages: max_pages.max(1),
            artifacts: None,
            // Both patterns are fixed literals; construction cannot fail.
            page_marker: Regex::new(r"(?i)^\s*page\s+\d+\s+(of|/)\s+\d+\s*$").unwrap(),
            numeric_line: Regex::new(r"^[\d\s\-]+$").unwrap(),
        }
    }

    pub fn from_config(config: &RasterConfig) -> Self {
        Self::new(
            vec![
                Box::new(PdftoppmStrategy::new(config.dpi)),
                Box::new(PdfiumStrategy::new(config.render_scale)),
            ],
            config.max_pages,
        )
    }

    /// Enables write-once audit retention of rendered pages.
    pub fn with_artifacts(mut self, artifacts: ArtifactStore) -> Self {
        self.artifacts = Some(artifacts);
        self
    }

    /// Rasterizes the PDF, or returns its embedded text when the document is
    /// born-digital. Fails only when every strategy is exhausted.
    pub fn rasterize(&self, job_id: &str, pdf_bytes: &[u8]) -> Result<RasterOutcome, ProcessError> {
        let _span = tracing::info_span!("raster", job_id = %job_id).entered();

        if let Some(text) = self.embedded_text(pdf_bytes) {
            debug!("Job {}: born-digital PDF, skipping rasterization", job_id);
            return Ok(RasterOutcome::EmbeddedText(text));
        }

        for strategy in &self.strategies {
            if !strategy.available() {
                debug!("Raster strategy '{}' unavailable, skipping", strategy.name());
                continue;
            }

            match strategy.rasterize(pdf_bytes, self.max_pages) {
                Ok(pages) if !pages.is_empty() => {
                    let pages = self.finish_pages(job_id, pages);
                    debug!(
                        "Job {}: '{}' produced {} page(s)",
                        job_id,
                        strategy.name(),
                        pages.len()
                    );
                    return Ok(RasterOutcome::Pages(pages));
                }
                Ok(_) => {
                    warn!(
                        "Raster strategy '{}' produced no pages, trying next",
                        strategy.name()
                    );
                }
                Err(e) => {
                    warn!(
                        "Raster strategy '{}' failed: {}, trying next",
                        strategy.name(),
                        e
                    );
                }
            }
        }

        Err(ProcessError::Rasterize(
            "every rasterization strategy failed or was unavailable".to_string(),
        ))
    }

    /// Flags blank pages and retains audit artifacts.
    fn finish_pages(&self, job_id: &str, mut pages: Vec<PageImage>) -> Vec<PageImage> {
        for page in &mut pages {
            page.blank = is_blank_page(&page.png);
            if page.blank {
                warn!("Job {}: page {} sampled as blank", job_id, page.page_number);
            }
            if let Some(ref artifacts) = self.artifacts {
                if let Err(e) = artifacts.retain_page(job_id, page.page_number, &page.png) {
                    warn!(
                        "Job {}: failed to retain page {} artifact: {}",
                        job_id, page.page_number, e
                    );
                }
            }
        }
        pages
    }

    /// Embedded-text pass: extract, strip page-marker noise, and accept only
    /// when enough plausible text remains.
    fn embedded_text(&self, pdf_bytes: &[u8]) -> Option<String> {
        let doc = lopdf::Document::load_mem(pdf_bytes).ok()?;

        let mut text = String::new();
        for (page_num, _) in doc.get_pages() {
            if let Ok(page_text) = doc.extract_text(&[page_num]) {
                text.push_str(&page_text);
                text.push('\n');
            }
        }

        let cleaned = self.strip_noise(&text);

        if cleaned.chars().count() <= MIN_EMBEDDED_TEXT_CHARS {
            return None;
        }

        if is_garbled(&cleaned) {
            debug!("Embedded PDF text looks garbled, sending down the OCR path");
            return None;
        }

        Some(cleaned)
    }

    /// Drops page-marker lines ("Page N of M") and lines of only digits,
    /// dashes and whitespace before the length threshold is applied.
    fn strip_noise(&self, text: &str) -> String {
        text.lines()
            .filter(|line| {
                let trimmed = line.trim();
                !trimmed.is_empty()
                    && !self.page_marker.is_match(trimmed)
                    && !self.numeric_line.is_match(trimmed)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Scanned PDFs with broken font maps extract as symbol soup; treat text with
/// a very low alphanumeric ratio as unusable.
fn is_garbled(text: &str) -> bool {
    let total_chars = text.chars().count();
    let alphanumeric_chars = text.chars().filter(|c| c.is_alphanumeric()).count();
    total_chars > MIN_EMBEDDED_TEXT_CHARS
        && alphanumeric_chars * 100 < total_chars * MIN_ALPHANUMERIC_PERCENT
}

/// Samples the top-left window of the rendered page; a page whose sampled
/// pixels never deviate from white beyond the tolerance is flagged blank.
pub(crate) fn is_blank_page(png: &[u8]) -> bool {
    let img = match image::load_from_memory(png) {
        Ok(img) => img.to_rgba8(),
        // Undecodable bytes are not "blank"; header validation is the
        // strategy's job.
        Err(_) => return false,
    };

    let width = img.width().min(BLANK_SAMPLE_WINDOW);
    let height = img.height().min(BLANK_SAMPLE_WINDOW);

    for y in 0..height {
        for x in 0..width {
            let pixel = img.get_pixel(x, y);
            if pixel[0] < WHITE_TOLERANCE || pixel[1] < WHITE_TOLERANCE || pixel[2] < WHITE_TOLERANCE
            {
                return false;
            }
        }
    }

    true
}
