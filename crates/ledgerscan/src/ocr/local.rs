use crate::error::ProcessError;
use crate::ocr::{Extraction, OcrInput, OcrProvider};

const PROVIDER_TAG: &str = "local";

/// Confidence for text pulled straight out of a born-digital PDF.
const PDF_TEXT_CONFIDENCE: f32 = 0.6;
/// Confidence for the filename-derived guess of last resort.
const FILENAME_GUESS_CONFIDENCE: f32 = 0.1;

/// Heuristic extractor of last resort. Pulls embedded text when the input is
/// a PDF that has any; otherwise derives a low-confidence guess from the
/// filename. Never fails, which is what makes the engine's fallback chain
/// total.
pub struct LocalProvider;

impl LocalProvider {
    pub fn new() -> Self {
        Self
    }

    fn pdf_text(bytes: &[u8]) -> Option<String> {
        let doc = lopdf::Document::load_mem(bytes).ok()?;
        let mut text = String::new();
        for (page_num, _) in doc.get_pages() {
            if let Ok(page_text) = doc.extract_text(&[page_num]) {
                text.push_str(&page_text);
                text.push('\n');
            }
        }
        let trimmed = text.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }

    fn filename_guess(filename: &str) -> String {
        let stem = std::path::Path::new(filename)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(filename);
        let cleaned = stem.replace(['_', '-', '.'], " ");
        format!("Receipt {}", cleaned.trim())
    }
}

impl Default for LocalProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl OcrProvider for LocalProvider {
    fn name(&self) -> &'static str {
        PROVIDER_TAG
    }

    fn extract(&self, input: &OcrInput<'_>) -> Result<Extraction, ProcessError> {
        if input.mime_type == "application/pdf" {
            if let Some(text) = Self::pdf_text(input.bytes) {
                return Ok(Extraction {
                    text,
                    confidence: PDF_TEXT_CONFIDENCE,
                    provider: PROVIDER_TAG,
                });
            }
        }

        // No recoverable text at all: best-effort guess from the filename.
        Ok(Extraction {
            text: Self::filename_guess(input.filename),
            confidence: FILENAME_GUESS_CONFIDENCE,
            provider: PROVIDER_TAG,
        })
    }
}
