//! OCR backends behind one capability interface.
//!
//! Provider selection is a closed set chosen by configuration at engine
//! construction; the local heuristic extractor is always kept as the
//! terminal fallback so extraction never hard-fails.

mod engine;
mod form_recognizer;
mod local;
mod retry;
mod vision;

pub use engine::OcrEngine;
pub use form_recognizer::FormRecognizerProvider;
pub use local::LocalProvider;
pub use retry::RetryPolicy;
pub use vision::CloudVisionProvider;

use crate::error::ProcessError;

/// Input handed to a provider: raw bytes plus the context the local
/// extractor needs for its filename-derived guess.
pub struct OcrInput<'a> {
    pub bytes: &'a [u8],
    pub mime_type: &'a str,
    pub filename: &'a str,
}

/// Unified extraction output returned by every provider.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub text: String,
    /// Reliability estimate in [0,1]; local extraction scores lower than the
    /// cloud providers by design.
    pub confidence: f32,
    /// Tag of the provider that produced the text.
    pub provider: &'static str,
}

/// One text-extraction backend.
pub trait OcrProvider: Send + Sync {
    fn name(&self) -> &'static str;

    fn extract(&self, input: &OcrInput<'_>) -> Result<Extraction, ProcessError>;
}
