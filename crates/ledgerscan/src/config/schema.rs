use serde::{Deserialize, Serialize};

/// Which OCR backend the pipeline prefers. The engine always keeps the local
/// heuristic extractor as the terminal fallback regardless of this setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProviderKind {
    CloudVision,
    FormRecognizer,
    #[default]
    Local,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::CloudVision => "cloud-vision",
            ProviderKind::FormRecognizer => "form-recognizer",
            ProviderKind::Local => "local",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OcrConfig {
    /// Preferred provider. Credentials missing at construction time downgrade
    /// the engine to the local extractor.
    pub provider: ProviderKind,
    /// Google Cloud Vision API key.
    pub vision_api_key: Option<String>,
    /// Azure Document Intelligence endpoint, e.g. "https://x.cognitiveservices.azure.com".
    pub form_recognizer_endpoint: Option<String>,
    /// Azure Document Intelligence subscription key.
    pub form_recognizer_key: Option<String>,
    pub retry: RetryConfig,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Local,
            vision_api_key: None,
            form_recognizer_endpoint: None,
            form_recognizer_key: None,
            retry: RetryConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetryConfig {
    /// Attempts per provider call before falling back (minimum 1).
    pub max_attempts: u32,
    /// Base delay for exponential backoff, doubled per attempt.
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 250,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RasterConfig {
    /// Rendering resolution for the CLI rasterizer.
    pub dpi: u32,
    /// Hard cap on rasterized pages per document.
    pub max_pages: usize,
    /// Scale factor for the in-process rendering fallback.
    pub render_scale: f32,
}

impl Default for RasterConfig {
    fn default() -> Self {
        Self {
            dpi: 300,
            max_pages: 5,
            render_scale: 3.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub ocr: OcrConfig,
    pub raster: RasterConfig,
    /// Regional VAT rate applied as a tagged estimate when no VAT figure is
    /// present in the document (fraction, e.g. 0.05).
    pub default_vat_rate: f64,
    /// Worker threads; 0 means one per CPU.
    pub worker_count: usize,
    /// Directory for write-once page-image audit artifacts. None disables
    /// artifact retention.
    pub artifact_directory: Option<std::path::PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ocr: OcrConfig::default(),
            raster: RasterConfig::default(),
            default_vat_rate: 0.05,
            worker_count: 0,
            artifact_directory: None,
        }
    }
}

impl Config {
    /// Effective worker count (resolves the 0 = per-CPU convention).
    pub fn effective_worker_count(&self) -> usize {
        if self.worker_count == 0 {
            num_cpus::get()
        } else {
            self.worker_count
        }
    }
}
