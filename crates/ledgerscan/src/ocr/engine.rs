use log::{info, warn};

use crate::config::{OcrConfig, ProviderKind};
use crate::ocr::{
    CloudVisionProvider, Extraction, FormRecognizerProvider, LocalProvider, OcrInput, OcrProvider,
    RetryPolicy,
};

/// Adapter over the configured provider with the local extractor as terminal
/// fallback. `extract` never returns an error: any primary-provider failure
/// (missing credentials, auth, quota, malformed image, network) downgrades to
/// a best-effort local result.
pub struct OcrEngine {
    primary: Option<Box<dyn OcrProvider>>,
    local: LocalProvider,
    retry: RetryPolicy,
}

impl OcrEngine {
    pub fn from_config(config: &OcrConfig) -> Self {
        let primary: Option<Box<dyn OcrProvider>> = match config.provider {
            ProviderKind::CloudVision => match &config.vision_api_key {
                Some(key) => Some(Box::new(CloudVisionProvider::new(key.clone()))),
                None => {
                    warn!("Cloud Vision selected but no API key configured; using local extractor");
                    None
                }
            },
            ProviderKind::FormRecognizer => {
                match (&config.form_recognizer_endpoint, &config.form_recognizer_key) {
                    (Some(endpoint), Some(key)) => Some(Box::new(FormRecognizerProvider::new(
                        endpoint.clone(),
                        key.clone(),
                    ))),
                    _ => {
                        warn!("Form Recognizer selected but credentials incomplete; using local extractor");
                        None
                    }
                }
            }
            ProviderKind::Local => None,
        };

        if let Some(ref provider) = primary {
            info!("OCR engine using provider '{}'", provider.name());
        }

        Self {
            primary,
            local: LocalProvider::new(),
            retry: RetryPolicy::from_config(&config.retry),
        }
    }

    /// Test/composition constructor with an explicit primary provider.
    pub fn with_provider(primary: Option<Box<dyn OcrProvider>>, retry: RetryPolicy) -> Self {
        Self {
            primary,
            local: LocalProvider::new(),
            retry,
        }
    }

    /// Name of the provider that will be tried first.
    pub fn primary_name(&self) -> &'static str {
        self.primary
            .as_ref()
            .map(|p| p.name())
            .unwrap_or_else(|| self.local.name())
    }

    /// Extracts text from the input, falling back to the local extractor when
    /// the primary provider exhausts its retries.
    pub fn extract(&self, input: &OcrInput<'_>) -> Extraction {
        if let Some(ref provider) = self.primary {
            let name = provider.name();
            match self.retry.run(name, || provider.extract(input)) {
                Ok(extraction) => return extraction,
                Err(e) => {
                    warn!(
                        "Provider '{}' exhausted retries ({}); falling back to local extractor",
                        name, e
                    );
                }
            }
        }

        match self.local.extract(input) {
            Ok(extraction) => extraction,
            // LocalProvider is infallible today; keep the engine total anyway.
            Err(e) => {
                warn!("Local extractor failed unexpectedly: {}", e);
                Extraction {
                    text: String::new(),
                    confidence: 0.0,
                    provider: self.local.name(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProcessError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    struct FailingProvider {
        calls: Arc<AtomicU32>,
    }

    impl OcrProvider for FailingProvider {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn extract(&self, _input: &OcrInput<'_>) -> Result<Extraction, ProcessError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            Err(ProcessError::OcrFailed("quota exceeded".to_string()))
        }
    }

    struct FixedProvider;

    impl OcrProvider for FixedProvider {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn extract(&self, _input: &OcrInput<'_>) -> Result<Extraction, ProcessError> {
            Ok(Extraction {
                text: "Tax Invoice\nTotal: 99.00".to_string(),
                confidence: 0.9,
                provider: "fixed",
            })
        }
    }

    fn input<'a>() -> OcrInput<'a> {
        OcrInput {
            bytes: b"bytes",
            mime_type: "image/png",
            filename: "fuel_receipt.png",
        }
    }

    #[test]
    fn test_primary_success_is_used() {
        let engine = OcrEngine::with_provider(
            Some(Box::new(FixedProvider)),
            RetryPolicy::new(2, Duration::from_millis(0)),
        );
        let extraction = engine.extract(&input());
        assert_eq!(extraction.provider, "fixed");
        assert!(extraction.text.contains("Tax Invoice"));
    }

    #[test]
    fn test_failing_primary_never_raises() {
        let provider = Box::new(FailingProvider {
            calls: Arc::new(AtomicU32::new(0)),
        });
        let engine =
            OcrEngine::with_provider(Some(provider), RetryPolicy::new(3, Duration::from_millis(0)));

        let extraction = engine.extract(&input());
        assert_eq!(extraction.provider, "local");
        assert_eq!(extraction.text, "Receipt fuel receipt");
        assert!(extraction.confidence < 0.5);
    }

    #[test]
    fn test_retry_count_honoured_before_fallback() {
        let calls = Arc::new(AtomicU32::new(0));
        let provider = Box::new(FailingProvider {
            calls: Arc::clone(&calls),
        });
        let engine =
            OcrEngine::with_provider(Some(provider), RetryPolicy::new(3, Duration::from_millis(0)));
        let _ = engine.extract(&input());
        assert_eq!(calls.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn test_unconfigured_provider_uses_local() {
        let config = OcrConfig {
            provider: ProviderKind::CloudVision,
            vision_api_key: None,
            ..OcrConfig::default()
        };
        let engine = OcrEngine::from_config(&config);
        assert_eq!(engine.primary_name(), "local");
        let extraction = engine.extract(&input());
        assert_eq!(extraction.provider, "local");
    }
}
