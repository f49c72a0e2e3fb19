use std::time::Duration;

use serde::Deserialize;

use crate::error::ProcessError;
use crate::ocr::{Extraction, OcrInput, OcrProvider};

const PROVIDER_TAG: &str = "form-recognizer";
const API_VERSION: &str = "2023-07-31";
const CONFIDENCE: f32 = 0.85;
const POLL_INTERVAL: Duration = Duration::from_secs(1);
const MAX_POLLS: u32 = 30;

/// Azure Document Intelligence (Form Recognizer) prebuilt-invoice model.
/// Submits the document for analysis and polls the returned operation until
/// it settles, then reads the recognized full-text content.
pub struct FormRecognizerProvider {
    client: reqwest::blocking::Client,
    endpoint: String,
    key: String,
    poll_interval: Duration,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeStatus {
    status: String,
    analyze_result: Option<AnalyzeResult>,
    error: Option<AnalyzeError>,
}

#[derive(Deserialize)]
struct AnalyzeResult {
    content: String,
}

#[derive(Deserialize)]
struct AnalyzeError {
    message: String,
}

impl FormRecognizerProvider {
    pub fn new(endpoint: String, key: String) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            key,
            poll_interval: POLL_INTERVAL,
        }
    }

    fn analyze_url(&self) -> String {
        format!(
            "{}/formrecognizer/documentModels/prebuilt-invoice:analyze?api-version={}",
            self.endpoint, API_VERSION
        )
    }

    fn submit(&self, input: &OcrInput<'_>) -> Result<String, ProcessError> {
        let response = self
            .client
            .post(self.analyze_url())
            .header("Ocp-Apim-Subscription-Key", &self.key)
            .header("Content-Type", input.mime_type)
            .body(input.bytes.to_vec())
            .send()
            .map_err(|e| ProcessError::OcrFailed(format!("Analyze request failed: {e}")))?
            .error_for_status()
            .map_err(|e| ProcessError::OcrFailed(format!("Analyze rejected: {e}")))?;

        response
            .headers()
            .get("operation-location")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
            .ok_or_else(|| {
                ProcessError::OcrFailed("Analyze response missing operation-location".to_string())
            })
    }

    fn poll(&self, operation_url: &str) -> Result<String, ProcessError> {
        for _ in 0..MAX_POLLS {
            let status: AnalyzeStatus = self
                .client
                .get(operation_url)
                .header("Ocp-Apim-Subscription-Key", &self.key)
                .send()
                .map_err(|e| ProcessError::OcrFailed(format!("Status poll failed: {e}")))?
                .error_for_status()
                .map_err(|e| ProcessError::OcrFailed(format!("Status poll rejected: {e}")))?
                .json()
                .map_err(|e| ProcessError::OcrFailed(format!("Status unparsable: {e}")))?;

            match status.status.as_str() {
                "succeeded" => {
                    return status
                        .analyze_result
                        .map(|r| r.content)
                        .ok_or_else(|| {
                            ProcessError::OcrFailed(
                                "Analysis succeeded without a result payload".to_string(),
                            )
                        });
                }
                "failed" => {
                    let message = status
                        .error
                        .map(|e| e.message)
                        .unwrap_or_else(|| "unspecified analysis failure".to_string());
                    return Err(ProcessError::OcrFailed(format!(
                        "Analysis failed: {message}"
                    )));
                }
                // notStarted / running
                _ => std::thread::sleep(self.poll_interval),
            }
        }

        Err(ProcessError::OcrFailed(
            "Timed out waiting for analysis to settle".to_string(),
        ))
    }
}

impl OcrProvider for FormRecognizerProvider {
    fn name(&self) -> &'static str {
        PROVIDER_TAG
    }

    fn extract(&self, input: &OcrInput<'_>) -> Result<Extraction, ProcessError> {
        let _span = tracing::info_span!("ocr.form_recognizer").entered();

        let operation_url = self.submit(input)?;
        let text = self.poll(&operation_url)?;

        if text.trim().is_empty() {
            return Err(ProcessError::OcrFailed(
                "Analysis returned empty content".to_string(),
            ));
        }

        Ok(Extraction {
            text,
            confidence: CONFIDENCE,
            provider: PROVIDER_TAG,
        })
    }
}
