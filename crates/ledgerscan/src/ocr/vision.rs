use base64::Engine as _;
use serde::Deserialize;

use crate::error::ProcessError;
use crate::ocr::{Extraction, OcrInput, OcrProvider};

const PROVIDER_TAG: &str = "cloud-vision";
const DEFAULT_ENDPOINT: &str = "https://vision.googleapis.com/v1/images:annotate";
const CONFIDENCE: f32 = 0.9;

/// Google Cloud Vision `images:annotate` with DOCUMENT_TEXT_DETECTION.
pub struct CloudVisionProvider {
    client: reqwest::blocking::Client,
    api_key: String,
    endpoint: String,
}

#[derive(Deserialize)]
struct AnnotateResponse {
    responses: Vec<AnnotateResult>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnnotateResult {
    full_text_annotation: Option<FullTextAnnotation>,
    error: Option<ApiError>,
}

#[derive(Deserialize)]
struct FullTextAnnotation {
    text: String,
}

#[derive(Deserialize)]
struct ApiError {
    message: String,
}

impl CloudVisionProvider {
    pub fn new(api_key: String) -> Self {
        Self::with_endpoint(api_key, DEFAULT_ENDPOINT.to_string())
    }

    /// Endpoint override for tests against a stub server.
    pub fn with_endpoint(api_key: String, endpoint: String) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            api_key,
            endpoint,
        }
    }
}

impl OcrProvider for CloudVisionProvider {
    fn name(&self) -> &'static str {
        PROVIDER_TAG
    }

    fn extract(&self, input: &OcrInput<'_>) -> Result<Extraction, ProcessError> {
        let _span = tracing::info_span!("ocr.cloud_vision").entered();

        let content = base64::engine::general_purpose::STANDARD.encode(input.bytes);
        let body = serde_json::json!({
            "requests": [{
                "image": { "content": content },
                "features": [{ "type": "DOCUMENT_TEXT_DETECTION" }]
            }]
        });

        let response = self
            .client
            .post(format!("{}?key={}", self.endpoint, self.api_key))
            .json(&body)
            .send()
            .map_err(|e| ProcessError::OcrFailed(format!("Vision request failed: {e}")))?
            .error_for_status()
            .map_err(|e| ProcessError::OcrFailed(format!("Vision returned error status: {e}")))?;

        let parsed: AnnotateResponse = response
            .json()
            .map_err(|e| ProcessError::OcrFailed(format!("Vision response unparsable: {e}")))?;

        let result = parsed
            .responses
            .into_iter()
            .next()
            .ok_or_else(|| ProcessError::OcrFailed("Vision returned no responses".to_string()))?;

        if let Some(err) = result.error {
            return Err(ProcessError::OcrFailed(format!(
                "Vision annotation error: {}",
                err.message
            )));
        }

        let text = result
            .full_text_annotation
            .map(|a| a.text)
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(ProcessError::OcrFailed(
                "Vision detected no text in the image".to_string(),
            ));
        }

        Ok(Extraction {
            text,
            confidence: CONFIDENCE,
            provider: PROVIDER_TAG,
        })
    }
}
