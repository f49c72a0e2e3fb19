//! Heuristic parsing of OCR text into structured expense fields.

mod amount;
mod fields;

pub use amount::{AmountCandidate, AmountExtractor};
pub use fields::FieldExtractor;

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// VAT figure attached to an extraction. `estimated` marks the documented
/// best-effort default-rate estimate, as opposed to a figure read from the
/// document.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VatAmount {
    pub value: f64,
    pub estimated: bool,
}

/// Structured output of the pipeline, embedded in the job record.
///
/// A field no pattern matched stays `None`; the VAT estimate is the only
/// documented default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tax_registration_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vat: Option<VatAmount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expense_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_category: Option<String>,
    /// Extraction reliability in [0,1], inherited from the OCR provider.
    pub confidence: f32,
    /// Opaque diagnostic metadata (provider tag, truncated raw text, page
    /// count, per-page scores). Informational only, never authoritative.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub diagnostics: BTreeMap<String, String>,
}
