use chrono::NaiveDate;
use log::debug;
use regex::Regex;

use crate::extract::amount::AmountExtractor;
use crate::extract::{ExtractionResult, VatAmount};

/// How many leading non-empty lines are considered for the vendor name.
const VENDOR_SCAN_LINES: usize = 10;
/// Lines eligible for the no-legal-suffix vendor fallback.
const VENDOR_FALLBACK_LINES: usize = 5;
/// Cap on the cleaned description.
const MAX_DESCRIPTION_LEN: usize = 500;
/// Plausible expense years; anything outside is an OCR misread.
const MIN_YEAR: i32 = 2000;
const MAX_YEAR: i32 = 2100;

const LEGAL_SUFFIXES: &[&str] = &[
    " LLC", " L.L.C", " LTD", " LIMITED", " INC", " CORP", " PJSC", " FZE", " FZC", " LLP",
    " CO.", " TRADING",
];

const MONTHS: &[(&str, u32)] = &[
    ("jan", 1),
    ("feb", 2),
    ("mar", 3),
    ("apr", 4),
    ("may", 5),
    ("jun", 6),
    ("jul", 7),
    ("aug", 8),
    ("sep", 9),
    ("oct", 10),
    ("nov", 11),
    ("dec", 12),
];

/// Rule-based parser turning raw OCR text into an [`ExtractionResult`].
///
/// Every field is best-effort: a field no rule matches stays `None` rather
/// than failing the extraction. Only the VAT figure carries a default, and it
/// is tagged as estimated.
pub struct FieldExtractor {
    amounts: AmountExtractor,
    default_vat_rate: f64,
    trn: Regex,
    invoice_patterns: Vec<Regex>,
    vat_percent: Regex,
    vat_absolute: Regex,
    month_day_year: Regex,
    day_month_year: Regex,
    iso_date: Regex,
    numeric_date: Regex,
    vendor_noise: Regex,
    vendor_amount: Regex,
}

impl FieldExtractor {
    pub fn new(default_vat_rate: f64) -> Self {
        Self {
            amounts: AmountExtractor::new(),
            default_vat_rate,
            trn: Regex::new(
                r"(?i)(?:\btrn\b|tax\s+registration\s+(?:no|number|#)?|vat\s+reg(?:istration)?\.?\s*(?:no|number|#)?)[:.\s#]*([A-Z0-9][A-Z0-9-]{8,24})",
            )
            .unwrap(),
            invoice_patterns: vec![
                Regex::new(r"(?i)invoice\s*(?:no|number|num|#)?\s*[:.#]?\s*([A-Z0-9][A-Z0-9/-]{2,24})")
                    .unwrap(),
                Regex::new(r"(?i)\binv\b\s*[:.#-]?\s*([A-Z0-9][A-Z0-9/-]{2,24})").unwrap(),
                Regex::new(r"(?i)\b(?:bill|receipt)\s*(?:no|number|#)\s*[:.#]?\s*([A-Z0-9][A-Z0-9/-]{2,24})")
                    .unwrap(),
            ],
            vat_percent: Regex::new(r"(?i)\b(?:vat|tax)\b[^\n%]{0,30}?(\d{1,2}(?:\.\d+)?)\s*%")
                .unwrap(),
            vat_absolute: Regex::new(
                r"(?i)\b(?:vat|tax)\b(?:\s+amount)?\s*[:.]?\s*(?:aed|usd|dhs?|\$)?\s*([\d,]+\.\d{2})",
            )
            .unwrap(),
            month_day_year: Regex::new(
                r"(?i)\b([a-z]{3,9})\.?\s+(\d{1,2})(?:st|nd|rd|th)?\s*,?\s+(\d{4})\b",
            )
            .unwrap(),
            day_month_year: Regex::new(
                r"(?i)\b(\d{1,2})(?:st|nd|rd|th)?\s+([a-z]{3,9})\.?\s*,?\s+(\d{4})\b",
            )
            .unwrap(),
            iso_date: Regex::new(r"\b(\d{4})[-/](\d{1,2})[-/](\d{1,2})\b").unwrap(),
            numeric_date: Regex::new(r"\b(\d{1,2})[./-](\d{1,2})[./-](\d{2,4})\b").unwrap(),
            vendor_noise: Regex::new(
                r"(?i)^\s*(?:tax\s+invoice|invoice|receipt|statement|date\b|tel\b|phone\b|fax\b|email\b|www\.|https?:|p\.?o\.?\s*box|page\s+\d)",
            )
            .unwrap(),
            vendor_amount: Regex::new(r"[\d,]+\.\d{2}").unwrap(),
        }
    }

    /// Parses the selected page's text. The caller fills in confidence,
    /// category, and diagnostics.
    pub fn extract(&self, text: &str) -> ExtractionResult {
        let _span = tracing::info_span!("extract.fields").entered();

        let mut consumed: Vec<String> = Vec::new();

        let vendor_name = self.vendor_name(text);
        if let Some(ref v) = vendor_name {
            consumed.push(v.clone());
        }

        let tax_registration_number = self.capture_trn(text, &mut consumed);
        let invoice_number = self.invoice_number(text, &mut consumed);
        let expense_date = self.expense_date(text, &mut consumed);

        let amount_candidate = self.amounts.extract(text);
        let amount = amount_candidate.as_ref().map(|c| c.value);
        let vat = amount.map(|a| self.vat(text, a));

        // Every candidate amount is stripped from the description, not just
        // the winner. Re-parsing the description must not surface a
        // different total. Labelled candidates take their whole line with
        // them so the label cannot re-attach to an unrelated number.
        let lines: Vec<&str> = text.lines().collect();
        for candidate in self.amounts.candidates(text) {
            if candidate.labelled() {
                if let Some(line) = lines.get(candidate.line_index) {
                    consumed.push(line.trim().to_string());
                }
            }
            consumed.push(candidate.matched);
        }

        let description = self.description(text, &consumed);

        debug!(
            "Extracted vendor={:?} invoice={:?} amount={:?}",
            vendor_name, invoice_number, amount
        );

        ExtractionResult {
            vendor_name,
            tax_registration_number,
            invoice_number,
            amount,
            vat,
            expense_date,
            description,
            ..ExtractionResult::default()
        }
    }

    /// The vendor is usually the document letterhead: the first meaningful
    /// line, preferably one carrying a legal suffix.
    fn vendor_name(&self, text: &str) -> Option<String> {
        let mut fallback: Option<String> = None;

        for (seen, line) in text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .take(VENDOR_SCAN_LINES)
            .enumerate()
        {
            if self.vendor_noise.is_match(line)
                || self.vendor_amount.is_match(line)
                || looks_numeric(line)
            {
                continue;
            }

            let upper = line.to_uppercase();
            if LEGAL_SUFFIXES
                .iter()
                .any(|s| upper.ends_with(s.trim_end_matches('.')) || upper.contains(s))
            {
                return Some(line.to_string());
            }

            if fallback.is_none() && seen < VENDOR_FALLBACK_LINES {
                let word_count = line.split_whitespace().count();
                let has_letters = line.chars().any(|c| c.is_alphabetic());
                let all_caps = has_letters && !line.chars().any(|c| c.is_lowercase());
                if has_letters && line.len() <= 48 && (word_count >= 2 || all_caps) {
                    fallback = Some(line.to_string());
                }
            }
        }

        fallback
    }

    fn capture_trn(&self, text: &str, consumed: &mut Vec<String>) -> Option<String> {
        let capture = self.trn.captures(text)?;
        let value = capture[1].to_string();
        // 10 to 20 alphanumerics once separators are dropped.
        let compact: String = value.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
        if !(10..=20).contains(&compact.len()) {
            return None;
        }
        consumed.push(capture[0].to_string());
        Some(value)
    }

    fn invoice_number(&self, text: &str, consumed: &mut Vec<String>) -> Option<String> {
        // Matched per line so a label at the end of one line cannot swallow
        // the start of the next.
        for pattern in &self.invoice_patterns {
            for line in text.lines() {
                for capture in pattern.captures_iter(line) {
                    let value = capture[1].to_string();
                    // Must carry a digit; bare label words like "Number" or
                    // "Date" are artifacts of loose spacing.
                    if value.chars().any(|c| c.is_ascii_digit()) {
                        consumed.push(capture[0].to_string());
                        return Some(value);
                    }
                }
            }
        }
        None
    }

    fn vat(&self, text: &str, amount: f64) -> VatAmount {
        if let Some(capture) = self.vat_percent.captures(text) {
            if let Ok(percent) = capture[1].parse::<f64>() {
                return VatAmount {
                    value: round2(amount * percent / 100.0),
                    estimated: false,
                };
            }
        }

        if let Some(capture) = self.vat_absolute.captures(text) {
            if let Ok(value) = capture[1].replace(',', "").parse::<f64>() {
                // Explicit zero counts as a stated figure.
                return VatAmount {
                    value: round2(value),
                    estimated: false,
                };
            }
        }

        VatAmount {
            value: round2(amount * self.default_vat_rate),
            estimated: true,
        }
    }

    fn expense_date(&self, text: &str, consumed: &mut Vec<String>) -> Option<NaiveDate> {
        // "October 1, 2024" / "Oct 1 2024"
        for capture in self.month_day_year.captures_iter(text) {
            let Some(month) = month_number(&capture[1]) else {
                continue;
            };
            if let Some(date) = make_date(
                capture[3].parse().ok()?,
                month,
                capture[2].parse().ok()?,
            ) {
                consumed.push(capture[0].to_string());
                return Some(date);
            }
        }

        // "1 October 2024"
        for capture in self.day_month_year.captures_iter(text) {
            let Some(month) = month_number(&capture[2]) else {
                continue;
            };
            if let Some(date) = make_date(
                capture[3].parse().ok()?,
                month,
                capture[1].parse().ok()?,
            ) {
                consumed.push(capture[0].to_string());
                return Some(date);
            }
        }

        // "2024-10-01"
        for capture in self.iso_date.captures_iter(text) {
            if let Some(date) = make_date(
                capture[1].parse().ok()?,
                capture[2].parse().ok()?,
                capture[3].parse().ok()?,
            ) {
                consumed.push(capture[0].to_string());
                return Some(date);
            }
        }

        // "01/10/2024": day-first, but a first group over 12 forces the
        // day reading on its own.
        for capture in self.numeric_date.captures_iter(text) {
            let first: u32 = capture[1].parse().ok()?;
            let second: u32 = capture[2].parse().ok()?;
            let mut year: i32 = capture[3].parse().ok()?;
            if year < 100 {
                year += 2000;
            }
            let (day, month) = if second > 12 && first <= 12 {
                (second, first)
            } else {
                (first, second)
            };
            if let Some(date) = make_date(year, month, day) {
                consumed.push(capture[0].to_string());
                return Some(date);
            }
        }

        None
    }

    /// Remaining text after extracted substrings are removed, whitespace
    /// collapsed, and length capped.
    fn description(&self, text: &str, consumed: &[String]) -> Option<String> {
        let mut remaining = text.to_string();
        for fragment in consumed {
            if !fragment.is_empty() {
                remaining = remaining.replace(fragment.as_str(), " ");
            }
        }

        let collapsed = remaining.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.is_empty() {
            return None;
        }

        let mut capped = collapsed;
        if capped.len() > MAX_DESCRIPTION_LEN {
            let mut cut = MAX_DESCRIPTION_LEN;
            while !capped.is_char_boundary(cut) {
                cut -= 1;
            }
            capped.truncate(cut);
        }
        Some(capped)
    }
}

fn looks_numeric(line: &str) -> bool {
    line.chars()
        .all(|c| c.is_ascii_digit() || c.is_ascii_punctuation() || c.is_whitespace())
}

fn month_number(name: &str) -> Option<u32> {
    let lower = name.to_lowercase();
    MONTHS
        .iter()
        .find(|(prefix, _)| lower.starts_with(prefix))
        .map(|(_, number)| *number)
}

fn make_date(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
        return None;
    }
    NaiveDate::from_ymd_opt(year, month, day)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    const INVOICE: &str = "\
Gulf Coast Supplies LLC
TRN: 100234567800003
Tax Invoice
Invoice No: INV-2024-0042
Date: October 1, 2024

Office chairs x 4
Subtotal: AED 1,000.00
VAT 5%: AED 50.00
Grand Total: AED 1,250.00";

    #[test]
    fn test_full_invoice_extraction() {
        let extractor = FieldExtractor::new(0.05);
        let result = extractor.extract(INVOICE);

        assert_eq!(result.vendor_name.as_deref(), Some("Gulf Coast Supplies LLC"));
        assert_eq!(
            result.tax_registration_number.as_deref(),
            Some("100234567800003")
        );
        assert_eq!(result.invoice_number.as_deref(), Some("INV-2024-0042"));
        assert_eq!(result.amount, Some(1250.0));
        assert_eq!(
            result.expense_date,
            NaiveDate::from_ymd_opt(2024, 10, 1)
        );

        let vat = result.vat.unwrap();
        assert_eq!(vat.value, 62.5);
        assert!(!vat.estimated);
    }

    #[test]
    fn test_grand_total_beats_subtotal() {
        let extractor = FieldExtractor::new(0.05);
        let result = extractor.extract("Subtotal: 1,000.00\nGrand Total: 1,250.00");
        assert_eq!(result.amount, Some(1250.0));
    }

    #[test]
    fn test_total_label_on_own_line() {
        let extractor = FieldExtractor::new(0.05);
        let result = extractor.extract("Total\n450.75");
        assert_eq!(result.amount, Some(450.75));
    }

    #[test]
    fn test_vat_defaults_to_estimated_rate() {
        let extractor = FieldExtractor::new(0.05);
        let result = extractor.extract("Coffee shop\nTotal 21.00");
        let vat = result.vat.unwrap();
        assert_eq!(vat.value, 1.05);
        assert!(vat.estimated);
    }

    #[test]
    fn test_explicit_zero_vat_is_not_estimated() {
        let extractor = FieldExtractor::new(0.05);
        let result = extractor.extract("Exports Co LLC\nVAT: 0.00\nTotal 500.00");
        let vat = result.vat.unwrap();
        assert_eq!(vat.value, 0.0);
        assert!(!vat.estimated);
    }

    #[test]
    fn test_no_amount_means_no_vat() {
        let extractor = FieldExtractor::new(0.05);
        let result = extractor.extract("thanks for visiting");
        assert!(result.amount.is_none());
        assert!(result.vat.is_none());
    }

    #[test]
    fn test_date_formats() {
        let extractor = FieldExtractor::new(0.05);

        let cases = [
            ("Date: October 1, 2024", (2024, 10, 1)),
            ("Issued 15 March 2023", (2023, 3, 15)),
            ("2022-07-09", (2022, 7, 9)),
            ("Date: 25/12/2024", (2024, 12, 25)),
            ("Date: 03/25/2024", (2024, 3, 25)),
        ];
        for (text, (y, m, d)) in cases {
            let result = extractor.extract(text);
            assert_eq!(
                result.expense_date,
                NaiveDate::from_ymd_opt(y, m, d),
                "failed on {text:?}"
            );
        }
    }

    #[test]
    fn test_implausible_year_rejected() {
        let extractor = FieldExtractor::new(0.05);
        let result = extractor.extract("Date: 01/01/1901");
        assert!(result.expense_date.is_none());
    }

    #[test]
    fn test_vendor_skips_noise_lines() {
        let extractor = FieldExtractor::new(0.05);
        let result = extractor.extract("Tax Invoice\n+971 4 1234567\nDesert Rose Trading LLC");
        assert_eq!(
            result.vendor_name.as_deref(),
            Some("Desert Rose Trading LLC")
        );
    }

    #[test]
    fn test_vendor_fallback_without_legal_suffix() {
        let extractor = FieldExtractor::new(0.05);
        let result = extractor.extract("Corner Bakery\n12 Marina Walk\nThanks!");
        assert_eq!(result.vendor_name.as_deref(), Some("Corner Bakery"));
    }

    #[test]
    fn test_invoice_number_requires_digits() {
        let extractor = FieldExtractor::new(0.05);
        let result = extractor.extract("Invoice Number pending");
        assert!(result.invoice_number.is_none());
    }

    #[test]
    fn test_trn_length_bounds() {
        let extractor = FieldExtractor::new(0.05);
        assert!(extractor.extract("TRN: 12345").tax_registration_number.is_none());
        assert_eq!(
            extractor
                .extract("TRN: 100234567800003")
                .tax_registration_number
                .as_deref(),
            Some("100234567800003")
        );
    }

    #[test]
    fn test_description_strips_extracted_fields() {
        let extractor = FieldExtractor::new(0.05);
        let result = extractor.extract(INVOICE);
        let description = result.description.unwrap();

        assert!(description.contains("Office chairs"));
        assert!(!description.contains("1,250.00"));
        assert!(!description.contains("INV-2024-0042"));
        assert!(!description.contains("Gulf Coast Supplies"));
    }

    #[test]
    fn test_amount_extraction_idempotent_over_description() {
        let extractor = FieldExtractor::new(0.05);
        let first = extractor.extract(INVOICE);
        let description = first.description.unwrap();

        let second = extractor.extract(&description);
        if let Some(amount) = second.amount {
            assert_eq!(Some(amount), first.amount);
        }
    }

    #[test]
    fn test_description_capped() {
        let extractor = FieldExtractor::new(0.05);
        let long = "word ".repeat(400);
        let result = extractor.extract(&long);
        assert!(result.description.unwrap().len() <= MAX_DESCRIPTION_LEN);
    }
}
