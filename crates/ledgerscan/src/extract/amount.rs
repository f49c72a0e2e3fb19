use log::debug;
use regex::Regex;

/// Priority tiers for amount candidates. Higher wins.
const PRIORITY_GRAND_TOTAL: u8 = 100;
const PRIORITY_LABEL_NEXT_LINE: u8 = 90;
const PRIORITY_TOTAL: u8 = 80;
const PRIORITY_DUE: u8 = 60;
const PRIORITY_BARE_DECIMAL: u8 = 30;
const PRIORITY_CURRENCY_TAGGED: u8 = 20;

/// Fallback bounds for free-standing numbers when no labelled candidate
/// exists. Excludes quantities and phone-number fragments.
const FALLBACK_MIN: f64 = 10.0;
const FALLBACK_MAX: f64 = 1_000_000.0;

/// Hard ceiling on any parsed monetary value.
const VALUE_CEILING: f64 = 10_000_000.0;

/// A monetary value spotted in the text, with the tier of the rule that
/// produced it and the line it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct AmountCandidate {
    pub value: f64,
    pub priority: u8,
    pub line_index: usize,
    /// Exact substring that matched, used to strip amounts back out of
    /// description text.
    pub matched: String,
}

impl AmountCandidate {
    /// True when an explicit total/due label produced this candidate. The
    /// whole line is then boilerplate rather than description content.
    pub fn labelled(&self) -> bool {
        self.priority >= PRIORITY_DUE
    }
}

/// Finds the document total among competing monetary values.
///
/// Labelled totals outrank amount-due phrasing, which outranks bare
/// two-decimal numbers, which outrank currency-tagged line items. Ties are
/// broken by value (larger wins) and then by position (later line wins,
/// totals sit at the bottom of invoices).
pub struct AmountExtractor {
    grand_total: Regex,
    total_label_alone: Regex,
    total_inline: Regex,
    subtotal: Regex,
    due: Regex,
    currency_tagged: Regex,
    bare_decimal: Regex,
    number: Regex,
}

impl AmountExtractor {
    pub fn new() -> Self {
        Self {
            grand_total: Regex::new(
                r"(?i)\b(?:grand\s+total|total\s+amount|total\s+due|amount\s+payable|net\s+total)\b",
            )
            .unwrap(),
            total_label_alone: Regex::new(r"(?i)^\s*(?:grand\s+)?total\s*:?\s*$").unwrap(),
            total_inline: Regex::new(r"(?i)\btotal\b").unwrap(),
            subtotal: Regex::new(r"(?i)\bsub[\s-]?total\b").unwrap(),
            due: Regex::new(r"(?i)\b(?:amount\s+due|balance\s+due|to\s+pay|payable)\b").unwrap(),
            currency_tagged: Regex::new(
                r"(?i)(?:aed|usd|eur|gbp|sar|inr|dhs?|\$|€|£)\s*([\d,]+\.\d{2})",
            )
            .unwrap(),
            bare_decimal: Regex::new(r"\b([\d,]+\.\d{2})\b").unwrap(),
            number: Regex::new(r"\b(\d[\d,]*(?:\.\d{1,2})?)\b").unwrap(),
        }
    }

    /// Collects every candidate in the text, one pass per line.
    pub fn candidates(&self, text: &str) -> Vec<AmountCandidate> {
        let lines: Vec<&str> = text.lines().collect();
        let mut candidates = Vec::new();

        for (index, line) in lines.iter().enumerate() {
            if self.grand_total.is_match(line) {
                if let Some((value, matched)) = self.last_number_on(line) {
                    candidates.push(AmountCandidate {
                        value,
                        priority: PRIORITY_GRAND_TOTAL,
                        line_index: index,
                        matched,
                    });
                }
            }

            if self.total_label_alone.is_match(line) {
                // Column layouts put the label and the value on consecutive
                // OCR lines.
                if let Some((value, matched)) = lines[index + 1..]
                    .iter()
                    .find(|l| !l.trim().is_empty())
                    .and_then(|l| self.last_number_on(l))
                {
                    candidates.push(AmountCandidate {
                        value,
                        priority: PRIORITY_LABEL_NEXT_LINE,
                        line_index: index,
                        matched,
                    });
                }
            } else if self.total_inline.is_match(line) && !self.subtotal.is_match(line) {
                if let Some((value, matched)) = self.last_number_on(line) {
                    candidates.push(AmountCandidate {
                        value,
                        priority: PRIORITY_TOTAL,
                        line_index: index,
                        matched,
                    });
                }
            }

            if self.due.is_match(line) {
                if let Some((value, matched)) = self.last_number_on(line) {
                    candidates.push(AmountCandidate {
                        value,
                        priority: PRIORITY_DUE,
                        line_index: index,
                        matched,
                    });
                }
            }

            for capture in self.currency_tagged.captures_iter(line) {
                if let Some(value) = parse_money(&capture[1]) {
                    candidates.push(AmountCandidate {
                        value,
                        priority: PRIORITY_CURRENCY_TAGGED,
                        line_index: index,
                        matched: capture[1].to_string(),
                    });
                }
            }

            for capture in self.bare_decimal.captures_iter(line) {
                if let Some(value) = parse_money(&capture[1]) {
                    candidates.push(AmountCandidate {
                        value,
                        priority: PRIORITY_BARE_DECIMAL,
                        line_index: index,
                        matched: capture[1].to_string(),
                    });
                }
            }
        }

        candidates
    }

    /// Picks the winning amount, or falls back to the largest free-standing
    /// number in a plausible monetary range when no rule matched.
    pub fn extract(&self, text: &str) -> Option<AmountCandidate> {
        let candidates = self.candidates(text);

        let winner = candidates.into_iter().max_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then(a.value.partial_cmp(&b.value).unwrap_or(std::cmp::Ordering::Equal))
                .then(a.line_index.cmp(&b.line_index))
        });

        if let Some(winner) = winner {
            debug!(
                "Amount {} selected at priority {} (line {})",
                winner.value, winner.priority, winner.line_index
            );
            return Some(winner);
        }

        self.fallback_largest(text)
    }

    fn fallback_largest(&self, text: &str) -> Option<AmountCandidate> {
        let mut best: Option<AmountCandidate> = None;
        for (index, line) in text.lines().enumerate() {
            for capture in self.number.captures_iter(line) {
                let Some(value) = parse_money(&capture[1]) else {
                    continue;
                };
                if !(FALLBACK_MIN..FALLBACK_MAX).contains(&value) {
                    continue;
                }
                if best.as_ref().map(|b| value > b.value).unwrap_or(true) {
                    best = Some(AmountCandidate {
                        value,
                        priority: 0,
                        line_index: index,
                        matched: capture[1].to_string(),
                    });
                }
            }
        }
        best
    }

    fn last_number_on(&self, line: &str) -> Option<(f64, String)> {
        self.number
            .captures_iter(line)
            .filter_map(|c| parse_money(&c[1]).map(|v| (v, c[1].to_string())))
            .last()
    }
}

impl Default for AmountExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_money(raw: &str) -> Option<f64> {
    let value: f64 = raw.replace(',', "").parse().ok()?;
    if value > 0.0 && value < VALUE_CEILING {
        Some(value)
    } else {
        None
    }
}
