//! Invoice page selection for multi-page scanned documents.

use log::debug;

/// Weight added per invoice-indicating keyword occurrence.
const INVOICE_WEIGHT: i32 = 10;
/// Weight subtracted per non-invoice keyword occurrence. Larger than the
/// positive weight so a delivery note mentioning "invoice" once still loses.
const NON_INVOICE_WEIGHT: i32 = 15;
/// Invoices usually lead the bundle.
const FIRST_PAGE_BONUS: i32 = 5;

const INVOICE_KEYWORDS: &[&str] = &[
    "tax invoice",
    "invoice number",
    "invoice",
    "bill",
    "amount due",
];

const NON_INVOICE_KEYWORDS: &[&str] = &[
    "delivery note",
    "purchase order",
    "goods received note",
];

/// Per-page score from the selector, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageScore {
    /// 1-indexed page number.
    pub page_number: u32,
    pub score: i32,
}

/// Outcome of selecting the billable page.
#[derive(Debug, Clone)]
pub struct PageSelection {
    /// 1-indexed page number of the winning page.
    pub page_number: u32,
    pub scores: Vec<PageScore>,
}

/// Scores each page's text against invoice-vs-non-invoice keyword sets and
/// picks the page most likely to be the billable document.
///
/// Pages with no text are skipped from scoring but remain in the page set.
/// A best score of zero or less falls back to page 1. Ties go to the earlier
/// page (stable maximum over ascending page order).
pub fn select_invoice_page(page_texts: &[(u32, &str)]) -> PageSelection {
    let mut scores = Vec::new();
    let mut best: Option<PageScore> = None;

    for (page_number, text) in page_texts {
        if text.trim().is_empty() {
            continue;
        }

        let score = score_page(*page_number, text);
        debug!("Page {} scored {}", page_number, score);

        if best.as_ref().map(|b| score > b.score).unwrap_or(true) {
            best = Some(PageScore {
                page_number: *page_number,
                score,
            });
        }
        scores.push(PageScore {
            page_number: *page_number,
            score,
        });
    }

    let page_number = match best {
        Some(ref b) if b.score > 0 => b.page_number,
        _ => 1,
    };

    PageSelection {
        page_number,
        scores,
    }
}

fn score_page(page_number: u32, text: &str) -> i32 {
    let normalized = text.to_lowercase();
    let mut score = 0;

    for keyword in INVOICE_KEYWORDS {
        score += normalized.matches(keyword).count() as i32 * INVOICE_WEIGHT;
    }
    for keyword in NON_INVOICE_KEYWORDS {
        score -= normalized.matches(keyword).count() as i32 * NON_INVOICE_WEIGHT;
    }
    if page_number == 1 {
        score += FIRST_PAGE_BONUS;
    }

    score
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invoice_page_beats_purchase_order() {
        let pages = vec![
            (1, "Purchase Order\nPO-2231\nSupplier copy"),
            (2, "Tax Invoice\nTotal Amount: 300.00"),
        ];
        let selection = select_invoice_page(&pages);
        assert_eq!(selection.page_number, 2);
    }

    #[test]
    fn test_first_page_bonus_breaks_even_content() {
        let pages = vec![(1, "Invoice for services"), (2, "Invoice for services")];
        let selection = select_invoice_page(&pages);
        assert_eq!(selection.page_number, 1);
    }

    #[test]
    fn test_all_negative_falls_back_to_page_one() {
        let pages = vec![
            (1, "Delivery note for shipment 9"),
            (2, "Goods received note"),
        ];
        let selection = select_invoice_page(&pages);
        assert_eq!(selection.page_number, 1);
    }

    #[test]
    fn test_empty_pages_skipped_from_scoring() {
        let pages = vec![(1, ""), (2, "   "), (3, "Tax Invoice\nAmount due: 50.00")];
        let selection = select_invoice_page(&pages);
        assert_eq!(selection.page_number, 3);
        // Only the page that produced text is scored.
        assert_eq!(selection.scores.len(), 1);
        assert_eq!(selection.scores[0].page_number, 3);
    }

    #[test]
    fn test_no_text_at_all_selects_page_one() {
        let pages = vec![(1, ""), (2, "")];
        let selection = select_invoice_page(&pages);
        assert_eq!(selection.page_number, 1);
        assert!(selection.scores.is_empty());
    }

    #[test]
    fn test_tie_goes_to_earlier_page() {
        // Identical text on pages 2 and 3; no first-page bonus involved.
        let pages = vec![(2, "Invoice copy"), (3, "Invoice copy")];
        let selection = select_invoice_page(&pages);
        assert_eq!(selection.page_number, 2);
    }

    #[test]
    fn test_keyword_occurrences_accumulate() {
        // "tax invoice" also contains "invoice"; both occurrences count.
        let score = score_page(2, "Tax Invoice");
        assert_eq!(score, 2 * INVOICE_WEIGHT);
    }
}
