//! Expense category suggestion: an optional text classifier with a keyword
//! scorer behind it. Classifier failures degrade silently to the scorer, a
//! suggestion is never required for a job to complete.

use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// Score added per occurrence of the category name in the text.
const NAME_WEIGHT: i32 = 10;
/// Score added per keyword occurrence.
const KEYWORD_WEIGHT: i32 = 5;
/// Score added per matched description word.
const DESCRIPTION_WORD_WEIGHT: i32 = 2;
/// Description words this short are too common to mean anything.
const MIN_DESCRIPTION_WORD_LEN: usize = 4;
/// Minimum score before a suggestion is worth making.
const SCORE_THRESHOLD: i32 = 5;

/// An expense category as configured per organization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub name: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Category {
    pub fn new(name: impl Into<String>, keywords: &[&str]) -> Self {
        Self {
            name: name.into(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            description: None,
        }
    }
}

/// Read-only lookup of an organization's category list.
pub trait CategorySource: Send + Sync {
    fn categories(&self, organization_id: &str) -> Vec<Category>;
}

/// Fixed category list shared by every organization. Stands in until
/// organizations manage their own lists.
pub struct StaticCategorySource {
    categories: Vec<Category>,
}

impl StaticCategorySource {
    pub fn new(categories: Vec<Category>) -> Self {
        Self { categories }
    }

    /// Common expense categories for receipts in this region.
    pub fn default_set() -> Self {
        Self::new(vec![
            Category::new("Fuel", &["fuel", "petrol", "diesel", "adnoc", "enoc", "eppco"]),
            Category::new("Meals", &["restaurant", "cafe", "coffee", "food", "catering"]),
            Category::new(
                "Office Supplies",
                &["stationery", "paper", "toner", "printer", "supplies"],
            ),
            Category::new("Travel", &["hotel", "flight", "airline", "taxi", "parking"]),
            Category::new("Utilities", &["electricity", "water", "internet", "telecom", "dewa"]),
        ])
    }
}

impl CategorySource for StaticCategorySource {
    fn categories(&self, _organization_id: &str) -> Vec<Category> {
        self.categories.clone()
    }
}

/// Optional smarter classifier sitting in front of the keyword scorer.
pub trait TextClassifier: Send + Sync {
    /// Picks one of the given categories for the text, or `None` when
    /// undecided. Errors are treated as "undecided" by the caller.
    fn classify(
        &self,
        text: &str,
        categories: &[Category],
    ) -> Result<Option<String>, crate::error::ProcessError>;
}

/// Suggests a category for extracted document text.
pub struct CategorySuggestor {
    source: Box<dyn CategorySource>,
    classifier: Option<Box<dyn TextClassifier>>,
}

impl CategorySuggestor {
    pub fn new(source: Box<dyn CategorySource>) -> Self {
        Self {
            source,
            classifier: None,
        }
    }

    pub fn with_classifier(mut self, classifier: Box<dyn TextClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// Returns the suggested category name, or `None` when nothing scores
    /// high enough. Never fails: classifier errors fall through to the
    /// keyword scorer.
    pub fn suggest(&self, organization_id: &str, text: &str) -> Option<String> {
        let _span = tracing::info_span!("categorize.suggest").entered();

        let categories = self.source.categories(organization_id);
        if categories.is_empty() {
            return None;
        }

        if let Some(classifier) = &self.classifier {
            match classifier.classify(text, &categories) {
                Ok(Some(name)) => {
                    // Only accept names the organization actually has, and
                    // answer with the canonical spelling.
                    if let Some(category) = categories
                        .iter()
                        .find(|c| c.name.eq_ignore_ascii_case(&name))
                    {
                        debug!("Classifier suggested category {:?}", category.name);
                        return Some(category.name.clone());
                    }
                    debug!("Classifier returned unknown category {:?}, falling back", name);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!("Category classifier failed, falling back to keyword scoring: {e}");
                }
            }
        }

        self.keyword_suggest(&categories, text)
    }

    fn keyword_suggest(&self, categories: &[Category], text: &str) -> Option<String> {
        let normalized = text.to_lowercase();
        let mut best: Option<(&Category, i32)> = None;

        for category in categories {
            let score = score_category(category, &normalized);
            debug!("Category {:?} scored {}", category.name, score);
            // Strict comparison keeps the first of equals, in source order.
            if score >= SCORE_THRESHOLD && best.map(|(_, s)| score > s).unwrap_or(true) {
                best = Some((category, score));
            }
        }

        best.map(|(category, _)| category.name.clone())
    }
}

fn score_category(category: &Category, normalized_text: &str) -> i32 {
    let mut score = 0;

    if normalized_text.contains(&category.name.to_lowercase()) {
        score += NAME_WEIGHT;
    }

    for keyword in &category.keywords {
        let keyword = keyword.to_lowercase();
        if !keyword.is_empty() && normalized_text.contains(&keyword) {
            score += KEYWORD_WEIGHT;
        }
    }

    if let Some(description) = &category.description {
        for word in description
            .split_whitespace()
            .filter(|w| w.len() >= MIN_DESCRIPTION_WORD_LEN)
        {
            if normalized_text.contains(&word.to_lowercase()) {
                score += DESCRIPTION_WORD_WEIGHT;
            }
        }
    }

    score
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProcessError;

    fn suggestor() -> CategorySuggestor {
        CategorySuggestor::new(Box::new(StaticCategorySource::default_set()))
    }

    struct FixedClassifier(Option<String>);

    impl TextClassifier for FixedClassifier {
        fn classify(
            &self,
            _text: &str,
            _categories: &[Category],
        ) -> Result<Option<String>, ProcessError> {
            Ok(self.0.clone())
        }
    }

    struct BrokenClassifier;

    impl TextClassifier for BrokenClassifier {
        fn classify(
            &self,
            _text: &str,
            _categories: &[Category],
        ) -> Result<Option<String>, ProcessError> {
            Err(ProcessError::OcrFailed("classifier offline".to_string()))
        }
    }

    #[test]
    fn test_fuel_receipt_scores_strongly() {
        let source = StaticCategorySource::default_set();
        let categories = source.categories("org-1");
        let fuel = categories.iter().find(|c| c.name == "Fuel").unwrap();
        // Name occurrence plus keyword occurrences.
        let score = score_category(fuel, "adnoc fuel station");
        assert!(score >= 15, "score was {score}");

        let suggestion = suggestor().suggest("org-1", "ADNOC fuel station");
        assert_eq!(suggestion.as_deref(), Some("Fuel"));
    }

    #[test]
    fn test_weak_match_below_threshold() {
        // No category name or keyword appears.
        assert_eq!(suggestor().suggest("org-1", "miscellaneous purchase"), None);
    }

    #[test]
    fn test_tie_goes_to_source_order() {
        let source = StaticCategorySource::new(vec![
            Category::new("Alpha", &["shared"]),
            Category::new("Beta", &["shared"]),
        ]);
        let suggestor = CategorySuggestor::new(Box::new(source));
        assert_eq!(
            suggestor.suggest("org-1", "shared term").as_deref(),
            Some("Alpha")
        );
    }

    #[test]
    fn test_classifier_answer_wins() {
        let suggestor =
            suggestor().with_classifier(Box::new(FixedClassifier(Some("Travel".to_string()))));
        assert_eq!(
            suggestor.suggest("org-1", "adnoc fuel").as_deref(),
            Some("Travel")
        );
    }

    #[test]
    fn test_classifier_unknown_category_falls_back() {
        let suggestor =
            suggestor().with_classifier(Box::new(FixedClassifier(Some("Made Up".to_string()))));
        assert_eq!(
            suggestor.suggest("org-1", "adnoc fuel station").as_deref(),
            Some("Fuel")
        );
    }

    #[test]
    fn test_classifier_error_degrades_silently() {
        let suggestor = suggestor().with_classifier(Box::new(BrokenClassifier));
        assert_eq!(
            suggestor.suggest("org-1", "adnoc fuel station").as_deref(),
            Some("Fuel")
        );
    }

    #[test]
    fn test_empty_category_list_yields_none() {
        let suggestor = CategorySuggestor::new(Box::new(StaticCategorySource::new(vec![])));
        assert_eq!(suggestor.suggest("org-1", "adnoc fuel"), None);
    }

    #[test]
    fn test_description_words_contribute() {
        let mut category = Category::new("Software", &[]);
        category.description = Some("cloud subscription licences".to_string());
        let score = score_category(&category, "monthly cloud subscription");
        assert_eq!(score, 2 * DESCRIPTION_WORD_WEIGHT);
    }
}
