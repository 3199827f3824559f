//! Keyword classifier. Scores CV text against the category keyword table.
//!
//! Pure and deterministic: the outcome depends on the text and the table only.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::classification::keywords::{default_table, CategoryKeywordTable};

/// Minimum winning score for a category to be assigned.
pub const CLASSIFICATION_THRESHOLD: f64 = 0.10;

// ────────────────────────────────────────────────────────────────────────────
// Output data models
// ────────────────────────────────────────────────────────────────────────────

/// Score of one category with at least one keyword match.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryScore {
    pub category: String,
    pub matched: usize,
    pub total: usize,
    pub score: f64, // 0.0 – 1.0
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationOutcome {
    pub category_name: Option<String>,
    pub confidence: f64,
}

impl ClassificationOutcome {
    pub fn unclassified() -> Self {
        Self {
            category_name: None,
            confidence: 0.0,
        }
    }

    pub fn is_classified(&self) -> bool {
        self.category_name.is_some()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Core scoring
// ────────────────────────────────────────────────────────────────────────────

/// Scores every category with at least one match, in table order.
///
/// A keyword counts once however often it occurs. Matching is plain substring
/// search on the lower-cased text, so short keywords also match inside words.
pub fn score_categories(text: &str, table: &CategoryKeywordTable) -> Vec<CategoryScore> {
    let text_lower = text.to_lowercase();

    table
        .categories()
        .iter()
        .filter_map(|category| {
            let total = category.keywords.len();
            let matched = category
                .keywords
                .iter()
                .filter(|keyword| text_lower.contains(keyword.as_str()))
                .count();
            if matched == 0 || total == 0 {
                return None;
            }
            Some(CategoryScore {
                category: category.name.clone(),
                matched,
                total,
                score: (matched as f64 / total as f64).min(1.0),
            })
        })
        .collect()
}

/// Picks the best-scoring category. Ties go to the category declared first in
/// the table. Below `threshold` the text is left unclassified.
pub fn classify_text(
    text: &str,
    table: &CategoryKeywordTable,
    threshold: f64,
) -> ClassificationOutcome {
    let scores = score_categories(text, table);

    let mut best: Option<&CategoryScore> = None;
    for candidate in &scores {
        if best.map_or(true, |b| candidate.score > b.score) {
            best = Some(candidate);
        }
    }

    let Some(best) = best else {
        info!("No category matches found in CV text");
        return ClassificationOutcome::unclassified();
    };

    if best.score < threshold {
        info!(
            "Confidence too low for '{}' ({:.2}% < {:.2}%), leaving CV unclassified",
            best.category,
            best.score * 100.0,
            threshold * 100.0
        );
        return ClassificationOutcome::unclassified();
    }

    info!(
        "Classified CV as '{}' with confidence {:.2}% ({}/{} keywords)",
        best.category,
        best.score * 100.0,
        best.matched,
        best.total
    );
    ClassificationOutcome {
        category_name: Some(best.category.clone()),
        confidence: best.score,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// KeywordClassifier
// ────────────────────────────────────────────────────────────────────────────

/// The active table and threshold, shared by the pipeline and the HTTP layer.
#[derive(Clone)]
pub struct KeywordClassifier {
    table: Arc<CategoryKeywordTable>,
    threshold: f64,
}

impl KeywordClassifier {
    pub fn new(table: Arc<CategoryKeywordTable>, threshold: f64) -> Self {
        Self {
            table,
            threshold: threshold.clamp(0.0, 1.0),
        }
    }

    pub fn table(&self) -> &CategoryKeywordTable {
        &self.table
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Classifies against `table_override` when given, else the active table.
    pub fn classify(
        &self,
        text: &str,
        table_override: Option<&CategoryKeywordTable>,
    ) -> ClassificationOutcome {
        if text.trim().is_empty() {
            info!("Empty text provided for classification");
            return ClassificationOutcome::unclassified();
        }
        classify_text(text, table_override.unwrap_or(&self.table), self.threshold)
    }
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::new(Arc::new(default_table().clone()), CLASSIFICATION_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classification::keywords::CategoryKeywords;

    const SCENARIO: &str = "I have 5 years experience with python, java, javascript, react, \
                            and sql database design. I also know git and agile.";

    fn table(categories: Vec<CategoryKeywords>) -> CategoryKeywordTable {
        CategoryKeywordTable::new(categories).unwrap()
    }

    fn cat(name: &str, keywords: &[&str]) -> CategoryKeywords {
        CategoryKeywords::new(name, keywords)
    }

    #[test]
    fn test_scenario_classifies_software_engineer() {
        let outcome = KeywordClassifier::default().classify(SCENARIO, None);
        assert_eq!(outcome.category_name.as_deref(), Some("Software Engineer"));
        assert!((outcome.confidence - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_scenario_scores() {
        let scores = score_categories(SCENARIO, default_table());
        let se = scores
            .iter()
            .find(|s| s.category == "Software Engineer")
            .unwrap();
        assert_eq!((se.matched, se.total), (8, 20));
        // "ba" matches inside "database".
        let ba = scores
            .iter()
            .find(|s| s.category == "Business Analyst")
            .unwrap();
        assert_eq!(ba.matched, 2);
    }

    #[test]
    fn test_all_software_engineer_keywords_give_full_confidence() {
        let se = default_table().get("Software Engineer").unwrap();
        let text = se.keywords.join(", ");

        let outcome = KeywordClassifier::default().classify(&text, None);
        assert_eq!(outcome.category_name.as_deref(), Some("Software Engineer"));
        assert_eq!(outcome.confidence, 1.0);
    }

    #[test]
    fn test_no_match_is_unclassified() {
        let outcome = KeywordClassifier::default().classify("yoga and tennis", None);
        assert_eq!(outcome, ClassificationOutcome::unclassified());
    }

    #[test]
    fn test_below_threshold_is_unclassified() {
        let outcome = KeywordClassifier::default().classify("I enjoy a kanban board", None);
        assert_eq!(outcome.category_name, None);
        assert_eq!(outcome.confidence, 0.0);
    }

    #[test]
    fn test_exactly_threshold_is_classified() {
        let keywords: Vec<String> = (0..10).map(|i| format!("skill{i}x")).collect();
        let refs: Vec<&str> = keywords.iter().map(String::as_str).collect();
        let table = table(vec![cat("Tester", &refs)]);

        let outcome = classify_text("skill0x only", &table, CLASSIFICATION_THRESHOLD);
        assert_eq!(outcome.category_name.as_deref(), Some("Tester"));
        assert!((outcome.confidence - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_repeated_keyword_counts_once() {
        let table = table(vec![cat("Chef", &["kitchen", "menu"])]);
        let outcome = classify_text("kitchen kitchen kitchen", &table, CLASSIFICATION_THRESHOLD);
        assert_eq!(outcome.confidence, 0.5);
    }

    #[test]
    fn test_tie_goes_to_first_declared_category() {
        let forward = table(vec![cat("Alpha", &["rust", "go"]), cat("Beta", &["rust", "zig"])]);
        let outcome = classify_text("rust", &forward, CLASSIFICATION_THRESHOLD);
        assert_eq!(outcome.category_name.as_deref(), Some("Alpha"));

        let reversed = table(vec![cat("Beta", &["rust", "zig"]), cat("Alpha", &["rust", "go"])]);
        let outcome = classify_text("rust", &reversed, CLASSIFICATION_THRESHOLD);
        assert_eq!(outcome.category_name.as_deref(), Some("Beta"));
    }

    #[test]
    fn test_zero_match_category_never_wins() {
        let table = table(vec![
            cat("Empty", &["cobol"]),
            cat("Match", &["a1", "b2", "c3", "d4"]),
        ]);
        let outcome = classify_text("a1", &table, CLASSIFICATION_THRESHOLD);
        assert_eq!(outcome.category_name.as_deref(), Some("Match"));
    }

    #[test]
    fn test_matching_is_case_insensitive() {
        let outcome = KeywordClassifier::default()
            .classify("DOCKER, KUBERNETES, Terraform, AWS and CI/CD pipelines", None);
        assert_eq!(outcome.category_name.as_deref(), Some("DevOps Engineer"));
    }

    #[test]
    fn test_override_table_is_used() {
        let custom = table(vec![cat("Nurse", &["patient care", "triage"])]);
        let outcome = KeywordClassifier::default().classify("Triage and patient care", Some(&custom));
        assert_eq!(outcome.category_name.as_deref(), Some("Nurse"));
        assert_eq!(outcome.confidence, 1.0);
    }

    #[test]
    fn test_confidence_bounds_and_idempotence() {
        let classifier = KeywordClassifier::default();
        let samples = [
            SCENARIO,
            "Recruiter handling onboarding, payroll and interview scheduling for HR",
            "Accountant: audit, tax, bookkeeping, GAAP",
            "",
            "x",
        ];
        for text in samples {
            let first = classifier.classify(text, None);
            assert!((0.0..=1.0).contains(&first.confidence));
            if first.is_classified() {
                assert!(first.confidence >= CLASSIFICATION_THRESHOLD);
            } else {
                assert_eq!(first.confidence, 0.0);
            }
            assert_eq!(first, classifier.classify(text, None));
        }
    }

    #[test]
    fn test_custom_threshold() {
        let classifier = KeywordClassifier::new(Arc::new(default_table().clone()), 0.5);
        assert_eq!(classifier.classify(SCENARIO, None), ClassificationOutcome::unclassified());
    }
}
