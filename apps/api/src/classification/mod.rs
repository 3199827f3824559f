//! Keyword-based CV classification and category resolution.

pub mod classifier;
pub mod keywords;
pub mod resolver;

pub use classifier::{ClassificationOutcome, KeywordClassifier, CLASSIFICATION_THRESHOLD};
pub use keywords::{CategoryKeywordTable, CategoryKeywords, KeywordTableError};
pub use resolver::{
    resolve_category_id, seed_categories, CategoryStore, CategoryStoreError,
    InMemoryCategoryStore, PgCategoryStore,
};
