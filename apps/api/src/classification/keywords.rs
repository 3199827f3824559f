//! Category keyword table: job category name → indicator phrases.
//!
//! The table is an ordered list, not a map. Classification ties go to the
//! category declared first, so order is part of the table's meaning.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum KeywordTableError {
    #[error("Keyword table has no categories")]
    Empty,

    #[error("Category at position {0} has a blank name")]
    BlankName(usize),

    #[error("Category '{0}' is declared more than once")]
    DuplicateName(String),

    #[error("Category '{0}' has no keywords")]
    NoKeywords(String),

    #[error("Category '{0}' contains a blank keyword")]
    BlankKeyword(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryKeywords {
    pub name: String,
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl CategoryKeywords {
    pub fn new(name: &str, keywords: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    /// Trimmed, lower-cased, de-duplicated (first occurrence kept).
    fn normalized(self) -> Self {
        let mut seen = HashSet::new();
        let keywords = self
            .keywords
            .into_iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| seen.insert(k.clone()))
            .collect();
        Self {
            name: self.name.trim().to_string(),
            keywords,
            description: self
                .description
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
        }
    }
}

/// Validated, normalised keyword table. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<CategoryKeywords>", into = "Vec<CategoryKeywords>")]
pub struct CategoryKeywordTable {
    categories: Vec<CategoryKeywords>,
}

impl CategoryKeywordTable {
    pub fn new(categories: Vec<CategoryKeywords>) -> Result<Self, KeywordTableError> {
        validate(&categories)?;
        Ok(Self::normalized(categories))
    }

    fn normalized(categories: Vec<CategoryKeywords>) -> Self {
        Self {
            categories: categories
                .into_iter()
                .map(CategoryKeywords::normalized)
                .collect(),
        }
    }

    pub fn categories(&self) -> &[CategoryKeywords] {
        &self.categories
    }

    pub fn get(&self, name: &str) -> Option<&CategoryKeywords> {
        self.categories.iter().find(|c| c.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(|c| c.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }
}

impl TryFrom<Vec<CategoryKeywords>> for CategoryKeywordTable {
    type Error = KeywordTableError;

    fn try_from(categories: Vec<CategoryKeywords>) -> Result<Self, Self::Error> {
        Self::new(categories)
    }
}

impl From<CategoryKeywordTable> for Vec<CategoryKeywords> {
    fn from(table: CategoryKeywordTable) -> Self {
        table.categories
    }
}

fn validate(categories: &[CategoryKeywords]) -> Result<(), KeywordTableError> {
    if categories.is_empty() {
        return Err(KeywordTableError::Empty);
    }
    let mut names = HashSet::new();
    for (index, category) in categories.iter().enumerate() {
        let name = category.name.trim();
        if name.is_empty() {
            return Err(KeywordTableError::BlankName(index));
        }
        if !names.insert(name) {
            return Err(KeywordTableError::DuplicateName(name.to_string()));
        }
        if category.keywords.is_empty() {
            return Err(KeywordTableError::NoKeywords(name.to_string()));
        }
        if category.keywords.iter().any(|k| k.trim().is_empty()) {
            return Err(KeywordTableError::BlankKeyword(name.to_string()));
        }
    }
    Ok(())
}

/// The built-in table, in tie-break order.
pub static DEFAULT_KEYWORD_TABLE: Lazy<CategoryKeywordTable> = Lazy::new(|| {
    CategoryKeywordTable::normalized(vec![
        CategoryKeywords::new(
            "Software Engineer",
            &[
                "software engineer", "software development", "programming", "coding",
                "python", "java", "javascript", "react", "angular", "node.js",
                "backend", "frontend", "full stack", "web development",
                "database", "sql", "api", "rest", "git", "agile",
            ],
        )
        .with_description(
            "Software developers building web and mobile applications with languages such as \
             Python, Java and JavaScript, and frameworks such as React, Angular and Node.js. \
             Covers backend, frontend and full stack roles.",
        ),
        CategoryKeywords::new(
            "Data Scientist",
            &[
                "data scientist", "data science", "machine learning", "ml", "ai",
                "data analysis", "analytics", "python", "r", "sql", "pandas", "numpy",
                "tensorflow", "pytorch", "scikit-learn", "jupyter", "statistics",
                "data visualization", "big data", "data mining", "deep learning",
            ],
        )
        .with_description(
            "Data analysis, machine learning and AI specialists working with Python, R, SQL, \
             Pandas, NumPy, TensorFlow, PyTorch and scikit-learn on large datasets and \
             predictive models.",
        ),
        CategoryKeywords::new(
            "Project Manager",
            &[
                "project manager", "pm", "project management", "agile", "scrum",
                "kanban", "sprint", "stakeholder", "team lead", "team leader",
                "delivery manager", "product owner", "jira", "confluence", "budget",
                "timeline", "risk management", "resource management",
            ],
        )
        .with_description(
            "Project managers coordinating teams, timelines and budgets with Agile, Scrum and \
             Kanban, using Jira and Confluence, and managing stakeholders and resources.",
        ),
        CategoryKeywords::new(
            "Marketing",
            &[
                "marketing", "digital marketing", "seo", "sem", "social media",
                "content marketing", "email marketing", "campaign", "branding",
                "advertising", "google ads", "facebook ads", "analytics", "crm",
                "sales", "lead generation", "conversion", "strategy",
            ],
        )
        .with_description(
            "Digital marketing, SEO, SEM and social media roles running advertising campaigns, \
             branding and content marketing with Google Ads, Facebook Ads and CRM tools.",
        ),
        CategoryKeywords::new(
            "Designer",
            &[
                "designer", "ui/ux", "user interface", "user experience", "graphic design",
                "adobe", "photoshop", "illustrator", "figma", "sketch", "wireframe",
                "prototype", "interaction design", "visual design", "brand identity",
                "web design", "mobile design",
            ],
        )
        .with_description(
            "UI/UX and graphic designers working with Photoshop, Illustrator, Figma and Sketch \
             on web and mobile interfaces, wireframes, prototypes and brand identity.",
        ),
        CategoryKeywords::new(
            "Business Analyst",
            &[
                "business analyst", "ba", "requirements", "stakeholder", "analysis",
                "documentation", "process improvement", "user stories", "use cases",
                "sql", "data analysis", "reporting", "dashboard", "excel", "power bi",
                "requirements gathering", "functional specification",
            ],
        )
        .with_description(
            "Business analysts gathering requirements and analysing data with SQL, Excel and \
             Power BI, producing documentation, user stories, use cases, reports and dashboards.",
        ),
        CategoryKeywords::new(
            "DevOps Engineer",
            &[
                "devops", "ci/cd", "docker", "kubernetes", "aws", "azure", "gcp",
                "terraform", "ansible", "jenkins", "gitlab", "github actions",
                "cloud", "infrastructure", "monitoring", "logging", "linux",
                "shell scripting", "automation", "deployment",
            ],
        )
        .with_description(
            "Infrastructure, CI/CD and cloud engineers working with Docker, Kubernetes, AWS, \
             Azure, GCP, Terraform, Ansible, Jenkins and GitLab to automate deployment and \
             monitoring.",
        ),
        CategoryKeywords::new(
            "HR/Recruitment",
            &[
                "hr", "human resources", "recruitment", "recruiter", "talent acquisition",
                "hiring", "interview", "onboarding", "employee relations", "payroll",
                "training", "performance management", "compensation", "benefits",
            ],
        )
        .with_description(
            "Human resources and recruitment: talent acquisition, onboarding, employee \
             relations, payroll, training, performance management, compensation and benefits.",
        ),
        CategoryKeywords::new(
            "Finance/Accounting",
            &[
                "finance", "accounting", "accountant", "cpa", "financial analysis",
                "audit", "tax", "bookkeeping", "excel", "quickbooks", "sap", "erp",
                "budget", "forecasting", "financial reporting", "gaap", "ifrs",
            ],
        )
        .with_description(
            "Accounting and finance roles using Excel, QuickBooks, SAP and ERP systems for \
             audit, tax, bookkeeping, budgeting, forecasting and GAAP/IFRS reporting.",
        ),
        CategoryKeywords::new(
            "Sales",
            &[
                "sales", "sales representative", "account executive", "business development",
                "customer acquisition", "client relationship", "negotiation", "crm",
                "salesforce", "quota", "revenue", "lead generation", "cold calling",
                "pipeline management",
            ],
        )
        .with_description(
            "Sales and business development roles managing client relationships in CRM tools \
             such as Salesforce, running pipelines and lead generation to hit quota and \
             revenue targets.",
        ),
    ])
});

pub fn default_table() -> &'static CategoryKeywordTable {
    &DEFAULT_KEYWORD_TABLE
}
