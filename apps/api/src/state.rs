use std::sync::Arc;

use crate::config::Config;
use crate::pipeline::CvPipeline;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Extraction, language, classification and category store, wired at startup.
    pub pipeline: Arc<CvPipeline>,
}
