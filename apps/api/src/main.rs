mod classification;
mod config;
mod db;
mod errors;
mod extraction;
mod language;
mod models;
mod ocr;
mod pipeline;
mod routes;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::classification::{keywords::default_table, seed_categories, KeywordClassifier};
use crate::config::Config;
use crate::db::create_category_store;
use crate::extraction::ExtractionDispatcher;
use crate::language::{
    LanguageDetector, LanguageNormalizer, LibreTranslateClient, Translator, WhatlangDetector,
};
use crate::ocr::{OcrEngine, SharedOcrEngine, TesseractEngine};
use crate::pipeline::{check_store_coverage, CvPipeline};
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting CV Board API v{}", env!("CARGO_PKG_VERSION"));

    // Category store (Postgres or in-memory)
    let store = create_category_store(config.database_url.as_deref()).await?;
    if config.seed_categories {
        seed_categories(store.as_ref(), default_table()).await?;
    }

    // OCR engine: constructed on first image, not at startup
    let ocr = Arc::new(build_ocr_engine(&config));
    let dispatcher = Arc::new(ExtractionDispatcher::new(ocr, config.ocr_limits.clone()));

    let normalizer = Arc::new(build_normalizer(&config)?);

    let classifier = KeywordClassifier::new(
        Arc::new(default_table().clone()),
        config.classification_threshold,
    );
    info!(
        "Keyword classifier ready: {} categories, threshold {:.2}",
        classifier.table().len(),
        classifier.threshold()
    );

    let pipeline = Arc::new(CvPipeline::new(dispatcher, normalizer, classifier, store));
    check_store_coverage(&pipeline).await;

    let state = AppState {
        config: config.clone(),
        pipeline,
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn build_ocr_engine(config: &Config) -> SharedOcrEngine {
    if !config.ocr_enabled {
        warn!("OCR disabled, image CVs will be stored without text");
        return SharedOcrEngine::disabled();
    }
    let languages = config.ocr_languages.clone();
    SharedOcrEngine::lazy(move || {
        TesseractEngine::locate(&languages).map(|engine| Arc::new(engine) as Arc<dyn OcrEngine>)
    })
}

/// Remote service first (when configured), then local detection.
fn build_normalizer(config: &Config) -> Result<LanguageNormalizer> {
    let mut detectors: Vec<Arc<dyn LanguageDetector>> = Vec::new();
    let mut translators: Vec<Arc<dyn Translator>> = Vec::new();

    if let Some(url) = &config.translate_url {
        let client = Arc::new(LibreTranslateClient::new(
            url,
            config.translate_api_key.clone(),
            config.translate_timeout,
        )?);
        detectors.push(client.clone());
        translators.push(client);
        info!("Translation service configured at {url}");
    } else {
        warn!("TRANSLATE_URL not set, non-English CVs will be classified untranslated");
    }
    detectors.push(Arc::new(WhatlangDetector));

    Ok(LanguageNormalizer::new(
        detectors,
        translators,
        config.translate_timeout,
    ))
}
