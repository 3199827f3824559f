use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::classification::CLASSIFICATION_THRESHOLD;
use crate::extraction::image::OcrLimits;
use crate::language::DEFAULT_PROVIDER_TIMEOUT;
use crate::ocr::tesseract::DEFAULT_LANGUAGES;

/// Application configuration loaded from environment variables.
/// Every variable is optional; unset means the default.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    /// Unset → in-memory category store.
    pub database_url: Option<String>,
    pub seed_categories: bool,
    pub auto_translate: bool,
    /// LibreTranslate-compatible endpoint; unset → local detection only.
    pub translate_url: Option<String>,
    pub translate_api_key: Option<String>,
    pub translate_timeout: Duration,
    pub ocr_enabled: bool,
    pub ocr_languages: String,
    pub ocr_limits: OcrLimits,
    pub classification_threshold: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            rust_log: "info".to_string(),
            database_url: None,
            seed_categories: true,
            auto_translate: true,
            translate_url: None,
            translate_api_key: None,
            translate_timeout: DEFAULT_PROVIDER_TIMEOUT,
            ocr_enabled: true,
            ocr_languages: DEFAULT_LANGUAGES.to_string(),
            ocr_limits: OcrLimits::default(),
            classification_threshold: CLASSIFICATION_THRESHOLD,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Config::default();
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let ocr_limits = OcrLimits {
            max_file_bytes: parse_or(&var, "OCR_MAX_FILE_BYTES", defaults.ocr_limits.max_file_bytes)?,
            timeout: Duration::from_secs(parse_or(
                &var,
                "OCR_TIMEOUT_SECS",
                defaults.ocr_limits.timeout.as_secs(),
            )?),
            max_dimension: parse_or(&var, "OCR_MAX_DIMENSION", defaults.ocr_limits.max_dimension)?,
            min_confidence: parse_or(
                &var,
                "OCR_MIN_CONFIDENCE",
                defaults.ocr_limits.min_confidence,
            )?,
        };
        if !(0.0..=1.0).contains(&ocr_limits.min_confidence) {
            bail!("OCR_MIN_CONFIDENCE must be between 0 and 1");
        }
        if ocr_limits.max_dimension == 0 {
            bail!("OCR_MAX_DIMENSION must be positive");
        }

        let classification_threshold = parse_or(
            &var,
            "CLASSIFICATION_THRESHOLD",
            defaults.classification_threshold,
        )?;
        if !(0.0..=1.0).contains(&classification_threshold) {
            bail!("CLASSIFICATION_THRESHOLD must be between 0 and 1");
        }

        Ok(Config {
            port: parse_or(&var, "PORT", defaults.port)
                .context("PORT must be a valid port number")?,
            rust_log: var("RUST_LOG").unwrap_or(defaults.rust_log),
            database_url: var("DATABASE_URL"),
            seed_categories: bool_or(&var, "SEED_CATEGORIES", defaults.seed_categories)?,
            auto_translate: bool_or(&var, "AUTO_TRANSLATE", defaults.auto_translate)?,
            translate_url: var("TRANSLATE_URL"),
            translate_api_key: var("TRANSLATE_API_KEY"),
            translate_timeout: Duration::from_secs(parse_or(
                &var,
                "TRANSLATE_TIMEOUT_SECS",
                defaults.translate_timeout.as_secs(),
            )?),
            ocr_enabled: bool_or(&var, "OCR_ENABLED", defaults.ocr_enabled)?,
            ocr_languages: var("OCR_LANGUAGES").unwrap_or(defaults.ocr_languages),
            ocr_limits,
            classification_threshold,
        })
    }
}

fn parse_or<T>(var: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value '{raw}'")),
        None => Ok(default),
    }
}

fn bool_or(var: &impl Fn(&str) -> Option<String>, key: &str, default: bool) -> Result<bool> {
    match var(key).map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => bail!("Environment variable '{key}' must be a boolean, got '{v}'"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_defaults_when_nothing_is_set() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.database_url, None);
        assert!(config.seed_categories);
        assert!(config.auto_translate);
        assert_eq!(config.ocr_languages, "eng+vie");
        assert_eq!(config.ocr_limits.max_file_bytes, 5 * 1024 * 1024);
        assert_eq!(config.ocr_limits.timeout, Duration::from_secs(30));
        assert_eq!(config.ocr_limits.max_dimension, 3000);
        assert_eq!(config.ocr_limits.min_confidence, 0.5);
        assert_eq!(config.classification_threshold, 0.10);
        assert_eq!(config.translate_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_overrides_are_parsed() {
        let config = config_from(&[
            ("PORT", "9090"),
            ("DATABASE_URL", "postgres://localhost/cvboard"),
            ("AUTO_TRANSLATE", "no"),
            ("OCR_ENABLED", "0"),
            ("OCR_TIMEOUT_SECS", "10"),
            ("CLASSIFICATION_THRESHOLD", "0.25"),
            ("TRANSLATE_URL", "http://localhost:5000"),
        ])
        .unwrap();
        assert_eq!(config.port, 9090);
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/cvboard"));
        assert!(!config.auto_translate);
        assert!(!config.ocr_enabled);
        assert_eq!(config.ocr_limits.timeout, Duration::from_secs(10));
        assert_eq!(config.classification_threshold, 0.25);
        assert_eq!(config.translate_url.as_deref(), Some("http://localhost:5000"));
    }

    #[test]
    fn test_blank_values_fall_back_to_defaults() {
        let config = config_from(&[("DATABASE_URL", "  "), ("PORT", "")]).unwrap();
        assert_eq!(config.database_url, None);
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(config_from(&[("PORT", "eighty")]).is_err());
        assert!(config_from(&[("OCR_ENABLED", "maybe")]).is_err());
        assert!(config_from(&[("CLASSIFICATION_THRESHOLD", "1.5")]).is_err());
        assert!(config_from(&[("OCR_MIN_CONFIDENCE", "-0.1")]).is_err());
    }
}
