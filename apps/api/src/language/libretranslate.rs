//! Client for a LibreTranslate-compatible service (`/detect`, `/translate`).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

use super::names::normalize_code;
use super::{LanguageDetector, LanguageError, Translator};

#[derive(Debug, Serialize)]
struct DetectRequest<'a> {
    q: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct Detection {
    language: String,
    #[serde(default)]
    confidence: f64,
}

#[derive(Debug, Serialize)]
struct TranslateRequest<'a> {
    q: &'a str,
    source: &'a str,
    target: &'a str,
    format: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    #[serde(rename = "translatedText")]
    translated_text: String,
}

#[derive(Debug, Deserialize)]
struct ServiceError {
    error: String,
}

/// Remote detector and translator. Serves as both providers in the normaliser.
#[derive(Clone)]
pub struct LibreTranslateClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl LibreTranslateClient {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, LanguageError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, LanguageError> {
        let response = self.client.post(self.endpoint(path)).json(body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ServiceError>(&body)
                .map(|e| e.error)
                .unwrap_or(body);
            return Err(LanguageError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl LanguageDetector for LibreTranslateClient {
    fn name(&self) -> &'static str {
        "libretranslate"
    }

    async fn detect(&self, text: &str) -> Result<String, LanguageError> {
        let detections: Vec<Detection> = self
            .post(
                "detect",
                &DetectRequest {
                    q: text,
                    api_key: self.api_key.as_deref(),
                },
            )
            .await?;
        best_detection(detections)
    }
}

#[async_trait]
impl Translator for LibreTranslateClient {
    fn name(&self) -> &'static str {
        "libretranslate"
    }

    async fn translate(
        &self,
        text: &str,
        source: &str,
        target: &str,
    ) -> Result<String, LanguageError> {
        let response: TranslateResponse = self
            .post(
                "translate",
                &TranslateRequest {
                    q: text,
                    source,
                    target,
                    format: "text",
                    api_key: self.api_key.as_deref(),
                },
            )
            .await?;
        debug!(
            "Translated {} chars {source}->{target} into {} chars",
            text.len(),
            response.translated_text.len()
        );
        Ok(response.translated_text)
    }
}

/// Highest-confidence detection, as a normalised code.
fn best_detection(detections: Vec<Detection>) -> Result<String, LanguageError> {
    detections
        .into_iter()
        .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
        .map(|d| normalize_code(&d.language))
        .filter(|code| !code.is_empty())
        .ok_or(LanguageError::Undetermined)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_without_double_slash() {
        let client =
            LibreTranslateClient::new("http://translate.local/", None, Duration::from_secs(1))
                .unwrap();
        assert_eq!(client.endpoint("detect"), "http://translate.local/detect");
    }

    #[test]
    fn test_blank_api_key_is_dropped() {
        let client = LibreTranslateClient::new(
            "http://translate.local",
            Some("  ".to_string()),
            Duration::from_secs(1),
        )
        .unwrap();
        assert!(client.api_key.is_none());
    }

    #[test]
    fn test_best_detection_picks_highest_confidence() {
        let detections: Vec<Detection> = serde_json::from_str(
            r#"[{"language":"fr","confidence":12.0},{"language":"vi","confidence":91.5}]"#,
        )
        .unwrap();
        assert_eq!(best_detection(detections).unwrap(), "vi");
    }

    #[test]
    fn test_best_detection_empty_is_undetermined() {
        assert!(matches!(
            best_detection(Vec::new()),
            Err(LanguageError::Undetermined)
        ));
    }

    #[test]
    fn test_translate_request_shape() {
        let body = serde_json::to_value(TranslateRequest {
            q: "Xin chào",
            source: "vi",
            target: "en",
            format: "text",
            api_key: None,
        })
        .unwrap();
        assert_eq!(body["source"], "vi");
        assert_eq!(body["target"], "en");
        assert!(body.get("api_key").is_none());
    }

    #[test]
    fn test_translate_response_parses() {
        let response: TranslateResponse =
            serde_json::from_str(r#"{"translatedText":"Hello"}"#).unwrap();
        assert_eq!(response.translated_text, "Hello");
    }

    #[tokio::test]
    async fn test_unreachable_service_is_error() {
        let client =
            LibreTranslateClient::new("http://127.0.0.1:1", None, Duration::from_secs(1)).unwrap();
        assert!(LanguageDetector::detect(&client, "some longer text here").await.is_err());
    }
}
