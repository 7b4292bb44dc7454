// Remote Provider Service
// Implements the specialist classifier and multimodal reasoning API calls

use reqwest::Client;
use std::collections::HashMap;
use std::env;
use std::time::Instant;
use thiserror::Error;

const GEMINI_DEFAULT_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const HUGGING_FACE_DEFAULT_URL: &str = "https://api-inference.huggingface.co/models";

pub const PROVIDER_GEMINI: &str = "gemini";
pub const PROVIDER_HUGGING_FACE: &str = "huggingface";

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },
    #[error("Missing content in response")]
    MissingContent,
    #[error("JSON parse error: {0}")]
    JsonError(String),
}

#[derive(Debug, Clone)]
pub struct ChatResult {
    pub content: String,
    pub latency_ms: i64,
}

/// One inline image plus a text brief, sent as a single content turn.
pub struct VisionRequest<'a> {
    pub model: &'a str,
    pub media_type: &'a str,
    pub image_base64: &'a str,
    pub prompt: &'a str,
    pub response_schema: &'a serde_json::Value,
}

pub struct ProviderClient {
    client: Client,
    gemini_url: String,
    hugging_face_url: String,
}

impl Default for ProviderClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderClient {
    pub fn new() -> Self {
        let client = Client::builder().build().unwrap_or_default();
        Self::from_parts(client, None, None)
    }

    /// Client that ignores system proxy settings.
    pub fn direct() -> Self {
        let client = Client::builder().no_proxy().build().unwrap_or_default();
        Self::from_parts(client, None, None)
    }

    /// Build from config-file settings. Environment URL overrides still take precedence.
    pub fn configured(
        proxy_url: Option<&str>,
        gemini_url: Option<&str>,
        hugging_face_url: Option<&str>,
    ) -> Result<Self, ProviderError> {
        let mut builder = Client::builder();
        if let Some(url) = proxy_url {
            builder = builder.proxy(reqwest::Proxy::all(url)?);
        }
        Ok(Self::from_parts(builder.build()?, gemini_url, hugging_face_url))
    }

    fn from_parts(client: Client, gemini_url: Option<&str>, hugging_face_url: Option<&str>) -> Self {
        Self {
            client,
            gemini_url: resolve_endpoint("GEMINI_API_URL", gemini_url, GEMINI_DEFAULT_URL),
            hugging_face_url: resolve_endpoint(
                "HUGGING_FACE_API_URL",
                hugging_face_url,
                HUGGING_FACE_DEFAULT_URL,
            ),
        }
    }

    /// Replace both base URLs; `model` names are appended to them per call.
    pub fn with_endpoints(mut self, gemini_url: &str, hugging_face_url: &str) -> Self {
        self.gemini_url = gemini_url.trim_end_matches('/').to_string();
        self.hugging_face_url = hugging_face_url.trim_end_matches('/').to_string();
        self
    }

    pub fn gemini_url(&self) -> &str {
        &self.gemini_url
    }

    pub fn hugging_face_url(&self) -> &str {
        &self.hugging_face_url
    }

    /// POST raw image bytes to a hosted image classifier.
    /// Returns the decoded JSON body on success.
    pub async fn call_hugging_face(
        &self,
        model: &str,
        api_key: &str,
        image: Vec<u8>,
    ) -> Result<(serde_json::Value, i64), ProviderError> {
        let url = format!("{}/{}", self.hugging_face_url, model);
        let start = Instant::now();

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", api_key))
            .body(image)
            .send()
            .await?;

        let latency_ms = start.elapsed().as_millis() as i64;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }

        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ProviderError::JsonError(e.to_string()))?;

        Ok((data, latency_ms))
    }

    /// Single non-streaming `generateContent` call with an inline image and a JSON response schema.
    pub async fn call_gemini_vision(
        &self,
        api_key: &str,
        request: &VisionRequest<'_>,
    ) -> Result<ChatResult, ProviderError> {
        let url = format!("{}/{}:generateContent", self.gemini_url, request.model);

        let body = serde_json::json!({
            "contents": [{
                "parts": [
                    {
                        "inline_data": {
                            "mime_type": request.media_type,
                            "data": request.image_base64
                        }
                    },
                    { "text": request.prompt }
                ]
            }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": request.response_schema
            }
        });

        let start = Instant::now();

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let latency_ms = start.elapsed().as_millis() as i64;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }

        // {"candidates":[{"content":{"parts":[{"text":"..."}]}}]}
        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ProviderError::JsonError(e.to_string()))?;

        let content = data["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .filter(|s| !s.trim().is_empty())
            .map(|s| s.to_string())
            .ok_or(ProviderError::MissingContent)?;

        Ok(ChatResult { content, latency_ms })
    }
}

fn resolve_endpoint(var: &str, configured: Option<&str>, default: &str) -> String {
    let url = env::var(var)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .or_else(|| configured.map(|c| c.to_string()).filter(|c| !c.trim().is_empty()))
        .unwrap_or_else(|| default.to_string());
    url.trim().trim_end_matches('/').to_string()
}

fn env_keys(provider: &str) -> &'static [&'static str] {
    match provider {
        PROVIDER_GEMINI => &["API_KEY", "GEMINI_API_KEY", "VERITAS_GEMINI_API_KEY"],
        PROVIDER_HUGGING_FACE => &[
            "HUGGING_FACE_API_KEY",
            "VITE_HUGGING_FACE_API_KEY",
            "NEXT_PUBLIC_HUGGING_FACE_API_KEY",
            "VERITAS_HUGGING_FACE_API_KEY",
        ],
        _ => &[],
    }
}

/// API key for a provider from the environment, first non-blank variable wins.
pub fn env_api_key(provider: &str) -> Option<String> {
    env_keys(provider)
        .iter()
        .filter_map(|key| env::var(key).ok())
        .map(|val| val.trim().to_string())
        .find(|val| !val.is_empty())
}

/// Environment first, then the given key table. Blank entries count as absent.
pub fn resolve_api_key(provider: &str, api_keys: &HashMap<String, String>) -> Option<String> {
    env_api_key(provider).or_else(|| {
        api_keys
            .get(provider)
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_client_creation() {
        let client = ProviderClient::new().with_endpoints("http://localhost:1/", "http://localhost:2");
        assert_eq!(client.gemini_url(), "http://localhost:1");
        assert_eq!(client.hugging_face_url(), "http://localhost:2");
    }

    #[test]
    fn test_env_keys_cover_both_providers() {
        assert!(env_keys(PROVIDER_GEMINI).contains(&"API_KEY"));
        assert!(env_keys(PROVIDER_HUGGING_FACE).contains(&"HUGGING_FACE_API_KEY"));
        assert!(env_keys("unknown").is_empty());
    }

    #[test]
    fn test_resolve_api_key_uses_given_table() {
        // No environment variables are read for an unknown provider.
        let mut keys = HashMap::new();
        keys.insert("custom".to_string(), "  from-config ".to_string());
        keys.insert("blank".to_string(), "   ".to_string());
        assert_eq!(resolve_api_key("custom", &keys).as_deref(), Some("from-config"));
        assert_eq!(resolve_api_key("blank", &keys), None);
        assert_eq!(resolve_api_key("missing", &keys), None);
    }
}
