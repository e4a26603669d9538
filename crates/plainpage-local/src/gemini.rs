//! Gemini text-transform backend.
//!
//! Notes:
//! - This runs over HTTP (reqwest) and is async. Wire it from async callers.
//! - Credentials come from the environment; construction fails without a key
//!   so an unconfigured client is caught before a run starts, not during one.
//! - The response is requested as JSON (responseMimeType) because the engine
//!   parses a sections/summary object out of it.

use plainpage_core::{Error, Result, TransformBackend, TransformRequest};
use serde::Serialize;

fn env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn gemini_api_key_from_env() -> Option<String> {
    env("PLAINPAGE_GEMINI_API_KEY").or_else(|| env("GEMINI_API_KEY"))
}

pub fn gemini_model_from_env() -> String {
    env("PLAINPAGE_GEMINI_MODEL").unwrap_or_else(|| "gemini-1.5-flash-8b".to_string())
}

pub fn gemini_base_url_from_env() -> String {
    env("PLAINPAGE_GEMINI_BASE_URL")
        .unwrap_or_else(|| "https://generativelanguage.googleapis.com".to_string())
}

#[derive(Debug, Serialize)]
struct ReqPart {
    text: String,
}

#[derive(Debug, Serialize)]
struct ReqContent {
    parts: Vec<ReqPart>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenCfg {
    temperature: f64,
    top_p: f64,
    top_k: u32,
    max_output_tokens: u32,
    response_mime_type: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiReq {
    contents: Vec<ReqContent>,
    generation_config: GenCfg,
}

#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(client: reqwest::Client, base_url: String, model: String, api_key: String) -> Self {
        Self {
            client,
            base_url,
            model,
            api_key,
        }
    }

    pub fn from_env(client: reqwest::Client) -> Result<Self> {
        let api_key = gemini_api_key_from_env().ok_or_else(|| {
            Error::NotConfigured("PLAINPAGE_GEMINI_API_KEY is not set".to_string())
        })?;
        Ok(Self::new(
            client,
            gemini_base_url_from_env(),
            gemini_model_from_env(),
            api_key,
        ))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn url(&self) -> String {
        format!(
            "{base}/v1beta/models/{model}:generateContent?key={key}",
            base = self.base_url.trim_end_matches('/'),
            model = self.model,
            key = self.api_key,
        )
    }
}

#[async_trait::async_trait]
impl TransformBackend for GeminiClient {
    async fn transform(&self, req: &TransformRequest) -> Result<String> {
        let body = GeminiReq {
            contents: vec![ReqContent {
                parts: vec![ReqPart {
                    text: req.prompt.clone(),
                }],
            }],
            generation_config: GenCfg {
                temperature: req.temperature,
                top_p: req.top_p,
                top_k: req.top_k,
                max_output_tokens: req.max_output_tokens,
                response_mime_type: "application/json",
            },
        };

        let resp = self
            .client
            .post(self.url())
            .timeout(req.timeout())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout(format!("gemini request timed out: {e}"))
                } else {
                    Error::Transform(format!("gemini request failed: {e}"))
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Transform(format!(
                "gemini returned HTTP {status}"
            )));
        }

        let v: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| Error::Transform(format!("gemini response was not JSON: {e}")))?;

        // candidates[0].content.parts[*].text
        let mut out = String::new();
        if let Some(parts) = v
            .get("candidates")
            .and_then(|x| x.as_array())
            .and_then(|c| c.first())
            .and_then(|c| c.get("content"))
            .and_then(|c| c.get("parts"))
            .and_then(|p| p.as_array())
        {
            for p in parts {
                if let Some(t) = p.get("text").and_then(|x| x.as_str()) {
                    out.push_str(t);
                }
            }
        }

        if out.trim().is_empty() {
            return Err(Error::Transform("gemini returned no text".to_string()));
        }
        Ok(out)
    }
}
