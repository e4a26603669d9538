//! Simplification engine: a three-tier degrade-on-failure ladder.
//!
//! Tier 1 is a context-aware remote transform, tier 2 a plain remote
//! transform, tier 3 local word substitution. Tiers are an explicit ordered
//! list; every remote attempt goes through the same validation and
//! post-processing contract, and tier 3 cannot fail, so the ladder always
//! terminates with a result once the input guard passes.

use crate::{prompt, substitute};
use plainpage_core::{
    Chunk, Error, Level, ProcessingResult, Result, Tier, TransformBackend, TransformRequest,
    MAX_INPUT_CHARS, SECTION_SEPARATOR,
};
use serde::Deserialize;
use std::sync::Arc;

fn env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn transform_timeout_ms_from_env() -> u64 {
    env("PLAINPAGE_TRANSFORM_TIMEOUT_MS")
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(30_000)
        .clamp(1_000, 300_000)
}

const TIERS: [Tier; 3] = [Tier::ContextAware, Tier::Plain, Tier::WordSubstitution];

/// Expected JSON body of a remote transform response.
#[derive(Debug, Deserialize)]
struct TransformPayload {
    sections: Vec<String>,
    summary: String,
}

pub struct Engine {
    backend: Option<Arc<dyn TransformBackend>>,
    request_timeout_ms: u64,
}

impl Engine {
    pub fn new(backend: Option<Arc<dyn TransformBackend>>) -> Self {
        Self {
            backend,
            request_timeout_ms: transform_timeout_ms_from_env(),
        }
    }

    /// Offline-only engine: remote tiers are skipped as unconfigured.
    pub fn offline() -> Self {
        Self::new(None)
    }

    /// Simplify one chunk's texts.
    ///
    /// Fails fast (no tiers, no retries) on empty or oversized input; any
    /// other failure walks down the tier ladder.
    pub async fn simplify(
        &self,
        chunk: &Chunk,
        level: Level,
        previous_summary: Option<&str>,
    ) -> Result<ProcessingResult> {
        let texts: Vec<&str> = chunk.items.iter().map(|i| i.text.as_str()).collect();
        let combined = texts.join(SECTION_SEPARATOR);
        if combined.trim().is_empty() {
            return Err(Error::InvalidInput("empty chunk text".to_string()));
        }
        let combined_chars = combined.chars().count();
        if combined_chars > MAX_INPUT_CHARS {
            return Err(Error::InvalidInput(format!(
                "chunk text too long ({combined_chars} chars, max {MAX_INPUT_CHARS})"
            )));
        }

        let mut last_err: Option<Error> = None;
        for tier in TIERS {
            match self
                .attempt(tier, &combined, &texts, chunk, level, previous_summary)
                .await
            {
                Ok(result) => {
                    if last_err.is_some() {
                        tracing::debug!(?tier, "tier fallback produced a result");
                    }
                    return Ok(result);
                }
                Err(e) => {
                    tracing::warn!(?tier, error = %e, "simplification tier failed");
                    last_err = Some(e);
                }
            }
        }

        // Unreachable: word substitution cannot fail. Keep the error path
        // anyway so the ladder stays honest if tiers are ever reordered.
        Err(last_err.unwrap_or_else(|| Error::Transform("no tier produced a result".to_string())))
    }

    async fn attempt(
        &self,
        tier: Tier,
        combined: &str,
        texts: &[&str],
        chunk: &Chunk,
        level: Level,
        previous_summary: Option<&str>,
    ) -> Result<ProcessingResult> {
        let expected = texts.len();
        match tier {
            Tier::ContextAware => {
                let prompt = prompt::context_aware(
                    combined,
                    expected,
                    &chunk.context(),
                    previous_summary,
                    level,
                );
                self.remote(tier, prompt, 0.7, expected).await
            }
            Tier::Plain => {
                let prompt = prompt::plain(combined, expected, level);
                self.remote(tier, prompt, 0.3, expected).await
            }
            Tier::WordSubstitution => {
                let out: Vec<Option<String>> = texts
                    .iter()
                    .map(|t| Some(substitute::simplify_offline(t, level)))
                    .collect();
                Ok(ProcessingResult {
                    texts: out,
                    summary: substitute::OFFLINE_SUMMARY.to_string(),
                    tier,
                })
            }
        }
    }

    async fn remote(
        &self,
        tier: Tier,
        prompt: String,
        temperature: f64,
        expected: usize,
    ) -> Result<ProcessingResult> {
        let backend = self
            .backend
            .as_ref()
            .ok_or_else(|| Error::NotConfigured("no transform backend".to_string()))?;

        let req = TransformRequest {
            prompt,
            temperature,
            top_p: 0.8,
            top_k: 40,
            max_output_tokens: 4096,
            timeout_ms: self.request_timeout_ms,
        };
        let raw = backend.transform(&req).await?;
        if raw.trim().is_empty() {
            return Err(Error::Transform("empty transform response".to_string()));
        }

        let payload: TransformPayload = serde_json::from_str(&raw)
            .map_err(|e| Error::Transform(format!("response was not the expected JSON: {e}")))?;
        if payload.summary.trim().is_empty() {
            return Err(Error::Transform("missing summary".to_string()));
        }

        let texts = normalize_sections(payload.sections, expected);
        if texts.iter().all(|t| t.is_none()) {
            return Err(Error::Transform("all sections empty".to_string()));
        }

        Ok(ProcessingResult {
            texts,
            summary: payload.summary.trim().to_string(),
            tier,
        })
    }
}

fn norm_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Clean one returned section: strip wrapping quotes and structural label
/// prefixes, drop stray separator tokens, collapse whitespace, and ensure
/// terminal punctuation.
fn cleanup_section(raw: &str) -> Option<String> {
    let mut s = raw.trim();
    while (s.starts_with('"') && s.ends_with('"') && s.len() >= 2)
        || (s.starts_with('\'') && s.ends_with('\'') && s.len() >= 2)
    {
        s = &s[1..s.len() - 1];
    }

    let mut text = s.replace(SECTION_SEPARATOR, " ");
    for label in ["[HEADING]", "[QUOTE]", "[LIST]"] {
        if let Some(rest) = text.trim_start().strip_prefix(label) {
            text = rest.to_string();
            break;
        }
    }
    let text = norm_ws(&text);
    if text.is_empty() {
        return None;
    }

    if text.ends_with(['.', '!', '?']) {
        Some(text)
    } else {
        Some(format!("{text}."))
    }
}

/// Force the section list to exactly `expected` entries: short lists are
/// padded with the skip sentinel, long lists truncated.
fn normalize_sections(sections: Vec<String>, expected: usize) -> Vec<Option<String>> {
    let mut out: Vec<Option<String>> = sections
        .into_iter()
        .take(expected)
        .map(|s| cleanup_section(&s))
        .collect();
    while out.len() < expected {
        out.push(None);
    }
    out
}
