//! Query expansion through an Ollama-compatible `/api/generate` endpoint.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use shopsearch_core::config::ExpansionConfig;
use shopsearch_core::error::{Error, ExpansionError, Result};
use shopsearch_core::traits::KeywordExpander;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expansion {
    /// The service returned keywords.
    Expanded(String),
    /// Expansion was switched off for this request.
    Disabled,
    /// The service failed; the raw query is used alone.
    Fallback(String),
}

impl Expansion {
    pub fn keywords(&self) -> Option<&str> {
        match self {
            Expansion::Expanded(k) => Some(k),
            _ => None,
        }
    }

    pub fn is_expanded(&self) -> bool { matches!(self, Expansion::Expanded(_)) }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

pub struct OllamaExpander {
    client: reqwest::Client,
    url: String,
    model: String,
}

impl OllamaExpander {
    pub fn new(config: &ExpansionConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| Error::InvalidConfig(format!("expansion client: {e}")))?;
        Ok(Self {
            client,
            url: format!("{}/api/generate", config.endpoint.trim_end_matches('/')),
            model: config.model.clone(),
        })
    }

    fn prompt(query: &str) -> String {
        format!(
            "Task: Extract product keywords for store search.\n\
             Query: \"{query}\"\n\
             Output: Just list 3-5 keywords in the same language as the query separated by space. No explanation."
        )
    }
}

/// Trims the model output and collapses internal whitespace to single spaces.
fn normalize_keywords(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[async_trait]
impl KeywordExpander for OllamaExpander {
    async fn expand(&self, query: &str) -> std::result::Result<String, ExpansionError> {
        let body = GenerateRequest { model: &self.model, prompt: Self::prompt(query), stream: false };
        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ExpansionError::Unavailable(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ExpansionError::Unavailable(format!("HTTP {status}")));
        }
        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ExpansionError::Malformed(e.to_string()))?;
        let keywords = normalize_keywords(&parsed.response);
        if keywords.is_empty() {
            return Err(ExpansionError::Malformed("empty response".to_string()));
        }
        debug!(%query, %keywords, "query expanded");
        Ok(keywords)
    }
}

/// Runs the expander and converts any failure into [`Expansion::Fallback`].
/// `None` means expansion is disabled.
pub async fn expand_or_fallback(expander: Option<&dyn KeywordExpander>, query: &str) -> Expansion {
    let Some(expander) = expander else {
        return Expansion::Disabled;
    };
    match expander.expand(query).await {
        Ok(keywords) => Expansion::Expanded(keywords),
        Err(e) => {
            warn!(%query, error = %e, "query expansion failed, using raw query");
            Expansion::Fallback(e.to_string())
        }
    }
}
