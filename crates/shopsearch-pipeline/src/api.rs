//! JSON bodies of the read API.

use serde::{Deserialize, Serialize};

use shopsearch_core::error::Error;
use shopsearch_core::types::SearchHit;

use crate::search::SearchOutcome;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub data: Vec<SearchHit>,
    /// Keywords added by the expander, or the raw query when none were added.
    pub ai_thought: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SearchResponse {
    pub fn from_outcome(query: &str, outcome: SearchOutcome) -> Self {
        let ai_thought = outcome.expansion.keywords().unwrap_or(query).to_string();
        Self { data: outcome.results, ai_thought, error: None }
    }

    /// Backend failures become an empty result list with a message.
    pub fn from_error(query: &str, error: &Error) -> Self {
        Self { data: Vec::new(), ai_thought: query.to_string(), error: Some(error.to_string()) }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetupResponse {
    pub msg: String,
    pub index: String,
    pub dimension: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub index_exists: bool,
}
