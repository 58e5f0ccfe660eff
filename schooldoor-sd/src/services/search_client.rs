//! Upstream search service client
//!
//! Issues one chat-completion request per attempt asking the upstream
//! service for a JSON array of school records in a region, excluding
//! schools we already know about. Transient failures (rate limit,
//! timeout, connection) are retried with exponential backoff via
//! `RetryPolicy`; credential and request errors are fatal on the first
//! attempt. The HTTP transport sits behind a trait so tests can inject
//! fakes.

use crate::services::retry::{RetryClass, RetryError, RetryPolicy};
use async_trait::async_trait;
use schooldoor_common::config::SearchConfig;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Known names sent upstream are truncated to this many entries to
/// respect prompt size limits.
pub const EXCLUSION_PREFIX_LIMIT: usize = 20;

const USER_AGENT: &str = "SchoolDoor/0.1.0 (https://schooldoor.example)";

/// Search client errors
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Invalid search API key")]
    InvalidApiKey,

    #[error("Upstream rejected the request: {0}")]
    BadRequest(String),

    #[error("Upstream rate limit exceeded")]
    RateLimited,

    #[error("Request timed out")]
    Timeout,

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Malformed upstream response: {0}")]
    Parse(String),

    #[error("Search failed after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: Box<SearchError> },
}

impl SearchError {
    /// Fatal-vs-retryable classification per failure kind.
    pub fn retry_class(&self) -> RetryClass {
        match self {
            SearchError::RateLimited | SearchError::Timeout | SearchError::Connection(_) => {
                RetryClass::Retryable
            }
            _ => RetryClass::Fatal,
        }
    }
}

/// Chat-completion request body
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Chat-completion response body (only the fields we consume)
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionResponse {
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoice {
    pub message: ChatMessage,
}

/// Transport seam for the upstream chat-completion call.
///
/// The production implementation is `HttpSearchTransport`; tests inject
/// fakes to exercise retry and failure paths deterministically.
#[async_trait]
pub trait SearchTransport: Send + Sync {
    async fn complete(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, SearchError>;
}

/// reqwest-backed transport with bearer authentication
pub struct HttpSearchTransport {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpSearchTransport {
    pub fn new(config: &SearchConfig, api_key: String) -> Result<Self, SearchError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| SearchError::Connection(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: config.base_url.clone(),
            api_key,
        })
    }
}

#[async_trait]
impl SearchTransport for HttpSearchTransport {
    async fn complete(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, SearchError> {
        let response = self
            .http_client
            .post(&self.base_url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SearchError::Timeout
                } else {
                    SearchError::Connection(e.to_string())
                }
            })?;

        let status = response.status();

        if status.as_u16() == 401 {
            return Err(SearchError::InvalidApiKey);
        }
        if status.as_u16() == 429 {
            return Err(SearchError::RateLimited);
        }
        if status.as_u16() == 400 {
            let detail = response
                .json::<serde_json::Value>()
                .await
                .ok()
                .and_then(|body| {
                    body.pointer("/error/message")
                        .and_then(|m| m.as_str())
                        .map(str::to_string)
                })
                .unwrap_or_else(|| "Bad request".to_string());
            return Err(SearchError::BadRequest(detail));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(SearchError::Api(status.as_u16(), text));
        }

        response
            .json()
            .await
            .map_err(|e| SearchError::Parse(e.to_string()))
    }
}

/// Search client: prompt construction + retry policy around the transport
pub struct SearchClient {
    transport: Arc<dyn SearchTransport>,
    policy: RetryPolicy,
    model: String,
}

impl SearchClient {
    pub fn new(transport: Arc<dyn SearchTransport>, config: &SearchConfig) -> Self {
        Self {
            transport,
            policy: RetryPolicy::new(config.max_retries, Duration::from_secs(1)),
            model: config.model.clone(),
        }
    }

    /// Search for schools in `region`, excluding already-known names.
    ///
    /// Returns the raw message content on success; the caller parses it.
    pub async fn search_region(
        &self,
        region: &str,
        known_names: &[String],
    ) -> Result<String, SearchError> {
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: "You are an expert at finding and extracting school information. \
                              Always return valid JSON."
                        .to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: build_prompt(region, known_names),
                },
            ],
            max_tokens: 4000,
            temperature: 0.1,
        };

        tracing::info!(region = %region, excluded = known_names.len().min(EXCLUSION_PREFIX_LIMIT),
            "Querying upstream search service");

        let result = self
            .policy
            .run("school_search", SearchError::retry_class, || async {
                self.transport.complete(&request).await
            })
            .await;

        let response = match result {
            Ok(response) => response,
            Err(RetryError::Fatal(err)) => return Err(err),
            Err(RetryError::Exhausted { attempts, last }) => {
                return Err(SearchError::RetriesExhausted {
                    attempts,
                    last: Box::new(last),
                })
            }
        };

        let content = response
            .choices
            .first()
            .map(|choice| choice.message.content.trim().to_string())
            .ok_or_else(|| SearchError::Parse("Response contained no choices".to_string()))?;

        tracing::debug!(
            region = %region,
            preview = %content.chars().take(200).collect::<String>(),
            "Upstream response received"
        );

        Ok(content)
    }
}

/// Build the fixed instructional prompt for a region.
///
/// The exclusion list is truncated to `EXCLUSION_PREFIX_LIMIT` names so
/// large regions cannot blow the upstream prompt budget.
pub fn build_prompt(region: &str, known_names: &[String]) -> String {
    let exclusion = if known_names.is_empty() {
        String::new()
    } else {
        let shown: Vec<&str> = known_names
            .iter()
            .take(EXCLUSION_PREFIX_LIMIT)
            .map(String::as_str)
            .collect();
        format!(
            "\nIMPORTANT: Do NOT include these schools that are already in our database:\n{}\n",
            shown.join(", ")
        )
    };

    format!(
        "Find schools specifically located in {region}, India. IMPORTANT: Only include schools \
         that are actually located in {region} city/area, not other cities.\n\
         {exclusion}\n\
         For each school, provide:\n\
         - name\n\
         - address (street, city, state, postal_code) - MUST be in {region}\n\
         - phone\n\
         - website\n\
         - school_type (CBSE, ICSE, State Board, IB, IGCSE, etc.)\n\
         - board\n\
         - grade_levels (Nursery to 12, Pre-K to 10, etc.)\n\
         - enrollment (approximate, numeric)\n\
         - student_teacher_ratio (numeric)\n\
         - medium_of_instruction (English, Hindi, Regional language)\n\
         - principal_name\n\
         - programs (list of special programs offered)\n\
         - facilities (map of category to list: sports, arts, technology, labs)\n\
         - board_exam_results (map, 10th/12th pass percentage)\n\
         - competitive_exam_results (map, JEE, NEET, etc.)\n\
         \n\
         CRITICAL: Return ONLY a valid JSON array. Do not include any text, explanations, or \
         formatting outside the JSON. Start your response with [ and end with ]. Focus on \
         finding NEW schools not already listed above. Include at least 5-10 new schools if \
         available, or return empty array [] if no new schools found."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_contains_region_and_json_instruction() {
        let prompt = build_prompt("Pune", &[]);
        assert!(prompt.contains("Pune, India"));
        assert!(prompt.contains("Return ONLY a valid JSON array"));
        assert!(!prompt.contains("Do NOT include these schools"));
    }

    #[test]
    fn exclusion_list_is_truncated_to_prefix_limit() {
        let names: Vec<String> = (0..30).map(|i| format!("School {i}")).collect();
        let prompt = build_prompt("Pune", &names);
        assert!(prompt.contains("School 19"));
        assert!(!prompt.contains("School 20"));
    }

    #[test]
    fn classification_matches_failure_taxonomy() {
        assert_eq!(SearchError::InvalidApiKey.retry_class(), RetryClass::Fatal);
        assert_eq!(
            SearchError::BadRequest("bad".into()).retry_class(),
            RetryClass::Fatal
        );
        assert_eq!(SearchError::RateLimited.retry_class(), RetryClass::Retryable);
        assert_eq!(SearchError::Timeout.retry_class(), RetryClass::Retryable);
        assert_eq!(
            SearchError::Connection("refused".into()).retry_class(),
            RetryClass::Retryable
        );
        assert_eq!(
            SearchError::Api(500, "oops".into()).retry_class(),
            RetryClass::Fatal
        );
    }
}
