use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

use super::types::{ContentContext, DetailErrorKind, Evaluation, EvaluationRequest, WordDetail};

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("content service not configured: {0}")]
    NotConfigured(&'static str),
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("invalid API key: {0}")]
    InvalidApiKey(String),
    #[error("HTTP {status}: {body}")]
    HttpStatus { status: reqwest::StatusCode, body: String },
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("JSON decode failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("empty response")]
    EmptyResponse,
}

impl ContentError {
    pub fn kind(&self) -> DetailErrorKind {
        match self {
            Self::NotConfigured(_) => DetailErrorKind::MissingConfiguration,
            Self::RateLimited(_) => DetailErrorKind::RateLimited,
            Self::InvalidApiKey(_) => DetailErrorKind::InvalidCredentials,
            Self::Json(_) | Self::EmptyResponse => DetailErrorKind::MalformedResponse,
            Self::HttpStatus { .. } | Self::Request(_) => DetailErrorKind::RequestFailed,
        }
    }

    /// Short message shown in place of content.
    pub fn user_message(&self) -> String {
        match self {
            Self::NotConfigured(_) => "API key not configured.".to_string(),
            Self::RateLimited(detail) => format!("API rate limit hit: {detail}"),
            Self::InvalidApiKey(_) => "Invalid API key. Please check your configuration.".to_string(),
            Self::Json(_) | Self::EmptyResponse => {
                "The content service returned an unreadable response.".to_string()
            }
            Self::HttpStatus { status, .. } => format!("Content service error (HTTP {status})."),
            Self::Request(_) => "Could not reach the content service.".to_string(),
        }
    }
}

/// Remote generator of word content and explanation verdicts.
#[async_trait]
pub trait ContentService: Send + Sync {
    /// Whether credentials are present. When false no call is attempted.
    fn is_configured(&self) -> bool;

    async fn fetch_one(
        &self,
        text: &str,
        context: &ContentContext,
    ) -> Result<WordDetail, ContentError>;

    /// Keyed by the input text. Words the service skipped are simply absent.
    async fn fetch_many(
        &self,
        texts: &[String],
        context: &ContentContext,
    ) -> Result<HashMap<String, WordDetail>, ContentError>;

    async fn evaluate(
        &self,
        request: &EvaluationRequest,
        context: &ContentContext,
    ) -> Result<Evaluation, ContentError>;
}
