use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{debug, warn};

use super::service::{ContentError, ContentService};
use super::types::{ContentContext, Evaluation, EvaluationRequest, WordDetail};

const DEFAULT_API_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/openai";
const DEFAULT_TIMEOUT_MS: u64 = 60_000;
const MAX_RETRIES: usize = 3;
const BASE_BACKOFF_MS: u64 = 200;
const MAX_ERROR_BODY_CHARS: usize = 300;

const DETAIL_TEMPERATURE: f64 = 0.5;
const BATCH_TEMPERATURE: f64 = 0.4;
const EVALUATION_TEMPERATURE: f64 = 0.6;

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub api_endpoint: String,
    pub timeout: Duration,
}

impl LlmConfig {
    pub fn from_env() -> Self {
        let api_key = env_string("LLM_API_KEY").map(|raw| decode_api_key(&raw));
        let api_endpoint = normalize_endpoint(
            env_string("LLM_API_ENDPOINT")
                .or_else(|| env_string("LLM_BASE_URL"))
                .unwrap_or_else(|| DEFAULT_API_ENDPOINT.to_string()),
        );
        let timeout = Duration::from_millis(env_u64("LLM_TIMEOUT").unwrap_or(DEFAULT_TIMEOUT_MS));

        Self {
            api_key,
            api_endpoint,
            timeout,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    pub model: Option<String>,
    pub choices: Vec<ChatChoice>,
}

impl ChatResponse {
    pub fn first_content(&self) -> Option<&str> {
        self.choices.first().map(|c| c.message.content.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoice {
    pub message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct WordDetailsPayload {
    #[serde(default)]
    definition: Option<String>,
    #[serde(default)]
    example_sentence: Option<String>,
    #[serde(default)]
    synonyms: Option<Vec<String>>,
    #[serde(default, rename = "synonymNuances")]
    synonym_nuances: Option<String>,
    #[serde(default)]
    mnemonic: Option<String>,
}

impl WordDetailsPayload {
    fn into_detail(self) -> WordDetail {
        WordDetail {
            definition: non_empty(self.definition)
                .unwrap_or_else(|| "No definition provided.".to_string()),
            example_sentence: non_empty(self.example_sentence)
                .unwrap_or_else(|| "No example sentence provided.".to_string()),
            synonyms: self
                .synonyms
                .unwrap_or_default()
                .into_iter()
                .filter(|s| !s.trim().is_empty())
                .collect(),
            synonym_nuances: non_empty(self.synonym_nuances),
            mnemonic: non_empty(self.mnemonic),
        }
    }
}

#[derive(Debug, Deserialize)]
struct EvaluationPayload {
    is_correct: bool,
    #[serde(default)]
    feedback: String,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default, rename = "synonymNuances")]
    synonym_nuances: Option<String>,
    #[serde(default)]
    mnemonic: Option<String>,
}

/// Content service backed by an OpenAI-compatible chat completions endpoint.
#[derive(Clone)]
pub struct LlmContentService {
    config: LlmConfig,
    client: reqwest::Client,
}

impl LlmContentService {
    pub fn from_env() -> Self {
        Self::new(LlmConfig::from_env())
    }

    pub fn new(config: LlmConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self { config, client }
    }

    async fn complete(
        &self,
        context: &ContentContext,
        prompt: String,
        temperature: f64,
    ) -> Result<String, ContentError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .ok_or(ContentError::NotConfigured("LLM_API_KEY"))?;

        let url = format!("{}/chat/completions", self.config.api_endpoint.trim_end_matches('/'));
        let messages = [
            ChatMessage {
                role: "system".into(),
                content: format!(
                    "You are a vocabulary tutor. Reply with a single JSON object only. {}",
                    context.language.response_instruction()
                ),
            },
            ChatMessage {
                role: "user".into(),
                content: prompt,
            },
        ];
        let payload = serde_json::json!({
            "model": context.model,
            "messages": messages,
            "temperature": temperature,
            "response_format": { "type": "json_object" },
            "stream": false
        });

        let response = self.post_with_retry(&url, api_key, &payload).await?;
        response
            .first_content()
            .map(|s| s.to_string())
            .filter(|s| !s.trim().is_empty())
            .ok_or(ContentError::EmptyResponse)
    }

    async fn post_with_retry(
        &self,
        url: &str,
        api_key: &str,
        payload: &serde_json::Value,
    ) -> Result<ChatResponse, ContentError> {
        let mut last_error: Option<ContentError> = None;

        for retry in 0..=MAX_RETRIES {
            match self.client.post(url).bearer_auth(api_key).json(payload).send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        let bytes = resp.bytes().await?;
                        return serde_json::from_slice(&bytes).map_err(|e| {
                            tracing::error!(error = %e, "failed to parse chat completion body");
                            ContentError::Json(e)
                        });
                    }
                    let body = resp.text().await.unwrap_or_default();
                    let err = classify_status(status, body);
                    if retry < MAX_RETRIES && is_retryable(&err) {
                        let backoff = Duration::from_millis(BASE_BACKOFF_MS * (1 << retry));
                        warn!(retry, ?status, "content request failed, retrying");
                        sleep(backoff).await;
                        last_error = Some(err);
                        continue;
                    }
                    return Err(err);
                }
                Err(e) => {
                    let err = ContentError::Request(e);
                    if retry < MAX_RETRIES {
                        let backoff = Duration::from_millis(BASE_BACKOFF_MS * (1 << retry));
                        warn!(retry, "content request error, retrying");
                        sleep(backoff).await;
                        last_error = Some(err);
                        continue;
                    }
                    return Err(err);
                }
            }
        }
        Err(last_error.unwrap_or(ContentError::EmptyResponse))
    }
}

#[async_trait]
impl ContentService for LlmContentService {
    fn is_configured(&self) -> bool {
        self.config.api_key.as_deref().is_some_and(|v| !v.trim().is_empty())
            && !self.config.api_endpoint.trim().is_empty()
    }

    async fn fetch_one(
        &self,
        text: &str,
        context: &ContentContext,
    ) -> Result<WordDetail, ContentError> {
        debug!(word = %text, model = %context.model, "fetching word details");
        let content = self
            .complete(context, detail_prompt(text), DETAIL_TEMPERATURE)
            .await?;
        parse_detail(&content)
    }

    async fn fetch_many(
        &self,
        texts: &[String],
        context: &ContentContext,
    ) -> Result<HashMap<String, WordDetail>, ContentError> {
        if texts.is_empty() {
            return Ok(HashMap::new());
        }
        debug!(count = texts.len(), model = %context.model, "fetching batch word details");
        let content = self
            .complete(context, batch_prompt(texts)?, BATCH_TEMPERATURE)
            .await?;
        parse_batch(&content, texts)
    }

    async fn evaluate(
        &self,
        request: &EvaluationRequest,
        context: &ContentContext,
    ) -> Result<Evaluation, ContentError> {
        debug!(word = %request.word, model = %context.model, "evaluating explanation");
        let content = self
            .complete(context, evaluation_prompt(request), EVALUATION_TEMPERATURE)
            .await?;
        parse_evaluation(&content)
    }
}

fn detail_prompt(word: &str) -> String {
    format!(
        r#"For the word "{word}", return a JSON object with these keys:
- "word": the word itself
- "definition": a concise definition
- "example_sentence": an example sentence using the word
- "synonyms": an array of 2-3 common synonyms, if any
- "synonymNuances": how those synonyms differ and when to use which
- "mnemonic": a short joke or fun fact that helps memorize the word

Use empty strings or empty arrays when you have nothing; never omit a key."#
    )
}

fn batch_prompt(words: &[String]) -> Result<String, ContentError> {
    let list = serde_json::to_string(words)?;
    Ok(format!(
        r#"Return a single JSON object whose keys are exactly the input words below.
Each value is an object with the keys:
- "definition"
- "example_sentence"
- "synonyms" (array of strings)
- "synonymNuances" (how the synonyms differ and when to use which)
- "mnemonic" (a joke or fun fact that helps memorize the word)

Input words:
{list}"#
    ))
}

fn evaluation_prompt(request: &EvaluationRequest) -> String {
    format!(
        r#"The target word is "{word}".
Its definition is: "{definition}"
An example sentence is: "{example}"
The learner wrote: "{explanation}"

Decide whether the learner's text shows a correct and adequate understanding of the word,
focusing on core meaning and appropriate usage. Return a JSON object with:
- "is_correct": boolean
- "feedback": brief explanation
- "confidence": number between 0.0 and 1.0
- "synonymNuances": how the word differs from its synonyms (always provide)
- "mnemonic": a joke or fun fact that helps memorize the word (always provide)"#,
        word = request.word,
        definition = request.definition,
        example = request.example_sentence,
        explanation = request.user_explanation,
    )
}

fn parse_detail(content: &str) -> Result<WordDetail, ContentError> {
    let payload: WordDetailsPayload = serde_json::from_str(&extract_json_from_response(content))?;
    Ok(payload.into_detail())
}

fn parse_batch(content: &str, words: &[String]) -> Result<HashMap<String, WordDetail>, ContentError> {
    let mut parsed: HashMap<String, WordDetailsPayload> =
        serde_json::from_str(&extract_json_from_response(content))?;

    let mut out = HashMap::with_capacity(words.len());
    for word in words {
        let payload = parsed.remove(word).or_else(|| {
            let key = parsed.keys().find(|k| k.eq_ignore_ascii_case(word))?.clone();
            parsed.remove(&key)
        });
        match payload {
            Some(payload) => {
                out.insert(word.clone(), payload.into_detail());
            }
            None => debug!(word = %word, "word missing from batch response"),
        }
    }
    Ok(out)
}

fn parse_evaluation(content: &str) -> Result<Evaluation, ContentError> {
    let payload: EvaluationPayload = serde_json::from_str(&extract_json_from_response(content))?;
    Ok(Evaluation {
        is_correct: payload.is_correct,
        feedback: payload.feedback,
        confidence: payload.confidence.map(|c| c.clamp(0.0, 1.0)),
        synonym_nuances: non_empty(payload.synonym_nuances),
        mnemonic: non_empty(payload.mnemonic),
    })
}

fn extract_json_from_response(response: &str) -> String {
    let trimmed = response.trim();

    if let Some(start) = trimmed.find('{') {
        if let Some(end) = trimmed.rfind('}') {
            if end > start {
                return trimmed[start..=end].to_string();
            }
        }
    }

    if let Some(start) = trimmed.find("```json") {
        let after_marker = &trimmed[start + 7..];
        if let Some(end) = after_marker.find("```") {
            return after_marker[..end].trim().to_string();
        }
    }

    trimmed.to_string()
}

fn classify_status(status: reqwest::StatusCode, body: String) -> ContentError {
    let body = truncate(body);
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS || body.contains("RESOURCE_EXHAUSTED") {
        ContentError::RateLimited(body)
    } else if status == reqwest::StatusCode::UNAUTHORIZED
        || status == reqwest::StatusCode::FORBIDDEN
        || body.contains("API key not valid")
    {
        ContentError::InvalidApiKey(body)
    } else {
        ContentError::HttpStatus { status, body }
    }
}

/// Rate limits are surfaced to the caller instead of being retried.
fn is_retryable(err: &ContentError) -> bool {
    match err {
        ContentError::HttpStatus { status, .. } => {
            *status == reqwest::StatusCode::REQUEST_TIMEOUT || status.is_server_error()
        }
        ContentError::Request(_) => true,
        _ => false,
    }
}

/// Keys starting with `AIza` are used raw; anything else may be Base64 encoded.
pub fn decode_api_key(raw: &str) -> String {
    let raw = raw.trim();
    if raw.starts_with("AIza") {
        return raw.to_string();
    }
    match base64::engine::general_purpose::STANDARD.decode(raw) {
        Ok(bytes) => match String::from_utf8(bytes) {
            Ok(decoded) if !decoded.trim().is_empty() => decoded.trim().to_string(),
            _ => raw.to_string(),
        },
        Err(_) => {
            debug!("API key is not Base64 encoded, using raw value");
            raw.to_string()
        }
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_u64(key: &str) -> Option<u64> {
    env_string(key)?.parse().ok()
}

fn normalize_endpoint(endpoint: String) -> String {
    let trimmed = endpoint.trim().trim_end_matches('/');
    let has_version = trimmed.rsplit('/').any(|segment| {
        let mut chars = segment.chars();
        chars.next() == Some('v') && chars.next().is_some_and(|c| c.is_ascii_digit())
    });
    if has_version {
        trimmed.to_string()
    } else {
        format!("{trimmed}/v1")
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn truncate(body: String) -> String {
    if body.chars().count() <= MAX_ERROR_BODY_CHARS {
        return body;
    }
    body.chars().take(MAX_ERROR_BODY_CHARS).collect()
}
