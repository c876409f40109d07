use serde::{Deserialize, Serialize};

pub const DEFAULT_MODEL_ID: &str = "gemini-3-flash-preview";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelOption {
    pub id: &'static str,
    pub name: &'static str,
}

pub const AVAILABLE_MODELS: &[ModelOption] = &[
    ModelOption {
        id: DEFAULT_MODEL_ID,
        name: "Gemini 3 Flash",
    },
    ModelOption {
        id: "qwen3-max",
        name: "Qwen 3 Max",
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Zh,
}

impl Language {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "en" | "english" => Some(Self::En),
            "zh" | "zh-cn" | "chinese" => Some(Self::Zh),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Zh => "zh",
        }
    }

    /// Appended to every prompt so generated content matches the UI language.
    pub fn response_instruction(&self) -> &'static str {
        match self {
            Self::En => "Write every explanatory value in English.",
            Self::Zh => {
                "Write definitions, nuance guides, mnemonics and feedback in Simplified Chinese. \
                 Keep example sentences and synonyms in English."
            }
        }
    }
}

/// Parameters that shape generated content. Cached content is only valid for
/// the context it was generated under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentContext {
    pub language: Language,
    pub model: String,
}

impl ContentContext {
    pub fn new(language: Language, model: impl Into<String>) -> Self {
        Self {
            language,
            model: model.into(),
        }
    }
}

impl Default for ContentContext {
    fn default() -> Self {
        Self::new(Language::default(), DEFAULT_MODEL_ID)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordDetail {
    pub definition: String,
    pub example_sentence: String,
    #[serde(default)]
    pub synonyms: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synonym_nuances: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mnemonic: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DetailErrorKind {
    /// Credentials absent. Retried on every call, never cached.
    MissingConfiguration,
    RateLimited,
    InvalidCredentials,
    /// The service answered with something that is not the expected JSON.
    MalformedResponse,
    /// Network failure, non-success status or any other failed call.
    RequestFailed,
    /// The batch answered but left this word out.
    NotReturned,
    UnknownWord,
}

/// Result of resolving a word's detail. Failures carry their kind so callers
/// never have to inspect message text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum DetailOutcome {
    Success(WordDetail),
    Failure {
        kind: DetailErrorKind,
        message: String,
    },
}

impl DetailOutcome {
    pub fn failure(kind: DetailErrorKind, message: impl Into<String>) -> Self {
        Self::Failure {
            kind,
            message: message.into(),
        }
    }

    pub fn missing_configuration() -> Self {
        Self::failure(
            DetailErrorKind::MissingConfiguration,
            "API key not configured.",
        )
    }

    pub fn not_returned() -> Self {
        Self::failure(
            DetailErrorKind::NotReturned,
            "Details not returned by the service for this word.",
        )
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn detail(&self) -> Option<&WordDetail> {
        match self {
            Self::Success(detail) => Some(detail),
            Self::Failure { .. } => None,
        }
    }

    pub fn error_kind(&self) -> Option<DetailErrorKind> {
        match self {
            Self::Success(_) => None,
            Self::Failure { kind, .. } => Some(*kind),
        }
    }

    /// Text to show in place of the definition.
    pub fn definition_text(&self) -> &str {
        match self {
            Self::Success(detail) => &detail.definition,
            Self::Failure { message, .. } => message,
        }
    }

    pub fn example_text(&self) -> &str {
        match self {
            Self::Success(detail) => &detail.example_sentence,
            Self::Failure { .. } => "",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationRequest {
    pub word: String,
    pub definition: String,
    pub example_sentence: String,
    pub user_explanation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
    pub is_correct: bool,
    pub feedback: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synonym_nuances: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mnemonic: Option<String>,
}

impl Evaluation {
    pub fn verdict(is_correct: bool, feedback: impl Into<String>) -> Self {
        Self {
            is_correct,
            feedback: feedback.into(),
            confidence: None,
            synonym_nuances: None,
            mnemonic: None,
        }
    }
}
