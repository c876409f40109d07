pub mod llm;
pub mod service;
pub mod types;

pub use llm::{LlmConfig, LlmContentService};
pub use service::{ContentError, ContentService};
pub use types::{
    ContentContext, DetailErrorKind, DetailOutcome, Evaluation, EvaluationRequest, Language,
    ModelOption, WordDetail, AVAILABLE_MODELS, DEFAULT_MODEL_ID,
};
