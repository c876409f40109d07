pub mod learn;
pub mod review;

use thiserror::Error;

use crate::store::StoreError;

pub use learn::{LearnCard, LearnSession, LearnStep, LearnSummary};
pub use review::{
    AnswerMethod, ReviewCard, ReviewFeedback, ReviewMode, ReviewSession, ReviewStep,
    ReviewSummary,
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("dynamic evaluation is unavailable, report the outcome manually")]
    EvaluatorUnavailable,
    #[error("explanation is empty")]
    EmptyExplanation,
    #[error("feedback for the current word has not been acknowledged")]
    AwaitingAcknowledgement,
    #[error("no feedback is pending")]
    NoPendingFeedback,
    #[error("session is finished")]
    Finished,
}
