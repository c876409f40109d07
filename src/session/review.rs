//! Review and practice runs.
//!
//! A due review walks the words whose review date has passed and moves them
//! along the interval ladder. Practice drills a single learned word and only
//! touches its counters, never its schedule.

use serde::Serialize;
use tracing::{debug, info};

use super::SessionError;
use crate::content::{DetailOutcome, EvaluationRequest};
use crate::srs::{ProgressEntry, WordStatus};
use crate::store::{StoreError, VocabularyStore};
use crate::words::WordIdentity;

pub const SELF_REPORT_CORRECT: &str = "Marked as correct.";
pub const SELF_REPORT_INCORRECT: &str = "Marked as incorrect.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewMode {
    Due,
    Practice { word_id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerMethod {
    Explanation,
    SelfReport,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReviewCard {
    pub word: WordIdentity,
    pub detail: DetailOutcome,
    pub entry: Option<ProgressEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewFeedback {
    pub word_id: String,
    pub method: AnswerMethod,
    pub is_correct: bool,
    pub feedback: String,
    pub confidence: Option<f64>,
    pub synonym_nuances: Option<String>,
    pub mnemonic: Option<String>,
    pub entry: ProgressEntry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewStep {
    Next,
    Finished,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReviewSummary {
    pub total: usize,
    pub answered: usize,
    pub correct: usize,
    pub completed: bool,
}

pub struct ReviewSession {
    store: VocabularyStore,
    mode: ReviewMode,
    words: Vec<WordIdentity>,
    index: usize,
    card: Option<ReviewCard>,
    feedback: Option<ReviewFeedback>,
    answered: usize,
    correct: usize,
}

impl ReviewSession {
    /// Due mode snapshots the words due now. Practice mode needs a known word
    /// that has already been learned; mastered words are allowed.
    pub fn start(store: &VocabularyStore, mode: ReviewMode) -> Result<Self, SessionError> {
        let words = match &mode {
            ReviewMode::Due => store.words_to_review(),
            ReviewMode::Practice { word_id } => {
                let word = store
                    .word(word_id)
                    .ok_or_else(|| StoreError::UnknownWord(word_id.clone()))?;
                if store.status(word_id) == WordStatus::New {
                    return Err(StoreError::NotLearned(word_id.clone()).into());
                }
                vec![word]
            }
        };

        info!(
            practice = matches!(mode, ReviewMode::Practice { .. }),
            count = words.len(),
            "review session started"
        );

        Ok(Self {
            store: store.clone(),
            mode,
            words,
            index: 0,
            card: None,
            feedback: None,
            answered: 0,
            correct: 0,
        })
    }

    pub fn mode(&self) -> &ReviewMode {
        &self.mode
    }

    pub fn is_practice(&self) -> bool {
        matches!(self.mode, ReviewMode::Practice { .. })
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn is_finished(&self) -> bool {
        self.index >= self.words.len()
    }

    /// Whether free-form explanations can be judged. Without it only the
    /// self-reported path is offered.
    pub fn evaluation_available(&self) -> bool {
        self.store.has_credentials()
    }

    pub fn position(&self) -> (usize, usize) {
        let total = self.words.len();
        ((self.index + 1).min(total), total)
    }

    pub fn pending_feedback(&self) -> Option<&ReviewFeedback> {
        self.feedback.as_ref()
    }

    /// The word under review with its detail, fetched on first access.
    pub async fn current(&mut self) -> Option<&ReviewCard> {
        let word = self.words.get(self.index)?.clone();
        let loaded = self.card.as_ref().is_some_and(|card| card.word.id == word.id);
        if !loaded {
            let detail = self.store.get_details(&word.id).await;
            let entry = self.store.entry(&word.id);
            self.card = Some(ReviewCard {
                word,
                detail,
                entry,
            });
        }
        self.card.as_ref()
    }

    pub async fn submit_explanation(
        &mut self,
        explanation: &str,
    ) -> Result<&ReviewFeedback, SessionError> {
        self.ensure_answerable()?;
        if !self.store.has_credentials() {
            return Err(SessionError::EvaluatorUnavailable);
        }
        let explanation = explanation.trim();
        if explanation.is_empty() {
            return Err(SessionError::EmptyExplanation);
        }

        let (word_id, request) = {
            let card = self.current().await.ok_or(SessionError::Finished)?;
            let request = EvaluationRequest {
                word: card.word.text.clone(),
                definition: card.detail.definition_text().to_string(),
                example_sentence: card.detail.example_text().to_string(),
                user_explanation: explanation.to_string(),
            };
            (card.word.id.clone(), request)
        };

        let evaluation = self.store.evaluate(request).await;
        let entry = self.record(&word_id, evaluation.is_correct).await?;
        debug!(word_id = %word_id, correct = evaluation.is_correct, "explanation evaluated");

        Ok(self.finish_answer(ReviewFeedback {
            word_id,
            method: AnswerMethod::Explanation,
            is_correct: evaluation.is_correct,
            feedback: evaluation.feedback,
            confidence: evaluation.confidence,
            synonym_nuances: evaluation.synonym_nuances,
            mnemonic: evaluation.mnemonic,
            entry,
        }))
    }

    pub async fn submit_self_report(
        &mut self,
        was_correct: bool,
    ) -> Result<&ReviewFeedback, SessionError> {
        self.ensure_answerable()?;
        let word_id = self
            .words
            .get(self.index)
            .map(|w| w.id.clone())
            .ok_or(SessionError::Finished)?;

        let entry = self.record(&word_id, was_correct).await?;
        let feedback = if was_correct {
            SELF_REPORT_CORRECT
        } else {
            SELF_REPORT_INCORRECT
        };

        Ok(self.finish_answer(ReviewFeedback {
            word_id,
            method: AnswerMethod::SelfReport,
            is_correct: was_correct,
            feedback: feedback.to_string(),
            confidence: None,
            synonym_nuances: None,
            mnemonic: None,
            entry,
        }))
    }

    /// Dismisses the pending feedback and moves to the next word.
    pub fn acknowledge(&mut self) -> Result<ReviewStep, SessionError> {
        if self.feedback.take().is_none() {
            return Err(SessionError::NoPendingFeedback);
        }
        self.index += 1;
        self.card = None;

        if self.is_finished() {
            info!(
                answered = self.answered,
                correct = self.correct,
                "review session finished"
            );
            Ok(ReviewStep::Finished)
        } else {
            Ok(ReviewStep::Next)
        }
    }

    pub fn end(self) -> ReviewSummary {
        ReviewSummary {
            total: self.words.len(),
            answered: self.answered,
            correct: self.correct,
            completed: self.index >= self.words.len(),
        }
    }

    fn ensure_answerable(&self) -> Result<(), SessionError> {
        if self.feedback.is_some() {
            return Err(SessionError::AwaitingAcknowledgement);
        }
        if self.is_finished() {
            return Err(SessionError::Finished);
        }
        Ok(())
    }

    async fn record(&self, word_id: &str, was_correct: bool) -> Result<ProgressEntry, SessionError> {
        let entry = if self.is_practice() {
            self.store.record_practice_outcome(word_id, was_correct).await?
        } else {
            self.store.record_review_outcome(word_id, was_correct).await?
        };
        Ok(entry)
    }

    fn finish_answer(&mut self, feedback: ReviewFeedback) -> &ReviewFeedback {
        self.answered += 1;
        if feedback.is_correct {
            self.correct += 1;
        }
        if let Some(card) = self.card.as_mut() {
            card.entry = Some(feedback.entry.clone());
        }
        self.feedback.insert(feedback)
    }
}
