use std::collections::HashMap;

use tracing::{info, warn};

use super::SessionError;
use crate::content::{DetailErrorKind, DetailOutcome};
use crate::store::VocabularyStore;
use crate::words::WordIdentity;

#[derive(Debug, Clone, PartialEq)]
pub struct LearnCard {
    pub word: WordIdentity,
    pub detail: DetailOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LearnStep {
    Next,
    Finished,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LearnSummary {
    pub total: usize,
    pub learned: Vec<String>,
    pub completed: bool,
}

/// A fixed batch of new words shown one at a time. Moving past a word marks
/// it learned; there is no correctness check.
pub struct LearnSession {
    store: VocabularyStore,
    words: Vec<WordIdentity>,
    details: HashMap<String, DetailOutcome>,
    index: usize,
    learned: Vec<String>,
    finished: bool,
}

impl LearnSession {
    /// Snapshots up to `batch_size` words to learn and fetches all their
    /// details in one batch.
    pub async fn start(store: &VocabularyStore, batch_size: usize) -> Self {
        let words: Vec<WordIdentity> = store.words_to_learn().into_iter().take(batch_size).collect();
        let mut session = Self {
            store: store.clone(),
            finished: words.is_empty(),
            words,
            details: HashMap::new(),
            index: 0,
            learned: Vec::new(),
        };
        session.refresh_details().await;
        info!(count = session.words.len(), "learn session started");
        session
    }

    /// Re-resolves details for the same snapshot, e.g. after a language switch.
    pub async fn refresh_details(&mut self) {
        if self.words.is_empty() {
            return;
        }
        let ids: Vec<String> = self.words.iter().map(|w| w.id.clone()).collect();
        self.details = self.store.get_details_batch(&ids).await;

        let failed = self.details.values().filter(|d| !d.is_success()).count();
        if failed > 0 {
            warn!(failed, "some learn session words have no details");
        }
    }

    pub fn words(&self) -> &[WordIdentity] {
        &self.words
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// 1-based position of the current word and the session size.
    pub fn position(&self) -> (usize, usize) {
        let total = self.words.len();
        ((self.index + 1).min(total), total)
    }

    pub fn current(&self) -> Option<LearnCard> {
        if self.finished {
            return None;
        }
        let word = self.words.get(self.index)?;
        let detail = self.details.get(&word.id).cloned().unwrap_or_else(|| {
            DetailOutcome::failure(
                DetailErrorKind::RequestFailed,
                "Could not load definition for this word.",
            )
        });
        Some(LearnCard {
            word: word.clone(),
            detail,
        })
    }

    /// Marks the current word learned and moves on.
    pub async fn next(&mut self) -> Result<LearnStep, SessionError> {
        if self.finished {
            return Err(SessionError::Finished);
        }
        let word_id = self
            .words
            .get(self.index)
            .map(|w| w.id.clone())
            .ok_or(SessionError::Finished)?;

        self.store.mark_as_learned(&word_id).await?;
        self.learned.push(word_id);
        self.index += 1;

        if self.index >= self.words.len() {
            self.finished = true;
            info!(learned = self.learned.len(), "learn session finished");
            Ok(LearnStep::Finished)
        } else {
            Ok(LearnStep::Next)
        }
    }

    /// Ends the session; words not yet passed stay NEW.
    pub fn end(self) -> LearnSummary {
        LearnSummary {
            total: self.words.len(),
            completed: self.finished && self.learned.len() == self.words.len(),
            learned: self.learned,
        }
    }
}
