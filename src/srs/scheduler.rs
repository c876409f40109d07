use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::progress::{ProgressEntry, WordStatus};
use crate::words::{WordCatalog, WordIdentity};

/// Words offered per learning session.
pub const LEARN_BATCH_SIZE: usize = 7;

pub type ProgressMap = HashMap<String, ProgressEntry>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressStats {
    pub total_words: usize,
    pub learned_count: usize,
    pub mastered_count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub stats: ProgressStats,
    pub words_to_learn: usize,
    pub words_to_review: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WordOverview {
    pub word: WordIdentity,
    pub status: WordStatus,
    pub next_review_date: Option<DateTime<Utc>>,
}

pub fn status_of(entries: &ProgressMap, word_id: &str) -> WordStatus {
    entries
        .get(word_id)
        .map(|entry| entry.status)
        .unwrap_or(WordStatus::New)
}

/// Words never learned, in catalog order.
pub fn words_to_learn(catalog: &WordCatalog, entries: &ProgressMap) -> Vec<WordIdentity> {
    catalog
        .all()
        .iter()
        .filter(|word| status_of(entries, &word.id) == WordStatus::New)
        .cloned()
        .collect()
}

/// Learning/reviewing words whose next review is not in the future, in catalog order.
pub fn words_to_review(
    catalog: &WordCatalog,
    entries: &ProgressMap,
    now: DateTime<Utc>,
) -> Vec<WordIdentity> {
    catalog
        .all()
        .iter()
        .filter(|word| entries.get(&word.id).is_some_and(|entry| entry.is_due(now)))
        .cloned()
        .collect()
}

pub fn progress_stats(catalog: &WordCatalog, entries: &ProgressMap) -> ProgressStats {
    let learned_count = entries
        .values()
        .filter(|entry| entry.status != WordStatus::New)
        .count();
    let mastered_count = entries
        .values()
        .filter(|entry| entry.status == WordStatus::Mastered)
        .count();

    ProgressStats {
        total_words: catalog.len(),
        learned_count,
        mastered_count,
    }
}

pub fn dashboard(catalog: &WordCatalog, entries: &ProgressMap, now: DateTime<Utc>) -> Dashboard {
    Dashboard {
        stats: progress_stats(catalog, entries),
        words_to_learn: words_to_learn(catalog, entries).len(),
        words_to_review: words_to_review(catalog, entries, now).len(),
    }
}

/// Every word with its effective status, filtered by a case-insensitive
/// substring of its text and sorted alphabetically.
pub fn word_overview(
    catalog: &WordCatalog,
    entries: &ProgressMap,
    search: &str,
    order: SortOrder,
) -> Vec<WordOverview> {
    let needle = search.trim().to_lowercase();
    let mut rows: Vec<WordOverview> = catalog
        .all()
        .iter()
        .filter(|word| needle.is_empty() || word.text.to_lowercase().contains(&needle))
        .map(|word| {
            let entry = entries.get(&word.id);
            WordOverview {
                word: word.clone(),
                status: entry.map(|e| e.status).unwrap_or(WordStatus::New),
                next_review_date: entry.and_then(|e| e.next_review_date),
            }
        })
        .collect();

    rows.sort_by(|a, b| {
        let ord = a.word.text.to_lowercase().cmp(&b.word.text.to_lowercase());
        match order {
            SortOrder::Ascending => ord,
            SortOrder::Descending => ord.reverse(),
        }
    });
    rows
}
