//! Durable blob layout: `{learnedWords, wordDetailsCache, context}`.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::content::{ContentContext, WordDetail};
use crate::srs::ProgressEntry;

/// Placeholder texts that older snapshots stored in place of real content.
/// An entry carrying one of them is an error, not a definition.
pub const ERROR_MARKERS: &[&str] = &[
    "API key not configured",
    "API client not initialized",
    "Invalid API Key",
    "API rate limit hit",
    "Error fetching",
    "Error in batch fetch",
    "Error awaiting previous batch",
    "Could not load definition",
    "Loading error (in-flight)",
    "Details not returned by",
    "Details not found in API response",
    "Details unavailable due to rate limit",
];

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotOut<'a> {
    learned_words: BTreeMap<&'a str, &'a ProgressEntry>,
    word_details_cache: BTreeMap<&'a str, &'a WordDetail>,
    context: &'a ContentContext,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct SnapshotIn {
    #[serde(default)]
    learned_words: HashMap<String, serde_json::Value>,
    #[serde(default)]
    word_details_cache: HashMap<String, serde_json::Value>,
    #[serde(default)]
    context: Option<ContentContext>,
}

#[derive(Debug, Default)]
pub struct RestoredState {
    pub progress: HashMap<String, ProgressEntry>,
    pub cache: HashMap<String, WordDetail>,
    /// Absent in snapshots written before the context was recorded.
    pub context: Option<ContentContext>,
    pub dropped_entries: usize,
}

pub fn is_error_marked(detail: &WordDetail) -> bool {
    [detail.definition.as_str(), detail.example_sentence.as_str()]
        .iter()
        .any(|text| ERROR_MARKERS.iter().any(|marker| text.contains(marker)))
}

pub fn encode(
    progress: &HashMap<String, ProgressEntry>,
    cache: &HashMap<String, WordDetail>,
    context: &ContentContext,
) -> serde_json::Result<String> {
    let snapshot = SnapshotOut {
        learned_words: progress.iter().map(|(k, v)| (k.as_str(), v)).collect(),
        word_details_cache: cache.iter().map(|(k, v)| (k.as_str(), v)).collect(),
        context,
    };
    serde_json::to_string(&snapshot)
}

/// Parses a snapshot, dropping records that do not deserialize and cache
/// entries that carry an error marker.
pub fn decode(blob: &str) -> serde_json::Result<RestoredState> {
    let raw: SnapshotIn = serde_json::from_str(blob)?;
    let mut restored = RestoredState {
        context: raw.context,
        ..RestoredState::default()
    };

    for (word_id, value) in raw.learned_words {
        match serde_json::from_value::<ProgressEntry>(value) {
            Ok(mut entry) => {
                entry.word_id = word_id.clone();
                restored.progress.insert(word_id, entry.normalized());
            }
            Err(err) => {
                warn!(word_id = %word_id, error = %err, "dropping unreadable progress entry");
                restored.dropped_entries += 1;
            }
        }
    }

    for (word_id, value) in raw.word_details_cache {
        match serde_json::from_value::<WordDetail>(value) {
            Ok(detail) if !is_error_marked(&detail) => {
                restored.cache.insert(word_id, detail);
            }
            Ok(_) => {
                warn!(word_id = %word_id, "dropping cached error placeholder");
                restored.dropped_entries += 1;
            }
            Err(err) => {
                warn!(word_id = %word_id, error = %err, "dropping unreadable cached detail");
                restored.dropped_entries += 1;
            }
        }
    }

    Ok(restored)
}
