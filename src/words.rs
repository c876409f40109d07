use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::store::StorageError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WordIdentity {
    pub id: String,
    pub text: String,
}

impl WordIdentity {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}

/// The fixed universe of words, in canonical order.
#[derive(Debug, Clone)]
pub struct WordCatalog {
    words: Vec<WordIdentity>,
    index: HashMap<String, usize>,
}

impl WordCatalog {
    /// Later duplicates of an id are ignored.
    pub fn new(words: Vec<WordIdentity>) -> Self {
        let mut unique = Vec::with_capacity(words.len());
        let mut index = HashMap::with_capacity(words.len());
        for word in words {
            if index.contains_key(&word.id) {
                tracing::warn!(word_id = %word.id, "duplicate word id in catalog, ignoring");
                continue;
            }
            index.insert(word.id.clone(), unique.len());
            unique.push(word);
        }
        Self {
            words: unique,
            index,
        }
    }

    pub fn builtin() -> Self {
        Self::new(
            BUILTIN_GRE_WORDS
                .iter()
                .map(|(id, text)| WordIdentity::new(*id, *text))
                .collect(),
        )
    }

    /// Reads a JSON array of `{"id": .., "text": ..}` objects.
    pub fn from_json_file(path: &Path) -> Result<Self, StorageError> {
        let raw = std::fs::read_to_string(path)?;
        let words: Vec<WordIdentity> = serde_json::from_str(&raw)?;
        Ok(Self::new(words))
    }

    pub fn all(&self) -> &[WordIdentity] {
        &self.words
    }

    pub fn get(&self, id: &str) -> Option<&WordIdentity> {
        self.index.get(id).map(|pos| &self.words[*pos])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

impl Default for WordCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

const BUILTIN_GRE_WORDS: &[(&str, &str)] = &[
    ("gre-001", "aberrant"),
    ("gre-002", "abscond"),
    ("gre-003", "alacrity"),
    ("gre-004", "anomaly"),
    ("gre-005", "approbation"),
    ("gre-006", "arduous"),
    ("gre-007", "assuage"),
    ("gre-008", "audacious"),
    ("gre-009", "austere"),
    ("gre-010", "axiomatic"),
    ("gre-011", "bolster"),
    ("gre-012", "bombastic"),
    ("gre-013", "cacophony"),
    ("gre-014", "capricious"),
    ("gre-015", "castigate"),
    ("gre-016", "chicanery"),
    ("gre-017", "cogent"),
    ("gre-018", "conundrum"),
    ("gre-019", "corroborate"),
    ("gre-020", "credulous"),
    ("gre-021", "deference"),
    ("gre-022", "denigrate"),
    ("gre-023", "diatribe"),
    ("gre-024", "dogmatic"),
    ("gre-025", "ebullient"),
    ("gre-026", "eclectic"),
    ("gre-027", "efficacy"),
    ("gre-028", "enervate"),
    ("gre-029", "ephemeral"),
    ("gre-030", "equivocate"),
    ("gre-031", "erudite"),
    ("gre-032", "esoteric"),
    ("gre-033", "exacerbate"),
    ("gre-034", "fastidious"),
    ("gre-035", "garrulous"),
    ("gre-036", "gregarious"),
    ("gre-037", "hegemony"),
    ("gre-038", "iconoclast"),
    ("gre-039", "laconic"),
    ("gre-040", "loquacious"),
    ("gre-041", "mitigate"),
    ("gre-042", "obdurate"),
    ("gre-043", "pedantic"),
    ("gre-044", "perfunctory"),
    ("gre-045", "prodigal"),
    ("gre-046", "quiescent"),
    ("gre-047", "sagacious"),
    ("gre-048", "ubiquitous"),
    ("gre-049", "vacillate"),
    ("gre-050", "zealot"),
];
