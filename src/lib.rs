pub mod config;
pub mod content;
pub mod logging;
pub mod session;
pub mod srs;
pub mod store;
pub mod words;

use std::sync::Arc;

use crate::config::Config;
use crate::content::LlmContentService;
use crate::store::{JsonFileStorage, StorageError, VocabularyStore};
use crate::words::WordCatalog;

/// Builds the catalog, content service and file storage described by
/// `config` and loads the persisted store.
pub async fn open_store(config: &Config) -> Result<VocabularyStore, StorageError> {
    let catalog = match &config.word_list_path {
        Some(path) => WordCatalog::from_json_file(path)?,
        None => WordCatalog::builtin(),
    };
    let service = Arc::new(LlmContentService::from_env());
    let storage = Arc::new(JsonFileStorage::new(config.storage_path()));

    VocabularyStore::builder(catalog, service, storage)
        .context(config.context())
        .load()
        .await
}
