use std::path::PathBuf;

use crate::content::{ContentContext, Language, DEFAULT_MODEL_ID};
use crate::srs::scheduler::LEARN_BATCH_SIZE;

const APP_NAME: &str = "danci-srs";
const STORAGE_FILE_NAME: &str = "progress.json";
const DEFAULT_LOG_DIR: &str = "./logs";

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    /// Set when `ENABLE_FILE_LOGS` is on; defaults to `./logs`.
    pub log_file_dir: Option<PathBuf>,
    pub data_dir: PathBuf,
    pub language: Language,
    pub model: String,
    pub word_list_path: Option<PathBuf>,
    pub learn_batch_size: usize,
}

impl Config {
    pub fn from_env() -> Self {
        let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let log_file_dir = env_flag("ENABLE_FILE_LOGS").then(|| {
            env_string("LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_DIR))
        });

        let data_dir = env_string("DANCI_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(default_data_dir);

        let language = env_string("DANCI_LANGUAGE")
            .and_then(|value| Language::parse(&value))
            .unwrap_or_default();

        let model = env_string("DANCI_MODEL").unwrap_or_else(|| DEFAULT_MODEL_ID.to_string());

        let word_list_path = env_string("DANCI_WORD_LIST").map(PathBuf::from);

        let learn_batch_size = env_string("DANCI_LEARN_BATCH_SIZE")
            .and_then(|value| value.parse::<usize>().ok())
            .filter(|size| *size > 0)
            .unwrap_or(LEARN_BATCH_SIZE);

        Self {
            log_level,
            log_file_dir,
            data_dir,
            language,
            model,
            word_list_path,
            learn_batch_size,
        }
    }

    pub fn storage_path(&self) -> PathBuf {
        self.data_dir.join(STORAGE_FILE_NAME)
    }

    pub fn context(&self) -> ContentContext {
        ContentContext::new(self.language, self.model.clone())
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join(APP_NAME))
        .unwrap_or_else(|| PathBuf::from("."))
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_flag(key: &str) -> bool {
    env_string(key).is_some_and(|v| v == "true" || v == "1")
}
