#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::Mutex;
use tokio::sync::Semaphore;

use danci_srs::content::{
    ContentContext, ContentError, ContentService, Evaluation, EvaluationRequest, WordDetail,
};
use danci_srs::store::{Clock, MemoryStorage, VocabularyStore};
use danci_srs::words::{WordCatalog, WordIdentity};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    RateLimited,
    InvalidKey,
    ServerError,
}

impl MockFailure {
    fn to_error(self) -> ContentError {
        match self {
            Self::RateLimited => ContentError::RateLimited("RESOURCE_EXHAUSTED".to_string()),
            Self::InvalidKey => ContentError::InvalidApiKey("API key not valid".to_string()),
            Self::ServerError => ContentError::HttpStatus {
                status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
                body: "internal".to_string(),
            },
        }
    }
}

/// Scripted content service. Definitions embed the word and the context so
/// tests can tell which context produced a cached entry.
#[derive(Default)]
pub struct MockContentService {
    unconfigured: AtomicBool,
    single_calls: AtomicUsize,
    batch_calls: AtomicUsize,
    evaluate_calls: AtomicUsize,
    gate: Mutex<Option<Arc<Semaphore>>>,
    omit: Mutex<HashSet<String>>,
    failure: Mutex<Option<MockFailure>>,
    verdict: Mutex<Option<Evaluation>>,
    batch_requests: Mutex<Vec<Vec<String>>>,
}

impl MockContentService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_configured(&self, configured: bool) {
        self.unconfigured.store(!configured, Ordering::SeqCst);
    }

    /// Blocks every call until `release` is called.
    pub fn hold(&self) {
        *self.gate.lock() = Some(Arc::new(Semaphore::new(0)));
    }

    pub fn release(&self) {
        if let Some(gate) = self.gate.lock().take() {
            gate.add_permits(Semaphore::MAX_PERMITS / 2);
        }
    }

    pub fn omit(&self, text: &str) {
        self.omit.lock().insert(text.to_string());
    }

    pub fn fail_with(&self, failure: Option<MockFailure>) {
        *self.failure.lock() = failure;
    }

    pub fn set_verdict(&self, evaluation: Evaluation) {
        *self.verdict.lock() = Some(evaluation);
    }

    pub fn single_calls(&self) -> usize {
        self.single_calls.load(Ordering::SeqCst)
    }

    pub fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }

    pub fn evaluate_calls(&self) -> usize {
        self.evaluate_calls.load(Ordering::SeqCst)
    }

    pub fn batch_requests(&self) -> Vec<Vec<String>> {
        self.batch_requests.lock().clone()
    }

    async fn pass_gate(&self) {
        let gate = self.gate.lock().clone();
        if let Some(gate) = gate {
            let _permit = gate.acquire().await;
        }
    }

    fn check_failure(&self) -> Result<(), ContentError> {
        match *self.failure.lock() {
            Some(failure) => Err(failure.to_error()),
            None => Ok(()),
        }
    }
}

pub fn detail_for(text: &str, context: &ContentContext) -> WordDetail {
    WordDetail {
        definition: format!("{text} defined [{}/{}]", context.language.as_str(), context.model),
        example_sentence: format!("A sentence using {text}."),
        synonyms: vec![format!("{text}-like")],
        synonym_nuances: None,
        mnemonic: None,
    }
}

#[async_trait]
impl ContentService for MockContentService {
    fn is_configured(&self) -> bool {
        !self.unconfigured.load(Ordering::SeqCst)
    }

    async fn fetch_one(
        &self,
        text: &str,
        context: &ContentContext,
    ) -> Result<WordDetail, ContentError> {
        self.single_calls.fetch_add(1, Ordering::SeqCst);
        self.pass_gate().await;
        self.check_failure()?;
        Ok(detail_for(text, context))
    }

    async fn fetch_many(
        &self,
        texts: &[String],
        context: &ContentContext,
    ) -> Result<HashMap<String, WordDetail>, ContentError> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        self.batch_requests.lock().push(texts.to_vec());
        self.pass_gate().await;
        self.check_failure()?;
        let omit = self.omit.lock().clone();
        Ok(texts
            .iter()
            .filter(|text| !omit.contains(*text))
            .map(|text| (text.clone(), detail_for(text, context)))
            .collect())
    }

    async fn evaluate(
        &self,
        request: &EvaluationRequest,
        _context: &ContentContext,
    ) -> Result<Evaluation, ContentError> {
        self.evaluate_calls.fetch_add(1, Ordering::SeqCst);
        self.pass_gate().await;
        self.check_failure()?;
        Ok(self.verdict.lock().clone().unwrap_or_else(|| Evaluation {
            is_correct: true,
            feedback: format!("Good explanation of {}.", request.word),
            confidence: Some(0.9),
            synonym_nuances: None,
            mnemonic: None,
        }))
    }
}

/// Manually driven clock shared with the store.
#[derive(Clone)]
pub struct TestClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl TestClock {
    pub fn new() -> Self {
        Self {
            now: Arc::new(Mutex::new(start_time())),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }

    pub fn advance_days(&self, days: i64) {
        *self.now.lock() += Duration::days(days);
    }

    pub fn clock(&self) -> Clock {
        let now = Arc::clone(&self.now);
        Arc::new(move || *now.lock())
    }
}

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
}

pub fn test_catalog() -> WordCatalog {
    WordCatalog::new(vec![
        WordIdentity::new("w1", "apricot"),
        WordIdentity::new("w2", "bramble"),
        WordIdentity::new("w3", "cobble"),
        WordIdentity::new("w4", "dapple"),
        WordIdentity::new("w5", "ember"),
    ])
}

pub fn ids(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

pub struct Harness {
    pub store: VocabularyStore,
    pub service: Arc<MockContentService>,
    pub storage: Arc<MemoryStorage>,
    pub clock: TestClock,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_storage(Arc::new(MemoryStorage::new())).await
    }

    pub async fn with_storage(storage: Arc<MemoryStorage>) -> Self {
        let service = MockContentService::new();
        let clock = TestClock::new();
        let store = open(&service, &storage, &clock, ContentContext::default()).await;
        Self {
            store,
            service,
            storage,
            clock,
        }
    }

    /// A second store over the same storage, as after a restart.
    pub async fn reopen(&self, context: ContentContext) -> VocabularyStore {
        open(&self.service, &self.storage, &self.clock, context).await
    }
}

async fn open(
    service: &Arc<MockContentService>,
    storage: &Arc<MemoryStorage>,
    clock: &TestClock,
    context: ContentContext,
) -> VocabularyStore {
    VocabularyStore::builder(test_catalog(), service.clone(), storage.clone())
        .context(context)
        .clock(clock.clock())
        .load()
        .await
        .unwrap()
}
