//! The process-wide owner of learning progress and the word detail cache.
//!
//! Detail lookups go cache first, then join an in-flight fetch for the same
//! word, and only then reach the content service. Every fetch is tagged with
//! the cache generation it started under; a context switch bumps the
//! generation, so late results from the old context are never cached and
//! callers that were waiting on them look the word up again.

pub mod snapshot;
pub mod storage;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::content::{
    ContentContext, ContentError, ContentService, DetailErrorKind, DetailOutcome, Evaluation,
    EvaluationRequest, Language, WordDetail,
};
use crate::srs::scheduler::{self, Dashboard, ProgressMap};
use crate::srs::{ProgressEntry, ProgressStats, SortOrder, WordOverview, WordStatus};
use crate::words::{WordCatalog, WordIdentity};

pub use storage::{BlobStorage, JsonFileStorage, MemoryStorage, StorageError, StorageResult};

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

type SharedDetail = Shared<BoxFuture<'static, DetailOutcome>>;
type SharedBatch = Shared<BoxFuture<'static, Arc<HashMap<String, DetailOutcome>>>>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("unknown word: {0}")]
    UnknownWord(String),
    #[error("word has not been learned yet: {0}")]
    NotLearned(String),
}

struct InFlightDetail {
    generation: u64,
    future: SharedDetail,
}

struct InFlightBatch {
    serial: u64,
    ids: HashSet<String>,
    future: SharedBatch,
}

/// What a single-word lookup ends up waiting on.
enum PendingDetail {
    Own(SharedDetail),
    Batch(SharedBatch),
}

struct StoreState {
    progress: ProgressMap,
    cache: HashMap<String, WordDetail>,
    context: ContentContext,
    generation: u64,
    in_flight: HashMap<String, InFlightDetail>,
    batch_in_flight: Option<InFlightBatch>,
    next_batch_serial: u64,
}

struct StoreInner {
    catalog: WordCatalog,
    service: Arc<dyn ContentService>,
    storage: Arc<dyn BlobStorage>,
    clock: Clock,
    state: Mutex<StoreState>,
    save_lock: tokio::sync::Mutex<()>,
}

pub struct StoreBuilder {
    catalog: WordCatalog,
    service: Arc<dyn ContentService>,
    storage: Arc<dyn BlobStorage>,
    context: ContentContext,
    clock: Option<Clock>,
}

impl StoreBuilder {
    pub fn context(mut self, context: ContentContext) -> Self {
        self.context = context;
        self
    }

    pub fn clock(mut self, clock: Clock) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Restores the persisted snapshot. An unreadable blob is discarded; only
    /// I/O failures are returned.
    pub async fn load(self) -> Result<VocabularyStore, StorageError> {
        let restored = match self.storage.load().await? {
            Some(blob) => snapshot::decode(&blob).unwrap_or_else(|err| {
                warn!(error = %err, "discarding unreadable progress snapshot");
                snapshot::RestoredState::default()
            }),
            None => snapshot::RestoredState::default(),
        };

        let mut cache = restored.cache;
        if restored
            .context
            .as_ref()
            .is_some_and(|saved| *saved != self.context)
            && !cache.is_empty()
        {
            info!(dropped = cache.len(), "content context changed since last run, clearing detail cache");
            cache.clear();
        }

        info!(
            entries = restored.progress.len(),
            cached = cache.len(),
            dropped = restored.dropped_entries,
            "vocabulary store loaded"
        );

        let state = StoreState {
            progress: restored.progress,
            cache,
            context: self.context,
            generation: 0,
            in_flight: HashMap::new(),
            batch_in_flight: None,
            next_batch_serial: 0,
        };

        Ok(VocabularyStore {
            inner: Arc::new(StoreInner {
                catalog: self.catalog,
                service: self.service,
                storage: self.storage,
                clock: self.clock.unwrap_or_else(system_clock),
                state: Mutex::new(state),
                save_lock: tokio::sync::Mutex::new(()),
            }),
        })
    }
}

/// Cloneable handle; all clones share one state.
#[derive(Clone)]
pub struct VocabularyStore {
    inner: Arc<StoreInner>,
}

impl VocabularyStore {
    pub fn builder(
        catalog: WordCatalog,
        service: Arc<dyn ContentService>,
        storage: Arc<dyn BlobStorage>,
    ) -> StoreBuilder {
        StoreBuilder {
            catalog,
            service,
            storage,
            context: ContentContext::default(),
            clock: None,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.inner.clock)()
    }

    pub fn catalog(&self) -> &WordCatalog {
        &self.inner.catalog
    }

    pub fn word(&self, word_id: &str) -> Option<WordIdentity> {
        self.inner.catalog.get(word_id).cloned()
    }

    pub fn has_credentials(&self) -> bool {
        self.inner.service.is_configured()
    }

    pub fn context(&self) -> ContentContext {
        self.inner.state.lock().context.clone()
    }

    pub fn entry(&self, word_id: &str) -> Option<ProgressEntry> {
        self.inner.state.lock().progress.get(word_id).cloned()
    }

    pub fn status(&self, word_id: &str) -> WordStatus {
        scheduler::status_of(&self.inner.state.lock().progress, word_id)
    }

    pub fn cached_detail(&self, word_id: &str) -> Option<WordDetail> {
        self.inner.state.lock().cache.get(word_id).cloned()
    }

    pub fn words_to_learn(&self) -> Vec<WordIdentity> {
        scheduler::words_to_learn(&self.inner.catalog, &self.inner.state.lock().progress)
    }

    pub fn words_to_review(&self) -> Vec<WordIdentity> {
        let now = self.now();
        scheduler::words_to_review(&self.inner.catalog, &self.inner.state.lock().progress, now)
    }

    pub fn progress_stats(&self) -> ProgressStats {
        scheduler::progress_stats(&self.inner.catalog, &self.inner.state.lock().progress)
    }

    pub fn dashboard(&self) -> Dashboard {
        let now = self.now();
        scheduler::dashboard(&self.inner.catalog, &self.inner.state.lock().progress, now)
    }

    pub fn word_overview(&self, search: &str, order: SortOrder) -> Vec<WordOverview> {
        scheduler::word_overview(
            &self.inner.catalog,
            &self.inner.state.lock().progress,
            search,
            order,
        )
    }

    /// Moves a NEW word onto the ladder. Already learned words keep their entry.
    pub async fn mark_as_learned(&self, word_id: &str) -> Result<ProgressEntry, StoreError> {
        self.ensure_known(word_id)?;
        let now = self.now();
        let (entry, changed) = {
            let mut state = self.inner.state.lock();
            let existing = state
                .progress
                .get(word_id)
                .filter(|entry| entry.status != WordStatus::New)
                .cloned();
            match existing {
                Some(existing) => (existing, false),
                None => {
                    let entry = ProgressEntry::create(word_id, now);
                    state.progress.insert(word_id.to_string(), entry.clone());
                    (entry, true)
                }
            }
        };

        if changed {
            debug!(word_id, "word marked as learned");
            self.save().await;
        }
        Ok(entry)
    }

    pub async fn record_review_outcome(
        &self,
        word_id: &str,
        was_correct: bool,
    ) -> Result<ProgressEntry, StoreError> {
        self.update_entry(word_id, |entry, now| entry.advance(was_correct, now))
            .await
    }

    pub async fn record_practice_outcome(
        &self,
        word_id: &str,
        was_correct: bool,
    ) -> Result<ProgressEntry, StoreError> {
        self.update_entry(word_id, |entry, now| {
            entry.record_practice_outcome(was_correct, now)
        })
        .await
    }

    /// Returns the word to NEW and forgets its cached detail.
    pub async fn reset_word_progress(&self, word_id: &str) -> Result<(), StoreError> {
        self.ensure_known(word_id)?;
        {
            let mut state = self.inner.state.lock();
            state.progress.remove(word_id);
            state.cache.remove(word_id);
        }
        info!(word_id, "word progress reset");
        self.save().await;
        Ok(())
    }

    pub async fn reset_all_progress(&self) {
        {
            let mut state = self.inner.state.lock();
            state.progress.clear();
            state.cache.clear();
        }
        info!("all progress reset");
        self.save().await;
    }

    /// Switches language/model. The cache is emptied and in-flight fetches
    /// are orphaned before any new fetch can see the new context.
    pub async fn set_context(&self, context: ContentContext) {
        {
            let mut state = self.inner.state.lock();
            if state.context == context {
                return;
            }
            state.generation += 1;
            state.cache.clear();
            state.in_flight.clear();
            state.batch_in_flight = None;
            info!(
                language = context.language.as_str(),
                model = %context.model,
                generation = state.generation,
                "content context changed, detail cache invalidated"
            );
            state.context = context;
        }
        self.save().await;
    }

    pub async fn set_language(&self, language: Language) {
        let mut context = self.context();
        context.language = language;
        self.set_context(context).await;
    }

    pub async fn set_model(&self, model: impl Into<String>) {
        let mut context = self.context();
        context.model = model.into();
        self.set_context(context).await;
    }

    /// Resolves one word's detail. A word is never fetched twice at once:
    /// callers join a pending single fetch or a pending batch covering it.
    /// A lookup overtaken by a context switch starts over under the new one.
    pub async fn get_details(&self, word_id: &str) -> DetailOutcome {
        let Some(word) = self.word(word_id) else {
            return unknown_word(word_id);
        };

        loop {
            let (pending, generation) = {
                let mut state = self.inner.state.lock();
                if let Some(detail) = state.cache.get(word_id) {
                    debug!(word_id, "detail cache hit");
                    return DetailOutcome::Success(detail.clone());
                }
                let generation = state.generation;
                let joined_single = state.in_flight.get(word_id).map(|f| f.future.clone());
                let joined_batch = state
                    .batch_in_flight
                    .as_ref()
                    .filter(|batch| batch.ids.contains(word_id))
                    .map(|batch| batch.future.clone());

                if let Some(future) = joined_single {
                    debug!(word_id, "joining in-flight detail fetch");
                    (PendingDetail::Own(future), generation)
                } else if let Some(future) = joined_batch {
                    debug!(word_id, "joining in-flight batch covering this word");
                    (PendingDetail::Batch(future), generation)
                } else if !self.inner.service.is_configured() {
                    warn!(word_id, "content service not configured, cannot fetch details");
                    return DetailOutcome::missing_configuration();
                } else {
                    let future =
                        self.spawn_detail_fetch(word.clone(), state.context.clone(), generation);
                    state.in_flight.insert(
                        word_id.to_string(),
                        InFlightDetail {
                            generation,
                            future: future.clone(),
                        },
                    );
                    (PendingDetail::Own(future), generation)
                }
            };

            let outcome = match pending {
                PendingDetail::Own(future) => future.await,
                PendingDetail::Batch(future) => {
                    future.await.get(word_id).cloned().unwrap_or_else(|| {
                        DetailOutcome::failure(DetailErrorKind::RequestFailed, "Error in batch fetch.")
                    })
                }
            };

            if self.inner.state.lock().generation == generation {
                return outcome;
            }
            debug!(word_id, "content context changed during fetch, looking up again");
        }
    }

    /// Resolves many words with one service call for everything uncached.
    /// Words already being fetched on their own are joined, not refetched.
    /// Every requested id is present in the result.
    pub async fn get_details_batch(&self, word_ids: &[String]) -> HashMap<String, DetailOutcome> {
        let mut results: HashMap<String, DetailOutcome> = HashMap::with_capacity(word_ids.len());
        let mut results_generation: Option<u64> = None;

        loop {
            let (singles, batch, generation) = {
                let mut state = self.inner.state.lock();
                let generation = state.generation;
                if results_generation.is_some_and(|seen| seen != generation) {
                    results.clear();
                }
                results_generation = Some(generation);
                let mut to_fetch: Vec<WordIdentity> = Vec::new();
                let mut singles: Vec<(String, SharedDetail)> = Vec::new();
                for id in word_ids {
                    if results.contains_key(id)
                        || to_fetch.iter().any(|w| w.id == *id)
                        || singles.iter().any(|(pending, _)| pending == id)
                    {
                        continue;
                    }
                    if let Some(detail) = state.cache.get(id) {
                        results.insert(id.clone(), DetailOutcome::Success(detail.clone()));
                        continue;
                    }
                    if let Some(in_flight) = state.in_flight.get(id) {
                        singles.push((id.clone(), in_flight.future.clone()));
                        continue;
                    }
                    match self.inner.catalog.get(id) {
                        Some(word) => to_fetch.push(word.clone()),
                        None => {
                            results.insert(id.clone(), unknown_word(id));
                        }
                    }
                }

                if to_fetch.is_empty() && singles.is_empty() {
                    return results;
                }

                if !to_fetch.is_empty() && !self.inner.service.is_configured() {
                    warn!(count = to_fetch.len(), "content service not configured, cannot fetch batch");
                    for word in to_fetch.drain(..) {
                        results.insert(word.id, DetailOutcome::missing_configuration());
                    }
                }

                let batch = if to_fetch.is_empty() {
                    None
                } else {
                    let joined = state
                        .batch_in_flight
                        .as_ref()
                        .map(|batch| (batch.serial, batch.future.clone()));
                    match joined {
                        Some((serial, future)) => {
                            debug!(serial, "batch already in flight, awaiting it");
                            Some((future, false))
                        }
                        None => {
                            let serial = state.next_batch_serial;
                            state.next_batch_serial += 1;
                            let ids = to_fetch.iter().map(|w| w.id.clone()).collect();
                            let future = self.spawn_batch_fetch(
                                to_fetch,
                                state.context.clone(),
                                generation,
                                serial,
                            );
                            state.batch_in_flight = Some(InFlightBatch {
                                serial,
                                ids,
                                future: future.clone(),
                            });
                            Some((future, true))
                        }
                    }
                };
                (singles, batch, generation)
            };

            let mut pass: HashMap<String, DetailOutcome> = HashMap::new();
            for (id, future) in singles {
                pass.insert(id, future.await);
            }
            let own = match batch {
                Some((future, own)) => {
                    let fetched = future.await;
                    for id in word_ids {
                        if !results.contains_key(id) && !pass.contains_key(id) {
                            if let Some(outcome) = fetched.get(id) {
                                pass.insert(id.clone(), outcome.clone());
                            }
                        }
                    }
                    own
                }
                None => true,
            };

            let current = self.inner.state.lock().generation;
            if current != generation {
                debug!("content context changed during batch, looking up again");
                continue;
            }
            results.extend(pass);

            if own {
                for id in word_ids {
                    results.entry(id.clone()).or_insert_with(|| {
                        DetailOutcome::failure(DetailErrorKind::RequestFailed, "Error in batch fetch.")
                    });
                }
                return results;
            }
            // Ids outside the joined batch: next pass backfills from cache or fetches them.
        }
    }

    /// Judges a free-form explanation. Never fails: problems become an
    /// incorrect verdict with explanatory feedback.
    pub async fn evaluate(&self, request: EvaluationRequest) -> Evaluation {
        if !self.inner.service.is_configured() {
            warn!(word = %request.word, "content service not configured, cannot evaluate");
            return Evaluation::verdict(
                false,
                "Evaluation service not available: API key not configured.",
            );
        }

        let context = self.context();
        match self.inner.service.evaluate(&request, &context).await {
            Ok(evaluation) => evaluation,
            Err(err) => {
                warn!(word = %request.word, error = %err, "evaluation failed");
                Evaluation::verdict(false, evaluation_failure_feedback(&err))
            }
        }
    }

    /// One-off lookup of arbitrary text. Nothing is cached.
    pub async fn explore(&self, text: &str) -> DetailOutcome {
        let text = text.trim();
        if text.is_empty() {
            return DetailOutcome::failure(DetailErrorKind::UnknownWord, "Enter a word to explore.");
        }
        if !self.inner.service.is_configured() {
            return DetailOutcome::missing_configuration();
        }

        let context = self.context();
        match self.inner.service.fetch_one(text, &context).await {
            Ok(detail) => DetailOutcome::Success(detail),
            Err(err) => {
                warn!(word = %text, error = %err, "explore lookup failed");
                DetailOutcome::failure(err.kind(), err.user_message())
            }
        }
    }

    /// Writes the whole snapshot. Failures are logged, not returned.
    pub async fn save(&self) {
        if let Err(err) = self.try_save().await {
            warn!(error = %err, "failed to persist vocabulary store");
        }
    }

    pub async fn try_save(&self) -> StorageResult<()> {
        let _guard = self.inner.save_lock.lock().await;
        let blob = {
            let state = self.inner.state.lock();
            snapshot::encode(&state.progress, &state.cache, &state.context)?
        };
        self.inner.storage.save(&blob).await
    }

    fn ensure_known(&self, word_id: &str) -> Result<(), StoreError> {
        if self.inner.catalog.contains(word_id) {
            Ok(())
        } else {
            Err(StoreError::UnknownWord(word_id.to_string()))
        }
    }

    /// Read-modify-write of a learned word's entry under one lock.
    async fn update_entry<F>(&self, word_id: &str, transition: F) -> Result<ProgressEntry, StoreError>
    where
        F: FnOnce(&ProgressEntry, DateTime<Utc>) -> ProgressEntry,
    {
        self.ensure_known(word_id)?;
        let now = self.now();
        let (previous, updated) = {
            let mut state = self.inner.state.lock();
            let current = state
                .progress
                .get(word_id)
                .filter(|entry| entry.status != WordStatus::New)
                .ok_or_else(|| StoreError::NotLearned(word_id.to_string()))?;
            let updated = transition(current, now);
            let previous = current.status;
            state.progress.insert(word_id.to_string(), updated.clone());
            (previous, updated)
        };

        if updated.status == WordStatus::Mastered && previous != WordStatus::Mastered {
            info!(word_id, "word mastered");
        }
        debug!(
            word_id,
            status = updated.status.as_str(),
            interval_index = updated.current_interval_index,
            "progress entry updated"
        );
        self.save().await;
        Ok(updated)
    }

    fn spawn_detail_fetch(
        &self,
        word: WordIdentity,
        context: ContentContext,
        generation: u64,
    ) -> SharedDetail {
        let store = self.clone();
        let handle =
            tokio::spawn(async move { store.fetch_and_store(word, context, generation).await });
        async move {
            handle.await.unwrap_or_else(|err| {
                DetailOutcome::failure(
                    DetailErrorKind::RequestFailed,
                    format!("Detail fetch aborted: {err}"),
                )
            })
        }
        .boxed()
        .shared()
    }

    async fn fetch_and_store(
        &self,
        word: WordIdentity,
        context: ContentContext,
        generation: u64,
    ) -> DetailOutcome {
        let outcome = match self.inner.service.fetch_one(&word.text, &context).await {
            Ok(detail) => DetailOutcome::Success(detail),
            Err(err) => {
                warn!(word = %word.text, error = %err, "detail fetch failed");
                DetailOutcome::failure(err.kind(), err.user_message())
            }
        };

        let persist = {
            let mut state = self.inner.state.lock();
            if state
                .in_flight
                .get(&word.id)
                .is_some_and(|in_flight| in_flight.generation == generation)
            {
                state.in_flight.remove(&word.id);
            }
            if state.generation != generation {
                debug!(word_id = %word.id, "discarding detail fetched under a stale context");
                false
            } else if let DetailOutcome::Success(detail) = &outcome {
                state.cache.insert(word.id.clone(), detail.clone());
                true
            } else {
                false
            }
        };

        if persist {
            self.save().await;
        }
        outcome
    }

    fn spawn_batch_fetch(
        &self,
        words: Vec<WordIdentity>,
        context: ContentContext,
        generation: u64,
        serial: u64,
    ) -> SharedBatch {
        let ids: Vec<String> = words.iter().map(|w| w.id.clone()).collect();
        let store = self.clone();
        let handle = tokio::spawn(async move {
            store
                .fetch_batch_and_store(words, context, generation, serial)
                .await
        });
        async move {
            handle.await.unwrap_or_else(|err| {
                let outcome = DetailOutcome::failure(
                    DetailErrorKind::RequestFailed,
                    format!("Error in batch fetch: {err}"),
                );
                Arc::new(ids.into_iter().map(|id| (id, outcome.clone())).collect())
            })
        }
        .boxed()
        .shared()
    }

    async fn fetch_batch_and_store(
        &self,
        words: Vec<WordIdentity>,
        context: ContentContext,
        generation: u64,
        serial: u64,
    ) -> Arc<HashMap<String, DetailOutcome>> {
        let texts: Vec<String> = words.iter().map(|w| w.text.clone()).collect();
        debug!(serial, count = texts.len(), "issuing batch detail fetch");

        let outcomes: HashMap<String, DetailOutcome> =
            match self.inner.service.fetch_many(&texts, &context).await {
                Ok(by_text) => {
                    let missing = words.iter().filter(|w| !by_text.contains_key(&w.text)).count();
                    if missing > 0 {
                        warn!(serial, missing, "batch response omitted some words");
                    }
                    words
                        .iter()
                        .map(|word| {
                            let outcome = by_text
                                .get(&word.text)
                                .cloned()
                                .map(DetailOutcome::Success)
                                .unwrap_or_else(DetailOutcome::not_returned);
                            (word.id.clone(), outcome)
                        })
                        .collect()
                }
                Err(err) => {
                    warn!(serial, error = %err, "batch detail fetch failed");
                    let outcome = DetailOutcome::failure(
                        err.kind(),
                        format!("Error in batch fetch: {}", err.user_message()),
                    );
                    words
                        .iter()
                        .map(|word| (word.id.clone(), outcome.clone()))
                        .collect()
                }
            };

        let persist = {
            let mut state = self.inner.state.lock();
            if state
                .batch_in_flight
                .as_ref()
                .is_some_and(|batch| batch.serial == serial)
            {
                state.batch_in_flight = None;
            }
            if state.generation != generation {
                debug!(serial, "discarding batch fetched under a stale context");
                false
            } else {
                let mut stored = false;
                for (id, outcome) in &outcomes {
                    if let DetailOutcome::Success(detail) = outcome {
                        state.cache.insert(id.clone(), detail.clone());
                        stored = true;
                    }
                }
                stored
            }
        };

        if persist {
            self.save().await;
        }
        Arc::new(outcomes)
    }
}

fn system_clock() -> Clock {
    Arc::new(Utc::now)
}

fn unknown_word(word_id: &str) -> DetailOutcome {
    DetailOutcome::failure(DetailErrorKind::UnknownWord, format!("Unknown word: {word_id}"))
}

fn evaluation_failure_feedback(err: &ContentError) -> String {
    match err {
        ContentError::RateLimited(detail) => {
            format!("API rate limit hit. Evaluation failed, please try again later. ({detail})")
        }
        ContentError::InvalidApiKey(_) => {
            "Evaluation failed due to an invalid API key. Please check your configuration."
                .to_string()
        }
        ContentError::NotConfigured(_) => {
            "Evaluation service not available: API key not configured.".to_string()
        }
        ContentError::Json(_) | ContentError::EmptyResponse => {
            "Could not evaluate: the service returned an unreadable response.".to_string()
        }
        ContentError::HttpStatus { .. } | ContentError::Request(_) => {
            "Could not evaluate due to an API error.".to_string()
        }
    }
}
