mod common;

use std::sync::Arc;

use common::{ids, Harness, MockFailure};
use danci_srs::content::{ContentContext, DetailErrorKind, Language};
use danci_srs::store::MemoryStorage;

async fn wait_for(mut condition: impl FnMut() -> bool) {
    while !condition() {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn concurrent_lookups_share_one_fetch() {
    let h = Harness::new().await;
    h.service.hold();

    let (a, b, ()) = tokio::join!(
        h.store.get_details("w1"),
        h.store.get_details("w1"),
        async { h.service.release() }
    );

    assert!(a.is_success());
    assert_eq!(a, b);
    assert_eq!(h.service.single_calls(), 1);
}

#[tokio::test]
async fn lookup_joins_a_pending_batch_for_the_same_word() {
    let h = Harness::new().await;
    h.service.hold();
    let requested = ids(&["w1", "w2"]);

    let (batch, single, ()) = tokio::join!(
        h.store.get_details_batch(&requested),
        h.store.get_details("w1"),
        async { h.service.release() }
    );

    assert!(single.is_success());
    assert_eq!(batch["w1"], single);
    assert_eq!(h.service.batch_calls(), 1);
    assert_eq!(h.service.single_calls(), 0);
}

#[tokio::test]
async fn batch_joins_a_pending_lookup_for_the_same_word() {
    let h = Harness::new().await;
    h.service.hold();
    let requested = ids(&["w1"]);

    let (single, batch, ()) = tokio::join!(
        h.store.get_details("w1"),
        h.store.get_details_batch(&requested),
        async { h.service.release() }
    );

    assert!(single.is_success());
    assert_eq!(batch["w1"], single);
    assert_eq!(h.service.single_calls() + h.service.batch_calls(), 1);
}

#[tokio::test]
async fn batch_fetches_only_words_not_already_pending() {
    let h = Harness::new().await;
    h.service.hold();
    let requested = ids(&["w1", "w2"]);

    let (single, batch, ()) = tokio::join!(
        h.store.get_details("w1"),
        h.store.get_details_batch(&requested),
        async { h.service.release() }
    );

    assert!(single.is_success());
    assert!(batch.values().all(|outcome| outcome.is_success()));
    assert_eq!(h.service.single_calls(), 1);
    assert_eq!(h.service.batch_requests(), vec![ids(&["bramble"])]);
}

#[tokio::test]
async fn cached_detail_is_served_without_a_call_and_persisted() {
    let h = Harness::new().await;

    let first = h.store.get_details("w2").await;
    let second = h.store.get_details("w2").await;

    assert_eq!(first, second);
    assert_eq!(h.service.single_calls(), 1);
    assert!(h.store.cached_detail("w2").is_some());
    let blob = h.storage.contents().unwrap();
    assert!(blob.contains("bramble defined"));
}

#[tokio::test]
async fn unknown_word_is_reported_without_a_call() {
    let h = Harness::new().await;

    let outcome = h.store.get_details("nope").await;

    assert_eq!(outcome.error_kind(), Some(DetailErrorKind::UnknownWord));
    assert_eq!(h.service.single_calls(), 0);
}

#[tokio::test]
async fn empty_batch_makes_no_call() {
    let h = Harness::new().await;

    let results = h.store.get_details_batch(&[]).await;

    assert!(results.is_empty());
    assert_eq!(h.service.batch_calls(), 0);
}

#[tokio::test]
async fn batch_only_fetches_uncached_words() {
    let h = Harness::new().await;
    h.store.get_details("w1").await;

    let results = h.store.get_details_batch(&ids(&["w1", "w2", "w3"])).await;

    assert_eq!(results.len(), 3);
    assert!(results.values().all(|outcome| outcome.is_success()));
    assert_eq!(h.service.batch_requests(), vec![ids(&["bramble", "cobble"])]);
}

#[tokio::test]
async fn fully_cached_batch_makes_no_call() {
    let h = Harness::new().await;
    h.store.get_details_batch(&ids(&["w1", "w2"])).await;

    let results = h.store.get_details_batch(&ids(&["w2", "w1"])).await;

    assert_eq!(results.len(), 2);
    assert_eq!(h.service.batch_calls(), 1);
}

#[tokio::test]
async fn word_left_out_of_a_batch_is_not_returned_and_not_cached() {
    let h = Harness::new().await;
    h.service.omit("cobble");

    let results = h.store.get_details_batch(&ids(&["w2", "w3"])).await;

    assert!(results["w2"].is_success());
    assert_eq!(results["w3"].error_kind(), Some(DetailErrorKind::NotReturned));
    assert!(h.store.cached_detail("w3").is_none());

    let retried = h.store.get_details("w3").await;
    assert!(retried.is_success());
    assert_eq!(h.service.single_calls(), 1);
}

#[tokio::test]
async fn failed_batch_gives_every_word_a_failure() {
    let h = Harness::new().await;
    h.service.fail_with(Some(MockFailure::RateLimited));

    let results = h.store.get_details_batch(&ids(&["w1", "w2", "w4"])).await;

    assert_eq!(results.len(), 3);
    for outcome in results.values() {
        assert_eq!(outcome.error_kind(), Some(DetailErrorKind::RateLimited));
    }
    assert!(h.store.cached_detail("w1").is_none());
    assert_eq!(h.storage.write_count(), 0);
}

#[tokio::test]
async fn unknown_ids_in_a_batch_are_reported_individually() {
    let h = Harness::new().await;

    let results = h.store.get_details_batch(&ids(&["w1", "ghost"])).await;

    assert!(results["w1"].is_success());
    assert_eq!(results["ghost"].error_kind(), Some(DetailErrorKind::UnknownWord));
    assert_eq!(h.service.batch_requests(), vec![ids(&["apricot"])]);
}

#[tokio::test]
async fn concurrent_batches_coalesce_and_backfill() {
    let h = Harness::new().await;
    h.service.hold();

    let first_ids = ids(&["w1", "w2"]);
    let second_ids = ids(&["w2", "w3"]);

    let (first, second, ()) = tokio::join!(
        h.store.get_details_batch(&first_ids),
        h.store.get_details_batch(&second_ids),
        async { h.service.release() }
    );

    assert!(first.values().all(|outcome| outcome.is_success()));
    assert_eq!(second.len(), 2);
    assert!(second.values().all(|outcome| outcome.is_success()));
    assert_eq!(
        h.service.batch_requests(),
        vec![ids(&["apricot", "bramble"]), ids(&["cobble"])]
    );
}

#[tokio::test]
async fn missing_credentials_are_not_cached() {
    let h = Harness::new().await;
    h.service.set_configured(false);

    let single = h.store.get_details("w1").await;
    let batch = h.store.get_details_batch(&ids(&["w2"])).await;

    assert_eq!(single.error_kind(), Some(DetailErrorKind::MissingConfiguration));
    assert_eq!(batch["w2"].error_kind(), Some(DetailErrorKind::MissingConfiguration));
    assert_eq!(h.service.single_calls() + h.service.batch_calls(), 0);
    assert!(h.store.cached_detail("w1").is_none());

    h.service.set_configured(true);
    assert!(h.store.get_details("w1").await.is_success());
}

#[tokio::test]
async fn context_switch_clears_cache_and_refetches() {
    let h = Harness::new().await;
    let before = h.store.get_details("w1").await;
    assert!(before.definition_text().contains("[en/"));

    h.store.set_language(Language::Zh).await;
    assert!(h.store.cached_detail("w1").is_none());

    let after = h.store.get_details("w1").await;
    assert!(after.definition_text().contains("[zh/"));
    assert_eq!(h.service.single_calls(), 2);
}

#[tokio::test]
async fn setting_the_same_context_keeps_the_cache() {
    let h = Harness::new().await;
    h.store.get_details("w1").await;

    h.store.set_context(h.store.context()).await;

    assert!(h.store.cached_detail("w1").is_some());
}

#[tokio::test]
async fn lookup_overtaken_by_a_context_switch_returns_fresh_content() {
    let h = Harness::new().await;
    h.service.hold();

    let store = h.store.clone();
    let pending = tokio::spawn(async move { store.get_details("w1").await });
    let service = h.service.clone();
    wait_for(move || service.single_calls() == 1).await;

    h.store.set_language(Language::Zh).await;
    h.service.release();

    let outcome = pending.await.unwrap();
    assert!(outcome.definition_text().contains("[zh/"));
    assert_eq!(h.service.single_calls(), 2);
    let cached = h.store.cached_detail("w1").unwrap();
    assert!(cached.definition.contains("[zh/"));

    h.store.get_details("w1").await;
    assert_eq!(h.service.single_calls(), 2);
}

#[tokio::test]
async fn batch_overtaken_by_a_context_switch_returns_fresh_content() {
    let h = Harness::new().await;
    h.service.hold();

    let store = h.store.clone();
    let requested = ids(&["w1", "w2"]);
    let pending = tokio::spawn(async move { store.get_details_batch(&requested).await });
    let service = h.service.clone();
    wait_for(move || service.batch_calls() == 1).await;

    h.store.set_language(Language::Zh).await;
    h.service.release();

    let results = pending.await.unwrap();
    assert_eq!(results.len(), 2);
    for outcome in results.values() {
        assert!(outcome.definition_text().contains("[zh/"));
    }
    assert_eq!(h.service.batch_calls(), 2);
}

#[tokio::test]
async fn fetch_survives_the_caller_going_away() {
    let h = Harness::new().await;
    h.service.hold();

    let store = h.store.clone();
    let caller = tokio::spawn(async move { store.get_details("w5").await });
    let service = h.service.clone();
    wait_for(move || service.single_calls() == 1).await;
    caller.abort();

    h.service.release();
    let store = h.store.clone();
    wait_for(move || store.cached_detail("w5").is_some()).await;
    assert_eq!(h.service.single_calls(), 1);
}

#[tokio::test]
async fn load_drops_error_placeholders_and_keeps_legacy_cache() {
    let blob = r#"{
        "learnedWords": {},
        "wordDetailsCache": {
            "w1": {"definition": "API key not configured.", "exampleSentence": "Please configure API key."},
            "w2": {"definition": "a thorny shrub", "exampleSentence": "The bramble snagged her coat."}
        }
    }"#;
    let h = Harness::with_storage(Arc::new(MemoryStorage::with_blob(blob))).await;

    assert!(h.store.cached_detail("w1").is_none());
    assert!(h.store.cached_detail("w2").is_some());

    let outcome = h.store.get_details("w2").await;
    assert_eq!(outcome.definition_text(), "a thorny shrub");
    assert_eq!(h.service.single_calls(), 0);
}

#[tokio::test]
async fn restart_under_another_context_drops_cache_but_keeps_progress() {
    let h = Harness::new().await;
    h.store.mark_as_learned("w1").await.unwrap();
    h.store.get_details("w1").await;

    let same = h.reopen(ContentContext::default()).await;
    assert!(same.cached_detail("w1").is_some());

    let switched = h
        .reopen(ContentContext::new(Language::Zh, "qwen3-max"))
        .await;
    assert!(switched.cached_detail("w1").is_none());
    assert!(switched.entry("w1").is_some());
}

#[tokio::test]
async fn unreadable_snapshot_starts_empty() {
    let h = Harness::with_storage(Arc::new(MemoryStorage::with_blob("{not json"))).await;

    assert_eq!(h.store.progress_stats().learned_count, 0);
    assert_eq!(h.store.words_to_learn().len(), 5);
}

#[tokio::test]
async fn explore_never_touches_the_cache() {
    let h = Harness::new().await;

    let outcome = h.store.explore("  serendipity ").await;

    assert!(outcome.definition_text().starts_with("serendipity defined"));
    assert_eq!(h.service.single_calls(), 1);
    assert_eq!(h.storage.write_count(), 0);
    assert!(h.store.explore("   ").await.error_kind().is_some());
}

#[tokio::test]
async fn reset_word_forgets_its_detail() {
    let h = Harness::new().await;
    h.store.mark_as_learned("w3").await.unwrap();
    h.store.get_details("w3").await;

    h.store.reset_word_progress("w3").await.unwrap();

    assert!(h.store.entry("w3").is_none());
    assert!(h.store.cached_detail("w3").is_none());
    assert!(h.store.reset_word_progress("ghost").await.is_err());
}

#[tokio::test]
async fn reset_all_clears_progress_and_cache() {
    let h = Harness::new().await;
    h.store.mark_as_learned("w1").await.unwrap();
    h.store.mark_as_learned("w2").await.unwrap();
    h.store.get_details_batch(&ids(&["w1", "w2"])).await;
    assert_eq!(h.store.dashboard().stats.learned_count, 2);

    h.store.reset_all_progress().await;

    let dashboard = h.store.dashboard();
    assert_eq!(dashboard.stats.learned_count, 0);
    assert_eq!(dashboard.words_to_learn, 5);
    assert!(h.store.cached_detail("w1").is_none());

    let restarted = h.reopen(ContentContext::default()).await;
    assert_eq!(restarted.progress_stats().learned_count, 0);
}
