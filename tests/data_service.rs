mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::*;
use muse::data_service::DataService;
use muse::defaults::default_characters;
use muse::error::RemoteError;
use muse::models::{Character, LocationInfo, LoginMethod, VoteReceipt};
use muse::storage::{keys, load_json, save_json, LocalStore, MemoryStore};

fn ranked_roster() -> Vec<Character> {
    default_characters()
        .into_iter()
        .zip([3, 10, 0, 7, 1])
        .map(|(mut character, votes)| {
            character.votes = votes;
            character
        })
        .collect()
}

#[tokio::test]
async fn remote_characters_come_back_most_voted_first() {
    let harness = Harness::with(FakeRemote::new(ranked_roster()), FakeLocation::granted());

    let characters = harness.data.get_characters().await;
    let votes: Vec<i64> = characters.iter().map(|c| c.votes).collect();
    assert_eq!(votes, vec![10, 7, 3, 1, 0]);

    let cached: Vec<Character> = load_json(&*harness.store, keys::CHARACTERS).unwrap();
    assert_eq!(cached, characters);
}

#[tokio::test]
async fn failing_remote_falls_back_to_cache() {
    let harness = Harness::new();
    let mut cached = default_characters();
    cached[2].votes = 42;
    save_json(&*harness.store, keys::CHARACTERS, &cached);
    harness.remote.set_failing(true);

    assert_eq!(harness.data.get_characters().await, cached);
}

#[tokio::test]
async fn failing_remote_without_cache_uses_defaults() {
    let harness = Harness::new();
    harness.remote.set_failing(true);

    let characters = harness.data.get_characters().await;
    assert_eq!(characters.len(), 5);
    assert_eq!(characters, default_characters());
}

#[tokio::test]
async fn empty_remote_table_uses_cache() {
    let harness = Harness::with(FakeRemote::new(Vec::new()), FakeLocation::granted());
    let mut cached = default_characters();
    cached.truncate(2);
    save_json(&*harness.store, keys::CHARACTERS, &cached);

    assert_eq!(harness.data.get_characters().await, cached);
}

#[tokio::test]
async fn malformed_cache_is_treated_as_absent() {
    let harness = Harness::new();
    harness.store.set(keys::CHARACTERS, "[{\"id\":").unwrap();
    harness.remote.set_failing(true);

    assert_eq!(harness.data.get_characters().await, default_characters());
}

#[tokio::test]
async fn rejected_vote_still_increments_cache_by_one() {
    let harness = Harness::new();
    harness.data.get_characters().await;
    harness.remote.set_failing(true);

    let outcome = harness.data.cast_vote("ada", "3", device(), None).await;

    assert!(matches!(outcome.remote, Err(RemoteError::Rejected(_))));
    let receipt: VoteReceipt = load_json(&*harness.store, &keys::vote_receipt("ada")).unwrap();
    assert_eq!(receipt.character_id, "3");
    assert_eq!(receipt, outcome.receipt);

    let cached = harness.data.cached_characters().unwrap();
    let total: i64 = cached.iter().map(|c| c.votes).sum();
    assert_eq!(total, 1);
    assert_eq!(cached.iter().find(|c| c.id == "3").unwrap().votes, 1);
}

#[tokio::test]
async fn accepted_vote_reaches_remote_and_cache() {
    let harness = Harness::new();
    let location = LocationInfo::new(1.0, 2.0, 3.0);

    let outcome = harness
        .data
        .cast_vote("ada", "2", device(), Some(location.clone()))
        .await;

    assert!(outcome.remote.is_ok());
    let votes = harness.remote.votes.lock().unwrap();
    assert_eq!(votes.len(), 1);
    assert_eq!(votes[0].character_id, "2");
    assert_eq!(votes[0].location, Some(location));
    assert_eq!(harness.data.cached_characters().unwrap()[0].id, "2");
}

#[tokio::test]
async fn remote_rejects_duplicate_identity() {
    let harness = Harness::new();

    assert!(harness.data.cast_vote("ada", "1", device(), None).await.remote.is_ok());
    let second = harness.data.cast_vote("ada", "2", device(), None).await;

    assert!(second.remote.is_err());
    assert_eq!(harness.remote.votes.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn login_record_gets_map_link() {
    let harness = Harness::new();

    harness
        .data
        .register_user_login(
            "ada",
            LoginMethod::Instagram,
            device(),
            Some(LocationInfo::new(40.7128, -74.006, 5.0)),
        )
        .await
        .unwrap();

    let logins = harness.remote.logins.lock().unwrap();
    assert_eq!(logins[0].method, LoginMethod::Instagram);
    assert_eq!(
        logins[0].location.as_ref().unwrap().map_link.as_deref(),
        Some("https://www.google.com/maps?q=40.7128,-74.006")
    );
}

#[tokio::test]
async fn login_failure_is_reported_not_raised() {
    let harness = Harness::new();
    harness.remote.set_failing(true);

    let result = harness
        .data
        .register_user_login("ada", LoginMethod::Facebook, device(), None)
        .await;

    assert!(result.is_err());
    assert_eq!(harness.remote.login_count(), 0);
}

#[tokio::test]
async fn realtime_changes_invoke_callback_until_cancelled() {
    let harness = Harness::with(
        FakeRemote::with_realtime(default_characters()),
        FakeLocation::granted(),
    );
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();

    let subscription = harness
        .data
        .subscribe_to_votes(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .await;
    assert!(subscription.is_active());

    harness.remote.push_change();
    tokio::time::timeout(Duration::from_secs(1), async {
        while calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("callback to run");

    subscription.cancel();
    settle().await;
    let seen = calls.load(Ordering::SeqCst);
    harness.remote.push_change();
    settle().await;
    assert_eq!(calls.load(Ordering::SeqCst), seen);
}

#[tokio::test]
async fn no_realtime_channel_means_noop_subscription() {
    let harness = Harness::new();
    let subscription = harness.data.subscribe_to_votes(|| {}).await;
    assert!(!subscription.is_active());
}

#[tokio::test]
async fn admin_logs_fall_back_to_empty() {
    let harness = Harness::new();
    harness.data.cast_vote("ada", "1", device(), None).await;
    assert_eq!(harness.data.vote_log().await.len(), 1);

    harness.remote.set_failing(true);
    assert!(harness.data.vote_log().await.is_empty());
    assert!(harness.data.login_log().await.is_empty());

    let local = DataService::local_only(Arc::new(MemoryStore::new()));
    assert!(local.vote_log().await.is_empty());
}

#[tokio::test]
async fn logout_keeps_receipts() {
    let harness = Harness::new();
    harness.data.set_current_user("ada");
    harness.data.cast_vote("ada", "1", device(), None).await;

    harness.data.clear_current_user();

    assert!(harness.data.current_user().is_none());
    assert!(harness.data.has_voted("ada"));
}
