//! Local-first data access.
//!
//! Every operation here degrades to the local store when the hosted backend
//! is missing or failing. Remote errors are logged and handed back for
//! information only; the user-visible outcome never waits on them.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::defaults::default_characters;
use crate::error::RemoteError;
use crate::events::{EventBus, SyncEvent};
use crate::models::{
    Character, DeviceInfo, LocationInfo, LoginMethod, LoginRecord, VoteReceipt, VoteRecord,
};
use crate::remote::RemoteBackend;
use crate::storage::{keys, load_json, remove_key, save_json, save_text, LocalStore};

/// Result of `cast_vote`: the receipt is always written, `remote` reports
/// whether the backend accepted the vote.
#[derive(Debug)]
pub struct VoteOutcome {
    pub receipt: VoteReceipt,
    pub remote: Result<(), RemoteError>,
}

/// Handle to a realtime subscription. Dropping it stops delivery.
#[derive(Debug, Default)]
pub struct Subscription {
    handle: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn noop() -> Self {
        Self { handle: None }
    }

    pub fn is_active(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn cancel(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

pub struct DataService {
    store: Arc<dyn LocalStore>,
    remote: Option<Arc<dyn RemoteBackend>>,
    events: EventBus,
}

impl DataService {
    pub fn new(
        store: Arc<dyn LocalStore>,
        remote: Option<Arc<dyn RemoteBackend>>,
        events: EventBus,
    ) -> Self {
        Self {
            store,
            remote,
            events,
        }
    }

    pub fn local_only(store: Arc<dyn LocalStore>) -> Self {
        Self::new(store, None, EventBus::new())
    }

    pub fn store(&self) -> &dyn LocalStore {
        &*self.store
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    fn remote(&self) -> Result<&Arc<dyn RemoteBackend>, RemoteError> {
        self.remote.as_ref().ok_or(RemoteError::NotConfigured)
    }

    /// Remote rows by descending votes, else the cached list, else the
    /// built-in roster.
    pub async fn get_characters(&self) -> Vec<Character> {
        match self.fetch_remote_characters().await {
            Ok(characters) if !characters.is_empty() => {
                save_json(self.store(), keys::CHARACTERS, &characters);
                return characters;
            }
            Ok(_) => tracing::info!("Remote character table is empty, using local list"),
            Err(RemoteError::NotConfigured) => {}
            Err(e) => tracing::warn!("Could not fetch characters: {}", e),
        }

        self.cached_characters().unwrap_or_else(default_characters)
    }

    async fn fetch_remote_characters(&self) -> Result<Vec<Character>, RemoteError> {
        let mut characters = self.remote()?.fetch_characters().await?;
        characters.sort_by(|a, b| b.votes.cmp(&a.votes));
        Ok(characters)
    }

    pub fn cached_characters(&self) -> Option<Vec<Character>> {
        load_json(self.store(), keys::CHARACTERS)
    }

    pub async fn register_user_login(
        &self,
        identifier: &str,
        method: LoginMethod,
        device: DeviceInfo,
        location: Option<LocationInfo>,
    ) -> Result<(), RemoteError> {
        let record = LoginRecord {
            identifier: identifier.to_string(),
            method,
            device,
            location: location.as_ref().map(LocationInfo::with_map_link),
            last_login: Utc::now(),
        };

        let result = match self.remote() {
            Ok(remote) => remote.insert_login(&record).await,
            Err(e) => Err(e),
        };
        match &result {
            Ok(()) => tracing::info!("Registered {} login for {}", method, identifier),
            Err(RemoteError::NotConfigured) => {
                tracing::debug!("No backend, skipping login record for {}", identifier)
            }
            Err(e) => tracing::error!("Could not register login for {}: {}", identifier, e),
        }
        result
    }

    pub async fn cast_vote(
        &self,
        identifier: &str,
        character_id: &str,
        device: DeviceInfo,
        location: Option<LocationInfo>,
    ) -> VoteOutcome {
        let now = Utc::now();
        let record = VoteRecord {
            identifier: identifier.to_string(),
            character_id: character_id.to_string(),
            device: device.clone(),
            location: location.clone(),
            created_at: now,
        };

        let remote = match self.remote() {
            Ok(remote) => remote.insert_vote(&record).await,
            Err(e) => Err(e),
        };
        if let Err(e) = &remote {
            tracing::error!("Remote vote for {} not recorded: {}", identifier, e);
        }

        let receipt = VoteReceipt {
            character_id: character_id.to_string(),
            timestamp: now,
            device,
            location,
        };
        save_json(self.store(), &keys::vote_receipt(identifier), &receipt);
        self.bump_cached_votes(character_id);
        self.events.publish(SyncEvent::CharactersChanged);

        tracing::info!("{} voted for {}", identifier, character_id);
        VoteOutcome { receipt, remote }
    }

    fn bump_cached_votes(&self, character_id: &str) {
        let mut characters = self.cached_characters().unwrap_or_else(default_characters);
        match characters.iter_mut().find(|c| c.id == character_id) {
            Some(character) => character.votes += 1,
            None => {
                tracing::warn!("Vote for unknown character {}", character_id);
                return;
            }
        }
        characters.sort_by(|a, b| b.votes.cmp(&a.votes));
        save_json(self.store(), keys::CHARACTERS, &characters);
    }

    /// Calls `callback` on every remote character change. Without a realtime
    /// channel the returned subscription does nothing.
    pub async fn subscribe_to_votes<F>(&self, callback: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        let remote = match self.remote() {
            Ok(remote) => remote,
            Err(_) => return Subscription::noop(),
        };
        let mut rx = match remote.watch_characters().await {
            Ok(rx) => rx,
            Err(RemoteError::RealtimeUnavailable) => return Subscription::noop(),
            Err(e) => {
                tracing::warn!("Could not subscribe to character changes: {}", e);
                return Subscription::noop();
            }
        };

        let handle = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(()) => callback(),
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::debug!("Skipped {} change notifications", skipped);
                        callback();
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Subscription {
            handle: Some(handle),
        }
    }

    pub fn vote_receipt(&self, identifier: &str) -> Option<VoteReceipt> {
        load_json(self.store(), &keys::vote_receipt(identifier))
    }

    pub fn has_voted(&self, identifier: &str) -> bool {
        self.vote_receipt(identifier).is_some()
    }

    pub async fn vote_log(&self) -> Vec<VoteRecord> {
        match self.remote() {
            Ok(remote) => remote.fetch_votes().await.unwrap_or_else(|e| {
                tracing::error!("Could not fetch vote log: {}", e);
                Vec::new()
            }),
            Err(_) => Vec::new(),
        }
    }

    pub async fn login_log(&self) -> Vec<LoginRecord> {
        match self.remote() {
            Ok(remote) => remote.fetch_logins().await.unwrap_or_else(|e| {
                tracing::error!("Could not fetch login log: {}", e);
                Vec::new()
            }),
            Err(_) => Vec::new(),
        }
    }

    pub fn current_user(&self) -> Option<String> {
        self.store().get(keys::CURRENT_USER)
    }

    pub fn set_current_user(&self, identifier: &str) {
        save_text(self.store(), keys::CURRENT_USER, identifier);
    }

    pub fn clear_current_user(&self) {
        remove_key(self.store(), keys::CURRENT_USER);
    }

    /// Returns the persisted guest id, generating one on first use. The flag
    /// is true when the id was created by this call.
    pub fn ensure_guest_id(&self) -> (String, bool) {
        if let Some(existing) = self.store().get(keys::GUEST_ID) {
            return (existing, false);
        }
        let guest = format!("guest_{}", Uuid::new_v4().simple());
        save_text(self.store(), keys::GUEST_ID, &guest);
        (guest, true)
    }

    pub fn cached_location(&self) -> Option<LocationInfo> {
        load_json(self.store(), keys::LOCATION)
    }

    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        load_json(self.store(), keys::DEADLINE)
    }

    pub fn set_deadline(&self, deadline: DateTime<Utc>) {
        if self.deadline() == Some(deadline) {
            return;
        }
        if save_json(self.store(), keys::DEADLINE, &deadline) {
            self.events.publish(SyncEvent::DeadlineChanged);
        }
    }
}
