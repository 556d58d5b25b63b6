#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

use muse::controller::{AppController, Session, SessionSettings};
use muse::data_service::DataService;
use muse::defaults::default_characters;
use muse::error::{PermissionError, RemoteError};
use muse::events::EventBus;
use muse::models::{Character, DeviceInfo, LocationInfo, LoginRecord, VoteRecord};
use muse::permissions::{LocationProvider, Permission};
use muse::remote::RemoteBackend;
use muse::storage::{LocalStore, MemoryStore};

/// In-memory stand-in for the hosted backend.
pub struct FakeRemote {
    pub characters: Mutex<Vec<Character>>,
    pub logins: Mutex<Vec<LoginRecord>>,
    pub votes: Mutex<Vec<VoteRecord>>,
    failing: AtomicBool,
    realtime: Option<broadcast::Sender<()>>,
}

impl FakeRemote {
    pub fn new(characters: Vec<Character>) -> Self {
        Self {
            characters: Mutex::new(characters),
            logins: Mutex::new(Vec::new()),
            votes: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
            realtime: None,
        }
    }

    pub fn with_realtime(characters: Vec<Character>) -> Self {
        let (tx, _) = broadcast::channel(16);
        Self {
            realtime: Some(tx),
            ..Self::new(characters)
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn push_change(&self) {
        if let Some(tx) = &self.realtime {
            let _ = tx.send(());
        }
    }

    pub fn login_count(&self) -> usize {
        self.logins.lock().unwrap().len()
    }

    fn check(&self) -> Result<(), RemoteError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(RemoteError::Rejected("backend offline".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RemoteBackend for FakeRemote {
    async fn fetch_characters(&self) -> Result<Vec<Character>, RemoteError> {
        self.check()?;
        let mut characters = self.characters.lock().unwrap().clone();
        characters.sort_by(|a, b| b.votes.cmp(&a.votes));
        Ok(characters)
    }

    async fn insert_login(&self, record: &LoginRecord) -> Result<(), RemoteError> {
        self.check()?;
        self.logins.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn insert_vote(&self, record: &VoteRecord) -> Result<(), RemoteError> {
        self.check()?;
        let mut votes = self.votes.lock().unwrap();
        if votes.iter().any(|v| v.identifier == record.identifier) {
            return Err(RemoteError::Rejected("already voted".to_string()));
        }
        let mut characters = self.characters.lock().unwrap();
        let character = characters
            .iter_mut()
            .find(|c| c.id == record.character_id)
            .ok_or_else(|| RemoteError::Rejected("unknown character".to_string()))?;
        character.votes += 1;
        votes.push(record.clone());
        drop(characters);
        drop(votes);
        self.push_change();
        Ok(())
    }

    async fn fetch_votes(&self) -> Result<Vec<VoteRecord>, RemoteError> {
        self.check()?;
        Ok(self.votes.lock().unwrap().iter().rev().cloned().collect())
    }

    async fn fetch_logins(&self) -> Result<Vec<LoginRecord>, RemoteError> {
        self.check()?;
        Ok(self.logins.lock().unwrap().iter().rev().cloned().collect())
    }

    async fn watch_characters(&self) -> Result<broadcast::Receiver<()>, RemoteError> {
        self.check()?;
        self.realtime
            .as_ref()
            .map(|tx| tx.subscribe())
            .ok_or(RemoteError::RealtimeUnavailable)
    }
}

/// Location prompt whose answer the test controls.
pub struct FakeLocation {
    answer: Mutex<Option<LocationInfo>>,
}

impl FakeLocation {
    pub fn granted() -> Self {
        Self {
            answer: Mutex::new(Some(LocationInfo::new(51.5007, -0.1246, 10.0))),
        }
    }

    pub fn denied() -> Self {
        Self {
            answer: Mutex::new(None),
        }
    }

    pub fn grant(&self) {
        *self.answer.lock().unwrap() = Some(LocationInfo::new(51.5007, -0.1246, 10.0));
    }
}

#[async_trait]
impl LocationProvider for FakeLocation {
    async fn request_location(&self) -> Result<LocationInfo, PermissionError> {
        self.answer
            .lock()
            .unwrap()
            .clone()
            .ok_or(PermissionError::Denied(Permission::Location))
    }
}

pub fn device() -> DeviceInfo {
    DeviceInfo {
        user_agent: "Mozilla/5.0 (X11; Linux x86_64)".to_string(),
        platform: "Linux".to_string(),
        language: "en-GB".to_string(),
        screen: "1920x1080".to_string(),
    }
}

pub fn future_deadline() -> DateTime<Utc> {
    Utc::now() + chrono::Duration::days(3)
}

pub fn past_deadline() -> DateTime<Utc> {
    Utc::now() - chrono::Duration::minutes(1)
}

pub fn settings(deadline: DateTime<Utc>) -> SessionSettings {
    SessionSettings {
        login_confirm_delay: Duration::ZERO,
        admin_check_delay: Duration::ZERO,
        ..SessionSettings::new(deadline, "open sesame")
    }
}

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub remote: Arc<FakeRemote>,
    pub location: Arc<FakeLocation>,
    pub data: Arc<DataService>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(FakeRemote::new(default_characters()), FakeLocation::granted())
    }

    pub fn with(remote: FakeRemote, location: FakeLocation) -> Self {
        let store = Arc::new(MemoryStore::new());
        let remote = Arc::new(remote);
        let data = Arc::new(DataService::new(
            store.clone() as Arc<dyn LocalStore>,
            Some(remote.clone() as Arc<dyn RemoteBackend>),
            EventBus::new(),
        ));
        Self {
            store,
            remote,
            location: Arc::new(location),
            data,
        }
    }

    pub fn controller(&self, settings: SessionSettings) -> AppController {
        AppController::new(Session {
            data: self.data.clone(),
            location: self.location.clone(),
            device: device(),
            settings,
        })
    }

    pub async fn loaded(&self, settings: SessionSettings) -> AppController {
        let mut controller = self.controller(settings);
        controller.load().await;
        controller
    }
}

/// Lets spawned fire-and-forget tasks run to completion.
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}
