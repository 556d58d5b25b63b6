//! Session state machine behind the voting screens.
//!
//! One `AppController` owns everything a single viewer sees: the active
//! screen, who is signed in, whether that identity has voted, which card is
//! in front, which dialogs are open, and the voting window. Calls to the data
//! service never block the happy path; only a missing required permission or
//! a closed voting window can stop a vote.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::countdown::{Countdown, CountdownTicker, VotingWindow};
use crate::data_service::DataService;
use crate::events::SyncEvent;
use crate::models::{Character, DeviceInfo, LoginMethod, LoginRecord, VoteRecord};
use crate::permissions::{self, LocationProvider, Permission};

pub const VOTE_RECORDED_NOTICE: &str = "Thank you! Your vote has been recorded.";
pub const VOTE_SAVED_LOCALLY_NOTICE: &str =
    "Your vote has been saved on this device and will be counted. No need to vote again.";
pub const ADMIN_PASSPHRASE_MISMATCH: &str = "Incorrect passphrase";

/// Per-session knobs fixed at construction.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub deadline: DateTime<Utc>,
    pub admin_passphrase: String,
    pub require_location: bool,
    /// Pause between a finished login and the confirmation dialog.
    pub login_confirm_delay: Duration,
    pub admin_check_delay: Duration,
}

impl SessionSettings {
    pub fn new(deadline: DateTime<Utc>, admin_passphrase: impl Into<String>) -> Self {
        Self {
            deadline,
            admin_passphrase: admin_passphrase.into(),
            require_location: false,
            login_confirm_delay: Duration::from_millis(400),
            admin_check_delay: Duration::from_millis(800),
        }
    }
}

/// Collaborators injected into a controller.
pub struct Session {
    pub data: Arc<DataService>,
    pub location: Arc<dyn LocationProvider>,
    pub device: DeviceInfo,
    pub settings: SessionSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Main,
    AdminLogin,
    AdminDashboard,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modals {
    pub login: bool,
    pub confirm: bool,
    pub permission: bool,
}

/// What pressing the vote button did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteAction {
    VotingEnded,
    PermissionRequired,
    LoginRequired,
    AlreadyVoted,
    ConfirmOpened,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmOutcome {
    /// The backend accepted the vote.
    Recorded,
    /// The backend failed; the vote stands locally.
    RecordedLocally,
    /// Nothing to confirm.
    Ignored,
}

/// A finished simulated login. Only the handle is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginCompletion {
    pub identity: String,
    pub method: LoginMethod,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdminLog {
    pub votes: Vec<VoteRecord>,
    pub logins: Vec<LoginRecord>,
}

pub struct AppController {
    session: Session,
    deadline: DateTime<Utc>,
    view: View,
    current_user: Option<String>,
    guest_id: Option<String>,
    has_voted: bool,
    active_index: usize,
    modals: Modals,
    missing_permissions: Vec<Permission>,
    window: VotingWindow,
    characters: Vec<Character>,
    notice: Option<String>,
    admin_error: Option<String>,
    admin_log: Option<AdminLog>,
}

impl AppController {
    pub fn new(session: Session) -> Self {
        let deadline = session.settings.deadline;
        session.data.set_deadline(deadline);

        Self {
            deadline,
            view: View::Main,
            current_user: None,
            guest_id: None,
            has_voted: false,
            active_index: 0,
            modals: Modals::default(),
            missing_permissions: Vec::new(),
            window: VotingWindow::now(deadline),
            characters: Vec::new(),
            notice: None,
            admin_error: None,
            admin_log: None,
            session,
        }
    }

    fn data(&self) -> &Arc<DataService> {
        &self.session.data
    }

    /// Initial screen setup: roster, identities, permissions, countdown.
    pub async fn load(&mut self) {
        self.characters = self.data().get_characters().await;
        self.clamp_active_index();

        let (guest_id, first_visit) = self.data().ensure_guest_id();
        self.guest_id = Some(guest_id.clone());

        self.current_user = self.data().current_user();
        self.has_voted = self
            .current_user
            .as_deref()
            .is_some_and(|user| self.data().has_voted(user));

        self.request_permissions().await;

        if first_visit {
            tracing::info!("First visit from {}", guest_id);
            self.spawn_login_registration(guest_id, LoginMethod::Guest);
        }

        self.tick_at(Utc::now());
    }

    pub fn start_countdown(&self) -> CountdownTicker {
        CountdownTicker::start(self.deadline)
    }

    pub fn tick_at(&mut self, now: DateTime<Utc>) {
        self.apply_window(VotingWindow::at(self.deadline, now));
    }

    pub fn apply_window(&mut self, window: VotingWindow) {
        if window.is_ended() && !self.window.is_ended() {
            tracing::info!("Voting has ended");
            self.modals.confirm = false;
        }
        self.window = window;
    }

    pub fn vote_action(&mut self) -> VoteAction {
        self.tick_at(Utc::now());

        if self.window.is_ended() {
            return VoteAction::VotingEnded;
        }
        if self.is_blocked_by_permissions() {
            self.modals.permission = true;
            return VoteAction::PermissionRequired;
        }
        if self.current_user.is_none() {
            self.modals.login = true;
            return VoteAction::LoginRequired;
        }
        if self.has_voted {
            return VoteAction::AlreadyVoted;
        }

        self.modals.confirm = true;
        VoteAction::ConfirmOpened
    }

    pub async fn confirm_vote(&mut self) -> ConfirmOutcome {
        let was_open = std::mem::take(&mut self.modals.confirm);
        self.tick_at(Utc::now());

        let user = match self.current_user.clone() {
            Some(user) if was_open && !self.has_voted && !self.window.is_ended() => user,
            _ => return ConfirmOutcome::Ignored,
        };
        let character_id = match self.active_character() {
            Some(character) => character.id.clone(),
            None => return ConfirmOutcome::Ignored,
        };

        let location = self.data().cached_location();
        let outcome = self
            .data()
            .cast_vote(&user, &character_id, self.session.device.clone(), location)
            .await;

        self.has_voted = true;
        if let Some(character) = self.characters.iter_mut().find(|c| c.id == character_id) {
            character.votes += 1;
        }

        match outcome.remote {
            Ok(()) => {
                self.notice = Some(VOTE_RECORDED_NOTICE.to_string());
                ConfirmOutcome::Recorded
            }
            Err(_) => {
                self.notice = Some(VOTE_SAVED_LOCALLY_NOTICE.to_string());
                ConfirmOutcome::RecordedLocally
            }
        }
    }

    pub fn cancel_confirm(&mut self) {
        self.modals.confirm = false;
    }

    /// Returns whether the confirmation dialog was opened afterwards.
    pub async fn login(&mut self, completion: LoginCompletion) -> bool {
        let identity = completion.identity.trim().to_string();
        if identity.is_empty() {
            tracing::warn!("Ignoring {} login with an empty handle", completion.method);
            return false;
        }

        self.data().set_current_user(&identity);
        self.current_user = Some(identity.clone());
        self.modals.login = false;
        self.has_voted = self.data().has_voted(&identity);
        self.spawn_login_registration(identity, completion.method);

        self.tick_at(Utc::now());
        if self.window.is_ended() || self.has_voted {
            return false;
        }

        tokio::time::sleep(self.session.settings.login_confirm_delay).await;
        self.tick_at(Utc::now());
        if self.window.is_ended() {
            return false;
        }
        self.modals.confirm = true;
        true
    }

    pub async fn login_as_guest(&mut self) -> bool {
        let guest_id = match self.guest_id.clone() {
            Some(guest_id) => guest_id,
            None => {
                let (guest_id, _) = self.data().ensure_guest_id();
                self.guest_id = Some(guest_id.clone());
                guest_id
            }
        };
        self.login(LoginCompletion {
            identity: guest_id,
            method: LoginMethod::Guest,
        })
        .await
    }

    pub fn close_login(&mut self) {
        self.modals.login = false;
    }

    /// Forgets the current identity. Its vote receipt stays.
    pub fn logout(&mut self) {
        if let Some(user) = self.current_user.take() {
            tracing::info!("{} logged out", user);
        }
        self.data().clear_current_user();
        self.has_voted = false;
        self.modals.confirm = false;
        self.notice = None;
    }

    fn spawn_login_registration(&self, identity: String, method: LoginMethod) {
        let data = Arc::clone(self.data());
        let device = self.session.device.clone();
        let location = data.cached_location();
        tokio::spawn(async move {
            // Failures are already logged by the data service.
            let _ = data
                .register_user_login(&identity, method, device, location)
                .await;
        });
    }

    pub async fn request_permissions(&mut self) -> bool {
        let check =
            permissions::request_permissions(&*self.session.location, self.data().store()).await;
        self.missing_permissions = check.missing;
        self.modals.permission = self.is_blocked_by_permissions();
        check.location.is_some()
    }

    pub async fn retry_permissions(&mut self) -> bool {
        self.request_permissions().await;
        !self.is_blocked_by_permissions()
    }

    fn is_blocked_by_permissions(&self) -> bool {
        self.session.settings.require_location && !self.missing_permissions.is_empty()
    }

    pub fn open_admin(&mut self) {
        self.view = View::AdminLogin;
        self.admin_error = None;
    }

    /// Checks the shared admin passphrase after a fixed delay.
    pub async fn submit_admin_passphrase(&mut self, passphrase: &str) -> bool {
        tokio::time::sleep(self.session.settings.admin_check_delay).await;

        if passphrase != self.session.settings.admin_passphrase {
            tracing::warn!("Rejected admin passphrase");
            self.admin_error = Some(ADMIN_PASSPHRASE_MISMATCH.to_string());
            return false;
        }

        self.admin_error = None;
        self.view = View::AdminDashboard;
        self.refresh_admin_log().await;
        true
    }

    pub async fn refresh_admin_log(&mut self) {
        if self.view != View::AdminDashboard {
            return;
        }
        let votes = self.data().vote_log().await;
        let logins = self.data().login_log().await;
        self.admin_log = Some(AdminLog { votes, logins });
    }

    pub fn close_admin(&mut self) {
        self.view = View::Main;
        self.admin_error = None;
        self.admin_log = None;
    }

    pub fn select_card(&mut self, index: usize) {
        if index < self.characters.len() {
            self.active_index = index;
        }
    }

    pub fn select_character(&mut self, character_id: &str) -> bool {
        match self.characters.iter().position(|c| c.id == character_id) {
            Some(index) => {
                self.active_index = index;
                true
            }
            None => false,
        }
    }

    pub fn next_card(&mut self) {
        if !self.characters.is_empty() {
            self.active_index = (self.active_index + 1) % self.characters.len();
        }
    }

    pub fn previous_card(&mut self) {
        if !self.characters.is_empty() {
            let len = self.characters.len();
            self.active_index = (self.active_index + len - 1) % len;
        }
    }

    fn clamp_active_index(&mut self) {
        if self.active_index >= self.characters.len() {
            self.active_index = 0;
        }
    }

    /// Re-reads state another view changed, without going to the network.
    pub fn apply_event(&mut self, event: SyncEvent) {
        match event {
            SyncEvent::CharactersChanged => {
                if let Some(characters) = self.data().cached_characters() {
                    self.replace_characters(characters);
                }
                if let Some(user) = self.current_user.as_deref() {
                    self.has_voted = self.data().has_voted(user);
                }
            }
            SyncEvent::DeadlineChanged => {
                if let Some(deadline) = self.data().deadline() {
                    self.deadline = deadline;
                    self.tick_at(Utc::now());
                }
            }
        }
    }

    pub async fn refresh_characters(&mut self) {
        let characters = self.data().get_characters().await;
        self.replace_characters(characters);
    }

    /// Keeps the same character in front when the roster is reordered.
    fn replace_characters(&mut self, characters: Vec<Character>) {
        let active_id = self.active_character().map(|c| c.id.clone());
        self.characters = characters;
        match active_id {
            Some(id) => {
                if !self.select_character(&id) {
                    self.clamp_active_index();
                }
            }
            None => self.clamp_active_index(),
        }
    }

    pub fn leaderboard(&self) -> Vec<Character> {
        let mut ranked = self.characters.clone();
        ranked.sort_by(|a, b| b.votes.cmp(&a.votes));
        ranked
    }

    pub fn dismiss_notice(&mut self) {
        self.notice = None;
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn current_user(&self) -> Option<&str> {
        self.current_user.as_deref()
    }

    pub fn guest_id(&self) -> Option<&str> {
        self.guest_id.as_deref()
    }

    pub fn has_voted(&self) -> bool {
        self.has_voted
    }

    pub fn can_vote(&self) -> bool {
        !self.window.is_ended() && !self.has_voted && !self.is_blocked_by_permissions()
    }

    pub fn active_index(&self) -> usize {
        self.active_index
    }

    pub fn active_character(&self) -> Option<&Character> {
        self.characters.get(self.active_index)
    }

    pub fn characters(&self) -> &[Character] {
        &self.characters
    }

    pub fn modals(&self) -> Modals {
        self.modals
    }

    pub fn missing_permissions(&self) -> &[Permission] {
        &self.missing_permissions
    }

    pub fn deadline(&self) -> DateTime<Utc> {
        self.deadline
    }

    pub fn voting_ended(&self) -> bool {
        self.window.is_ended()
    }

    pub fn countdown(&self) -> Option<Countdown> {
        self.window.countdown()
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn admin_error(&self) -> Option<&str> {
        self.admin_error.as_deref()
    }

    pub fn admin_log(&self) -> Option<&AdminLog> {
        self.admin_log.as_ref()
    }
}
