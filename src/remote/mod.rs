//! Hosted backend boundary.

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::error::RemoteError;
use crate::models::{Character, LoginRecord, VoteRecord};

mod postgres;

pub use postgres::PgBackend;

#[async_trait]
pub trait RemoteBackend: Send + Sync {
    /// Character rows ordered by descending vote count.
    async fn fetch_characters(&self) -> Result<Vec<Character>, RemoteError>;

    async fn insert_login(&self, record: &LoginRecord) -> Result<(), RemoteError>;

    /// Records a vote and bumps the character's count.
    async fn insert_vote(&self, record: &VoteRecord) -> Result<(), RemoteError>;

    /// Newest first.
    async fn fetch_votes(&self) -> Result<Vec<VoteRecord>, RemoteError>;

    /// Newest first.
    async fn fetch_logins(&self) -> Result<Vec<LoginRecord>, RemoteError>;

    /// Feed that ticks whenever the character table changes.
    /// `RemoteError::RealtimeUnavailable` when no channel is configured.
    async fn watch_characters(&self) -> Result<broadcast::Receiver<()>, RemoteError>;
}
