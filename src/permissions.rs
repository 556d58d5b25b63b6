//! Device permission requests.
//!
//! Only location is ever requested, and only to tag login and vote records
//! the user submits themselves. A granted location is cached in the local
//! store so later records can reuse it without prompting again.

use async_trait::async_trait;
use serde::Serialize;

use crate::error::PermissionError;
use crate::models::LocationInfo;
use crate::storage::{keys, save_json, LocalStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    Location,
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Permission::Location => write!(f, "location"),
        }
    }
}

/// Host-side location prompt.
#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn request_location(&self) -> Result<LocationInfo, PermissionError>;
}

/// Outcome of one round of permission prompts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PermissionCheck {
    pub location: Option<LocationInfo>,
    pub missing: Vec<Permission>,
}

impl PermissionCheck {
    pub fn is_granted(&self) -> bool {
        self.missing.is_empty()
    }
}

pub async fn request_permissions(
    provider: &dyn LocationProvider,
    store: &dyn LocalStore,
) -> PermissionCheck {
    match provider.request_location().await {
        Ok(location) => {
            save_json(store, keys::LOCATION, &location);
            PermissionCheck {
                location: Some(location),
                missing: Vec::new(),
            }
        }
        Err(e) => {
            tracing::warn!("Location request failed: {}", e);
            PermissionCheck {
                location: None,
                missing: vec![e.permission()],
            }
        }
    }
}
