// src/config.rs
use std::{env, fmt::Display, path::PathBuf, str::FromStr};

use anyhow::{anyhow, Context};
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::controller::SessionSettings;

pub struct Config {
    pub port: u16,
    /// No URL means local-only mode.
    pub database_url: Option<String>,
    pub deadline: DateTime<Utc>,
    pub admin_passphrase: String,
    pub require_location: bool,
    pub store_path: PathBuf,
    pub realtime_channel: Option<String>,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup, so tests need not touch the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let deadline = require(&lookup, "MUSE_DEADLINE")?;
        let deadline = DateTime::parse_from_rfc3339(&deadline)
            .with_context(|| format!("MUSE_DEADLINE is not RFC 3339: {deadline}"))?
            .with_timezone(&Utc);

        let realtime_channel = match lookup("MUSE_REALTIME_CHANNEL") {
            Some(channel) if channel.trim().is_empty() => None,
            Some(channel) => Some(channel),
            None => Some("characters_changed".to_string()),
        };

        Ok(Self {
            port: try_load(&lookup, "PORT", "3030")?,
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            deadline,
            admin_passphrase: require(&lookup, "MUSE_ADMIN_PASSPHRASE")?,
            require_location: try_load(&lookup, "MUSE_REQUIRE_LOCATION", "false")?,
            store_path: try_load(&lookup, "MUSE_STORE_PATH", "muse-store.json")?,
            realtime_channel,
        })
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            require_location: self.require_location,
            ..SessionSettings::new(self.deadline, self.admin_passphrase.clone())
        }
    }
}

fn require<F>(lookup: &F, key: &str) -> anyhow::Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).ok_or_else(|| anyhow!("{key} must be set"))
}

fn try_load<F, T>(lookup: &F, key: &str, default: &str) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    let raw = lookup(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    raw.parse().map_err(|e| {
        warn!("Invalid {key} value: {e}");
        anyhow!("invalid {key} value {raw:?}: {e}")
    })
}
