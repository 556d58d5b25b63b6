// models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A votable character card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Character {
    pub id: String,
    pub name: String,
    pub role: String,
    pub description: String,
    pub image_url: String,
    pub votes: i64,
    pub theme_color: String,
}

/// How an identity was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginMethod {
    Google,
    Facebook,
    Instagram,
    Twitter,
    Guest,
}

impl std::fmt::Display for LoginMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoginMethod::Google => write!(f, "google"),
            LoginMethod::Facebook => write!(f, "facebook"),
            LoginMethod::Instagram => write!(f, "instagram"),
            LoginMethod::Twitter => write!(f, "twitter"),
            LoginMethod::Guest => write!(f, "guest"),
        }
    }
}

impl std::str::FromStr for LoginMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "google" => Ok(LoginMethod::Google),
            "facebook" => Ok(LoginMethod::Facebook),
            "instagram" => Ok(LoginMethod::Instagram),
            "twitter" => Ok(LoginMethod::Twitter),
            "guest" => Ok(LoginMethod::Guest),
            other => Err(format!("unknown login method: {other}")),
        }
    }
}

/// Coarse description of the client device, supplied by the host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub user_agent: String,
    pub platform: String,
    pub language: String,
    pub screen: String,
}

/// A location the user explicitly agreed to share.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationInfo {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map_link: Option<String>,
}

impl LocationInfo {
    pub fn new(latitude: f64, longitude: f64, accuracy: f64) -> Self {
        Self {
            latitude,
            longitude,
            accuracy,
            map_link: None,
        }
    }

    /// Copy of this location with `map_link` filled in.
    pub fn with_map_link(&self) -> Self {
        Self {
            map_link: Some(format!(
                "https://www.google.com/maps?q={},{}",
                self.latitude, self.longitude
            )),
            ..self.clone()
        }
    }
}

/// Local proof that an identity has voted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteReceipt {
    pub character_id: String,
    pub timestamp: DateTime<Utc>,
    pub device: DeviceInfo,
    pub location: Option<LocationInfo>,
}

/// Login or visit entry appended to the remote `users` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginRecord {
    pub identifier: String,
    pub method: LoginMethod,
    pub device: DeviceInfo,
    pub location: Option<LocationInfo>,
    pub last_login: DateTime<Utc>,
}

/// Vote row in the remote `votes` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteRecord {
    pub identifier: String,
    pub character_id: String,
    pub device: DeviceInfo,
    pub location: Option<LocationInfo>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_link_uses_coordinates() {
        let location = LocationInfo::new(48.8584, 2.2945, 12.0).with_map_link();
        assert_eq!(
            location.map_link.as_deref(),
            Some("https://www.google.com/maps?q=48.8584,2.2945")
        );
        assert_eq!(location.latitude, 48.8584);
    }

    #[test]
    fn login_method_parses_its_display_form() {
        for method in [
            LoginMethod::Google,
            LoginMethod::Facebook,
            LoginMethod::Instagram,
            LoginMethod::Twitter,
            LoginMethod::Guest,
        ] {
            assert_eq!(method.to_string().parse::<LoginMethod>(), Ok(method));
        }
        assert!("myspace".parse::<LoginMethod>().is_err());
    }
}
