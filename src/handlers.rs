// handlers.rs
use std::sync::Arc;

use axum::{extract::State, http::HeaderMap, Json};
use chrono::{DateTime, Utc};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::countdown::{Countdown, VotingWindow};
use crate::error::ApiError;
use crate::models::{Character, DeviceInfo, LocationInfo, LoginMethod, LoginRecord, VoteRecord};
use crate::state::AppState;

pub const ADMIN_PASSPHRASE_HEADER: &str = "x-admin-passphrase";

#[derive(Debug, Serialize)]
pub struct CountdownResponse {
    pub deadline: DateTime<Utc>,
    pub ended: bool,
    pub countdown: Option<Countdown>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub identifier: String,
    pub method: LoginMethod,
    #[serde(default)]
    pub device: DeviceInfo,
    pub location: Option<LocationInfo>,
}

#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    pub identifier: String,
    pub character_id: String,
    #[serde(default)]
    pub device: DeviceInfo,
    pub location: Option<LocationInfo>,
}

#[derive(Debug, Deserialize)]
pub struct AdminLoginRequest {
    pub passphrase: String,
}

pub async fn health() -> &'static str {
    "OK"
}

/// Leaderboard, most votes first
pub async fn get_characters(State(state): State<Arc<AppState>>) -> Json<Vec<Character>> {
    Json(state.data.get_characters().await)
}

pub async fn get_countdown(State(state): State<Arc<AppState>>) -> Json<CountdownResponse> {
    let deadline = state.data.deadline().unwrap_or(state.settings.deadline);
    let window = VotingWindow::now(deadline);

    Json(CountdownResponse {
        deadline,
        ended: window.is_ended(),
        countdown: window.countdown(),
    })
}

/// Record a login or visit. Backend failures are not the caller's problem.
pub async fn register_login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let identifier = req.identifier.trim();
    if identifier.is_empty() {
        return Err(ApiError::InvalidRequest("identifier is required".to_string()));
    }

    let stored = state
        .data
        .register_user_login(identifier, req.method, req.device, req.location)
        .await
        .is_ok();

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "status": "Login received", "stored": stored })),
    ))
}

/// Cast a vote. The receipt is kept locally even when the backend refuses it.
pub async fn vote(
    State(state): State<Arc<AppState>>,
    Json(req): Json<VoteRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let identifier = req.identifier.trim();
    let character_id = req.character_id.trim();
    if identifier.is_empty() || character_id.is_empty() {
        return Err(ApiError::InvalidRequest(
            "identifier and character_id are required".to_string(),
        ));
    }

    let deadline = state.data.deadline().unwrap_or(state.settings.deadline);
    if VotingWindow::now(deadline).is_ended() {
        return Err(ApiError::VotingClosed);
    }
    if state.data.has_voted(identifier) {
        return Err(ApiError::AlreadyVoted(identifier.to_string()));
    }

    let outcome = state
        .data
        .cast_vote(identifier, character_id, req.device, req.location)
        .await;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "receipt": outcome.receipt, "stored": outcome.remote.is_ok() })),
    ))
}

pub async fn admin_login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AdminLoginRequest>,
) -> Result<Json<Value>, ApiError> {
    tokio::time::sleep(state.settings.admin_check_delay).await;
    check_passphrase(&state, &req.passphrase)?;
    Ok(Json(json!({ "status": "Welcome" })))
}

pub async fn admin_votes(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<VoteRecord>>, ApiError> {
    check_passphrase(&state, header_passphrase(&headers))?;
    Ok(Json(state.data.vote_log().await))
}

pub async fn admin_logins(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<LoginRecord>>, ApiError> {
    check_passphrase(&state, header_passphrase(&headers))?;
    Ok(Json(state.data.login_log().await))
}

fn header_passphrase(headers: &HeaderMap) -> &str {
    headers
        .get(ADMIN_PASSPHRASE_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
}

fn check_passphrase(state: &AppState, passphrase: &str) -> Result<(), ApiError> {
    if passphrase == state.settings.admin_passphrase {
        Ok(())
    } else {
        tracing::warn!("Rejected admin passphrase");
        Err(ApiError::Unauthorized)
    }
}
