//! MUSE: pick a character, cast one vote, watch the leaderboard.
//!
//! The crate splits into ports and the logic that drives them:
//!
//! - [`storage`]: on-device key-value records (current user, guest id,
//!   vote receipts, cached roster, deadline, cached location)
//! - [`remote`]: the hosted backend (characters, login log, votes and a
//!   change feed), with a Postgres implementation
//! - [`data_service`]: local-first composition of the two
//! - [`controller`]: the per-viewer session state machine
//! - [`routes`] / [`handlers`]: the HTTP surface served by the binary
//!
//! A vote is recorded locally first. Remote failures are logged and reported
//! back, but never undo or block what the voter sees.

pub mod config;
pub mod controller;
pub mod countdown;
pub mod data_service;
pub mod defaults;
pub mod error;
pub mod events;
pub mod handlers;
pub mod models;
pub mod permissions;
pub mod remote;
pub mod routes;
pub mod state;
pub mod storage;
