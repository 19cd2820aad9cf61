//! Data models for the chirpy service
//!
//! This module defines the persisted document and its records, plus the
//! request/response shapes exchanged with HTTP clients.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The complete persisted state, loaded and saved as one unit
///
/// Every collection defaults to empty and the id counter defaults to 1, so an
/// empty JSON object is a valid (empty) document. Field names on disk are
/// `id` (the counter), `chirps`, `users` and `refresh_tokens`, which keeps
/// files from earlier deployments loadable.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Document {
    /// Id handed to the next created chirp. Only ever increases.
    #[serde(rename = "id", default = "first_chirp_id")]
    pub next_chirp_id: u64,

    #[serde(default)]
    pub chirps: BTreeMap<u64, Chirp>,

    /// Users keyed by their UUID string
    #[serde(default)]
    pub users: BTreeMap<String, User>,

    /// Refresh tokens keyed by the token value itself, so a bearer-presented
    /// token can be looked up directly
    #[serde(default)]
    pub refresh_tokens: BTreeMap<String, RefreshToken>,
}

fn first_chirp_id() -> u64 {
    1
}

impl Default for Document {
    fn default() -> Self {
        Self {
            next_chirp_id: first_chirp_id(),
            chirps: BTreeMap::new(),
            users: BTreeMap::new(),
            refresh_tokens: BTreeMap::new(),
        }
    }
}

/// A short user-authored post
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Chirp {
    pub id: u64,
    pub body: String,
    /// Id of the user who posted the chirp
    #[serde(rename = "user_id")]
    pub author_id: String,
}

/// A registered account
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// UUID v4 string
    pub id: String,

    /// Unique across all users, compared case-sensitively
    pub email: String,

    /// Opaque password hash (PHC string)
    #[serde(rename = "password")]
    pub password_hash: String,

    /// Promotion flag, set by the billing webhook
    #[serde(default)]
    pub is_chirpy_red: bool,
}

/// A long-lived credential exchanged for short-lived access tokens
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RefreshToken {
    pub user_id: String,
    /// Random hex value, also the key of the token in the document
    #[serde(rename = "refresh_token")]
    pub token: String,
    #[serde(rename = "expire_time")]
    pub expires_at: DateTime<Utc>,
}

impl RefreshToken {
    /// A token is expired once `now` reaches its expiry instant.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Ordering applied to chirp listings, compared by id
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl SortOrder {
    /// Parses a `sort` query value. Anything other than `desc` is ascending.
    pub fn parse(value: &str) -> Self {
        match value {
            "desc" => SortOrder::Descending,
            _ => SortOrder::Ascending,
        }
    }
}

/// Request payload for registration, login and account update
///
/// # Example
/// ```json
/// {
///   "email": "walt@breakingbad.com",
///   "password": "Heisenberg1"
/// }
/// ```
#[derive(Deserialize)]
pub struct CredentialsRequest {
    pub email: String,
    pub password: String,
}

/// Public view of a user (the password hash is never sent)
#[derive(Serialize, Deserialize, Debug)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub is_chirpy_red: bool,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            is_chirpy_red: user.is_chirpy_red,
        }
    }
}

/// Response returned after a successful login
#[derive(Serialize, Deserialize, Debug)]
pub struct LoginResponse {
    pub id: String,
    pub email: String,
    pub is_chirpy_red: bool,

    /// Signed access token (JWT)
    pub token: String,

    /// Opaque refresh token to exchange at `/api/refresh`
    pub refresh_token: String,
}

/// Response returned by `/api/refresh`
#[derive(Serialize, Deserialize, Debug)]
pub struct AccessTokenResponse {
    pub token: String,
}

/// Request payload for posting a chirp
#[derive(Deserialize)]
pub struct CreateChirpRequest {
    pub body: String,
}

/// Query parameters for listing chirps
///
/// # Example
/// Query string: `?author_id=3f1c...&sort=desc`
#[derive(Deserialize, Default)]
pub struct ListParams {
    /// Only return chirps posted by this user
    pub author_id: Option<String>,

    /// `asc` (default) or `desc`
    pub sort: Option<String>,
}

/// Webhook payload sent by the Polka billing provider
///
/// # Example
/// ```json
/// {
///   "event": "user.upgraded",
///   "data": { "user_id": "3311741c-680c-4546-99f3-fc9efac2036c" }
/// }
/// ```
#[derive(Deserialize)]
pub struct PolkaEvent {
    pub event: String,
    pub data: PolkaEventData,
}

#[derive(Deserialize)]
pub struct PolkaEventData {
    pub user_id: String,
}
