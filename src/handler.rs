//! HTTP request handlers for the chirpy API
//!
//! Handlers validate input, call the store and translate its errors. Every
//! store call (and password hashing) runs on tokio's blocking pool, since the
//! store performs synchronous file I/O under its lock.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse},
    Extension, Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use time::OffsetDateTime;

use crate::auth::{
    access_token_ttl, generate_refresh_token, hash_password, issue_access_token, verify_password,
};
use crate::error::{ApiError, StoreError};
use crate::middleware::{bearer_token, AuthUser};
use crate::model::{
    AccessTokenResponse, Chirp, CreateChirpRequest, CredentialsRequest, ListParams, LoginResponse,
    PolkaEvent, RefreshToken, SortOrder, UserResponse,
};
use crate::state::AppState;
use crate::validation::{clean_profanity, is_valid_chirp_length, is_valid_email, validate_password};

/// Webhook event that promotes a user
const USER_UPGRADED: &str = "user.upgraded";

/// Cookie carrying the refresh token between login and `/api/refresh`
pub const REFRESH_COOKIE: &str = "refresh_token";

/// Path scope of the refresh cookie; covers both refresh and revoke
const REFRESH_COOKIE_PATH: &str = "/api";

async fn run_blocking<T, F>(f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|err| ApiError::Internal(format!("blocking task failed: {err}")))?
}

fn validate_credentials(request: &CredentialsRequest) -> Result<(), ApiError> {
    if !is_valid_email(&request.email) {
        return Err(ApiError::BadRequest("invalid email".to_string()));
    }
    validate_password(&request.password)
        .map_err(|reason| ApiError::BadRequest(format!("invalid password: {reason}")))
}

async fn hash(password: String) -> Result<String, ApiError> {
    run_blocking(move || hash_password(&password).map_err(|err| ApiError::Internal(err.to_string())))
        .await
}

fn refresh_cookie(refresh_token: &RefreshToken) -> Result<Cookie<'static>, ApiError> {
    let expires = OffsetDateTime::from_unix_timestamp(refresh_token.expires_at.timestamp())
        .map_err(|err| ApiError::Internal(format!("refresh token expiry out of range: {err}")))?;

    Ok(Cookie::build((REFRESH_COOKIE, refresh_token.token.clone()))
        .path(REFRESH_COOKIE_PATH)
        .http_only(true)
        .same_site(SameSite::Strict)
        .expires(expires)
        .build())
}

fn bearer_header(access_token: &str) -> [(header::HeaderName, String); 1] {
    [(header::AUTHORIZATION, format!("Bearer {access_token}"))]
}

/// Looks up the presented refresh token, hiding why it was rejected
///
/// The `refresh_token` cookie set at login wins; clients without a cookie
/// store can send the token as a Bearer credential instead.
async fn valid_refresh_token(
    state: &AppState,
    jar: &CookieJar,
    headers: &HeaderMap,
) -> Result<RefreshToken, ApiError> {
    let token = jar
        .get(REFRESH_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
        .or_else(|| bearer_token(headers).map(str::to_string))
        .ok_or_else(|| ApiError::Unauthorized("missing refresh token".to_string()))?;

    let db = state.db.clone();
    let found = run_blocking(move || Ok(db.tokens.get_valid(&token))).await?;

    match found {
        Ok(refresh_token) => Ok(refresh_token),
        Err(err @ (StoreError::NotFound(_) | StoreError::Expired)) => {
            tracing::debug!(error = %err, "refresh token rejected");
            Err(ApiError::Unauthorized("invalid refresh token".to_string()))
        }
        Err(err) => Err(err.into()),
    }
}

pub async fn health() -> &'static str {
    "OK"
}

/// Admin page showing how many requests have been served
pub async fn admin_metrics(State(state): State<AppState>) -> Html<String> {
    Html(format!(
        r#"<html>
  <body>
    <h1>Welcome, Chirpy Admin</h1>
    <p>Chirpy has been visited {} times!</p>
  </body>
</html>"#,
        state.hits.hits()
    ))
}

pub async fn reset_metrics(State(state): State<AppState>) -> &'static str {
    state.hits.reset();
    "Hits reset to 0"
}

/// Registers a new user
///
/// # Response
///
/// - **201 Created** - User created
/// - **400 Bad Request** - Invalid email or weak password
/// - **409 Conflict** - Email already used
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload?;
    validate_credentials(&request)?;

    let password_hash = hash(request.password).await?;
    let db = state.db.clone();
    let user = run_blocking(move || Ok(db.users.create(&request.email, &password_hash)?)).await?;

    tracing::info!(user_id = %user.id, "user registered");
    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

/// Changes the email and password of the authenticated user
pub async fn update_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<Json<UserResponse>, ApiError> {
    let Json(request) = payload?;
    validate_credentials(&request)?;

    let password_hash = hash(request.password).await?;
    let db = state.db.clone();
    let user =
        run_blocking(move || Ok(db.users.update(&auth.id, &request.email, &password_hash)?))
            .await?;

    Ok(Json(user.into()))
}

/// Exchanges email and password for an access token and a refresh token
///
/// Logging in replaces any refresh token the user already held. The refresh
/// token is also set as an HttpOnly cookie, and the access token is echoed in
/// the `Authorization` response header.
///
/// # Response
///
/// - **200 OK** - Credentials accepted
/// - **401 Unauthorized** - Unknown email or wrong password (indistinguishable)
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload?;

    let db = state.db.clone();
    let (user, refresh_token) = run_blocking(move || {
        let user = db.users.get_by_email(&request.email)?;
        if !verify_password(&user.password_hash, &request.password) {
            return Err(StoreError::Unauthorized.into());
        }

        let refresh_token = generate_refresh_token(&user.id);
        db.tokens.store(refresh_token.clone())?;
        Ok((user, refresh_token))
    })
    .await?;

    let token = issue_access_token(&user.id, &state.config.jwt_secret, access_token_ttl())
        .map_err(|err| ApiError::Internal(err.to_string()))?;

    let jar = jar.add(refresh_cookie(&refresh_token)?);

    tracing::info!(user_id = %user.id, "user logged in");
    Ok((
        jar,
        bearer_header(&token),
        Json(LoginResponse {
            id: user.id,
            email: user.email,
            is_chirpy_red: user.is_chirpy_red,
            token,
            refresh_token: refresh_token.token,
        }),
    ))
}

/// Issues a fresh access token for a valid refresh token
pub async fn refresh(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let refresh_token = valid_refresh_token(&state, &jar, &headers).await?;

    let token = issue_access_token(
        &refresh_token.user_id,
        &state.config.jwt_secret,
        access_token_ttl(),
    )
    .map_err(|err| ApiError::Internal(err.to_string()))?;

    Ok((bearer_header(&token), Json(AccessTokenResponse { token })))
}

/// Revokes the presented refresh token and clears the refresh cookie
pub async fn revoke(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let refresh_token = valid_refresh_token(&state, &jar, &headers).await?;

    let db = state.db.clone();
    run_blocking(move || Ok(db.tokens.revoke(&refresh_token.token)?)).await?;

    let jar = jar.remove(Cookie::build(REFRESH_COOKIE).path(REFRESH_COOKIE_PATH));
    Ok((StatusCode::NO_CONTENT, jar))
}

/// Posts a chirp as the authenticated user
///
/// # Response
///
/// - **201 Created** - Chirp stored, profane words masked
/// - **400 Bad Request** - Body longer than 140 characters
pub async fn create_chirp(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    payload: Result<Json<CreateChirpRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload?;
    if !is_valid_chirp_length(&request.body) {
        return Err(ApiError::BadRequest("Chirp is too long".to_string()));
    }

    let body = clean_profanity(&request.body);
    let db = state.db.clone();
    let chirp = run_blocking(move || Ok(db.chirps.create(&body, &auth.id)?)).await?;

    Ok((StatusCode::CREATED, Json(chirp)))
}

/// Lists chirps, optionally filtered by author
///
/// # Example Request
///
/// `GET /api/chirps?author_id=3311741c-680c-4546-99f3-fc9efac2036c&sort=desc`
pub async fn list_chirps(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Chirp>>, ApiError> {
    let order = params
        .sort
        .as_deref()
        .map(SortOrder::parse)
        .unwrap_or_default();

    let db = state.db.clone();
    let chirps = run_blocking(move || {
        let chirps = match params.author_id.as_deref().filter(|id| !id.is_empty()) {
            Some(author_id) => db.chirps.get_by_author(author_id, order)?,
            None => db.chirps.list(order, |_| true)?,
        };
        Ok(chirps)
    })
    .await?;

    Ok(Json(chirps))
}

pub async fn get_chirp(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<Chirp>, ApiError> {
    let db = state.db.clone();
    let chirp = run_blocking(move || Ok(db.chirps.get_by_id(id)?)).await?;
    Ok(Json(chirp))
}

/// Deletes a chirp owned by the authenticated user
///
/// # Response
///
/// - **204 No Content** - Chirp deleted
/// - **403 Forbidden** - The chirp belongs to someone else
/// - **404 Not Found** - No such chirp
pub async fn delete_chirp(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<u64>,
) -> Result<StatusCode, ApiError> {
    let db = state.db.clone();
    run_blocking(move || {
        // The store does not check ownership, so it happens here. The check
        // and the delete are separate critical sections; chirps never change
        // author, so a chirp that passed the check stays deletable.
        let chirp = db.chirps.get_by_id(id)?;
        if chirp.author_id != auth.id {
            return Err(ApiError::Forbidden(
                "You are not authorized to delete this chirp".to_string(),
            ));
        }

        db.chirps.delete(id)?;
        Ok(())
    })
    .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Handles billing events from Polka
///
/// Only `user.upgraded` has an effect; other events are acknowledged and
/// ignored so the provider does not retry them.
pub async fn polka_webhook(
    State(state): State<AppState>,
    payload: Result<Json<PolkaEvent>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(event) = payload?;
    if event.event != USER_UPGRADED {
        tracing::debug!(event = %event.event, "ignoring polka event");
        return Ok(StatusCode::NO_CONTENT);
    }

    let db = state.db.clone();
    let user_id = event.data.user_id;
    let user = run_blocking(move || Ok(db.users.promote(&user_id)?)).await?;

    tracing::info!(user_id = %user.id, "user upgraded to chirpy red");
    Ok(StatusCode::NO_CONTENT)
}
