use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};

use crate::auth::validate_access_token;
use crate::error::ApiError;
use crate::state::AppState;

/// Id of the user authenticated by [`require_auth`], stored in request extensions
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: String,
}

/// Returns the credential of an `Authorization: <scheme> <credential>` header.
pub fn authorization_credential<'a>(headers: &'a HeaderMap, scheme: &str) -> Option<&'a str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix(scheme)?
        .strip_prefix(' ')
        .map(str::trim)
        .filter(|credential| !credential.is_empty())
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    authorization_credential(headers, "Bearer")
}

/// Counts every request passing through toward the admin metrics page
pub async fn count_hits(State(state): State<AppState>, request: Request, next: Next) -> Response {
    state.hits.record();
    next.run(request).await
}

/// Rejects requests without a valid access token
///
/// On success the token subject is attached as an [`AuthUser`] extension.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(request.headers())
        .ok_or_else(|| ApiError::Unauthorized("missing access token".to_string()))?;

    let claims = validate_access_token(token, &state.config.jwt_secret).map_err(|err| {
        tracing::debug!(error = %err, "access token rejected");
        ApiError::Unauthorized("invalid token".to_string())
    })?;

    request.extensions_mut().insert(AuthUser { id: claims.sub });
    Ok(next.run(request).await)
}

/// Checks the `Authorization: ApiKey <key>` header sent by the Polka webhook
pub async fn require_polka_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    match authorization_credential(request.headers(), "ApiKey") {
        Some(key) if key == state.config.polka_key => Ok(next.run(request).await),
        _ => Err(ApiError::Unauthorized("invalid polka key".to_string())),
    }
}
