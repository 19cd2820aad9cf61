//! Route definitions for the chirpy API
//!
//! This module configures all HTTP routes and maps them to their respective handlers.

use axum::handler::Handler;
use axum::routing::{get, post};
use axum::{middleware, Router};
use tower_http::services::ServeDir;

use crate::handler::{
    admin_metrics, create_chirp, delete_chirp, get_chirp, health, list_chirps, login,
    polka_webhook, refresh, register, reset_metrics, revoke, update_user,
};
use crate::middleware::{count_hits, require_auth, require_polka_key};
use crate::state::AppState;

/// Creates and configures the Axum application router with all routes
///
/// # Route Definitions
///
/// - `GET /api/health` - Liveness probe
/// - `POST /api/users` - Register
/// - `PUT /api/users` - Update email/password (access token)
/// - `POST /api/login` - Issue access and refresh tokens
/// - `POST /api/refresh` - New access token from a refresh token
/// - `POST /api/revoke` - Revoke a refresh token
/// - `GET /api/chirps` - List chirps (`author_id`, `sort` query params)
/// - `POST /api/chirps` - Post a chirp (access token)
/// - `GET /api/chirps/{id}` - Fetch one chirp
/// - `DELETE /api/chirps/{id}` - Delete one's own chirp (access token)
/// - `POST /api/polka/webhooks` - Billing webhook (`ApiKey` header)
/// - `GET /app/*` - Static files
/// - `GET /admin/metrics`, `GET /api/reset` - Hit counter (not counted themselves)
///
/// # Example Usage
///
/// ```no_run
/// # use chirpy::config::Config;
/// # use chirpy::database::{init_db, BackendKind};
/// # use chirpy::route::create_app;
/// # use chirpy::state::AppState;
/// # let config = Config::from_env().unwrap();
/// let db = init_db("database.json", BackendKind::Json).unwrap();
/// let app = create_app(AppState::new(db, config));
/// // axum::serve(listener, app).await.unwrap();
/// ```
pub fn create_app(state: AppState) -> Router {
    let auth = middleware::from_fn_with_state(state.clone(), require_auth);
    let polka = middleware::from_fn_with_state(state.clone(), require_polka_key);

    let api_routes = Router::new()
        .route("/health", get(health))
        .route("/users", post(register).put(update_user.layer(auth.clone())))
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/revoke", post(revoke))
        .route(
            "/chirps",
            get(list_chirps).post(create_chirp.layer(auth.clone())),
        )
        .route(
            "/chirps/{id}",
            get(get_chirp).delete(delete_chirp.layer(auth)),
        )
        .route("/polka/webhooks", post(polka_webhook.layer(polka)));

    // Everything except the admin counter pages counts as a hit
    let counted = Router::new()
        .nest("/api", api_routes)
        .nest_service("/app", ServeDir::new(&state.config.static_dir))
        .layer(middleware::from_fn_with_state(state.clone(), count_hits));

    Router::new()
        .route("/admin/metrics", get(admin_metrics))
        .route("/api/reset", get(reset_metrics))
        .merge(counted)
        .with_state(state)
}
