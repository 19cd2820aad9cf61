use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use chirpy::config::Config;
use chirpy::database::{init_db, BackendKind, Database};
use chirpy::model::RefreshToken;
use chirpy::route::create_app;
use chirpy::state::AppState;

const POLKA_KEY: &str = "f271c81ff7084ee5b99a5091b42d486e";

fn setup_test_app() -> (Router, Database, TempDir) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let config = Config {
        port: 0,
        database_path: dir.path().join("database.json"),
        backend: BackendKind::Json,
        jwt_secret: "auth-secret".to_string(),
        polka_key: POLKA_KEY.to_string(),
        static_dir: dir.path().join("public"),
    };
    let db = init_db(&config.database_path, config.backend).expect("Failed to initialize test database");
    (create_app(AppState::new(db.clone(), config)), db, dir)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Failed to read response body")
        .to_bytes();

    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
    };
    (status, body)
}

fn request(method: &str, uri: &str, authorization: Option<&str>, payload: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(value) = authorization {
        builder = builder.header("Authorization", value);
    }
    match payload {
        Some(payload) => builder
            .header("content-type", "application/json")
            .body(Body::from(payload.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Registers and logs in a user, returning the login response
async fn signup(app: &Router, email: &str) -> Value {
    let credentials = json!({ "email": email, "password": "Heisenberg1" });

    let (status, _) = send(app, request("POST", "/api/users", None, Some(credentials.clone()))).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(app, request("POST", "/api/login", None, Some(credentials))).await;
    assert_eq!(status, StatusCode::OK);
    body
}

fn bearer(token: &Value) -> String {
    format!("Bearer {}", token.as_str().unwrap())
}

#[tokio::test]
async fn test_refresh_issues_working_access_token() {
    let (app, _db, _dir) = setup_test_app();
    let session = signup(&app, "walt@breakingbad.com").await;

    let (status, body) = send(
        &app,
        request("POST", "/api/refresh", Some(&bearer(&session["refresh_token"])), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // The new access token is accepted by authenticated routes
    let (status, chirp) = send(
        &app,
        request(
            "POST",
            "/api/chirps",
            Some(&bearer(&body["token"])),
            Some(json!({ "body": "Say my name" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(chirp["user_id"], session["id"]);
}

#[tokio::test]
async fn test_access_token_is_not_a_refresh_token() {
    let (app, _db, _dir) = setup_test_app();
    let session = signup(&app, "walt@breakingbad.com").await;

    let (status, body) = send(
        &app,
        request("POST", "/api/refresh", Some(&bearer(&session["token"])), None),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid refresh token");
}

#[tokio::test]
async fn test_refresh_requires_token() {
    let (app, _db, _dir) = setup_test_app();

    let (status, body) = send(&app, request("POST", "/api/refresh", None, None)).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "missing refresh token");
}

#[tokio::test]
async fn test_revoke_then_refresh_fails() {
    let (app, db, _dir) = setup_test_app();
    let session = signup(&app, "walt@breakingbad.com").await;
    let refresh = bearer(&session["refresh_token"]);

    let (status, body) = send(&app, request("POST", "/api/revoke", Some(&refresh), None)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);

    let (status, _) = send(&app, request("POST", "/api/refresh", Some(&refresh), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, request("POST", "/api/revoke", Some(&refresh), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    assert!(db.store().load().unwrap().refresh_tokens.is_empty());
}

#[tokio::test]
async fn test_login_rotates_refresh_token() {
    let (app, _db, _dir) = setup_test_app();
    let first = signup(&app, "walt@breakingbad.com").await;

    let (status, second) = send(
        &app,
        request(
            "POST",
            "/api/login",
            None,
            Some(json!({ "email": "walt@breakingbad.com", "password": "Heisenberg1" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_ne!(first["refresh_token"], second["refresh_token"]);

    let (status, _) = send(
        &app,
        request("POST", "/api/refresh", Some(&bearer(&first["refresh_token"])), None),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        request("POST", "/api/refresh", Some(&bearer(&second["refresh_token"])), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_expired_refresh_token_is_rejected_and_removed() {
    let (app, db, _dir) = setup_test_app();
    db.tokens
        .store(RefreshToken {
            user_id: "u1".to_string(),
            token: "deadbeef".to_string(),
            expires_at: Utc::now() - Duration::days(1),
        })
        .unwrap();

    let (status, _) = send(&app, request("POST", "/api/refresh", Some("Bearer deadbeef"), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    assert!(!db.store().load().unwrap().refresh_tokens.contains_key("deadbeef"));
}

#[tokio::test]
async fn test_polka_webhook_requires_api_key() {
    let (app, _db, _dir) = setup_test_app();
    let session = signup(&app, "walt@breakingbad.com").await;
    let event = json!({ "event": "user.upgraded", "data": { "user_id": session["id"] } });

    for authorization in [None, Some("ApiKey wrong"), Some(&*format!("Bearer {POLKA_KEY}"))] {
        let (status, _) = send(
            &app,
            request("POST", "/api/polka/webhooks", authorization, Some(event.clone())),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}

#[tokio::test]
async fn test_polka_webhook_upgrades_user() {
    let (app, db, _dir) = setup_test_app();
    let session = signup(&app, "walt@breakingbad.com").await;
    let user_id = session["id"].as_str().unwrap().to_string();
    let api_key = format!("ApiKey {POLKA_KEY}");

    // Other events are acknowledged without effect
    let (status, _) = send(
        &app,
        request(
            "POST",
            "/api/polka/webhooks",
            Some(&api_key),
            Some(json!({ "event": "user.payment_failed", "data": { "user_id": user_id } })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(!db.users.get_by_id(&user_id).unwrap().is_chirpy_red);

    let (status, _) = send(
        &app,
        request(
            "POST",
            "/api/polka/webhooks",
            Some(&api_key),
            Some(json!({ "event": "user.upgraded", "data": { "user_id": user_id } })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, login) = send(
        &app,
        request(
            "POST",
            "/api/login",
            None,
            Some(json!({ "email": "walt@breakingbad.com", "password": "Heisenberg1" })),
        ),
    )
    .await;
    assert_eq!(login["is_chirpy_red"], true);

    // Changing credentials keeps the upgrade
    let (status, updated) = send(
        &app,
        request(
            "PUT",
            "/api/users",
            Some(&bearer(&login["token"])),
            Some(json!({ "email": "walt@breakingbad.com", "password": "BlueSky99" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["is_chirpy_red"], true);
}

#[tokio::test]
async fn test_polka_webhook_unknown_user() {
    let (app, _db, _dir) = setup_test_app();

    let (status, _) = send(
        &app,
        request(
            "POST",
            "/api/polka/webhooks",
            Some(&format!("ApiKey {POLKA_KEY}")),
            Some(json!({
                "event": "user.upgraded",
                "data": { "user_id": "3311741c-680c-4546-99f3-fc9efac2036c" }
            })),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_metrics_count_and_reset() {
    let (app, _db, _dir) = setup_test_app();

    for _ in 0..3 {
        send(&app, request("GET", "/api/health", None, None)).await;
    }

    let (status, page) = send(&app, request("GET", "/admin/metrics", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(page.as_str().unwrap().contains("visited 3 times"));

    let (status, _) = send(&app, request("GET", "/api/reset", None, None)).await;
    assert_eq!(status, StatusCode::OK);

    let (_, page) = send(&app, request("GET", "/admin/metrics", None, None)).await;
    assert!(page.as_str().unwrap().contains("visited 0 times"));
}

#[tokio::test]
async fn test_login_sets_refresh_cookie_and_bearer_header() {
    let (app, _db, _dir) = setup_test_app();
    let credentials = json!({ "email": "walt@breakingbad.com", "password": "Heisenberg1" });
    send(&app, request("POST", "/api/users", None, Some(credentials.clone()))).await;

    let response = app
        .clone()
        .oneshot(request("POST", "/api/login", None, Some(credentials)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let headers = response.headers().clone();
    let body: Value = serde_json::from_slice(&response.into_body().collect().await.unwrap().to_bytes()).unwrap();

    let cookie = headers
        .get(header::SET_COOKIE)
        .expect("login sets the refresh cookie")
        .to_str()
        .unwrap();
    assert!(cookie.starts_with(&format!("refresh_token={}", body["refresh_token"].as_str().unwrap())));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("Path=/api"));
    assert!(cookie.contains("Expires="));

    assert_eq!(
        headers.get(header::AUTHORIZATION).unwrap().to_str().unwrap(),
        bearer(&body["token"])
    );
}

#[tokio::test]
async fn test_refresh_and_revoke_with_cookie() {
    let (app, _db, _dir) = setup_test_app();
    let session = signup(&app, "walt@breakingbad.com").await;
    let cookie = format!("refresh_token={}", session["refresh_token"].as_str().unwrap());

    let with_cookie = |uri: &str| {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::COOKIE, &cookie)
            .body(Body::empty())
            .unwrap()
    };

    let response = app.clone().oneshot(with_cookie("/api/refresh")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .get(header::AUTHORIZATION)
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("Bearer "));

    let response = app.clone().oneshot(with_cookie("/api/revoke")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let cleared = response.headers().get(header::SET_COOKIE).unwrap().to_str().unwrap();
    assert!(cleared.starts_with("refresh_token="));
    assert!(cleared.contains("Max-Age=0"));

    let (status, body) = send(&app, with_cookie("/api/refresh")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid refresh token");
}
