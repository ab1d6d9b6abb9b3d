//! End-to-end authentication flows through the HTTP router.

mod common;

use axum::http::{Method, StatusCode};
use common::spawn_app;
use serde_json::json;

#[tokio::test]
async fn health_is_public() {
    let app = spawn_app().await;
    let reply = app.send(Method::GET, "/api/v1/health", None, None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["success"], true);
    assert_eq!(reply.body["data"]["status"], "healthy");
}

#[tokio::test]
async fn register_login_and_profile() {
    let app = spawn_app().await;

    let registered = app.register("ana@loja.test", "secret1").await;
    assert_eq!(registered.status, StatusCode::CREATED);
    assert_eq!(registered.body["data"]["user"]["role"], "user");
    assert_eq!(registered.body["data"]["expires_in"], 24 * 3600);

    let login = app.login("ana@loja.test", "secret1").await;
    assert_eq!(login.status, StatusCode::OK);
    let token = login.token();

    let me = app
        .send(Method::GET, "/api/v1/auth/me", Some(&token), None)
        .await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.body["data"]["email"], "ana@loja.test");

    for raw in [&registered.raw, &login.raw, &me.raw] {
        assert!(!raw.contains("password_hash"));
        assert!(!raw.contains("$2b$"));
    }
}

#[tokio::test]
async fn duplicate_and_weak_registrations() {
    let app = spawn_app().await;
    app.register("ana@loja.test", "secret1").await;

    let dup = app.register("ana@loja.test", "secret2").await;
    assert_eq!(dup.status, StatusCode::CONFLICT);
    assert_eq!(dup.error_code(), "DUPLICATE_EMAIL");

    let weak = app.register("bea@loja.test", "123").await;
    assert_eq!(weak.status, StatusCode::BAD_REQUEST);
    assert_eq!(weak.error_code(), "WEAK_PASSWORD");

    let bad_email = app.register("not-an-email", "secret1").await;
    assert_eq!(bad_email.status, StatusCode::BAD_REQUEST);
    assert_eq!(bad_email.error_code(), "INVALID_INPUT");
}

#[tokio::test]
async fn login_failures_look_the_same() {
    let app = spawn_app().await;
    app.register("ana@loja.test", "secret1").await;

    let wrong = app.login("ana@loja.test", "wrong-password").await;
    let unknown = app.login("nobody@loja.test", "secret1").await;

    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong.body, unknown.body);
    assert_eq!(wrong.error_code(), "INVALID_CREDENTIALS");
}

#[tokio::test]
async fn protected_routes_require_a_valid_bearer() {
    let app = spawn_app().await;

    let missing = app.send(Method::GET, "/api/v1/auth/me", None, None).await;
    assert_eq!(missing.status, StatusCode::UNAUTHORIZED);
    assert_eq!(missing.error_code(), "MISSING_TOKEN");

    let garbage = app
        .send(Method::GET, "/api/v1/auth/me", Some("not.a.token"), None)
        .await;
    assert_eq!(garbage.status, StatusCode::UNAUTHORIZED);
    assert_eq!(garbage.error_code(), "MALFORMED_TOKEN");
}

#[tokio::test]
async fn admin_routes_enforce_role() {
    let app = spawn_app().await;
    let (_, user_token) = app.user_token("ana@loja.test").await;

    let anonymous = app.send(Method::GET, "/api/v1/admin/users", None, None).await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);
    assert_eq!(anonymous.error_code(), "MISSING_TOKEN");

    let denied = app
        .send(Method::GET, "/api/v1/admin/users", Some(&user_token), None)
        .await;
    assert_eq!(denied.status, StatusCode::FORBIDDEN);
    assert_eq!(denied.error_code(), "ACCESS_DENIED");

    let admin_token = app.admin_token().await;
    let users = app
        .send(Method::GET, "/api/v1/admin/users", Some(&admin_token), None)
        .await;
    assert_eq!(users.status, StatusCode::OK);
    assert_eq!(users.body["data"].as_array().map(Vec::len), Some(2));
    assert!(!users.raw.contains("password_hash"));
}

#[tokio::test]
async fn deactivated_user_is_locked_out() {
    let app = spawn_app().await;
    let (user_id, user_token) = app.user_token("ana@loja.test").await;
    let admin_token = app.admin_token().await;

    let reply = app
        .send(
            Method::PATCH,
            &format!("/api/v1/admin/users/{user_id}/active"),
            Some(&admin_token),
            Some(json!({ "active": false })),
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["data"]["active"], false);

    // previously issued token stops working
    let me = app
        .send(Method::GET, "/api/v1/auth/me", Some(&user_token), None)
        .await;
    assert_eq!(me.status, StatusCode::UNAUTHORIZED);
    assert_eq!(me.error_code(), "INACTIVE_ACCOUNT");

    let login = app.login("ana@loja.test", "secret1").await;
    assert_eq!(login.status, StatusCode::UNAUTHORIZED);
    assert_eq!(login.error_code(), "INACTIVE_ACCOUNT");

    let missing = app
        .send(
            Method::PATCH,
            "/api/v1/admin/users/9999/active",
            Some(&admin_token),
            Some(json!({ "active": false })),
        )
        .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn refresh_issues_a_new_token() {
    let app = spawn_app().await;
    let (_, token) = app.user_token("ana@loja.test").await;

    let refreshed = app
        .send(Method::POST, "/api/v1/auth/refresh", Some(&token), None)
        .await;
    assert_eq!(refreshed.status, StatusCode::OK);
    let new_token = refreshed.token();

    let me = app
        .send(Method::GET, "/api/v1/auth/me", Some(&new_token), None)
        .await;
    assert_eq!(me.status, StatusCode::OK);

    let without = app
        .send(Method::POST, "/api/v1/auth/refresh", None, None)
        .await;
    assert_eq!(without.status, StatusCode::UNAUTHORIZED);
    assert_eq!(without.error_code(), "MISSING_TOKEN");
}

#[tokio::test]
async fn tokens_survive_exactly_one_rotation() {
    let app = spawn_app().await;
    let (_, token) = app.user_token("ana@loja.test").await;

    app.keys.rotate().unwrap();
    let after_one = app
        .send(Method::GET, "/api/v1/auth/me", Some(&token), None)
        .await;
    assert_eq!(after_one.status, StatusCode::OK);

    app.keys.rotate().unwrap();
    let after_two = app
        .send(Method::GET, "/api/v1/auth/me", Some(&token), None)
        .await;
    assert_eq!(after_two.status, StatusCode::UNAUTHORIZED);
    assert_eq!(after_two.error_code(), "UNKNOWN_KEY");
}

#[tokio::test]
async fn change_password_flow() {
    let app = spawn_app().await;
    let (_, token) = app.user_token("ana@loja.test").await;

    let wrong = app
        .send(
            Method::PUT,
            "/api/v1/auth/password",
            Some(&token),
            Some(json!({ "old_password": "nope!!", "new_password": "brandnew" })),
        )
        .await;
    assert_eq!(wrong.status, StatusCode::BAD_REQUEST);
    assert_eq!(wrong.error_code(), "INCORRECT_PASSWORD");

    let ok = app
        .send(
            Method::PUT,
            "/api/v1/auth/password",
            Some(&token),
            Some(json!({ "old_password": "secret1", "new_password": "brandnew" })),
        )
        .await;
    assert_eq!(ok.status, StatusCode::OK);

    assert_eq!(
        app.login("ana@loja.test", "secret1").await.status,
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(
        app.login("ana@loja.test", "brandnew").await.status,
        StatusCode::OK
    );
}
