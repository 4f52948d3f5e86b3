mod common;

use axum::http::{Method, StatusCode};
use common::{TestHarness, get_request, json_request, test_config};
use serde_json::json;
use std::time::Duration;

#[tokio::test]
async fn test_login_creates_user_and_issues_tokens() {
    let harness = TestHarness::new().await;

    let body = harness.login("github", "code-alice").await;

    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["expires_in"], 900);
    assert_eq!(body["is_new_user"], true);
    assert_eq!(body["user"]["github_id"], "42");
    assert_eq!(body["user"]["username"], "alice");
    assert_eq!(body["user"]["email"], "a@x.com");
    assert_eq!(body["session"]["user_id"], body["user"]["id"]);
    assert_eq!(body["refresh_token"].as_str().unwrap().len(), 64);
    assert_eq!(harness.users.len().await, 1);

    let again = harness.login("GitHub", "code-alice").await;
    assert_eq!(again["is_new_user"], false);
    assert_eq!(again["user"]["id"], body["user"]["id"]);
}

#[tokio::test]
async fn test_login_with_unknown_provider() {
    let harness = TestHarness::new().await;

    let (status, body) = harness
        .request(json_request(
            Method::POST,
            "/auth/bitbucket/login",
            None,
            json!({"code": "x"}),
        ))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "provider_unsupported");
}

#[tokio::test]
async fn test_login_with_unregistered_provider() {
    let harness = TestHarness::new().await;

    let (status, body) = harness
        .request(json_request(
            Method::POST,
            "/auth/google/login",
            None,
            json!({"code": "x"}),
        ))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "provider_unsupported");
}

#[tokio::test]
async fn test_login_with_rejected_code() {
    let harness = TestHarness::new().await;

    let (status, body) = harness
        .request(json_request(
            Method::POST,
            "/auth/github/login",
            None,
            json!({"code": "bogus"}),
        ))
        .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "external");
}

#[tokio::test]
async fn test_refresh_endpoint() {
    let harness = TestHarness::new().await;
    let login = harness.login("github", "code-alice").await;

    let (status, body) = harness
        .request(json_request(
            Method::POST,
            "/auth/refresh",
            None,
            json!({
                "user_id": login["session"]["user_id"],
                "session_nonce": login["session"]["session_nonce"],
                "refresh_token": login["refresh_token"],
            }),
        ))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["refresh_token"], login["refresh_token"]);
    assert_ne!(body["access_token"], login["access_token"]);

    let token = body["access_token"].as_str().unwrap();
    let (status, me) = harness.request(get_request("/users/me", Some(token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["id"], login["user"]["id"]);
}

#[tokio::test]
async fn test_refresh_with_wrong_secret() {
    let harness = TestHarness::new().await;
    let login = harness.login("github", "code-alice").await;

    let (status, body) = harness
        .request(json_request(
            Method::POST,
            "/auth/refresh",
            None,
            json!({
                "user_id": login["session"]["user_id"],
                "session_nonce": login["session"]["session_nonce"],
                "refresh_token": "0".repeat(64),
            }),
        ))
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "secret_mismatch");
}

#[tokio::test]
async fn test_profile_read_and_update() {
    let harness = TestHarness::new().await;
    harness.login("github", "code-bob").await;
    let login = harness.login("github", "code-alice").await;
    let token = login["access_token"].as_str().unwrap();

    let (status, body) = harness
        .request(json_request(
            Method::PATCH,
            "/users/me",
            Some(token),
            json!({"name": "Alice Liddell"}),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Alice Liddell");
    assert_eq!(body["username"], "alice");

    let (status, body) = harness
        .request(json_request(
            Method::PATCH,
            "/users/me",
            Some(token),
            json!({"username": "bob"}),
        ))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "already_exists");

    let (_, me) = harness.request(get_request("/users/me", Some(token))).await;
    assert_eq!(me["name"], "Alice Liddell");
    assert_eq!(me["username"], "alice");
}

#[tokio::test]
async fn test_invalid_and_expired_tokens_are_distinguished() {
    let mut config = test_config();
    config.jwt.access_token_ttl = 1;
    let harness = TestHarness::with_config(config).await;
    let login = harness.login("github", "code-alice").await;
    let token = login["access_token"].as_str().unwrap().to_string();

    let (status, body) = harness
        .request(get_request("/users/me", Some("not.a.token")))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "token_invalid");

    tokio::time::sleep(Duration::from_secs(2)).await;

    let (status, body) = harness.request(get_request("/users/me", Some(&token))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "token_expired");
}

#[tokio::test]
async fn test_token_signed_with_other_secret_is_invalid() {
    let other = TestHarness::with_config({
        let mut config = test_config();
        config.jwt.secret = "someone-else".to_string();
        config
    })
    .await;
    let foreign = other.login("github", "code-alice").await;

    let harness = TestHarness::new().await;
    let (status, body) = harness
        .request(get_request(
            "/users/me",
            foreign["access_token"].as_str(),
        ))
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "token_invalid");
}

fn refresh_body(login: &serde_json::Value) -> serde_json::Value {
    json!({
        "user_id": login["session"]["user_id"],
        "session_nonce": login["session"]["session_nonce"],
        "refresh_token": login["refresh_token"],
    })
}

#[tokio::test]
async fn test_logout_revokes_refresh_session() {
    let harness = TestHarness::new().await;
    let login = harness.login("github", "code-alice").await;
    let token = login["access_token"].as_str().unwrap();

    let (status, _) = harness
        .request(json_request(
            Method::POST,
            "/auth/logout",
            Some(token),
            json!({"session_nonce": login["session"]["session_nonce"]}),
        ))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = harness
        .request(json_request(Method::POST, "/auth/refresh", None, refresh_body(&login)))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "session_not_found");
}

#[tokio::test]
async fn test_logout_after_refresh_ends_original_session() {
    let harness = TestHarness::new().await;
    let login = harness.login("github", "code-alice").await;

    let (status, refreshed) = harness
        .request(json_request(Method::POST, "/auth/refresh", None, refresh_body(&login)))
        .await;
    assert_eq!(status, StatusCode::OK);
    let refreshed_token = refreshed["access_token"].as_str().unwrap();

    let logout = json!({"session_nonce": login["session"]["session_nonce"]});
    let (status, _) = harness
        .request(json_request(
            Method::POST,
            "/auth/logout",
            Some(refreshed_token),
            logout.clone(),
        ))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = harness
        .request(json_request(Method::POST, "/auth/refresh", None, refresh_body(&login)))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "session_not_found");

    // A second logout has nothing left to end
    let (status, body) = harness
        .request(json_request(
            Method::POST,
            "/auth/logout",
            Some(refreshed_token),
            logout,
        ))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "session_not_found");
}

#[tokio::test]
async fn test_logout_without_nonce_is_rejected() {
    let harness = TestHarness::new().await;
    let login = harness.login("github", "code-alice").await;
    let token = login["access_token"].as_str().unwrap();

    let (status, _) = harness
        .request(json_request(Method::POST, "/auth/logout", Some(token), json!({})))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, body) = harness
        .request(json_request(
            Method::POST,
            "/auth/logout",
            Some(token),
            json!({"session_nonce": " "}),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    let (status, _) = harness
        .request(json_request(Method::POST, "/auth/refresh", None, refresh_body(&login)))
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_health_endpoint() {
    let harness = TestHarness::new().await;

    let (status, body) = harness.request(get_request("/health?check=all", None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["checks"]["cache"]["status"], "healthy");
    assert_eq!(body["checks"]["jwt"]["status"], "healthy");
}
