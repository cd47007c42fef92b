//! Integration tests for the account endpoints

mod common;

use axum::{
    body::Body,
    http::{Method, StatusCode},
};
use common::{request, TestContext, JWT_SECRET};
use serde_json::json;
use solfa_shared::auth::jwt::{create_token, Claims};
use tower::Service as _;

fn signup_body(username: &str, email: &str, password: &str) -> serde_json::Value {
    json!({ "username": username, "email": email, "password": password })
}

fn token_from_link(link: &str) -> String {
    link.split("token=")
        .nth(1)
        .expect("link should carry a token")
        .to_string()
}

#[tokio::test]
async fn test_liveness_and_health() {
    let ctx = TestContext::new();

    let (status, body) = ctx.get("/solfa", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "solfa");

    let (status, body) = ctx.get("/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"], "connected");
}

#[tokio::test]
async fn test_security_headers_on_api_responses() {
    let ctx = TestContext::new();
    let mut app = ctx.app.clone();

    let response = app
        .call(request(Method::GET, "/solfa", None, Body::empty(), None))
        .await
        .unwrap();

    assert_eq!(response.headers().get("x-content-type-options").unwrap(), "nosniff");
    assert_eq!(response.headers().get("x-frame-options").unwrap(), "DENY");
    assert!(response.headers().get("strict-transport-security").is_none());
}

#[tokio::test]
async fn test_signup_verify_login_flow() {
    let ctx = TestContext::new();

    let (status, body) = ctx
        .post_json("/signup", None, signup_body("clara", "clara@example.com", "nocturne"))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["id"].as_i64().unwrap();

    let sent = ctx.wait_for_mail(1).await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].email, "clara@example.com");
    assert!(sent[0].link.starts_with("http://solfa.test/verify?token="));
    let token = token_from_link(&sent[0].link);
    assert_eq!(token.len(), 32);

    // Unverified accounts can't log in yet
    let (status, body) = ctx
        .post_json("/login", None, json!({"email": "clara@example.com", "password": "nocturne"}))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid email or password");

    let (status, _) = ctx.get(&format!("/verify?token={}", token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = ctx
        .post_json("/login", None, json!({"email": "clara@example.com", "password": "nocturne"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], id);
    assert_eq!(body["username"], "clara");
    assert_eq!(body["email"], "clara@example.com");

    let session = body["token"].as_str().unwrap().to_string();
    let (status, body) = ctx.get("/me", Some(&session)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "clara");
    assert!(body.get("password_hash").is_none());

    assert_eq!(ctx.audit_actions(), vec!["signup", "verify_email", "login"]);
}

#[tokio::test]
async fn test_verification_token_works_once() {
    let ctx = TestContext::new();
    ctx.post_json("/signup", None, signup_body("ana", "ana@example.com", "cadence"))
        .await;
    ctx.post_json("/signup", None, signup_body("ben", "ben@example.com", "cadence"))
        .await;

    let sent = ctx.wait_for_mail(2).await;
    let ana = sent.iter().find(|m| m.email == "ana@example.com").unwrap();
    let token = token_from_link(&ana.link);

    let (status, body) = ctx.get(&format!("/verify?token={}", token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "ana@example.com");

    let (status, body) = ctx.get(&format!("/verify?token={}", token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid token");

    // Ben is still unverified
    let (status, _) = ctx
        .post_json("/login", None, json!({"email": "ben@example.com", "password": "cadence"}))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_verify_rejects_missing_or_unknown_token() {
    let ctx = TestContext::new();

    let (status, _) = ctx.get("/verify", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = ctx.get("/verify?token=", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = ctx.get("/verify?token=deadbeef", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid token");
}

#[tokio::test]
async fn test_signup_existing_email_conflicts_regardless_of_password() {
    let ctx = TestContext::new();
    ctx.create_user("clara", "clara@example.com", "nocturne").await;

    let (status, body) = ctx
        .post_json("/signup", None, signup_body("other", "clara@example.com", "x"))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "Email already in use");
    assert_eq!(ctx.users.len(), 1);
}

#[tokio::test]
async fn test_signup_validation() {
    let ctx = TestContext::new();

    let (status, body) = ctx
        .post_json("/signup", None, signup_body("clara", "not-an-email", "nocturne"))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
    assert_eq!(body["details"][0]["field"], "email");

    let (status, body) = ctx
        .post_json("/signup", None, signup_body("clara", "clara@example.com", "short"))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"][0]["field"], "password");

    let (status, body) = ctx
        .post_json("/signup", None, signup_body("   ", "clara@example.com", "nocturne"))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"][0]["field"], "username");

    let malformed = request(
        Method::POST,
        "/signup",
        None,
        Body::from("{not json"),
        Some("application/json"),
    );
    let (status, body) = ctx.send(malformed).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");

    assert!(ctx.users.is_empty());
    assert!(ctx.notifier.sent().is_empty());
}

#[tokio::test]
async fn test_login_failures_are_indistinguishable() {
    let ctx = TestContext::new();
    ctx.create_user("clara", "clara@example.com", "nocturne").await;
    ctx.post_json("/signup", None, signup_body("ben", "ben@example.com", "cadence"))
        .await;

    let attempts = [
        json!({"email": "nobody@example.com", "password": "nocturne"}),
        json!({"email": "clara@example.com", "password": "wrong-password"}),
        json!({"email": "ben@example.com", "password": "cadence"}),
    ];

    let mut bodies = Vec::new();
    for attempt in attempts {
        let (status, body) = ctx.post_json("/login", None, attempt).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        bodies.push(body);
    }

    assert_eq!(bodies[0], bodies[1]);
    assert_eq!(bodies[1], bodies[2]);
    assert!(!ctx.audit_actions().contains(&"login".to_string()));
}

#[tokio::test]
async fn test_login_validation() {
    let ctx = TestContext::new();

    let (status, _) = ctx
        .post_json("/login", None, json!({"email": "nope", "password": "nocturne"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = ctx.post_json("/login", None, json!({"email": "a@b.io"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_logout() {
    let ctx = TestContext::new();
    let user = ctx.create_user("clara", "clara@example.com", "nocturne").await;
    let token = ctx.token_for(&user);

    let (status, _) = ctx.post_json("/logout", None, json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = ctx.post_json("/logout", Some("not-a-jwt"), json!({})).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = ctx.post_json("/logout", Some(&token), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "clara@example.com");
    assert_eq!(ctx.audit_actions(), vec!["logout"]);

    // Stateless tokens stay usable after logout
    let (status, _) = ctx.get("/me", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_protected_routes_reject_bad_tokens() {
    let ctx = TestContext::new();
    let user = ctx.create_user("clara", "clara@example.com", "nocturne").await;

    let (status, body) = ctx.get("/me", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");
    assert_eq!(body["message"], "Missing token");

    let expired = create_token(
        &Claims::with_expiration("clara", "clara@example.com", chrono::Duration::hours(-2)),
        JWT_SECRET,
    )
    .unwrap();
    let (status, _) = ctx.get("/me", Some(&expired)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let token = ctx.token_for(&user);
    let signature_start = token.rfind('.').unwrap() + 1;
    let mut tampered = token.clone();
    let replacement = if token[signature_start..].starts_with('A') { "B" } else { "A" };
    tampered.replace_range(signature_start..signature_start + 1, replacement);
    let (status, _) = ctx.get("/me", Some(&tampered)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let foreign = create_token(
        &Claims::new("clara", "clara@example.com"),
        "another-secret-that-is-long-enough-too",
    )
    .unwrap();
    let (status, _) = ctx.get("/me", Some(&foreign)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_me_for_deleted_account_is_not_found() {
    let ctx = TestContext::new();
    let token = create_token(&Claims::new("ghost", "ghost@example.com"), JWT_SECRET).unwrap();

    let (status, body) = ctx.get("/me", Some(&token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "User not found");
}

#[tokio::test]
async fn test_update_profile() {
    let ctx = TestContext::new();
    let user = ctx.create_user("clara", "clara@example.com", "nocturne").await;
    let token = ctx.token_for(&user);

    let (status, body) = ctx
        .put_json("/me", Some(&token), json!({"username": "clara.s"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["username"], "clara.s");

    let (_, body) = ctx.get("/me", Some(&token)).await;
    assert_eq!(body["username"], "clara.s");

    let (status, _) = ctx.put_json("/me", Some(&token), json!({"username": ""})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let malformed = request(
        Method::PUT,
        "/me",
        Some(&token),
        Body::from("username=clara"),
        Some("application/json"),
    );
    let (status, _) = ctx.send(malformed).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(ctx.audit_actions(), vec!["update_profile"]);
}

#[tokio::test]
async fn test_get_user_by_id() {
    let ctx = TestContext::new();
    let user = ctx.create_user("clara", "clara@example.com", "nocturne").await;
    let token = ctx.token_for(&user);

    let (status, body) = ctx.get(&format!("/users/{}", user.id), Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "clara@example.com");

    let (status, _) = ctx.get("/users/999", Some(&token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = ctx.get("/users/clara", Some(&token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = ctx.get(&format!("/users/{}", user.id), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
