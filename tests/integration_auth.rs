#![allow(clippy::unwrap_used, clippy::missing_panics_doc, missing_debug_implementations, unreachable_pub)]
mod common;

use common::TestApp;
use jsonwebtoken::{EncodingKey, Header, encode};
use reeltalk_server::domain::auth::Claims;
use reeltalk_server::domain::user::GoogleProfile;
use uuid::Uuid;

fn now() -> u64 {
    u64::try_from(time::OffsetDateTime::now_utc().unix_timestamp()).unwrap()
}

fn token(secret: &str, id: Uuid, exp: u64) -> String {
    let claims = Claims {
        id,
        email: "someone@example.com".into(),
        name: "Someone".into(),
        username: "someone".into(),
        avatar: None,
        iat: now() - 60,
        exp,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
}

#[tokio::test]
async fn test_expired_and_foreign_tokens_are_rejected() {
    let app = TestApp::spawn().await;
    let alice = app.register_user("alice").await;

    let expired = token(common::TEST_SECRET, alice.id, now() - 1);
    let (status, _) = app.get_json("/users", &expired).await;
    assert_eq!(status, 401);

    let foreign = token("another_secret", alice.id, now() + 600);
    let (status, _) = app.get_json("/users", &foreign).await;
    assert_eq!(status, 401);

    let valid = token(common::TEST_SECRET, alice.id, now() + 600);
    let (status, _) = app.get_json("/users", &valid).await;
    assert_eq!(status, 200);
}

#[tokio::test]
async fn test_sign_in_token_lasts_three_hours() {
    let app = TestApp::spawn().await;
    let profile = GoogleProfile {
        id: "google-123".into(),
        display_name: Some("Layla Hassan".into()),
        email: Some("layla@example.com".into()),
        photo: None,
    };

    let (user, session) = app.user_service.sign_in_google(profile.clone()).await.unwrap();
    assert_eq!(user.username, "laylahassan");
    let remaining = session.expires_at - now();
    assert!((10_790..=10_800).contains(&remaining), "{remaining}");

    let (status, body) = app.get_json(&format!("/users/{}", user.id), &session.token).await;
    assert_eq!(status, 200);
    assert_eq!(body["name"], "Layla Hassan");

    let (again, _) = app.user_service.sign_in_google(profile).await.unwrap();
    assert_eq!(again.id, user.id);
}

#[tokio::test]
async fn test_google_sign_in_route_issues_a_usable_token() {
    let app = TestApp::spawn().await;
    let bob = app.register_user("bob").await;

    let body = serde_json::json!({
        "id": "google-route-1",
        "displayName": "Noor Aziz",
        "email": "noor@example.com",
        "photo": "https://cdn.example.com/noor.png",
    });
    let resp = app.client.post(app.url("/auth/google")).json(&body).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let session: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(session["user"]["username"], "nooraziz");
    assert_eq!(session["user"]["email"], "noor@example.com");
    let token = session["token"].as_str().unwrap().to_string();
    let remaining = session["expiresAt"].as_u64().unwrap() - now();
    assert!((10_790..=10_800).contains(&remaining), "{remaining}");

    let (status, sent) =
        app.post_json("/messages", &token, &serde_json::json!({ "to": bob.id.to_string(), "content": "hi" })).await;
    assert_eq!(status, 201);
    assert_eq!(sent["from"]["username"], "nooraziz");

    let mut ws = app.connect_ws(&token).await;
    ws.send_private_message(bob.id, "over the gateway", None).await;
    assert_eq!(ws.receive_json().await["event"], "message_sent");

    // Signing in again keeps the account.
    let resp = app.client.post(app.url("/auth/google")).json(&body).send().await.unwrap();
    let again: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(again["user"]["id"], session["user"]["id"]);
}

#[tokio::test]
async fn test_google_sign_in_route_rejects_bad_bodies() {
    let app = TestApp::spawn().await;

    let resp = app.client.post(app.url("/auth/google")).json(&serde_json::json!({ "displayName": "x" })).send().await;
    assert_eq!(resp.unwrap().status(), 400);

    let resp = app.client.post(app.url("/auth/google")).body("not json").send().await.unwrap();
    assert_eq!(resp.status(), 400);

    let resp = app.client.get(app.url("/auth/google")).send().await.unwrap();
    assert_eq!(resp.status(), 405);
}

#[tokio::test]
async fn test_google_sign_in_route_requires_exchange_secret_when_configured() {
    let mut config = common::get_test_config();
    config.auth.exchange_secret = Some("callback-secret".into());
    let app = TestApp::spawn_with_config(config).await;
    let body = serde_json::json!({ "id": "google-guarded", "displayName": "Guarded" });

    let resp = app.client.post(app.url("/auth/google")).json(&body).send().await.unwrap();
    assert_eq!(resp.status(), 401);

    let resp = app
        .client
        .post(app.url("/auth/google"))
        .header("x-auth-exchange-secret", "wrong")
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = app
        .client
        .post(app.url("/auth/google"))
        .header("x-auth-exchange-secret", "callback-secret")
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}
