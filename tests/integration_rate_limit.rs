#![allow(clippy::unwrap_used, clippy::missing_panics_doc, missing_debug_implementations, unreachable_pub)]
mod common;

use common::TestApp;
use reeltalk_server::config::RateLimitConfig;

#[tokio::test]
async fn test_burst_is_throttled() {
    let mut config = common::get_test_config();
    config.rate_limit = RateLimitConfig { per_second: 1, burst: 2 };
    let app = TestApp::spawn_with_config(config).await;
    let alice = app.register_user("alice").await;

    let mut statuses = Vec::new();
    for _ in 0..4 {
        let (status, _) = app.get_json("/users", &alice.token).await;
        statuses.push(status.as_u16());
    }

    assert_eq!(&statuses[..2], &[200, 200]);
    assert!(statuses[2..].contains(&429), "{statuses:?}");
}

#[tokio::test]
async fn test_forwarded_clients_are_limited_separately() {
    let mut config = common::get_test_config();
    config.rate_limit = RateLimitConfig { per_second: 1, burst: 1 };
    let app = TestApp::spawn_with_config(config).await;
    let alice = app.register_user("alice").await;

    for client_ip in ["203.0.113.1", "203.0.113.2", "203.0.113.3"] {
        let resp = app
            .client
            .get(app.url("/users"))
            .bearer_auth(&alice.token)
            .header("X-Forwarded-For", client_ip)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200, "{client_ip}");
    }
}
