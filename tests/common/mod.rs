#![allow(dead_code, clippy::unwrap_used, clippy::missing_panics_doc, clippy::must_use_candidate, unreachable_pub)]

use futures::{SinkExt, StreamExt};
use reeltalk_server::adapters::memory::MemoryStore;
use reeltalk_server::api::{self, MgmtState};
use reeltalk_server::config::{
    AuthConfig, Config, DatabaseConfig, GatewayConfig, HealthConfig, MessagingConfig, RateLimitConfig, ServerConfig,
    TelemetryConfig,
};
use reeltalk_server::domain::user::GoogleProfile;
use reeltalk_server::services::user_service::UserService;
use reeltalk_server::adapters::database::DbPool;
use reeltalk_server::{AppBuilder, Storage, init_pool, run_migrations};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Once;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use uuid::Uuid;

pub const TEST_SECRET: &str = "test_secret";

static INIT: Once = Once::new();

pub fn setup_tracing() {
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "warn".into())
            .add_directive("reeltalk_server=debug".parse().unwrap())
            .add_directive("tower=warn".parse().unwrap())
            .add_directive("hyper=warn".parse().unwrap())
            .add_directive("reqwest=warn".parse().unwrap())
            .add_directive("tungstenite=warn".parse().unwrap());

        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    });
}

/// A migrated pool for the database named by `DATABASE_URL`, or `None` when it is unset so
/// database tests can be skipped on machines without Postgres.
pub async fn get_test_pool() -> Option<DbPool> {
    setup_tracing();
    let Ok(url) = std::env::var("DATABASE_URL") else {
        tracing::warn!("DATABASE_URL not set, skipping database test");
        return None;
    };

    let config = DatabaseConfig { url, max_connections: 5, acquire_timeout_secs: 5, connect_attempts: 3 };
    let pool = init_pool(&config).await.expect("Failed to connect to DB. Is Postgres running?");
    run_migrations(&pool).await.expect("Failed to run migrations");
    Some(pool)
}

pub fn get_test_config() -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            mgmt_port: 0,
            shutdown_timeout_secs: 1,
            trusted_proxies: vec!["127.0.0.1/32".parse().unwrap(), "::1/128".parse().unwrap()],
        },
        database: DatabaseConfig {
            url: "postgres://unused".to_string(),
            max_connections: 1,
            acquire_timeout_secs: 1,
            connect_attempts: 1,
        },
        auth: AuthConfig { jwt_secret: TEST_SECRET.to_string(), token_ttl_secs: 10_800, exchange_secret: None },
        messaging: MessagingConfig::default(),
        gateway: GatewayConfig { messages_per_second: 1_000, message_burst: 1_000, ..GatewayConfig::default() },
        rate_limit: RateLimitConfig { per_second: 10_000, burst: 10_000 },
        health: HealthConfig::default(),
        telemetry: TelemetryConfig::default(),
    }
}

pub fn generate_username(prefix: &str) -> String {
    format!("{prefix}{}", &Uuid::new_v4().simple().to_string()[..8])
}

#[derive(Debug, Clone)]
pub struct TestUser {
    pub id: Uuid,
    pub username: String,
    pub token: String,
}

pub struct TestApp {
    pub server_url: String,
    pub mgmt_url: String,
    pub ws_url: String,
    pub client: reqwest::Client,
    pub config: Config,
    pub store: MemoryStore,
    pub user_service: UserService,
    pub shutdown_tx: watch::Sender<bool>,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with_config(get_test_config()).await
    }

    pub async fn spawn_with_config(config: Config) -> Self {
        setup_tracing();

        let store = MemoryStore::new();
        let app = AppBuilder::new(config.clone()).with_storage(Storage::memory(store.clone())).build().unwrap();
        let user_service = app.services.user_service.clone();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let _workers = app.workers.spawn_all(shutdown_rx.clone());

        let app_router = api::app_router(config.clone(), app.services, shutdown_rx.clone());
        let mgmt_router = api::mgmt_router(MgmtState { health_service: app.health_service });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let mgmt_listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mgmt_addr = mgmt_listener.local_addr().unwrap();

        let mut api_rx = shutdown_rx.clone();
        tokio::spawn(async move {
            axum::serve(listener, app_router.into_make_service_with_connect_info::<SocketAddr>())
                .with_graceful_shutdown(async move {
                    let _ = api_rx.wait_for(|&s| s).await;
                })
                .await
                .unwrap();
        });

        let mut mgmt_rx = shutdown_rx;
        tokio::spawn(async move {
            axum::serve(mgmt_listener, mgmt_router.into_make_service_with_connect_info::<SocketAddr>())
                .with_graceful_shutdown(async move {
                    let _ = mgmt_rx.wait_for(|&s| s).await;
                })
                .await
                .unwrap();
        });

        Self {
            server_url: format!("http://{addr}"),
            mgmt_url: format!("http://{mgmt_addr}"),
            ws_url: format!("ws://{addr}/v1/gateway"),
            client: reqwest::Client::new(),
            config,
            store,
            user_service,
            shutdown_tx,
        }
    }

    /// Signs a new account in the way the Google callback would.
    pub async fn register_user(&self, name: &str) -> TestUser {
        let profile = GoogleProfile {
            id: format!("google-{}", Uuid::new_v4()),
            display_name: Some(name.to_string()),
            email: Some(format!("{name}@example.com")),
            photo: Some(format!("https://cdn.example.com/{name}.png")),
        };
        let (user, session) = self.user_service.sign_in_google(profile).await.unwrap();
        TestUser { id: user.id, username: user.username, token: session.token }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/v1{path}", self.server_url)
    }

    pub async fn get_json(&self, path: &str, token: &str) -> (reqwest::StatusCode, Value) {
        let resp = self.client.get(self.url(path)).bearer_auth(token).send().await.unwrap();
        let status = resp.status();
        (status, resp.json().await.unwrap_or(Value::Null))
    }

    pub async fn post_json(&self, path: &str, token: &str, body: &Value) -> (reqwest::StatusCode, Value) {
        let resp = self.client.post(self.url(path)).bearer_auth(token).json(body).send().await.unwrap();
        let status = resp.status();
        (status, resp.json().await.unwrap_or(Value::Null))
    }

    /// Connects to the gateway passing the token as a query parameter.
    pub async fn connect_ws(&self, token: &str) -> TestWsClient {
        let (stream, _) = tokio_tungstenite::connect_async(format!("{}?token={token}", self.ws_url)).await.unwrap();
        TestWsClient { stream }
    }

    /// Connects to the gateway passing `credential` verbatim in the `Authorization` header.
    pub async fn connect_ws_with_header(&self, credential: &str) -> TestWsClient {
        let mut request = self.ws_url.as_str().into_client_request().unwrap();
        request.headers_mut().insert("Authorization", credential.parse().unwrap());
        let (stream, _) = tokio_tungstenite::connect_async(request).await.unwrap();
        TestWsClient { stream }
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
    }
}

pub struct TestWsClient {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl TestWsClient {
    pub async fn send_json(&mut self, frame: &Value) {
        self.stream.send(Message::Text(frame.to_string().into())).await.unwrap();
    }

    pub async fn send_private_message(&mut self, to: Uuid, content: &str, ack: Option<u64>) {
        let mut frame = serde_json::json!({
            "event": "private_message",
            "data": { "to": to.to_string(), "content": content },
        });
        if let Some(id) = ack {
            frame["ack"] = id.into();
        }
        self.send_json(&frame).await;
    }

    pub async fn receive_raw_timeout(
        &mut self,
        timeout: Duration,
    ) -> Option<Result<Message, tokio_tungstenite::tungstenite::Error>> {
        tokio::time::timeout(timeout, self.stream.next()).await.ok().flatten()
    }

    /// Next JSON frame, skipping control frames. `None` on timeout or close.
    pub async fn receive_json_timeout(&mut self, timeout: Duration) -> Option<Value> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            match tokio::time::timeout(remaining, self.stream.next()).await {
                Ok(Some(Ok(Message::Text(text)))) => return serde_json::from_str(text.as_str()).ok(),
                Ok(Some(Ok(Message::Ping(_) | Message::Pong(_)))) => {}
                _ => return None,
            }
        }
    }

    pub async fn receive_json(&mut self) -> Value {
        self.receive_json_timeout(Duration::from_secs(5)).await.expect("Timed out waiting for a gateway frame")
    }

    /// Waits for the next frame with the given event name, discarding others.
    pub async fn receive_event(&mut self, event: &str) -> Value {
        loop {
            let frame = self.receive_json().await;
            if frame["event"] == event {
                return frame;
            }
        }
    }

    /// True if the server closes the connection within `timeout`.
    pub async fn wait_for_close(&mut self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            match tokio::time::timeout(remaining, self.stream.next()).await {
                Ok(Some(Ok(Message::Close(_)) | Err(_)) | None) => return true,
                Ok(Some(Ok(_))) => {}
                Err(_) => return false,
            }
        }
    }

    pub async fn close(mut self) {
        let _ = self.stream.close(None).await;
    }
}
