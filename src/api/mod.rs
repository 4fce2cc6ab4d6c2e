use crate::api::rate_limit::log_rate_limit_events;
use crate::config::Config;
use crate::services::auth_service::AuthService;
use crate::services::category_service::CategoryService;
use crate::services::gateway::GatewayService;
use crate::services::health_service::HealthService;
use crate::services::message_service::MessageService;
use crate::services::rate_limit_service::RateLimitService;
use crate::services::user_service::UserService;
use crate::services::video_service::VideoService;
use axum::body::Body;
use axum::http::{HeaderName, Request};
use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use std::sync::Arc;
use tower_governor::GovernorLayer;
use tower_governor::governor::GovernorConfigBuilder;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

pub mod auth;
pub mod categories;
pub mod gateway;
pub mod health;
pub mod messages;
pub mod middleware;
pub mod rate_limit;
pub mod schemas;
pub mod users;
pub mod videos;

#[derive(Clone, Debug)]
pub struct AppState {
    pub config: Config,
    pub auth_service: AuthService,
    pub message_service: MessageService,
    pub user_service: UserService,
    pub video_service: VideoService,
    pub category_service: CategoryService,
    pub gateway_service: GatewayService,
    pub rate_limit_service: RateLimitService,
    pub shutdown_rx: tokio::sync::watch::Receiver<bool>,
}

#[derive(Clone, Debug)]
pub struct MgmtState {
    pub health_service: HealthService,
}

#[derive(Clone, Debug)]
pub struct ServiceContainer {
    pub auth_service: AuthService,
    pub message_service: MessageService,
    pub user_service: UserService,
    pub video_service: VideoService,
    pub category_service: CategoryService,
    pub gateway_service: GatewayService,
    pub rate_limit_service: RateLimitService,
}

/// Configures and returns the primary application router.
///
/// # Panics
/// Panics if the rate limiter configuration cannot be constructed.
pub fn app_router(
    config: Config,
    services: ServiceContainer,
    shutdown_rx: tokio::sync::watch::Receiver<bool>,
) -> Router {
    let interval_ns = 1_000_000_000 / config.rate_limit.per_second.max(1);
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_nanosecond(u64::from(interval_ns))
            .burst_size(config.rate_limit.burst.max(1))
            .key_extractor(services.rate_limit_service.extractor.clone())
            .finish()
            .expect("Failed to build rate limiter config"),
    );

    let state = AppState {
        config,
        auth_service: services.auth_service,
        message_service: services.message_service,
        user_service: services.user_service,
        video_service: services.video_service,
        category_service: services.category_service,
        gateway_service: services.gateway_service,
        rate_limit_service: services.rate_limit_service,
        shutdown_rx,
    };

    let api_routes = Router::new()
        .route("/auth/google", post(auth::sign_in_google))
        .route("/messages", get(messages::list_conversation).post(messages::create_message))
        .route(
            "/messages/{id}",
            get(messages::get_message).patch(messages::update_message).delete(messages::delete_message),
        )
        .route("/users", get(users::list_users))
        .route("/users/search", get(users::search_users))
        .route("/users/{id}", get(users::get_user).delete(users::delete_user))
        .route("/videos", get(videos::list_videos).post(videos::create_video))
        .route("/videos/search", get(videos::list_videos))
        .route(
            "/videos/{id}",
            get(videos::get_video).patch(videos::update_video).delete(videos::delete_video),
        )
        .route("/categories", get(categories::list_categories).post(categories::create_category))
        .route("/categories/{id}", get(categories::get_category))
        .route("/gateway", get(gateway::websocket_handler))
        .layer(GovernorLayer::new(governor_conf));

    let request_id_header = HeaderName::from_static(middleware::REQUEST_ID_HEADER);

    Router::new()
        .nest("/v1", api_routes)
        .layer(from_fn_with_state(state.clone(), log_rate_limit_events))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(move |request: &Request<Body>| {
                    let request_id = middleware::request_id(request.extensions());

                    tracing::info_span!(
                        "request",
                        "request_id" = %request_id,
                        "http.request.method" = %request.method(),
                        "url.path" = %request.uri().path(),
                        "http.response.status_code" = tracing::field::Empty,
                        "otel.kind" = "server",
                        "user_id" = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>, latency: std::time::Duration, _span: &tracing::Span| {
                        let status = response.status();
                        tracing::Span::current().record("http.response.status_code", status.as_u16());

                        tracing::info!(
                            latency_ms = %latency.as_millis(),
                            status = %status.as_u16(),
                            "request completed"
                        );
                    },
                )
                .on_failure(|error, _latency, _span: &tracing::Span| {
                    tracing::error!(error = %error, "request failed");
                }),
        )
        .layer(SetRequestIdLayer::new(request_id_header, middleware::MakeRequestUuidOrHeader))
        .with_state(state)
}

pub fn mgmt_router(state: MgmtState) -> Router {
    Router::new().route("/livez", get(health::livez)).route("/readyz", get(health::readyz)).with_state(state)
}
