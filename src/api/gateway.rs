use crate::api::AppState;
use crate::api::middleware::request_id;
use crate::error::AppError;
use crate::services::gateway::session::ConnectionState;
use axum::{
    extract::{Query, State, ws::WebSocketUpgrade},
    http::{Extensions, HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct GatewayParams {
    token: Option<String>,
}

/// Upgrades to a gateway connection once the caller's credential checks out.
///
/// The credential is read from the `Authorization` header, falling back to `?token=`. Either
/// may carry the `Bearer ` prefix. Connections that fail verification never reach the upgrade.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<GatewayParams>,
    headers: HeaderMap,
    extensions: Extensions,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let request_id = request_id(&extensions);
    let mut connection = ConnectionState::Connecting;

    let credential = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.trim().is_empty())
        .map(str::to_string)
        .or(params.token);

    let verified = credential
        .as_deref()
        .ok_or(AppError::Unauthorized)
        .and_then(|c| state.auth_service.verify_handshake(c));

    match verified {
        Ok(identity) => {
            connection.advance(ConnectionState::Authenticated);
            let gateway = state.gateway_service.clone();
            let shutdown_rx = state.shutdown_rx.clone();
            ws.on_upgrade(move |socket| async move {
                gateway.handle_socket(socket, identity, request_id, shutdown_rx).await;
            })
        }
        Err(e) => {
            connection.advance(ConnectionState::Closed);
            let reason = state.gateway_service.record_handshake_rejection(credential.is_some());
            tracing::warn!(error = %e, reason, "WebSocket handshake refused");
            StatusCode::UNAUTHORIZED.into_response()
        }
    }
}
