use crate::config::GatewayConfig;
use crate::domain::auth::Identity;
use crate::domain::message::{PrivateMessage, SendAck};
use crate::protocol::{AckDto, ClientFrame, EVENT_PRIVATE_MESSAGE, PrivateMessagePayload, ServerFrame};
use crate::services::gateway::Metrics;
use crate::services::gateway::flow::MessageFlow;
use crate::services::gateway::registry::{RoomEvent, SessionRegistry};
use crate::services::rate_limit_service::{EventLimiter, RateLimitService};
use axum::extract::ws::{CloseFrame, Message as WsMessage, WebSocket, close_code};
use futures::{SinkExt, StreamExt};
use opentelemetry::KeyValue;
use tokio::sync::{broadcast, mpsc, watch};
use uuid::Uuid;

const RATE_LIMITED: &str = "Rate limit exceeded";

/// Lifecycle of one gateway connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Authenticated,
    Joined,
    Closed,
}

impl ConnectionState {
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Connecting, Self::Authenticated | Self::Closed)
                | (Self::Authenticated, Self::Joined | Self::Closed)
                | (Self::Joined, Self::Closed)
        )
    }

    /// Moves to `next`, logging and staying put on an illegal transition.
    pub fn advance(&mut self, next: Self) -> bool {
        if self.can_transition_to(next) {
            tracing::debug!(from = ?*self, to = ?next, "Connection state changed");
            *self = next;
            true
        } else {
            tracing::warn!(from = ?*self, to = ?next, "Rejected connection state transition");
            false
        }
    }
}

pub struct Session {
    pub identity: Identity,
    pub request_id: String,
    pub socket: WebSocket,
    pub flow: MessageFlow,
    pub registry: SessionRegistry,
    pub metrics: Metrics,
    pub rate_limit: RateLimitService,
    pub config: GatewayConfig,
    pub shutdown_rx: watch::Receiver<bool>,
}

/// Handles the inbound events of one connection.
struct Inbound {
    identity: Identity,
    flow: MessageFlow,
    outbound_tx: mpsc::Sender<ServerFrame>,
    metrics: Metrics,
    rate_limit: RateLimitService,
    limiter: EventLimiter,
}

impl Session {
    #[tracing::instrument(
        name = "websocket_session",
        skip(self),
        fields(
            user_id = %self.identity.id,
            request_id = %self.request_id,
            otel.kind = "server",
            ws.session_id = %Uuid::new_v4()
        )
    )]
    pub(crate) async fn run(self) {
        let Self { identity, socket, flow, registry, metrics, rate_limit, config, mut shutdown_rx, .. } = self;

        // The handshake has already verified the credential.
        let mut state = ConnectionState::Authenticated;
        let mut membership = registry.join(identity.id);
        state.advance(ConnectionState::Joined);

        metrics.active_connections.add(1, &[]);
        tracing::info!("WebSocket connected");

        let (mut ws_sink, mut ws_stream) = socket.split();
        let (outbound_tx, mut outbound_rx) = mpsc::channel::<ServerFrame>(config.outbound_buffer_size.max(1));
        let inbound = Inbound {
            identity,
            flow,
            outbound_tx,
            metrics: metrics.clone(),
            limiter: rate_limit.connection_limiter(),
            rate_limit,
        };

        loop {
            if *shutdown_rx.borrow() {
                tracing::info!("Shutdown signal received, closing WebSocket");
                let _ = ws_sink
                    .send(WsMessage::Close(Some(CloseFrame {
                        code: close_code::AWAY,
                        reason: "Server shutting down".into(),
                    })))
                    .await;
                break;
            }

            tokio::select! {
                biased;

                _ = shutdown_rx.changed() => {}

                msg = ws_stream.next() => {
                    let continue_loop = match msg {
                        Some(Ok(WsMessage::Text(text))) => {
                            if let Some(reply) = inbound.dispatch(text.as_str()) {
                                send_frame(&mut ws_sink, &reply).await
                            } else {
                                true
                            }
                        }
                        Some(Ok(WsMessage::Binary(_))) => {
                            tracing::warn!("Received unexpected binary frame");
                            send_frame(&mut ws_sink, &ServerFrame::error("Binary frames are not supported")).await
                        }
                        Some(Ok(WsMessage::Close(_)) | Err(_)) | None => false,
                        Some(Ok(WsMessage::Ping(_))) => {
                            tracing::debug!("Received heartbeat ping from client");
                            true
                        }
                        Some(Ok(WsMessage::Pong(_))) => {
                            tracing::debug!("Received heartbeat pong from client");
                            true
                        }
                    };

                    if !continue_loop { break; }
                }

                frame = outbound_rx.recv() => {
                    match frame {
                        Some(frame) => {
                            if !send_frame(&mut ws_sink, &frame).await { break; }
                        }
                        None => break,
                    }
                }

                event = membership.recv() => {
                    let continue_loop = match event {
                        Ok(RoomEvent::Message(view)) => {
                            send_frame(&mut ws_sink, &ServerFrame::Message((*view).into())).await
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "Connection fell behind its room, events dropped");
                            metrics.lagged_events_total.add(skipped, &[]);
                            true
                        }
                        Ok(RoomEvent::Disconnect) | Err(broadcast::error::RecvError::Closed) => false,
                    };

                    if !continue_loop { break; }
                }
            }
        }

        let _ = ws_sink.close().await;
        drop(membership);
        state.advance(ConnectionState::Closed);

        metrics.active_connections.add(-1, &[]);
        tracing::info!("WebSocket disconnected");
    }
}

impl Inbound {
    /// Routes one inbound text frame. Returns a frame to send immediately, if any.
    /// Private messages are handled on their own task and confirm through `outbound_tx`.
    fn dispatch(&self, text: &str) -> Option<ServerFrame> {
        let frame: ClientFrame = match serde_json::from_str(text) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::debug!(error = %e, "Failed to decode gateway frame");
                return Some(ServerFrame::error("Malformed frame"));
            }
        };

        if frame.event != EVENT_PRIVATE_MESSAGE {
            tracing::debug!(event = %frame.event, "Received unknown gateway event");
            return Some(ServerFrame::error(format!("Unknown event: {}", frame.event)));
        }

        self.metrics.inbound_events_total.add(1, &[KeyValue::new("event", EVENT_PRIVATE_MESSAGE)]);
        if !self.rate_limit.admit_event(&self.limiter) {
            return Some(throttled(frame.ack));
        }

        // Malformed fields fall through as missing and are rejected with the validation error.
        let payload = serde_json::from_value::<PrivateMessagePayload>(frame.data).unwrap_or_else(|e| {
            tracing::debug!(error = %e, "Failed to decode private_message payload");
            PrivateMessagePayload::default()
        });
        let event = PrivateMessage::from(payload);

        let identity = self.identity.clone();
        let flow = self.flow.clone();
        let outbound_tx = self.outbound_tx.clone();
        let ack_id = frame.ack;
        tokio::spawn(async move {
            let ack = flow.handle_private_message(&identity, event).await;
            for reply in confirmations(ack, ack_id) {
                if outbound_tx.send(reply).await.is_err() {
                    tracing::debug!("Connection closed before confirmation, discarding");
                    break;
                }
            }
        });

        None
    }
}

/// The reply to an event refused by the connection's rate limit. Nothing is persisted.
fn throttled(ack_id: Option<u64>) -> ServerFrame {
    match ack_id {
        Some(id) => ServerFrame::Ack(AckDto::new(id, SendAck::Failed(RATE_LIMITED.to_string()))),
        None => ServerFrame::error(RATE_LIMITED),
    }
}

/// Frames reporting a send outcome to the originating connection, in delivery order.
fn confirmations(ack: SendAck, ack_id: Option<u64>) -> Vec<ServerFrame> {
    let mut frames = Vec::with_capacity(2);
    match (&ack, ack_id) {
        (SendAck::Sent(view), _) => frames.push(ServerFrame::MessageSent(view.clone().into())),
        (SendAck::Failed(error), None) => frames.push(ServerFrame::error(error.clone())),
        (SendAck::Failed(_), Some(_)) => {}
    }
    if let Some(id) = ack_id {
        frames.push(ServerFrame::Ack(AckDto::new(id, ack)));
    }
    frames
}

async fn send_frame<S>(sink: &mut S, frame: &ServerFrame) -> bool
where
    S: futures::Sink<WsMessage> + Unpin,
{
    match serde_json::to_string(frame) {
        Ok(json) => sink.send(WsMessage::Text(json.into())).await.is_ok(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode gateway frame");
            true
        }
    }
}
