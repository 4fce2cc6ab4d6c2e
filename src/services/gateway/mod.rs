pub mod flow;
pub mod registry;
pub mod session;

use crate::config::GatewayConfig;
use crate::domain::auth::Identity;
use crate::services::gateway::flow::MessageFlow;
use crate::services::gateway::registry::SessionRegistry;
use crate::services::gateway::session::Session;
use crate::services::rate_limit_service::RateLimitService;
use axum::extract::ws::WebSocket;
use opentelemetry::{
    KeyValue, global,
    metrics::{Counter, UpDownCounter},
};

#[derive(Clone, Debug)]
pub(crate) struct Metrics {
    pub(crate) active_connections: UpDownCounter<i64>,
    pub(crate) inbound_events_total: Counter<u64>,
    pub(crate) lagged_events_total: Counter<u64>,
    pub(crate) handshake_rejections_total: Counter<u64>,
}

impl Metrics {
    #[must_use]
    pub(crate) fn new() -> Self {
        let meter = global::meter("reeltalk-server");
        Self {
            active_connections: meter
                .i64_up_down_counter("websocket_active_connections")
                .with_description("Number of active WebSocket connections")
                .build(),
            inbound_events_total: meter
                .u64_counter("websocket_inbound_events_total")
                .with_description("Total inbound gateway events by type")
                .build(),
            lagged_events_total: meter
                .u64_counter("websocket_lagged_events_total")
                .with_description("Total room events dropped for connections that fell behind")
                .build(),
            handshake_rejections_total: meter
                .u64_counter("websocket_handshake_rejections_total")
                .with_description("Gateway handshakes refused before upgrade")
                .build(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Debug)]
pub struct GatewayService {
    flow: MessageFlow,
    registry: SessionRegistry,
    rate_limit: RateLimitService,
    config: GatewayConfig,
    metrics: Metrics,
}

impl GatewayService {
    #[must_use]
    pub fn new(
        flow: MessageFlow,
        registry: SessionRegistry,
        rate_limit: RateLimitService,
        config: GatewayConfig,
    ) -> Self {
        Self { flow, registry, rate_limit, config, metrics: Metrics::new() }
    }

    /// Counts a handshake refused before upgrade and returns the recorded reason.
    pub fn record_handshake_rejection(&self, credential_present: bool) -> &'static str {
        let reason = rejection_reason(credential_present);
        self.metrics.handshake_rejections_total.add(1, &[KeyValue::new("reason", reason)]);
        reason
    }

    #[must_use]
    pub const fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Runs an upgraded connection whose credential has already been verified.
    pub async fn handle_socket(
        &self,
        socket: WebSocket,
        identity: Identity,
        request_id: String,
        shutdown_rx: tokio::sync::watch::Receiver<bool>,
    ) {
        let session = Session {
            identity,
            request_id,
            socket,
            flow: self.flow.clone(),
            registry: self.registry.clone(),
            metrics: self.metrics.clone(),
            rate_limit: self.rate_limit.clone(),
            config: self.config.clone(),
            shutdown_rx,
        };

        session.run().await;
    }
}

const fn rejection_reason(credential_present: bool) -> &'static str {
    if credential_present { "invalid" } else { "missing" }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryStore;
    use crate::config::MessagingConfig;
    use crate::services::message_service::MessageService;
    use std::sync::Arc;

    #[test]
    fn test_handshake_rejections_are_labelled_by_reason() {
        let store = MemoryStore::new();
        let registry = SessionRegistry::new(4);
        let messages = MessageService::new(Arc::new(store.clone()), Arc::new(store), MessagingConfig::default());
        let service = GatewayService::new(
            MessageFlow::new(messages, registry.clone()),
            registry,
            RateLimitService::new(Vec::new(), GatewayConfig::default()),
            GatewayConfig::default(),
        );

        assert_eq!(service.record_handshake_rejection(false), "missing");
        assert_eq!(service.record_handshake_rejection(true), "invalid");
    }
}
