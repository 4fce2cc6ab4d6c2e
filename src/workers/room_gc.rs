use crate::config::GatewayConfig;
use crate::services::gateway::registry::SessionRegistry;
use std::time::Duration;
use tracing::Instrument;

/// Periodically reclaims gateway rooms whose connections have all closed.
#[derive(Debug)]
pub struct RoomGcWorker {
    registry: SessionRegistry,
    config: GatewayConfig,
}

impl RoomGcWorker {
    #[must_use]
    pub const fn new(registry: SessionRegistry, config: GatewayConfig) -> Self {
        Self { registry, config }
    }

    pub async fn run(self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.config.room_gc_interval_secs.max(1)));

        while !*shutdown.borrow() {
            tokio::select! {
                _ = interval.tick() => {
                    async {
                        self.registry.perform_gc();
                    }
                    .instrument(tracing::debug_span!("room_gc_iteration"))
                    .await;
                }
                _ = shutdown.changed() => {}
            }
        }
        tracing::info!("Room GC loop shutting down...");
    }
}
