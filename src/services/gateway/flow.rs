use crate::domain::auth::Identity;
use crate::domain::message::{PrivateMessage, SendAck};
use crate::services::gateway::registry::{RoomEvent, SessionRegistry};
use crate::services::message_service::MessageService;

/// Persists a realtime message and fans it out to the recipient's room.
///
/// The caller learns the outcome through the returned [`SendAck`], which is produced only
/// after the message is stored and the fan-out has been issued.
#[derive(Clone, Debug)]
pub struct MessageFlow {
    message_service: MessageService,
    registry: SessionRegistry,
}

impl MessageFlow {
    #[must_use]
    pub const fn new(message_service: MessageService, registry: SessionRegistry) -> Self {
        Self { message_service, registry }
    }

    #[tracing::instrument(skip(self, sender, event), fields(user_id = %sender.id))]
    pub async fn handle_private_message(&self, sender: &Identity, event: PrivateMessage) -> SendAck {
        match self.message_service.create_message(sender, event.to.as_deref(), event.content.as_deref()).await {
            Ok(saved) => {
                let delivered = self.registry.send_to_user(saved.to.id, RoomEvent::Message(Box::new(saved.clone())));
                tracing::debug!(message_id = %saved.id, delivered, "Private message fanned out");
                SendAck::Sent(saved)
            }
            Err(e) => SendAck::Failed(e.public_message()),
        }
    }
}
