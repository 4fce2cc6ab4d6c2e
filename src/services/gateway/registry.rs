use crate::domain::message::MessageView;
use dashmap::DashMap;
use opentelemetry::{
    KeyValue, global,
    metrics::{Counter, UpDownCounter},
};
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

/// An event delivered to every live connection of one user.
#[derive(Debug, Clone)]
pub enum RoomEvent {
    Message(Box<MessageView>),
    Disconnect,
}

#[derive(Clone, Debug)]
struct Metrics {
    fanout_total: Counter<u64>,
    active_rooms: UpDownCounter<i64>,
    gc_reclaimed_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("reeltalk-server");
        Self {
            fanout_total: meter
                .u64_counter("reeltalk_room_fanout_total")
                .with_description("Room sends by whether any connection was reached")
                .build(),
            active_rooms: meter
                .i64_up_down_counter("reeltalk_active_rooms")
                .with_description("Number of user rooms held in memory")
                .build(),
            gc_reclaimed_total: meter
                .u64_counter("reeltalk_rooms_reclaimed_total")
                .with_description("Total empty rooms reclaimed by GC")
                .build(),
        }
    }
}

/// Name of the room holding every connection of `user_id`.
#[must_use]
pub fn room_name(user_id: Uuid) -> String {
    format!("user_{user_id}")
}

/// A connection's place in its user's room. Dropping it leaves the room.
#[derive(Debug)]
pub struct Membership {
    user_id: Uuid,
    rx: broadcast::Receiver<RoomEvent>,
}

impl Membership {
    #[must_use]
    pub const fn user_id(&self) -> Uuid {
        self.user_id
    }

    /// Waits for the next room event.
    ///
    /// # Errors
    /// Returns `RecvError::Lagged` if this connection fell behind the room capacity.
    pub async fn recv(&mut self) -> Result<RoomEvent, broadcast::error::RecvError> {
        self.rx.recv().await
    }
}

/// Tracks live gateway connections, one room per user.
#[derive(Clone, Debug)]
pub struct SessionRegistry {
    rooms: Arc<DashMap<Uuid, broadcast::Sender<RoomEvent>>>,
    room_capacity: usize,
    metrics: Metrics,
}

impl SessionRegistry {
    #[must_use]
    pub fn new(room_capacity: usize) -> Self {
        Self { rooms: Arc::new(DashMap::new()), room_capacity: room_capacity.max(1), metrics: Metrics::new() }
    }

    /// Adds a connection to the user's room, creating the room if needed.
    #[tracing::instrument(level = "debug", skip(self), fields(room = %room_name(user_id)))]
    pub fn join(&self, user_id: Uuid) -> Membership {
        // Subscribe while the entry guard is held so GC cannot reclaim the room in between.
        let room = self.rooms.entry(user_id).or_insert_with(|| {
            self.metrics.active_rooms.add(1, &[]);
            broadcast::channel(self.room_capacity).0
        });
        let rx = room.subscribe();
        Membership { user_id, rx }
    }

    /// Delivers `event` to every connection in the user's room and returns how many
    /// connections it reached. An empty or missing room is not an error.
    pub fn send_to_user(&self, user_id: Uuid, event: RoomEvent) -> usize {
        let delivered = self.rooms.get(&user_id).map_or(0, |room| room.send(event).unwrap_or(0));
        let outcome = if delivered > 0 { "delivered" } else { "offline" };
        self.metrics.fanout_total.add(1, &[KeyValue::new("outcome", outcome)]);
        tracing::debug!(room = %room_name(user_id), delivered, "Room fan-out");
        delivered
    }

    /// Asks every live connection of the user to close.
    pub fn disconnect_user(&self, user_id: Uuid) -> usize {
        self.send_to_user(user_id, RoomEvent::Disconnect)
    }

    #[must_use]
    pub fn connection_count(&self, user_id: Uuid) -> usize {
        self.rooms.get(&user_id).map_or(0, |room| room.receiver_count())
    }

    /// Reclaims rooms whose connections have all gone away.
    pub fn perform_gc(&self) -> u64 {
        let mut reclaimed = 0;
        self.rooms.retain(|_, room| {
            let active = room.receiver_count() > 0;
            if !active {
                self.metrics.active_rooms.add(-1, &[]);
                reclaimed += 1;
            }
            active
        });

        if reclaimed > 0 {
            self.metrics.gc_reclaimed_total.add(reclaimed, &[]);
            tracing::info!(reclaimed, "Room GC reclaimed empty rooms");
        }
        reclaimed
    }

    #[cfg(test)]
    fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::conversation::ConversationKey;
    use crate::domain::user::UserSummary;
    use time::OffsetDateTime;

    fn view(to: Uuid) -> MessageView {
        let from = Uuid::new_v4();
        let summary = |id| UserSummary { id, name: "n".into(), username: "u".into(), avatar: None };
        MessageView {
            id: Uuid::new_v4(),
            conversation_key: ConversationKey::between(from, to),
            from: summary(from),
            to: summary(to),
            content: "hello".into(),
            read: false,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn test_room_name() {
        let id = Uuid::new_v4();
        assert_eq!(room_name(id), format!("user_{id}"));
    }

    #[tokio::test]
    async fn test_fanout_reaches_every_connection_of_the_user() {
        let registry = SessionRegistry::new(8);
        let bob = Uuid::new_v4();
        let mut phone = registry.join(bob);
        let mut laptop = registry.join(bob);
        let mut other = registry.join(Uuid::new_v4());

        assert_eq!(registry.connection_count(bob), 2);
        assert_eq!(registry.send_to_user(bob, RoomEvent::Message(Box::new(view(bob)))), 2);

        assert!(matches!(phone.recv().await, Ok(RoomEvent::Message(m)) if m.to.id == bob));
        assert!(matches!(laptop.recv().await, Ok(RoomEvent::Message(m)) if m.to.id == bob));
        assert!(other.rx.try_recv().is_err());
    }

    #[test]
    fn test_send_to_offline_user_is_not_an_error() {
        let registry = SessionRegistry::new(8);
        let ghost = Uuid::new_v4();
        assert_eq!(registry.send_to_user(ghost, RoomEvent::Message(Box::new(view(ghost)))), 0);

        let membership = registry.join(ghost);
        drop(membership);
        assert_eq!(registry.send_to_user(ghost, RoomEvent::Disconnect), 0);
    }

    #[test]
    fn test_gc_reclaims_only_empty_rooms() {
        let registry = SessionRegistry::new(8);
        let active = Uuid::new_v4();
        let stale = Uuid::new_v4();

        let _keep = registry.join(active);
        drop(registry.join(stale));
        assert_eq!(registry.room_count(), 2);

        assert_eq!(registry.perform_gc(), 1);
        assert_eq!(registry.room_count(), 1);
        assert_eq!(registry.connection_count(active), 1);
        assert_eq!(registry.connection_count(stale), 0);
    }

    #[tokio::test]
    async fn test_concurrent_joins_share_one_room() {
        let registry = SessionRegistry::new(8);
        let user = Uuid::new_v4();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let registry = registry.clone();
                tokio::spawn(async move { registry.join(user) })
            })
            .collect();
        let mut memberships = Vec::new();
        for handle in handles {
            memberships.push(handle.await.unwrap());
        }

        assert_eq!(registry.room_count(), 1);
        assert_eq!(registry.disconnect_user(user), 16);
        for membership in &mut memberships {
            assert!(matches!(membership.recv().await, Ok(RoomEvent::Disconnect)));
        }
    }
}
