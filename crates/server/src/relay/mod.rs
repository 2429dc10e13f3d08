//! Room-scoped event relay.
//!
//! Each connection may join any number of arena rooms. Arena-addressed events
//! go to exactly the members of one room; the global stop goes to everyone.
//! The relay keeps no history, so a connection that misses a broadcast has to
//! resynchronize by announcing itself again.
//!
//! The registry sits behind one async mutex and every broadcast happens while
//! it is held, so members of a room see events in the order they arrived.

pub mod message;
pub mod registry;

pub use message::{CageId, ClientEvent, MessageError, SCHEDULE_ROOM, ServerEvent};
pub use registry::{ConnectionId, ConnectionRegistry, ConnectionSnapshot};

use std::sync::Arc;

use bracketeer_core::{CacheDb, Clock, SystemClock};
use serde_json::Value;
use tokio::sync::{Mutex, mpsc};
use uuid::Uuid;

/// One live connection as seen by its transport task.
#[derive(Debug)]
pub struct RelayConnection {
    pub id: ConnectionId,
    /// Events addressed to this connection, in delivery order.
    pub events: mpsc::UnboundedReceiver<ServerEvent>,
}

/// Shared relay handle; clones share one registry.
#[derive(Clone)]
pub struct EventRelay {
    registry: Arc<Mutex<ConnectionRegistry>>,
    /// Where presence announcements are recorded; None disables recording.
    db: Option<CacheDb>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for EventRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRelay")
            .field("records_clients", &self.db.is_some())
            .finish_non_exhaustive()
    }
}

impl Default for EventRelay {
    fn default() -> Self {
        Self::new()
    }
}

impl EventRelay {
    /// A relay that does not record presence.
    pub fn new() -> Self {
        Self { registry: Arc::new(Mutex::new(ConnectionRegistry::new())), db: None, clock: Arc::new(SystemClock) }
    }

    /// Record presence announcements as client rows in `db`.
    pub fn with_client_store(mut self, db: CacheDb) -> Self {
        self.db = Some(db);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Register a new connection.
    pub async fn connect(&self) -> RelayConnection {
        let (tx, events) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        self.registry.lock().await.register(id, tx);
        tracing::info!(connection_id = %id, "relay connection opened");
        RelayConnection { id, events }
    }

    /// Forget a connection; its room memberships go with it.
    pub async fn disconnect(&self, id: ConnectionId) {
        let rooms = self.registry.lock().await.remove(id);
        tracing::info!(connection_id = %id, ?rooms, "relay connection closed");
    }

    /// Handle one inbound text frame. Invalid frames are logged and dropped.
    pub async fn handle_text(&self, id: ConnectionId, text: &str, information: &Value) {
        match ClientEvent::parse(text) {
            Ok(event) => self.dispatch(id, event, information).await,
            Err(e) => tracing::warn!(connection_id = %id, error = %e, "dropping relay message"),
        }
    }

    /// Apply one validated event.
    ///
    /// `information` is stored with the client row on the first presence
    /// announcement.
    pub async fn dispatch(&self, id: ConnectionId, event: ClientEvent, information: &Value) {
        tracing::debug!(connection_id = %id, event = event.name(), "relay event");
        match event {
            ClientEvent::Exists => self.announce(id, information).await,
            ClientEvent::NotifySchedule { location } => {
                let joined = self.registry.lock().await.join(id, SCHEDULE_ROOM);
                tracing::debug!(connection_id = %id, %location, joined, "schedule screen registered");
            }
            ClientEvent::JoinCage { cage } => {
                let room = cage.room();
                let mut registry = self.registry.lock().await;
                if !registry.contains(id) {
                    return;
                }
                let new_member = registry.join(id, &room);
                let delivered = registry.broadcast(&room, &ServerEvent::joined_room(&room));
                tracing::info!(connection_id = %id, %room, new_member, delivered, "joined room");
            }
            ClientEvent::Timer { cage, message } => {
                self.to_cage(&cage, ServerEvent::timer(message)).await;
            }
            ClientEvent::TimerBackground { cage, payload } => {
                self.to_cage(&cage, ServerEvent::timer_background(payload)).await;
            }
            ClientEvent::PlayerReady { cage, payload } => {
                self.to_cage(&cage, ServerEvent::player_ready(payload)).await;
            }
            ClientEvent::PlayerTapout { cage, payload } => {
                self.to_cage(&cage, ServerEvent::player_tapout(payload)).await;
            }
            ClientEvent::ColorNames { cage, red, blue } => {
                let room = cage.room();
                let registry = self.registry.lock().await;
                registry.broadcast(&room, &ServerEvent::share_name("red", red));
                registry.broadcast(&room, &ServerEvent::share_name("blue", blue));
            }
            ClientEvent::PlaySound { cage, sound } => {
                self.to_cage(&cage, ServerEvent::play_sound(sound)).await;
            }
            ClientEvent::ResetScreens { cage } => {
                self.to_cage(&cage, ServerEvent::reset_screens()).await;
            }
            ClientEvent::GlobalEstop => self.global_estop(id).await,
            ClientEvent::Ignored { .. } => {}
        }
    }

    async fn to_cage(&self, cage: &CageId, event: ServerEvent) -> usize {
        let room = cage.room();
        let delivered = self.registry.lock().await.broadcast(&room, &event);
        tracing::debug!(%room, event = %event.event, delivered, "relayed");
        delivered
    }

    async fn announce(&self, id: ConnectionId, information: &Value) {
        let first = {
            let mut registry = self.registry.lock().await;
            registry.send_to(id, ServerEvent::query_location());
            registry.mark_announced(id)
        };

        if let (true, Some(db)) = (first, &self.db) {
            match db
                .register_client(&id.to_string(), information, self.clock.now())
                .await
            {
                Ok(created) => tracing::info!(connection_id = %id, created, "client announced"),
                Err(e) => tracing::error!(connection_id = %id, error = %e, "failed to record client"),
            }
        }
    }

    /// Stop every arena. Each connection receives the pair once, whatever
    /// rooms it is in.
    async fn global_estop(&self, origin: ConnectionId) {
        let registry = self.registry.lock().await;
        let stopped = registry.broadcast_all(&ServerEvent::estop_timer());
        registry.broadcast_all(&ServerEvent::estop_background());
        tracing::warn!(
            connection_id = %origin,
            rooms = ?registry.room_names(),
            stopped,
            "global emergency stop"
        );
    }

    /// Live connections and their rooms.
    pub async fn snapshot(&self) -> Vec<ConnectionSnapshot> {
        self.registry.lock().await.snapshot()
    }

    pub async fn room_names(&self) -> Vec<String> {
        self.registry.lock().await.room_names()
    }

    pub async fn connection_count(&self) -> usize {
        self.registry.lock().await.connection_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bracketeer_core::ManualClock;
    use serde_json::json;

    fn drain(conn: &mut RelayConnection) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = conn.events.try_recv() {
            events.push(event);
        }
        events
    }

    async fn join(relay: &EventRelay, conn: &RelayConnection, cage: u32) {
        relay
            .handle_text(
                conn.id,
                &json!({"event": "join_cage_request", "data": {"cage_id": cage}}).to_string(),
                &Value::Null,
            )
            .await;
    }

    #[tokio::test]
    async fn test_join_broadcasts_to_whole_room() {
        let relay = EventRelay::new();
        let mut a = relay.connect().await;
        let mut b = relay.connect().await;

        join(&relay, &a, 2).await;
        join(&relay, &b, 2).await;

        assert_eq!(drain(&mut a), vec![ServerEvent::joined_room("cage_no_2"), ServerEvent::joined_room("cage_no_2")]);
        assert_eq!(drain(&mut b), vec![ServerEvent::joined_room("cage_no_2")]);
    }

    #[tokio::test]
    async fn test_rejoin_keeps_single_membership() {
        let relay = EventRelay::new();
        let mut a = relay.connect().await;
        join(&relay, &a, 1).await;
        join(&relay, &a, 1).await;
        drain(&mut a);

        relay
            .dispatch(a.id, ClientEvent::ResetScreens { cage: CageId::new("1") }, &Value::Null)
            .await;
        assert_eq!(drain(&mut a), vec![ServerEvent::reset_screens()]);
    }

    #[tokio::test]
    async fn test_timer_relays_message_only() {
        let relay = EventRelay::new();
        let mut a = relay.connect().await;
        join(&relay, &a, 4).await;
        drain(&mut a);

        relay
            .handle_text(
                a.id,
                r#"{"event": "timer_event", "data": {"cageID": "4", "message": "START"}}"#,
                &Value::Null,
            )
            .await;
        assert_eq!(drain(&mut a), vec![ServerEvent::timer(json!("START"))]);
    }

    #[tokio::test]
    async fn test_exists_replies_to_caller_and_records_once() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let relay = EventRelay::new()
            .with_client_store(db.clone())
            .with_clock(Arc::new(ManualClock::new(1_700_000_000.0)));
        let mut a = relay.connect().await;
        let mut b = relay.connect().await;
        join(&relay, &a, 1).await;
        join(&relay, &b, 1).await;
        drain(&mut a);
        drain(&mut b);

        let info = json!({"user_agent": "timer-screen"});
        relay.dispatch(a.id, ClientEvent::Exists, &info).await;
        relay.dispatch(a.id, ClientEvent::Exists, &info).await;

        assert_eq!(drain(&mut a), vec![ServerEvent::query_location(), ServerEvent::query_location()]);
        assert!(drain(&mut b).is_empty());

        let clients = db.list_clients(10).await.unwrap();
        assert_eq!(clients.len(), 1);
        assert_eq!(clients[0].connection_sid, a.id.to_string());
        assert_eq!(clients[0].information, info);
    }

    #[tokio::test]
    async fn test_schedule_screens_join_schedule_room() {
        let relay = EventRelay::new();
        let a = relay.connect().await;
        relay
            .handle_text(a.id, r#"{"event": "client_notify_schedule", "data": "/schedule"}"#, &Value::Null)
            .await;
        assert_eq!(relay.room_names().await, vec![SCHEDULE_ROOM.to_string()]);
    }

    #[tokio::test]
    async fn test_play_sound_and_reset() {
        let relay = EventRelay::new();
        let mut a = relay.connect().await;
        join(&relay, &a, 7).await;
        drain(&mut a);

        relay
            .handle_text(a.id, r#"{"event": "c_play_sound_event", "data": {"cageID": 7, "sound": "buzzer"}}"#, &Value::Null)
            .await;
        relay
            .handle_text(a.id, r#"{"event": "reset_screen_states", "data": {"cageID": 7}}"#, &Value::Null)
            .await;

        assert_eq!(drain(&mut a), vec![ServerEvent::play_sound(json!("buzzer")), ServerEvent::reset_screens()]);
    }

    #[tokio::test]
    async fn test_no_op_events_send_nothing() {
        let relay = EventRelay::new();
        let mut a = relay.connect().await;
        join(&relay, &a, 2).await;
        drain(&mut a);

        for frame in [
            r#"{"event": "client_attests_existence", "data": "/cage/2"}"#,
            r#"{"event": "client_requests_schedule"}"#,
            r#"{"event": "test_connect"}"#,
        ] {
            relay.handle_text(a.id, frame, &Value::Null).await;
        }

        assert!(drain(&mut a).is_empty());
        assert_eq!(relay.room_names().await, vec!["cage_no_2".to_string()]);
    }

    #[tokio::test]
    async fn test_disconnect_clears_rooms() {
        let relay = EventRelay::new();
        let a = relay.connect().await;
        join(&relay, &a, 3).await;
        assert_eq!(relay.connection_count().await, 1);

        relay.disconnect(a.id).await;
        assert_eq!(relay.connection_count().await, 0);
        assert!(relay.room_names().await.is_empty());
    }
}
