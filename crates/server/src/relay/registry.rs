//! Connection and room bookkeeping.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::message::ServerEvent;

pub type ConnectionId = Uuid;

/// Outbound half of a live connection.
pub type EventSender = mpsc::UnboundedSender<ServerEvent>;

#[derive(Debug)]
struct Connection {
    tx: EventSender,
    rooms: BTreeSet<String>,
    connected_at: DateTime<Utc>,
    announced: bool,
}

/// Diagnostic view of one connection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionSnapshot {
    pub connection_id: ConnectionId,
    pub connected_at: DateTime<Utc>,
    pub announced: bool,
    pub rooms: Vec<String>,
}

/// Live connections and the rooms they joined.
///
/// Rooms exist only while they have members. Sends never block, so a
/// broadcast under the caller's lock delivers in receive order.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: HashMap<ConnectionId, Connection>,
    rooms: BTreeMap<String, BTreeSet<ConnectionId>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: ConnectionId, tx: EventSender) {
        self.connections
            .insert(id, Connection { tx, rooms: BTreeSet::new(), connected_at: Utc::now(), announced: false });
    }

    /// Drop a connection and its memberships. Returns the rooms it was in.
    pub fn remove(&mut self, id: ConnectionId) -> Vec<String> {
        let Some(conn) = self.connections.remove(&id) else {
            return Vec::new();
        };
        for room in &conn.rooms {
            if let Some(members) = self.rooms.get_mut(room) {
                members.remove(&id);
                if members.is_empty() {
                    self.rooms.remove(room);
                }
            }
        }
        conn.rooms.into_iter().collect()
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.connections.contains_key(&id)
    }

    /// Add a connection to a room. Returns false if it was already a member
    /// or is not registered.
    pub fn join(&mut self, id: ConnectionId, room: &str) -> bool {
        let Some(conn) = self.connections.get_mut(&id) else {
            return false;
        };
        if !conn.rooms.insert(room.to_string()) {
            return false;
        }
        self.rooms.entry(room.to_string()).or_default().insert(id);
        true
    }

    /// Mark a connection as having announced itself. Returns true the first time.
    pub fn mark_announced(&mut self, id: ConnectionId) -> bool {
        match self.connections.get_mut(&id) {
            Some(conn) if !conn.announced => {
                conn.announced = true;
                true
            }
            _ => false,
        }
    }

    pub fn rooms_of(&self, id: ConnectionId) -> Vec<String> {
        self.connections
            .get(&id)
            .map(|conn| conn.rooms.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Rooms with at least one member.
    pub fn room_names(&self) -> Vec<String> {
        self.rooms.keys().cloned().collect()
    }

    pub fn member_count(&self, room: &str) -> usize {
        self.rooms.get(room).map_or(0, BTreeSet::len)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Send to one connection. A closed receiver counts as not delivered.
    pub fn send_to(&self, id: ConnectionId, event: ServerEvent) -> bool {
        self.connections
            .get(&id)
            .is_some_and(|conn| conn.tx.send(event).is_ok())
    }

    /// Send to every member of `room`. Returns the number of deliveries.
    pub fn broadcast(&self, room: &str, event: &ServerEvent) -> usize {
        let Some(members) = self.rooms.get(room) else {
            return 0;
        };
        members
            .iter()
            .filter_map(|id| self.connections.get(id))
            .filter(|conn| conn.tx.send(event.clone()).is_ok())
            .count()
    }

    /// Send to every registered connection once.
    pub fn broadcast_all(&self, event: &ServerEvent) -> usize {
        self.connections
            .values()
            .filter(|conn| conn.tx.send(event.clone()).is_ok())
            .count()
    }

    /// Connections ordered by connect time.
    pub fn snapshot(&self) -> Vec<ConnectionSnapshot> {
        let mut snapshot: Vec<_> = self
            .connections
            .iter()
            .map(|(id, conn)| ConnectionSnapshot {
                connection_id: *id,
                connected_at: conn.connected_at,
                announced: conn.announced,
                rooms: conn.rooms.iter().cloned().collect(),
            })
            .collect();
        snapshot.sort_by_key(|s| (s.connected_at, s.connection_id));
        snapshot
    }
}
