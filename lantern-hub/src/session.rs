//! Per-connection session state.
//!
//! The WebSocket transport knows nothing about rooms or roles; everything the
//! hub tracks about a connection lives in a [`Session`] looked up by
//! [`ConnectionId`] in the [`SessionTable`].

use std::collections::HashMap;

use lantern_proto::signal::{Role, ServerMessage};
use parking_lot::RwLock;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Channel feeding a connection's writer task.
pub type Outbox = mpsc::UnboundedSender<ServerMessage>;

/// Opaque handle of one live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Allocates a fresh, time-ordered connection handle.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// What the hub knows about one connection.
#[derive(Debug)]
pub struct Session {
    /// Assigned role; `None` until a join succeeds.
    pub role: Option<Role>,
    /// Registered peer identity; `None` until `register-id`.
    pub peer_id: Option<String>,
    /// Joined room; `None` until a join succeeds. Never changes afterwards.
    pub room: Option<String>,
    outbox: Outbox,
}

impl Session {
    fn new(outbox: Outbox) -> Self {
        Self {
            role: None,
            peer_id: None,
            room: None,
            outbox,
        }
    }

    /// Returns `true` while the connection's writer is still draining.
    #[must_use]
    pub fn is_open(&self) -> bool {
        !self.outbox.is_closed()
    }

    /// Queues a message for delivery. Returns `false` if the connection is gone.
    pub fn send(&self, msg: ServerMessage) -> bool {
        self.outbox.send(msg).is_ok()
    }
}

/// Routing-relevant copy of a session's fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Membership {
    /// Assigned role, if joined.
    pub role: Option<Role>,
    /// Registered peer identity.
    pub peer_id: Option<String>,
    /// Joined room name.
    pub room: Option<String>,
}

/// Side table mapping connection handles to their session state.
///
/// Thread-safe via [`RwLock`]. When both a room lock and this table's lock
/// are needed, the room lock is always taken first.
#[derive(Default)]
pub struct SessionTable {
    sessions: RwLock<HashMap<ConnectionId, Session>>,
}

impl SessionTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an unassigned session for a new connection.
    pub fn insert(&self, id: ConnectionId, outbox: Outbox) {
        self.sessions.write().insert(id, Session::new(outbox));
    }

    /// Destroys a session, returning it if it existed.
    pub fn remove(&self, id: ConnectionId) -> Option<Session> {
        self.sessions.write().remove(&id)
    }

    /// Binds a peer identity to a connection, replacing any earlier one.
    ///
    /// Returns the previous identity.
    pub fn register_peer_id(&self, id: ConnectionId, peer_id: String) -> Option<String> {
        self.sessions
            .write()
            .get_mut(&id)
            .and_then(|s| s.peer_id.replace(peer_id))
    }

    /// Records a successful join or a role change.
    ///
    /// Returns `false` if the session no longer exists.
    #[must_use]
    pub fn set_membership(&self, id: ConnectionId, role: Role, room: &str) -> bool {
        let mut sessions = self.sessions.write();
        let Some(session) = sessions.get_mut(&id) else {
            return false;
        };
        session.role = Some(role);
        session.room = Some(room.to_string());
        true
    }

    /// Returns a copy of the routing fields of a session.
    #[must_use]
    pub fn membership(&self, id: ConnectionId) -> Option<Membership> {
        self.sessions.read().get(&id).map(|s| Membership {
            role: s.role,
            peer_id: s.peer_id.clone(),
            room: s.room.clone(),
        })
    }

    /// Returns the registered peer identity of a connection.
    #[must_use]
    pub fn peer_id(&self, id: ConnectionId) -> Option<String> {
        self.sessions.read().get(&id).and_then(|s| s.peer_id.clone())
    }

    /// Returns `true` if the connection exists and its writer is alive.
    #[must_use]
    pub fn is_open(&self, id: ConnectionId) -> bool {
        self.sessions.read().get(&id).is_some_and(Session::is_open)
    }

    /// Delivers a message to one connection if it is open.
    ///
    /// Returns `false` when the connection is unknown or closed.
    pub fn send(&self, id: ConnectionId, msg: ServerMessage) -> bool {
        let sessions = self.sessions.read();
        match sessions.get(&id) {
            Some(session) if session.is_open() => session.send(msg),
            _ => false,
        }
    }

    /// Delivers a copy of `msg` to each open connection in `ids`.
    ///
    /// Returns the number of connections the message was queued for.
    pub fn broadcast<'a>(
        &self,
        ids: impl IntoIterator<Item = &'a ConnectionId>,
        msg: &ServerMessage,
    ) -> usize {
        let sessions = self.sessions.read();
        ids.into_iter()
            .filter_map(|id| sessions.get(id))
            .filter(|s| s.is_open())
            .filter(|s| s.send(msg.clone()))
            .count()
    }

    /// Returns every id in `ids` whose registered identity is `peer_id`.
    #[must_use]
    pub fn find_by_peer_id<'a>(
        &self,
        ids: impl IntoIterator<Item = &'a ConnectionId>,
        peer_id: &str,
    ) -> Vec<ConnectionId> {
        let sessions = self.sessions.read();
        ids.into_iter()
            .filter(|id| {
                sessions
                    .get(id)
                    .is_some_and(|s| s.peer_id.as_deref() == Some(peer_id))
            })
            .copied()
            .collect()
    }

    /// Number of live sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    /// Returns `true` if no sessions exist.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}
