//! The signaling hub: owns the room registry and the session table and
//! dispatches decoded client messages to admission, relay routing, or
//! identity registration.
//!
//! A [`Hub`] is an ordinary value. The server shares one behind an `Arc`;
//! tests build as many isolated instances as they like.

use lantern_proto::signal::{ClientMessage, NegotiationKind};

use crate::rooms::{RoomRegistry, RoomSnapshot};
use crate::session::{ConnectionId, Membership, Outbox, SessionTable};

/// Shared signaling state for all connections.
#[derive(Default)]
pub struct Hub {
    pub(crate) sessions: SessionTable,
    pub(crate) rooms: RoomRegistry,
}

impl Hub {
    /// Creates a hub with an empty default registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a hub around a pre-configured registry.
    #[must_use]
    pub fn with_registry(rooms: RoomRegistry) -> Self {
        Self {
            sessions: SessionTable::new(),
            rooms,
        }
    }

    /// Registers a new connection and returns its handle.
    ///
    /// Everything the hub sends to the connection is queued on `outbox`.
    pub fn connect(&self, outbox: Outbox) -> ConnectionId {
        let id = ConnectionId::new();
        self.sessions.insert(id, outbox);
        tracing::debug!(conn = %id, "session created");
        id
    }

    /// Applies one decoded client message from connection `id`.
    pub fn handle(&self, id: ConnectionId, msg: ClientMessage) {
        match msg {
            ClientMessage::RegisterId { peer_id } => self.register_id(id, peer_id),
            ClientMessage::Join { room, role, code } => self.join(id, &room, role, code),
            ClientMessage::Offer(body) => self.relay(id, NegotiationKind::Offer, body),
            ClientMessage::Answer(body) => self.relay(id, NegotiationKind::Answer, body),
            ClientMessage::IceCandidate(body) => {
                self.relay(id, NegotiationKind::IceCandidate, body);
            }
        }
    }

    /// Binds a peer identity to a connection. Last registration wins.
    fn register_id(&self, id: ConnectionId, peer_id: String) {
        if peer_id.is_empty() {
            tracing::warn!(conn = %id, "ignoring register-id with empty peerId");
            return;
        }
        tracing::info!(conn = %id, peer_id = %peer_id, "peer identity registered");
        if let Some(previous) = self.sessions.register_peer_id(id, peer_id) {
            tracing::debug!(conn = %id, previous = %previous, "peer identity replaced");
        }
    }

    /// Routing-relevant state of a connection.
    #[must_use]
    pub fn membership(&self, id: ConnectionId) -> Option<Membership> {
        self.sessions.membership(id)
    }

    /// Membership snapshot of a room.
    #[must_use]
    pub fn room(&self, name: &str) -> Option<RoomSnapshot> {
        self.rooms.snapshot(name)
    }

    /// Number of active rooms.
    #[must_use]
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Number of live connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.sessions.len()
    }
}
