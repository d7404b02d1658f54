//! Relay routing for connection-negotiation messages.
//!
//! Offers, answers and ICE candidates travel sender -> receivers (broadcast,
//! or unicast when `to` names a peer identity) and receiver -> sender. The
//! payload is forwarded verbatim; the hub only stamps `from` with the
//! originating connection's registered identity, overwriting anything the
//! client put there.

use lantern_proto::signal::{Negotiation, NegotiationKind, ServerMessage};

use crate::hub::Hub;
use crate::session::ConnectionId;

impl Hub {
    /// Forwards a negotiation message from connection `id` within its room.
    ///
    /// Messages from connections without a room, to absent peers, or to
    /// closed connections are dropped silently.
    pub(crate) fn relay(&self, id: ConnectionId, kind: NegotiationKind, mut body: Negotiation) {
        let Some(membership) = self.sessions.membership(id) else {
            return;
        };
        let Some(room_name) = membership.room else {
            tracing::debug!(conn = %id, kind = kind.as_str(), "dropping negotiation from connection without a room");
            return;
        };
        let Some(handle) = self.rooms.get(&room_name) else {
            return;
        };

        body.from = membership.peer_id;
        let room = handle.lock();

        if room.sender() == Some(id) {
            if let Some(target) = body.to.clone() {
                let targets = self.sessions.find_by_peer_id(room.receivers(), &target);
                let msg = ServerMessage::negotiation(kind, body);
                let delivered = self.sessions.broadcast(&targets, &msg);
                if delivered == 0 {
                    tracing::debug!(room = %room_name, to = %target, kind = kind.as_str(), "unicast target not found, dropped");
                }
            } else {
                let msg = ServerMessage::negotiation(kind, body);
                let delivered = self.sessions.broadcast(room.receivers(), &msg);
                tracing::debug!(room = %room_name, kind = kind.as_str(), delivered, "negotiation broadcast to receivers");
            }
        } else if room.has_receiver(id) {
            let delivered = room
                .sender()
                .is_some_and(|sender| self.sessions.send(sender, ServerMessage::negotiation(kind, body)));
            if !delivered {
                tracing::debug!(room = %room_name, kind = kind.as_str(), "no open sender, dropped");
            }
        } else {
            tracing::debug!(conn = %id, room = %room_name, "sender of negotiation is no longer a member");
        }
    }
}
