//! Disconnect handling: drop the session, tell the other side of the room,
//! and garbage-collect the room once it is empty.

use lantern_proto::signal::ServerMessage;

use crate::hub::Hub;
use crate::rooms;
use crate::session::ConnectionId;

impl Hub {
    /// Tears down connection `id`.
    ///
    /// If it was the room's sender, every receiver gets `sender-left`. If it
    /// was a receiver, the sender gets `receiver-left` with its identity.
    /// Calling this for an unknown or never-joined connection is a no-op
    /// apart from dropping the session.
    pub fn disconnect(&self, id: ConnectionId) {
        // The session goes first. A join racing this call records membership
        // under the room lock, so it either lands in the removed session (and
        // is reconciled below) or finds the session gone and backs out.
        let Some(session) = self.sessions.remove(id) else {
            return;
        };
        let handle = session.room.as_deref().and_then(|name| self.rooms.get(name));
        let Some(handle) = handle else {
            tracing::debug!(conn = %id, "session closed without a room");
            return;
        };

        // Role is read from the room, not the session: another join may have
        // demoted this connection since it last looked.
        let mut room = handle.lock();
        if room.is_closed() {
            return;
        }

        if room.clear_sender(id) {
            let notified = self
                .sessions
                .broadcast(room.receivers(), &ServerMessage::SenderLeft);
            tracing::info!(
                conn = %id,
                peer_id = ?session.peer_id,
                room = %room.name(),
                notified,
                "sender left"
            );
        } else if room.remove_receiver(id) {
            if let Some(sender) = room.sender() {
                self.sessions.send(
                    sender,
                    ServerMessage::ReceiverLeft {
                        peer_id: session.peer_id.clone(),
                    },
                );
            }
            tracing::info!(
                conn = %id,
                peer_id = ?session.peer_id,
                room = %room.name(),
                remaining = room.receivers().len(),
                "receiver left"
            );
        }

        rooms::release_if_empty(&self.rooms, &handle, room);
    }
}
