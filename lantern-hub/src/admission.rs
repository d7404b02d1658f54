//! Join handling: room-code checks, sender installation and demotion,
//! receiver registration.

use lantern_proto::signal::{CodeValue, DenyReason, Role, ServerMessage};

use crate::hub::Hub;
use crate::rooms::{self, RegistryError, Room};
use crate::session::ConnectionId;

/// Reasons a join request is refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AdmissionError {
    /// Receiver join without a code.
    #[error("room code required")]
    MissingCode,
    /// Receiver join with the wrong code.
    #[error("invalid room code")]
    InvalidCode,
    /// The connection already belongs to a room.
    #[error("connection already joined a room")]
    AlreadyJoined,
    /// Creating the room would exceed the registry limit.
    #[error("room limit reached")]
    RoomLimit,
}

impl From<AdmissionError> for DenyReason {
    fn from(err: AdmissionError) -> Self {
        match err {
            AdmissionError::MissingCode => Self::MissingCode,
            AdmissionError::InvalidCode => Self::InvalidCode,
            AdmissionError::AlreadyJoined => Self::AlreadyJoined,
            AdmissionError::RoomLimit => Self::RoomLimit,
        }
    }
}

impl From<RegistryError> for AdmissionError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::CapacityReached(_) => Self::RoomLimit,
        }
    }
}

/// Checks a receiver's code against the room's access code.
fn check_code(room: &Room, code: Option<&CodeValue>) -> Result<(), AdmissionError> {
    match code {
        None => Err(AdmissionError::MissingCode),
        Some(c) if c.is_blank() => Err(AdmissionError::MissingCode),
        Some(c) if c.matches(room.access_code()) => Ok(()),
        Some(_) => Err(AdmissionError::InvalidCode),
    }
}

impl Hub {
    /// Runs a join request from connection `id`.
    ///
    /// On refusal the connection receives `join-denied` and no room or
    /// session state changes.
    pub(crate) fn join(&self, id: ConnectionId, room: &str, role: Role, code: Option<CodeValue>) {
        if room.is_empty() {
            tracing::warn!(conn = %id, "dropping join with empty room name");
            return;
        }

        if let Err(err) = self.admit(id, room, role, code.as_ref()) {
            tracing::info!(conn = %id, room = %room, role = %role, reason = %err, "join denied");
            self.sessions.send(
                id,
                ServerMessage::JoinDenied {
                    reason: err.into(),
                },
            );
        }
    }

    fn admit(
        &self,
        id: ConnectionId,
        name: &str,
        role: Role,
        code: Option<&CodeValue>,
    ) -> Result<(), AdmissionError> {
        let Some(membership) = self.sessions.membership(id) else {
            // Connection already torn down.
            return Ok(());
        };
        if membership.room.is_some() {
            return Err(AdmissionError::AlreadyJoined);
        }

        loop {
            let handle = self.rooms.get_or_create(name)?;
            let mut room = handle.lock();
            if room.is_closed() {
                continue;
            }

            if role == Role::Receiver
                && let Err(err) = check_code(&room, code)
            {
                rooms::release_if_empty(&self.rooms, &handle, room);
                return Err(err);
            }

            // Membership is recorded under the room lock so a concurrent
            // disconnect either sees the room or finds no session here.
            if !self.sessions.set_membership(id, role, name) {
                tracing::debug!(conn = %id, room = %name, "connection closed during join");
                rooms::release_if_empty(&self.rooms, &handle, room);
                return Ok(());
            }

            match role {
                Role::Sender => self.admit_sender(id, &mut room),
                Role::Receiver => self.admit_receiver(id, &mut room),
            }
            tracing::info!(
                conn = %id,
                peer_id = ?membership.peer_id,
                room = %name,
                role = %role,
                receivers = room.receivers().len(),
                "join accepted"
            );
            return Ok(());
        }
    }

    /// Installs `id` as the room's sender, demoting any previous one.
    ///
    /// A previous sender whose session is already gone is dropped instead of
    /// demoted; its disconnect has nothing left to clean up.
    fn admit_sender(&self, id: ConnectionId, room: &mut Room) {
        if let Some(previous) = room.install_sender(id)
            && self
                .sessions
                .set_membership(previous, Role::Receiver, room.name())
        {
            room.add_receiver(previous);
            self.sessions.send(
                previous,
                ServerMessage::RoleChanged {
                    new_role: Role::Receiver,
                },
            );
            tracing::info!(room = %room.name(), demoted = %previous, "previous sender demoted");
        }

        self.sessions
            .send(id, ServerMessage::Joined { role: Role::Sender });
        self.sessions.send(
            id,
            ServerMessage::RoomCode {
                code: room.access_code().to_string(),
            },
        );
        self.sessions
            .broadcast(room.receivers(), &ServerMessage::SenderReady);
    }

    /// Adds `id` to the room's receivers.
    fn admit_receiver(&self, id: ConnectionId, room: &mut Room) {
        room.add_receiver(id);

        self.sessions.send(
            id,
            ServerMessage::Joined {
                role: Role::Receiver,
            },
        );
        if room.sender().is_some() {
            self.sessions.send(id, ServerMessage::SenderReady);
        }
    }
}
