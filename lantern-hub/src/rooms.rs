//! Room registry for the signaling hub.
//!
//! Maintains an in-memory directory of active rooms keyed by name. A room is
//! created lazily by the first join that names it and removed the moment it
//! has neither a sender nor receivers.
//!
//! Each room sits behind its own [`Mutex`], so traffic in one room never
//! waits on another. The registry map lock is only held for lookup, insert
//! and remove, and is never held while waiting for a room lock.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rand::Rng;

use crate::session::ConnectionId;

/// Default maximum number of rooms the registry will hold.
pub const DEFAULT_MAX_ROOMS: usize = 1000;

/// Produces access codes for newly created rooms.
pub type CodeGenerator = Box<dyn Fn() -> String + Send + Sync>;

/// Shared handle to one room.
pub type RoomHandle = Arc<Mutex<Room>>;

/// Errors that can occur during room registry operations.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The registry has reached its maximum capacity.
    #[error("room registry is full (max {0} rooms)")]
    CapacityReached(usize),
}

/// Membership state of one room.
#[derive(Debug)]
pub struct Room {
    name: String,
    access_code: String,
    sender: Option<ConnectionId>,
    receivers: BTreeSet<ConnectionId>,
    closed: bool,
}

impl Room {
    fn new(name: &str, access_code: String) -> Self {
        Self {
            name: name.to_string(),
            access_code,
            sender: None,
            receivers: BTreeSet::new(),
            closed: false,
        }
    }

    /// Room name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Four-digit code receivers must present. Fixed for the room's lifetime.
    #[must_use]
    pub fn access_code(&self) -> &str {
        &self.access_code
    }

    /// Current sender, if any.
    #[must_use]
    pub const fn sender(&self) -> Option<ConnectionId> {
        self.sender
    }

    /// Current receivers, ordered by connection age (oldest first).
    #[must_use]
    pub const fn receivers(&self) -> &BTreeSet<ConnectionId> {
        &self.receivers
    }

    /// Returns `true` if `id` is a receiver of this room.
    #[must_use]
    pub fn has_receiver(&self, id: ConnectionId) -> bool {
        self.receivers.contains(&id)
    }

    /// Returns `true` if the room has neither a sender nor receivers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sender.is_none() && self.receivers.is_empty()
    }

    /// Returns `true` once the room has been retired from the registry.
    ///
    /// A closed room must not gain members; callers look the name up again.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    /// Installs `id` as sender, returning the sender it replaced.
    ///
    /// `id` is removed from the receivers so the two roles never overlap.
    pub fn install_sender(&mut self, id: ConnectionId) -> Option<ConnectionId> {
        self.receivers.remove(&id);
        self.sender.replace(id)
    }

    /// Adds `id` as a receiver. Clears the sender slot if `id` held it.
    pub fn add_receiver(&mut self, id: ConnectionId) {
        if self.sender == Some(id) {
            self.sender = None;
        }
        self.receivers.insert(id);
    }

    /// Clears the sender slot if `id` holds it. Returns whether it did.
    pub fn clear_sender(&mut self, id: ConnectionId) -> bool {
        if self.sender == Some(id) {
            self.sender = None;
            true
        } else {
            false
        }
    }

    /// Removes `id` from the receivers. Returns whether it was present.
    pub fn remove_receiver(&mut self, id: ConnectionId) -> bool {
        self.receivers.remove(&id)
    }

    /// Marks the room retired if it is empty. Returns whether it did.
    pub fn close_if_empty(&mut self) -> bool {
        if self.is_empty() {
            self.closed = true;
        }
        self.closed
    }
}

/// Point-in-time copy of a room's membership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSnapshot {
    /// Room name.
    pub name: String,
    /// Access code.
    pub access_code: String,
    /// Current sender.
    pub sender: Option<ConnectionId>,
    /// Current receivers, ordered by connection age (oldest first).
    pub receivers: Vec<ConnectionId>,
}

impl From<&Room> for RoomSnapshot {
    fn from(room: &Room) -> Self {
        Self {
            name: room.name.clone(),
            access_code: room.access_code.clone(),
            sender: room.sender,
            receivers: room.receivers.iter().copied().collect(),
        }
    }
}

/// Generates a uniformly random four-digit code without a leading zero.
#[must_use]
pub fn random_access_code() -> String {
    rand::rng().random_range(1000..=9999_u16).to_string()
}

/// In-memory directory of active rooms.
pub struct RoomRegistry {
    rooms: RwLock<HashMap<String, RoomHandle>>,
    max_rooms: usize,
    codes: CodeGenerator,
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RoomRegistry {
    /// Creates an empty registry with random access codes and the default
    /// room limit.
    #[must_use]
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_MAX_ROOMS, Box::new(random_access_code))
    }

    /// Creates an empty registry with a custom room limit and code source.
    #[must_use]
    pub fn with_limits(max_rooms: usize, codes: CodeGenerator) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            max_rooms,
            codes,
        }
    }

    /// Returns the room with the given name, if it exists.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<RoomHandle> {
        self.rooms.read().get(name).cloned()
    }

    /// Returns the room with the given name, creating it with a fresh access
    /// code if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::CapacityReached`] if the room would have to be
    /// created while the registry is full.
    pub fn get_or_create(&self, name: &str) -> Result<RoomHandle, RegistryError> {
        if let Some(room) = self.get(name) {
            return Ok(room);
        }

        let mut rooms = self.rooms.write();
        if let Some(room) = rooms.get(name) {
            return Ok(Arc::clone(room));
        }
        if rooms.len() >= self.max_rooms {
            return Err(RegistryError::CapacityReached(self.max_rooms));
        }

        let room = Arc::new(Mutex::new(Room::new(name, (self.codes)())));
        rooms.insert(name.to_string(), Arc::clone(&room));
        drop(rooms);

        tracing::info!(room = %name, "room created");
        Ok(room)
    }

    /// Removes `room` from the directory if the entry under its name is still
    /// that same room.
    ///
    /// Returns `true` if an entry was removed.
    pub fn remove(&self, name: &str, room: &RoomHandle) -> bool {
        let mut rooms = self.rooms.write();
        let removed = match rooms.get(name) {
            Some(current) if Arc::ptr_eq(current, room) => rooms.remove(name).is_some(),
            _ => false,
        };
        drop(rooms);

        if removed {
            tracing::info!(room = %name, "room removed");
        }
        removed
    }

    /// Returns a snapshot of a room's membership.
    #[must_use]
    pub fn snapshot(&self, name: &str) -> Option<RoomSnapshot> {
        let handle = self.get(name)?;
        let room = handle.lock();
        Some(RoomSnapshot::from(&*room))
    }

    /// Number of active rooms.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rooms.read().len()
    }

    /// Returns `true` if no rooms exist.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rooms.read().is_empty()
    }
}

/// Retires `room` if it is empty and drops it from `registry`.
///
/// The entry is removed while the room guard is still held, so a join that
/// fetched the handle earlier finds it closed and the name already free.
pub(crate) fn release_if_empty(
    registry: &RoomRegistry,
    handle: &RoomHandle,
    mut room: parking_lot::MutexGuard<'_, Room>,
) {
    if room.close_if_empty() {
        registry.remove(room.name(), handle);
    }
    drop(room);
}
