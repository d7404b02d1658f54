//! Lantern signaling hub library.
//!
//! Exposes the hub for use in tests and embedding. The hub accepts WebSocket
//! connections, admits them into rooms as sender or receiver, and relays
//! connection-negotiation messages between a room's sender and its
//! receivers. Media never passes through it.

pub mod admission;
pub mod config;
pub mod hub;
mod reconcile;
pub mod rooms;
mod router;
pub mod server;
pub mod session;
