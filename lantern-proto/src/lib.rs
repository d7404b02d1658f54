//! Shared protocol definitions for the Lantern signaling wire format.
//!
//! Every frame is a single JSON object with a mandatory `type` field.
//! Client and hub speak different vocabularies, modeled as
//! [`signal::ClientMessage`] and [`signal::ServerMessage`].

pub mod codec;
pub mod signal;
