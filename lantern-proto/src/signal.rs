//! Signaling message types exchanged between browser clients and the hub.
//!
//! All enums are JSON-serialized as `{"type": "<kebab-case-variant>", ...}`.
//! Negotiation messages (`offer`, `answer`, `ice-candidate`) carry an opaque
//! payload the hub never interprets; see [`Negotiation`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Role a connection plays inside a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    /// The single stream source of a room.
    Sender,
    /// A consumer of the sender's stream.
    Receiver,
}

impl Role {
    /// Wire name of the role.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sender => "sender",
            Self::Receiver => "receiver",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Room code as presented by a joining client.
///
/// Browsers send the code either as typed text or as a parsed number, so
/// both JSON strings and JSON numbers are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CodeValue {
    /// Code sent as a JSON string, e.g. `"4821"`.
    Text(String),
    /// Code sent as a JSON number, e.g. `4821`.
    Number(serde_json::Number),
}

impl CodeValue {
    /// Decimal string form used for comparison against a room's code.
    #[must_use]
    pub fn normalized(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Number(n) => n.to_string(),
        }
    }

    /// Returns `true` if the client effectively sent no code (`""`).
    #[must_use]
    pub fn is_blank(&self) -> bool {
        matches!(self, Self::Text(s) if s.is_empty())
    }

    /// Exact comparison against a room's access code.
    #[must_use]
    pub fn matches(&self, access_code: &str) -> bool {
        self.normalized() == access_code
    }
}

/// Opaque connection-negotiation payload.
///
/// Only the routing fields `to` and `from` are understood by the hub.
/// Everything else (SDP, candidates, whatever the client put there) is kept
/// in `payload` and forwarded verbatim.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Negotiation {
    /// Target peer identity for unicast delivery.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    /// Peer identity of the originating connection, set by the hub.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    /// All remaining fields, untouched.
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

/// Which of the three negotiation messages a [`Negotiation`] travels as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationKind {
    /// Session description offer.
    Offer,
    /// Session description answer.
    Answer,
    /// Trickled ICE candidate.
    IceCandidate,
}

impl NegotiationKind {
    /// Wire `type` of this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Offer => "offer",
            Self::Answer => "answer",
            Self::IceCandidate => "ice-candidate",
        }
    }
}

// ---------------------------------------------------------------------------
// Client -> Hub messages
// ---------------------------------------------------------------------------

/// Messages sent from a client to the hub.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// Binds a peer identity to the connection. Last registration wins.
    RegisterId {
        /// Client-chosen identity used as the unicast routing key.
        #[serde(rename = "peerId")]
        peer_id: String,
    },
    /// Asks to enter a room in the given role.
    Join {
        /// Room name.
        room: String,
        /// Requested role.
        role: Role,
        /// Access code, required for receivers.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<CodeValue>,
    },
    /// Relayed offer.
    Offer(Negotiation),
    /// Relayed answer.
    Answer(Negotiation),
    /// Relayed ICE candidate.
    IceCandidate(Negotiation),
}

impl ClientMessage {
    /// Splits a negotiation message into its kind and payload.
    ///
    /// # Errors
    ///
    /// Returns the message unchanged if it is not a negotiation message.
    pub fn into_negotiation(self) -> Result<(NegotiationKind, Negotiation), Self> {
        match self {
            Self::Offer(n) => Ok((NegotiationKind::Offer, n)),
            Self::Answer(n) => Ok((NegotiationKind::Answer, n)),
            Self::IceCandidate(n) => Ok((NegotiationKind::IceCandidate, n)),
            other => Err(other),
        }
    }
}

// ---------------------------------------------------------------------------
// Hub -> Client messages
// ---------------------------------------------------------------------------

/// Why a join request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DenyReason {
    /// A receiver join carried no code.
    MissingCode,
    /// A receiver join carried a code that does not match the room.
    InvalidCode,
    /// The connection is already a member of a room.
    AlreadyJoined,
    /// The hub is at its room capacity and the room does not exist yet.
    RoomLimit,
}

/// Messages sent from the hub to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// Join accepted in the given role.
    Joined {
        /// Role the connection now holds.
        role: Role,
    },
    /// Join refused; nothing changed.
    JoinDenied {
        /// Refusal cause.
        reason: DenyReason,
    },
    /// The room's access code, sent to the sender so it can display it.
    RoomCode {
        /// Four-digit code.
        code: String,
    },
    /// A sender is present; receivers may start negotiating.
    SenderReady,
    /// The room's sender disconnected.
    SenderLeft,
    /// A receiver disconnected.
    ReceiverLeft {
        /// Identity of the receiver that left, if it ever registered one.
        #[serde(rename = "peerId", default, skip_serializing_if = "Option::is_none")]
        peer_id: Option<String>,
    },
    /// This connection was reassigned to another role.
    RoleChanged {
        /// The role now held.
        #[serde(rename = "newRole")]
        new_role: Role,
    },
    /// Relayed offer.
    Offer(Negotiation),
    /// Relayed answer.
    Answer(Negotiation),
    /// Relayed ICE candidate.
    IceCandidate(Negotiation),
}

impl ServerMessage {
    /// Wraps a negotiation payload back into the message of the same kind.
    #[must_use]
    pub fn negotiation(kind: NegotiationKind, body: Negotiation) -> Self {
        match kind {
            NegotiationKind::Offer => Self::Offer(body),
            NegotiationKind::Answer => Self::Answer(body),
            NegotiationKind::IceCandidate => Self::IceCandidate(body),
        }
    }
}
