//! Definition of Agora messages

// We don't use these messages in the agora_common crate itself
#![allow(dead_code)]

use crate::queries::chain::{ChainStateQuery, ChainStateQueryResponse};
use crate::queries::network::{NetworkStateQuery, NetworkStateQueryResponse};
use crate::queries::peers::{PeerChainQuery, PeerChainQueryResponse};
use crate::types::*;

// Caryatid core messages
use caryatid_module_clock::messages::ClockTickMessage;

/// A peer reported its status, relayed by the transport layer
#[derive(Debug, Default, Clone, serde::Serialize, serde::Deserialize)]
pub struct PeerStatusMessage {
    pub ip: String,
    pub port: u16,

    /// The peer's self-reported state
    pub state: PeerState,
}

impl PeerStatusMessage {
    pub fn address(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }
}

/// A peer connection was dropped
#[derive(Debug, Default, Clone, serde::Serialize, serde::Deserialize)]
pub struct PeerDisconnectedMessage {
    pub ip: String,
    pub port: u16,
}

/// Outcome of one verification run against one peer
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum VerificationOutcome {
    /// The peer's chain was verified; a confirmed fork is a normal outcome
    Verified(PeerVerificationResult),

    /// The peer could not be verified (unresponsive, malformed replies,
    /// failed cryptographic checks). NOT the same as "not forked".
    Unverifiable(String),
}

/// Published after each verification run against a peer
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PeerVerifiedMessage {
    pub ip: String,
    pub port: u16,

    /// The peer state the verification ran against
    pub state: PeerState,

    pub outcome: VerificationOutcome,
}

/// A block was appended to the local chain
#[derive(Debug, Default, Clone, serde::Serialize, serde::Deserialize)]
pub struct BlockAppliedMessage {
    pub header: BlockHeader,
}

/// Freshly computed network classification
#[derive(Debug, Default, Clone, serde::Serialize, serde::Deserialize)]
pub struct NetworkStateMessage {
    pub state: NetworkState,
}

// === Global message enum ===
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum Message {
    None(()),                                    // Just so we have a simple default

    // Generic messages, get out of jail free cards
    String(String),                              // Simple string
    JSON(serde_json::Value),                     // JSON object

    // Caryatid standard messages
    Clock(ClockTickMessage),                     // Clock tick

    // Peer lifecycle messages
    PeerStatus(PeerStatusMessage),               // A peer reported status
    PeerDisconnected(PeerDisconnectedMessage),   // A peer went away
    PeerVerified(PeerVerifiedMessage),           // Verification outcome for a peer

    // Chain messages
    BlockApplied(BlockAppliedMessage),           // Local chain advanced

    // Network classification
    NetworkState(NetworkStateMessage),           // Computed network state

    // Query/response pairs
    ChainQuery(ChainStateQuery),                 // Local chain store query
    ChainQueryResponse(ChainStateQueryResponse),
    PeerChainQuery(PeerChainQuery),              // Remote peer chain query
    PeerChainQueryResponse(PeerChainQueryResponse),
    NetworkQuery(NetworkStateQuery),             // Network state query
    NetworkQueryResponse(NetworkStateQueryResponse),
}

impl Default for Message {
    fn default() -> Self {
        Self::None(())
    }
}

// Casts from specific messages
impl From<ClockTickMessage> for Message {
    fn from(msg: ClockTickMessage) -> Self {
        Message::Clock(msg)
    }
}

impl From<PeerStatusMessage> for Message {
    fn from(msg: PeerStatusMessage) -> Self {
        Message::PeerStatus(msg)
    }
}

impl From<PeerVerifiedMessage> for Message {
    fn from(msg: PeerVerifiedMessage) -> Self {
        Message::PeerVerified(msg)
    }
}

impl From<BlockAppliedMessage> for Message {
    fn from(msg: BlockAppliedMessage) -> Self {
        Message::BlockApplied(msg)
    }
}

impl From<NetworkStateMessage> for Message {
    fn from(msg: NetworkStateMessage) -> Self {
        Message::NetworkState(msg)
    }
}
