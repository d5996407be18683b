//! Definition of Agora's core types

use crate::hash::BlockId;

/// A public key, in binary
pub type PublicKey = Vec<u8>;

/// An ed25519 signature, in binary
pub type Signature = Vec<u8>;

/// Minimal view of a block: just enough to compare chains by height
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BlockHeader {
    /// Block id
    pub id: BlockId,

    /// Height in the chain, starting at 1 for genesis
    pub height: u64,
}

/// A full block as exchanged with peers during verification
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Block {
    /// Block id (digest of the fields below)
    pub id: BlockId,

    /// Height in the chain
    pub height: u64,

    /// Id of the preceding block
    pub previous_id: BlockId,

    /// Forging timestamp, seconds since the chain epoch
    pub timestamp: u64,

    /// Public key of the delegate that forged this block
    pub generator: PublicKey,

    /// Generator's signature over the block id
    pub signature: Signature,
}

impl Block {
    pub fn header(&self) -> BlockHeader {
        BlockHeader {
            id: self.id,
            height: self.height,
        }
    }
}

/// A peer's last self-reported status, as relayed by the transport layer.
/// Read-only to the verification and network-state modules.
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PeerState {
    /// Peer's reported best block header, if it has reported one
    pub header: Option<BlockHeader>,

    /// Peer's reported chain height
    pub height: u64,

    /// Whether the peer currently accepts forging
    pub forging_allowed: bool,

    /// Peer's view of the current forging slot
    pub current_slot: u64,
}

/// A known peer together with what we know about its chain
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Peer {
    pub ip: String,
    pub port: u16,

    /// Last self-reported status
    pub state: PeerState,

    /// Outcome of the last successful verification of this peer's chain,
    /// if one has been run against its current reported state
    pub verification: Option<PeerVerificationResult>,
}

impl Peer {
    pub fn address(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }
}

/// The outcome of verifying one peer's chain against our own
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PeerVerificationResult {
    /// Our chain height at the time of verification
    pub our_height: u64,

    /// The peer's reported height at the time of verification
    pub peer_height: u64,

    /// Highest height at which both chains are known to hold the same block
    pub highest_common_height: u64,
}

impl PeerVerificationResult {
    /// A peer is forked only when the chains demonstrably diverged before
    /// either party's tip - not merely when the peer is behind us.
    pub fn forked(&self) -> bool {
        self.highest_common_height < self.our_height.min(self.peer_height)
    }
}

/// How the process is being run. Selects deterministic-test behaviour
/// in the network analysis instead of checking environment variables.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RuntimeMode {
    #[default]
    Production,
    Test,
}

/// Classification of the network as seen from this node
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum NetworkStateStatus {
    /// Node is still in its bootstrap window; no judgement possible yet
    #[default]
    ColdStart,

    /// Deterministic test network; safety checks disabled
    Test,

    /// Too few peers connected to form a meaningful sample
    BelowMinimumPeers,

    /// Enough peers known; quorum fields are meaningful
    Default,
}

/// Snapshot classification of the whole peer network, recomputed on demand.
/// The forging loop refuses to forge when the status is not `Default` or
/// the quorum falls below its threshold.
#[derive(Debug, Default, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct NetworkState {
    pub status: NetworkStateStatus,

    /// Local chain height at computation time
    pub node_height: u64,

    /// Local chain tip id at computation time
    pub last_block_id: BlockId,

    /// Peers agreeing with our chain
    pub peers_quorum: usize,

    /// Peers excluded from the quorum (overheight or forked)
    pub peers_no_quorum: usize,

    /// Peers with a confirmed fork against our chain
    pub peers_forked: usize,

    /// Headers reported by peers that claim a higher chain than ours
    pub over_height_block_headers: Vec<BlockHeader>,
}

impl NetworkState {
    pub fn with_status(status: NetworkStateStatus, last_block: &BlockHeader) -> Self {
        Self {
            status,
            node_height: last_block.height,
            last_block_id: last_block.id,
            ..Self::default()
        }
    }

    /// Fraction of known peers agreeing with our chain, in [0, 1].
    /// Vacuously 1.0 when no peers are known.
    pub fn quorum(&self) -> f64 {
        let total = self.peers_quorum + self.peers_no_quorum;
        if total == 0 {
            1.0
        } else {
            self.peers_quorum as f64 / total as f64
        }
    }
}
