//! Queries served by the peer transport layer against one remote peer

use crate::types::{Block, BlockHeader};

pub const DEFAULT_PEER_QUERY_TOPIC: (&str, &str) = ("peer-query-topic", "agora.query.peers");

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum PeerChainQuery {
    /// Ask the peer for its block headers at the given heights, in the same
    /// order; `None` where the peer has no block
    GetBlockHeadersAt {
        ip: String,
        port: u16,
        heights: Vec<u64>,
    },

    /// Ask the peer for up to `count` full blocks starting at `start`,
    /// ascending by height
    GetBlocksFrom {
        ip: String,
        port: u16,
        start: u64,
        count: u64,
    },
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum PeerChainQueryResponse {
    BlockHeadersAt(Vec<Option<BlockHeader>>),
    BlocksFrom(Vec<Block>),
    Error(String),
}
