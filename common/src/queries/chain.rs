//! Queries answered by the local chain store

use crate::hash::BlockId;
use crate::types::BlockHeader;

pub const DEFAULT_CHAIN_QUERY_TOPIC: (&str, &str) = ("chain-query-topic", "agora.query.chain");

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum ChainStateQuery {
    GetLastBlockHeader,

    /// Ids of our blocks at the given heights, in the same order;
    /// `None` for heights above our tip
    GetBlockIdsAt { heights: Vec<u64> },
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum ChainStateQueryResponse {
    LastBlockHeader(BlockHeader),
    BlockIdsAt(Vec<Option<BlockId>>),
    Error(String),
}
