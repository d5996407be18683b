//! Bus-backed implementations of the verifier's collaborator traits.
//!
//! The chain store and the peer transport are separate modules; we reach
//! them with request/response over the message bus.

use std::sync::Arc;

use agora_common::messages::Message;
use agora_common::queries::chain::{ChainStateQuery, ChainStateQueryResponse};
use agora_common::queries::peers::{PeerChainQuery, PeerChainQueryResponse};
use agora_common::{Block, BlockHeader, BlockId};
use anyhow::{bail, Result};
use async_trait::async_trait;
use caryatid_sdk::Context;

use crate::verifier::{ChainLookup, PeerChain};

async fn request(context: &Arc<Context<Message>>, topic: &str, message: Message) -> Result<Message> {
    let raw = context.message_bus.request(topic, Arc::new(message)).await?;
    Ok(Arc::try_unwrap(raw).unwrap_or_else(|arc| (*arc).clone()))
}

/// Local chain access via the chain store module
pub struct BusChainLookup {
    context: Arc<Context<Message>>,
    topic: String,
}

impl BusChainLookup {
    pub fn new(context: Arc<Context<Message>>, topic: String) -> Self {
        Self { context, topic }
    }
}

#[async_trait]
impl ChainLookup for BusChainLookup {
    async fn last_block_header(&self) -> Result<BlockHeader> {
        let query = Message::ChainQuery(ChainStateQuery::GetLastBlockHeader);
        match request(&self.context, &self.topic, query).await? {
            Message::ChainQueryResponse(ChainStateQueryResponse::LastBlockHeader(header)) => {
                Ok(header)
            }
            Message::ChainQueryResponse(ChainStateQueryResponse::Error(e)) => {
                bail!("chain store error: {e}")
            }
            msg => bail!("unexpected response from chain store: {msg:?}"),
        }
    }

    async fn block_ids_at(&self, heights: &[u64]) -> Result<Vec<Option<BlockId>>> {
        let query = Message::ChainQuery(ChainStateQuery::GetBlockIdsAt {
            heights: heights.to_vec(),
        });
        match request(&self.context, &self.topic, query).await? {
            Message::ChainQueryResponse(ChainStateQueryResponse::BlockIdsAt(ids)) => Ok(ids),
            Message::ChainQueryResponse(ChainStateQueryResponse::Error(e)) => {
                bail!("chain store error: {e}")
            }
            msg => bail!("unexpected response from chain store: {msg:?}"),
        }
    }
}

/// Remote chain access to one specific peer via the transport module
pub struct BusPeerChain {
    context: Arc<Context<Message>>,
    topic: String,
    ip: String,
    port: u16,
}

impl BusPeerChain {
    pub fn new(context: Arc<Context<Message>>, topic: String, ip: String, port: u16) -> Self {
        Self {
            context,
            topic,
            ip,
            port,
        }
    }
}

#[async_trait]
impl PeerChain for BusPeerChain {
    async fn block_headers_at(&self, heights: &[u64]) -> Result<Vec<Option<BlockHeader>>> {
        let query = Message::PeerChainQuery(PeerChainQuery::GetBlockHeadersAt {
            ip: self.ip.clone(),
            port: self.port,
            heights: heights.to_vec(),
        });
        match request(&self.context, &self.topic, query).await? {
            Message::PeerChainQueryResponse(PeerChainQueryResponse::BlockHeadersAt(headers)) => {
                Ok(headers)
            }
            Message::PeerChainQueryResponse(PeerChainQueryResponse::Error(e)) => {
                bail!("peer transport error: {e}")
            }
            msg => bail!("unexpected response from peer transport: {msg:?}"),
        }
    }

    async fn blocks_from(&self, start: u64, count: u64) -> Result<Vec<Block>> {
        let query = Message::PeerChainQuery(PeerChainQuery::GetBlocksFrom {
            ip: self.ip.clone(),
            port: self.port,
            start,
            count,
        });
        match request(&self.context, &self.topic, query).await? {
            Message::PeerChainQueryResponse(PeerChainQueryResponse::BlocksFrom(blocks)) => {
                Ok(blocks)
            }
            Message::PeerChainQueryResponse(PeerChainQueryResponse::Error(e)) => {
                bail!("peer transport error: {e}")
            }
            msg => bail!("unexpected response from peer transport: {msg:?}"),
        }
    }
}
