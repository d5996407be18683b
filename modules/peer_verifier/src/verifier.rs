//! Core verification logic: given one peer's claimed state, find the highest
//! height at which its chain agrees with ours and check that any divergence
//! is genuine (signed blocks, not a lying peer).

use std::sync::{Arc, Mutex};

use agora_common::{
    capped_set::CappedSet,
    nsect::{NSect, Probe},
    rounds, Block, BlockHeader, BlockId, PeerState, PeerVerificationResult,
};
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use tracing::debug;

use crate::error::{BlockVerificationError, VerifyError};

/// Read access to the local chain (served by the chain store)
#[async_trait]
pub trait ChainLookup: Send + Sync {
    async fn last_block_header(&self) -> Result<BlockHeader>;

    /// Ids of our blocks at the given heights, in the same order; `None`
    /// above our tip
    async fn block_ids_at(&self, heights: &[u64]) -> Result<Vec<Option<BlockId>>>;
}

/// Read access to one remote peer's chain (served by the transport layer)
#[async_trait]
pub trait PeerChain: Send + Sync {
    /// The peer's headers at the given heights, in the same order; `None`
    /// where the peer has no block
    async fn block_headers_at(&self, heights: &[u64]) -> Result<Vec<Option<BlockHeader>>>;

    /// Up to `count` of the peer's blocks starting at `start`, ascending
    async fn blocks_from(&self, start: u64, count: u64) -> Result<Vec<Block>>;
}

/// Cryptographic verification of a single block against its predecessor
pub trait BlockVerifier: Send + Sync {
    fn verify_block(
        &self,
        block: &Block,
        previous_id: &BlockId,
    ) -> Result<(), BlockVerificationError>;
}

/// One verification run against one peer. Performs no writes anywhere;
/// callers decide what to do with the result.
pub struct Verifier {
    chain: Arc<dyn ChainLookup>,
    peer: Arc<dyn PeerChain>,
    blocks: Arc<dyn BlockVerifier>,

    /// Ids of blocks that already passed cryptographic verification,
    /// shared across runs so re-verifications are cheap
    verified_ids: Arc<Mutex<CappedSet<BlockId>>>,

    n_ary: usize,
    delegates_per_round: u64,
}

impl Verifier {
    pub fn new(
        chain: Arc<dyn ChainLookup>,
        peer: Arc<dyn PeerChain>,
        blocks: Arc<dyn BlockVerifier>,
        verified_ids: Arc<Mutex<CappedSet<BlockId>>>,
        n_ary: usize,
        delegates_per_round: u64,
    ) -> Self {
        Self {
            chain,
            peer,
            blocks,
            verified_ids,
            n_ary,
            delegates_per_round,
        }
    }

    /// Verify the peer's claimed state against our chain.
    ///
    /// A confirmed fork is a normal outcome and still produces a result;
    /// an error means the peer could not be judged at all and must not be
    /// treated as either forked or agreeing.
    pub async fn verify(&self, claimed: &PeerState) -> Result<PeerVerificationResult, VerifyError> {
        let header = claimed.header.as_ref().ok_or_else(|| {
            VerifyError::BogusReply("status report carries no block header".into())
        })?;
        if header.height != claimed.height {
            return Err(VerifyError::BogusReply(format!(
                "reported height {} does not match header height {}",
                claimed.height, header.height
            )));
        }
        if claimed.height == 0 {
            return Err(VerifyError::BogusReply("peer reports an empty chain".into()));
        }

        let our = self.chain.last_block_header().await?;
        let our_height = our.height;
        let peer_height = claimed.height;
        if our_height == 0 {
            return Err(VerifyError::Communication(anyhow!("local chain is empty")));
        }

        // Fast path: the claimed tip is already part of our chain, so the
        // peer is either identical or lagging behind on the same history.
        // No peer round trips needed.
        if peer_height <= our_height {
            let ids = self.chain.block_ids_at(&[peer_height]).await?;
            let ours_at = ids
                .into_iter()
                .next()
                .flatten()
                .ok_or_else(|| anyhow!("local chain has no block at height {peer_height}"))?;
            if ours_at == header.id {
                debug!(height = peer_height, "claimed tip is in our chain");
                return Ok(PeerVerificationResult {
                    our_height,
                    peer_height,
                    highest_common_height: peer_height,
                });
            }
        }

        // Locate the highest common height with a batched n-ary search;
        // each probe is one request to the peer
        let upper = our_height.min(peer_height);
        let mut probe = CommonHeightProbe {
            chain: self.chain.as_ref(),
            peer: self.peer.as_ref(),
        };
        let common = NSect::new(self.n_ary)
            .find(1, upper, &mut probe)
            .await
            .map_err(VerifyError::from_search_failure)?
            .ok_or(VerifyError::NoCommonBlocks)?;
        debug!(common, "highest common height located");

        // The peer says its chain continues past the common block; make it
        // prove the first stretch is genuine before we believe the fork
        self.verify_peer_blocks(common, peer_height).await?;

        Ok(PeerVerificationResult {
            our_height,
            peer_height,
            highest_common_height: common,
        })
    }

    /// Fetch and cryptographically verify the peer's blocks just above the
    /// common height, up to the end of that round. The cap matters: past the
    /// round boundary the delegate schedules of the two chains can
    /// legitimately differ, so nothing further can be checked here.
    async fn verify_peer_blocks(&self, common: u64, peer_height: u64) -> Result<(), VerifyError> {
        let start = common + 1;
        if start > peer_height {
            return Ok(());
        }

        let round = rounds::round_of(start, self.delegates_per_round);
        let end = peer_height.min(rounds::last_height_in_round(round, self.delegates_per_round));

        let ids = self.chain.block_ids_at(&[common]).await?;
        let mut previous_id = ids
            .into_iter()
            .next()
            .flatten()
            .ok_or_else(|| anyhow!("local chain has no block at height {common}"))?;

        let count = end - start + 1;
        let blocks = self.peer.blocks_from(start, count).await?;
        if blocks.len() as u64 > count {
            return Err(VerifyError::BogusReply(format!(
                "asked for {count} blocks, got {}",
                blocks.len()
            )));
        }

        for (offset, block) in blocks.iter().enumerate() {
            let expected = start + offset as u64;
            if block.height != expected {
                return Err(VerifyError::BogusReply(format!(
                    "expected block at height {expected}, got height {}",
                    block.height
                )));
            }
            let already_verified = self.verified_ids.lock().unwrap().contains(&block.id);
            if !already_verified {
                self.blocks.verify_block(block, &previous_id).map_err(|source| {
                    VerifyError::BlockVerification {
                        height: expected,
                        source,
                    }
                })?;
                self.verified_ids.lock().unwrap().insert(block.id);
            }
            previous_id = block.id;
        }

        if (blocks.len() as u64) < count {
            return Err(VerifyError::BogusReply(format!(
                "peer claims height {peer_height} but produced only {} of {count} blocks from height {start}",
                blocks.len()
            )));
        }

        Ok(())
    }
}

/// The batched-search probe: "of these heights, which is the highest where
/// the peer's block id equals ours?" The peer only ever sees height lists;
/// id equality is judged locally.
struct CommonHeightProbe<'a> {
    chain: &'a dyn ChainLookup,
    peer: &'a dyn PeerChain,
}

#[async_trait]
impl Probe for CommonHeightProbe<'_> {
    async fn probe(&mut self, heights: &[u64]) -> Result<Option<u64>> {
        let ours = self.chain.block_ids_at(heights).await?;
        if ours.len() != heights.len() {
            bail!("chain store returned {} ids for {} heights", ours.len(), heights.len());
        }

        let theirs = self.peer.block_headers_at(heights).await?;
        if theirs.len() != heights.len() {
            return Err(anyhow::Error::new(VerifyError::BogusReply(format!(
                "{} headers returned for {} requested heights",
                theirs.len(),
                heights.len()
            ))));
        }

        let mut highest = None;
        for ((height, ours), theirs) in heights.iter().zip(&ours).zip(&theirs) {
            let ours = ours
                .as_ref()
                .ok_or_else(|| anyhow!("local chain has no block at height {height}"))?;
            let Some(theirs) = theirs else {
                continue;
            };
            if theirs.height != *height {
                return Err(anyhow::Error::new(VerifyError::BogusReply(format!(
                    "header at height {} returned for requested height {height}",
                    theirs.height
                ))));
            }
            if theirs.id == *ours {
                highest = Some(*height);
            }
        }
        Ok(highest)
    }
}
