//! Agora peer verifier module for Caryatid
//! Locates where a peer's claimed chain diverges from ours and checks that
//! the divergence is genuine before anyone calls the peer forked

pub mod block_verifier;
pub mod cache;
pub mod error;
pub mod verifier;

mod bus;
mod configuration;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use agora_common::capped_set::CappedSet;
use agora_common::messages::{
    Message, PeerStatusMessage, PeerVerifiedMessage, VerificationOutcome,
};
use agora_common::BlockId;
use anyhow::Result;
use caryatid_sdk::{module, Context};
use config::Config;
use tokio::time::timeout;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::block_verifier::Ed25519BlockVerifier;
use crate::bus::{BusChainLookup, BusPeerChain};
use crate::cache::VerificationCache;
use crate::configuration::VerifierConfig;
use crate::error::VerifyError;
use crate::verifier::Verifier;

/// Peer verifier module
#[module(
    message_type(Message),
    name = "peer-verifier",
    description = "Fork-point discovery and peer chain verification"
)]
pub struct PeerVerifier;

impl PeerVerifier {
    pub async fn init(&self, context: Arc<Context<Message>>, config: Arc<Config>) -> Result<()> {
        let cfg = VerifierConfig::try_load(&config)?;
        info!("Creating peer status subscriber on '{}'", cfg.peer_status_topic);
        info!("Publishing verification outcomes on '{}'", cfg.publish_verified_topic);

        let mut status_subscription = context.subscribe(&cfg.peer_status_topic).await?;

        context.clone().run(async move {
            let chain = Arc::new(BusChainLookup::new(context.clone(), cfg.chain_query_topic.clone()));
            let verified_ids = Arc::new(Mutex::new(CappedSet::new(cfg.verified_blocks_cache_size)));
            let mut results = VerificationCache::new(cfg.result_cache_size);

            loop {
                let Ok((_, message)) = status_subscription.read().await else {
                    error!("Peer status subscription failed");
                    return;
                };

                match message.as_ref() {
                    Message::PeerStatus(status) => {
                        let span = info_span!("peer_verify", peer = %status.address());
                        Self::handle_status(
                            &context,
                            &cfg,
                            &chain,
                            &verified_ids,
                            &mut results,
                            status,
                        )
                        .instrument(span)
                        .await;
                    }
                    Message::PeerDisconnected(gone) => {
                        results.remove(&format!("{}:{}", gone.ip, gone.port));
                    }
                    _ => debug!("Ignoring unexpected message on peer status topic"),
                }
            }
        });

        Ok(())
    }

    async fn handle_status(
        context: &Arc<Context<Message>>,
        cfg: &VerifierConfig,
        chain: &Arc<BusChainLookup>,
        verified_ids: &Arc<Mutex<CappedSet<BlockId>>>,
        results: &mut VerificationCache,
        status: &PeerStatusMessage,
    ) {
        let outcome = if let Some(result) = results.lookup(&status.address(), &status.state) {
            debug!("Already verified against this claimed state");
            VerificationOutcome::Verified(result)
        } else {
            let peer = Arc::new(BusPeerChain::new(
                context.clone(),
                cfg.peer_query_topic.clone(),
                status.ip.clone(),
                status.port,
            ));
            let verifier = Verifier::new(
                chain.clone(),
                peer,
                Arc::new(Ed25519BlockVerifier),
                verified_ids.clone(),
                cfg.n_ary,
                cfg.delegates_per_round,
            );

            let deadline = Duration::from_secs(cfg.verification_timeout);
            let verdict = match timeout(deadline, verifier.verify(&status.state)).await {
                Ok(verdict) => verdict,
                Err(_) => Err(VerifyError::Timeout),
            };

            match verdict {
                Ok(result) => {
                    results.store(&status.address(), &status.state, result);
                    if result.forked() {
                        info!(
                            common = result.highest_common_height,
                            peer_height = result.peer_height,
                            "Peer is on a different chain"
                        );
                    } else {
                        debug!(
                            common = result.highest_common_height,
                            "Peer chain agrees with ours"
                        );
                    }
                    VerificationOutcome::Verified(result)
                }
                Err(e) => {
                    warn!("Could not verify peer: {e}");
                    VerificationOutcome::Unverifiable(e.to_string())
                }
            }
        };

        let message = Arc::new(Message::PeerVerified(PeerVerifiedMessage {
            ip: status.ip.clone(),
            port: status.port,
            state: status.state.clone(),
            outcome,
        }));
        context
            .message_bus
            .publish(&cfg.publish_verified_topic, message)
            .await
            .unwrap_or_else(|e| error!("Failed to publish verification outcome: {e}"));
    }
}
