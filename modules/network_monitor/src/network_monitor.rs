//! Agora network monitor module for Caryatid
//! Aggregates every connected peer's state into a single forging-safety
//! classification, consumed by the forging loop before each slot

pub mod analyzer;
pub mod cold_start;
pub mod records;

use std::sync::Arc;

use agora_common::messages::{Message, NetworkStateMessage};
use agora_common::queries::network::{
    NetworkStateQuery, NetworkStateQueryResponse, DEFAULT_NETWORK_QUERY_TOPIC,
};
use agora_common::{BlockHeader, NetworkState, RuntimeMode};
use anyhow::Result;
use caryatid_sdk::{module, Context};
use config::Config;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::analyzer::analyze;
use crate::cold_start::ColdStartLatch;
use crate::records::PeerRecords;

const DEFAULT_PEER_STATUS_TOPIC: (&str, &str) = ("peer-status-topic", "agora.peer.status");
const DEFAULT_PEER_VERIFIED_TOPIC: (&str, &str) = ("peer-verified-topic", "agora.peer.verified");
const DEFAULT_PEER_DISCONNECTED_TOPIC: (&str, &str) =
    ("peer-disconnected-topic", "agora.peer.disconnected");
const DEFAULT_BLOCK_APPLIED_TOPIC: (&str, &str) = ("block-applied-topic", "agora.block.applied");
const DEFAULT_PUBLISH_STATE_TOPIC: (&str, &str) = ("publish-state-topic", "agora.network.state");
const DEFAULT_CLOCK_TICK_TOPIC: (&str, &str) = ("clock-tick-subscribe-topic", "clock.tick");

const DEFAULT_MINIMUM_NETWORK_REACH_KEY: &str = "minimum-network-reach";
const DEFAULT_MINIMUM_NETWORK_REACH: i64 = 2;

/// Publish a fresh classification every this many clock ticks (one forging
/// slot at the chain's 8-second block time)
const PUBLISH_EVERY_TICKS: u64 = 8;

/// State shared between the message loop and the query handler
struct MonitorState {
    records: PeerRecords,
    last_block: BlockHeader,
    latch: ColdStartLatch,
}

impl MonitorState {
    fn analyze(&mut self, mode: RuntimeMode, minimum_network_reach: usize) -> Result<NetworkState> {
        let peers = self.records.snapshot();
        analyze(&mut self.latch, mode, minimum_network_reach, &self.last_block, &peers)
    }
}

/// Network monitor module
#[module(
    message_type(Message),
    name = "network-monitor",
    description = "Peer network aggregation and forging-safety classification"
)]
pub struct NetworkMonitor;

impl NetworkMonitor {
    fn conf(config: &Arc<Config>, keydef: (&str, &str)) -> String {
        let actual = config.get_string(keydef.0).unwrap_or(keydef.1.to_string());
        info!("Parameter value '{}' for {}", actual, keydef.0);
        actual
    }

    pub async fn init(&self, context: Arc<Context<Message>>, config: Arc<Config>) -> Result<()> {
        let peer_status_topic = Self::conf(&config, DEFAULT_PEER_STATUS_TOPIC);
        let peer_verified_topic = Self::conf(&config, DEFAULT_PEER_VERIFIED_TOPIC);
        let peer_disconnected_topic = Self::conf(&config, DEFAULT_PEER_DISCONNECTED_TOPIC);
        let block_applied_topic = Self::conf(&config, DEFAULT_BLOCK_APPLIED_TOPIC);
        let publish_state_topic = Self::conf(&config, DEFAULT_PUBLISH_STATE_TOPIC);
        let clock_tick_topic = Self::conf(&config, DEFAULT_CLOCK_TICK_TOPIC);
        let network_query_topic = Self::conf(&config, DEFAULT_NETWORK_QUERY_TOPIC);

        let minimum_network_reach = config
            .get_int(DEFAULT_MINIMUM_NETWORK_REACH_KEY)
            .unwrap_or(DEFAULT_MINIMUM_NETWORK_REACH)
            .max(0) as usize;
        info!("Minimum network reach {minimum_network_reach}");

        let mode = config.get::<RuntimeMode>("mode").unwrap_or_default();
        info!("Runtime mode {mode:?}");

        let cold_start = config.get_bool("cold-start").unwrap_or(true);

        let mut status_subscription = context.subscribe(&peer_status_topic).await?;
        let mut verified_subscription = context.subscribe(&peer_verified_topic).await?;
        let mut disconnected_subscription = context.subscribe(&peer_disconnected_topic).await?;
        let mut block_subscription = context.subscribe(&block_applied_topic).await?;
        let mut clock_subscription = context.subscribe(&clock_tick_topic).await?;

        let state = Arc::new(Mutex::new(MonitorState {
            records: PeerRecords::new(),
            last_block: BlockHeader::default(),
            latch: ColdStartLatch::new(cold_start),
        }));

        // Answer network state queries from the forging loop
        let query_state = state.clone();
        context.handle(&network_query_topic, move |message| {
            let state = query_state.clone();
            async move {
                let Message::NetworkQuery(NetworkStateQuery::GetNetworkState) = message.as_ref()
                else {
                    return Arc::new(Message::NetworkQueryResponse(
                        NetworkStateQueryResponse::Error(
                            "Invalid message for network-monitor".into(),
                        ),
                    ));
                };

                let response = match state.lock().await.analyze(mode, minimum_network_reach) {
                    Ok(network_state) => NetworkStateQueryResponse::NetworkState(network_state),
                    Err(e) => {
                        error!("Network analysis failed: {e}");
                        NetworkStateQueryResponse::Error(e.to_string())
                    }
                };
                Arc::new(Message::NetworkQueryResponse(response))
            }
        });

        // Track peers and the local tip; publish a classification each slot
        context.clone().run(async move {
            loop {
                tokio::select! {
                    result = status_subscription.read() => {
                        let Ok((_, message)) = result else {
                            error!("Peer status subscription failed");
                            return;
                        };
                        if let Message::PeerStatus(status) = message.as_ref() {
                            state.lock().await.records.apply_status(status);
                        }
                    }

                    result = verified_subscription.read() => {
                        let Ok((_, message)) = result else {
                            error!("Peer verified subscription failed");
                            return;
                        };
                        if let Message::PeerVerified(verified) = message.as_ref() {
                            state.lock().await.records.apply_verified(verified);
                        }
                    }

                    result = disconnected_subscription.read() => {
                        let Ok((_, message)) = result else {
                            error!("Peer disconnected subscription failed");
                            return;
                        };
                        if let Message::PeerDisconnected(gone) = message.as_ref() {
                            state.lock().await.records.apply_disconnected(gone);
                        }
                    }

                    result = block_subscription.read() => {
                        let Ok((_, message)) = result else {
                            error!("Block applied subscription failed");
                            return;
                        };
                        if let Message::BlockApplied(applied) = message.as_ref() {
                            state.lock().await.last_block = applied.header.clone();
                        }
                    }

                    result = clock_subscription.read() => {
                        let Ok((_, message)) = result else {
                            error!("Clock subscription failed");
                            return;
                        };
                        if let Message::Clock(tick) = message.as_ref() {
                            if tick.number % PUBLISH_EVERY_TICKS != 0 {
                                continue;
                            }
                            let network_state =
                                match state.lock().await.analyze(mode, minimum_network_reach) {
                                    Ok(network_state) => network_state,
                                    Err(e) => {
                                        error!("Network analysis failed: {e}");
                                        continue;
                                    }
                                };
                            debug!(
                                status = ?network_state.status,
                                quorum = network_state.quorum(),
                                "network state"
                            );
                            let message = Arc::new(Message::NetworkState(NetworkStateMessage {
                                state: network_state,
                            }));
                            context
                                .message_bus
                                .publish(&publish_state_topic, message)
                                .await
                                .unwrap_or_else(|e| error!("Failed to publish network state: {e}"));
                        }
                    }
                }
            }
        });

        Ok(())
    }
}
