//! Classification of the peer network into a forging-safety verdict.
//!
//! Pure over its inputs: one snapshot of peer records and the local tip in,
//! one `NetworkState` out. The only side effect is releasing the cold-start
//! latch, which happens at most once.

use agora_common::{BlockHeader, NetworkState, NetworkStateStatus, Peer, RuntimeMode};
use anyhow::Result;
use tracing::debug;

use crate::cold_start::ColdStartMonitor;

/// Decision order, first match wins:
/// cold start, test mode, below minimum peers, quorum evaluation.
pub fn analyze(
    monitor: &mut dyn ColdStartMonitor,
    mode: RuntimeMode,
    minimum_network_reach: usize,
    last_block: &BlockHeader,
    peers: &[Peer],
) -> Result<NetworkState> {
    if monitor.is_cold_start() {
        monitor.complete_cold_start()?;
        return Ok(NetworkState::with_status(NetworkStateStatus::ColdStart, last_block));
    }

    if mode == RuntimeMode::Test {
        return Ok(NetworkState::with_status(NetworkStateStatus::Test, last_block));
    }

    if peers.len() < minimum_network_reach {
        debug!(
            peers = peers.len(),
            minimum_network_reach, "not enough peers for a meaningful sample"
        );
        return Ok(NetworkState::with_status(NetworkStateStatus::BelowMinimumPeers, last_block));
    }

    let mut state = NetworkState::with_status(NetworkStateStatus::Default, last_block);
    for peer in peers {
        if peer.state.height > last_block.height {
            // Overheight peers cannot be judged against our shorter chain;
            // they count against the quorum and their headers are surfaced
            // so the forging loop can see what they claim
            state.peers_no_quorum += 1;
            if let Some(header) = &peer.state.header {
                state.over_height_block_headers.push(header.clone());
            }
        } else if peer.verification.as_ref().is_some_and(|v| v.forked()) {
            state.peers_no_quorum += 1;
            state.peers_forked += 1;
        } else {
            // Same-height peers and peers behind us that are not known to
            // be forked agree with our history
            state.peers_quorum += 1;
        }
    }
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cold_start::ColdStartLatch;
    use agora_common::{BlockId, PeerState, PeerVerificationResult};
    use anyhow::bail;

    fn last_block(height: u64) -> BlockHeader {
        BlockHeader {
            id: BlockId::new([42; 32]),
            height,
        }
    }

    fn peer(ip: &str, height: u64, verification: Option<PeerVerificationResult>) -> Peer {
        Peer {
            ip: ip.into(),
            port: 4000,
            state: PeerState {
                header: Some(BlockHeader {
                    id: BlockId::new([height as u8; 32]),
                    height,
                }),
                height,
                forging_allowed: true,
                current_slot: height,
            },
            verification,
        }
    }

    fn forked(our: u64, theirs: u64, common: u64) -> Option<PeerVerificationResult> {
        Some(PeerVerificationResult {
            our_height: our,
            peer_height: theirs,
            highest_common_height: common,
        })
    }

    fn released() -> ColdStartLatch {
        ColdStartLatch::new(false)
    }

    #[test]
    fn cold_start_wins_and_completes_once() {
        struct CountingLatch {
            active: bool,
            completions: usize,
        }
        impl ColdStartMonitor for CountingLatch {
            fn is_cold_start(&self) -> bool {
                self.active
            }
            fn complete_cold_start(&mut self) -> Result<()> {
                self.active = false;
                self.completions += 1;
                Ok(())
            }
        }

        let mut latch = CountingLatch {
            active: true,
            completions: 0,
        };
        let state =
            analyze(&mut latch, RuntimeMode::Production, 2, &last_block(8), &[]).unwrap();
        assert_eq!(state.status, NetworkStateStatus::ColdStart);
        assert_eq!(latch.completions, 1);

        // Released now; the next analysis moves on to the other rules
        let state =
            analyze(&mut latch, RuntimeMode::Production, 2, &last_block(8), &[]).unwrap();
        assert_ne!(state.status, NetworkStateStatus::ColdStart);
        assert_eq!(latch.completions, 1);
    }

    #[test]
    fn completion_failure_propagates() {
        struct BrokenLatch;
        impl ColdStartMonitor for BrokenLatch {
            fn is_cold_start(&self) -> bool {
                true
            }
            fn complete_cold_start(&mut self) -> Result<()> {
                bail!("persistence failure")
            }
        }

        let err = analyze(&mut BrokenLatch, RuntimeMode::Production, 2, &last_block(8), &[])
            .unwrap_err();
        assert!(err.to_string().contains("persistence failure"));
    }

    #[test]
    fn test_mode_disables_safety_checks() {
        let state = analyze(&mut released(), RuntimeMode::Test, 2, &last_block(8), &[]).unwrap();
        assert_eq!(state.status, NetworkStateStatus::Test);
    }

    #[test]
    fn too_few_peers_blocks_forging() {
        let peers = vec![peer("10.0.0.1", 8, None)];
        let state =
            analyze(&mut released(), RuntimeMode::Production, 2, &last_block(8), &peers).unwrap();
        assert_eq!(state.status, NetworkStateStatus::BelowMinimumPeers);
    }

    #[test]
    fn quorum_counts_agreeing_peers() {
        // Own height 8; peers at 9 (overheight), 8, 8, 6 (forked), 6 (fine)
        let peers = vec![
            peer("10.0.0.1", 9, None),
            peer("10.0.0.2", 8, None),
            peer("10.0.0.3", 8, None),
            peer("10.0.0.4", 6, forked(8, 6, 4)),
            peer("10.0.0.5", 6, forked(8, 6, 6)),
        ];
        let state =
            analyze(&mut released(), RuntimeMode::Production, 2, &last_block(8), &peers).unwrap();

        assert_eq!(state.status, NetworkStateStatus::Default);
        assert_eq!(state.peers_quorum, 3);
        assert_eq!(state.peers_no_quorum, 2);
        assert_eq!(state.peers_forked, 1);
        assert_eq!(state.quorum(), 3.0 / 5.0);
        assert_eq!(state.peers_quorum + state.peers_no_quorum, peers.len());

        // Exactly the height-9 peer's header is surfaced
        assert_eq!(state.over_height_block_headers.len(), 1);
        assert_eq!(state.over_height_block_headers[0].height, 9);
    }

    #[test]
    fn unverified_laggards_count_toward_quorum() {
        let peers = vec![peer("10.0.0.1", 5, None), peer("10.0.0.2", 8, None)];
        let state =
            analyze(&mut released(), RuntimeMode::Production, 2, &last_block(8), &peers).unwrap();
        assert_eq!(state.peers_quorum, 2);
        assert_eq!(state.quorum(), 1.0);
    }

    #[test]
    fn zero_peers_with_zero_reach_is_vacuously_safe() {
        let state =
            analyze(&mut released(), RuntimeMode::Production, 0, &last_block(8), &[]).unwrap();
        assert_eq!(state.status, NetworkStateStatus::Default);
        assert_eq!(state.quorum(), 1.0);
    }

    #[test]
    fn analysis_is_idempotent_over_unchanged_inputs() {
        let peers = vec![
            peer("10.0.0.1", 9, None),
            peer("10.0.0.2", 8, None),
            peer("10.0.0.4", 6, forked(8, 6, 4)),
        ];
        let a = analyze(&mut released(), RuntimeMode::Production, 2, &last_block(8), &peers)
            .unwrap();
        let b = analyze(&mut released(), RuntimeMode::Production, 2, &last_block(8), &peers)
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn snapshot_fields_reflect_the_local_tip() {
        let state =
            analyze(&mut released(), RuntimeMode::Production, 0, &last_block(8), &[]).unwrap();
        assert_eq!(state.node_height, 8);
        assert_eq!(state.last_block_id, BlockId::new([42; 32]));
    }
}
