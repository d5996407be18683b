//! Last-known state of every connected peer, maintained from bus messages.

use std::collections::BTreeMap;

use agora_common::messages::{
    PeerDisconnectedMessage, PeerStatusMessage, PeerVerifiedMessage, VerificationOutcome,
};
use agora_common::Peer;
use tracing::debug;

/// Peer records keyed by address. Updates arrive from the transport layer
/// (status reports, disconnects) and from the verifier (outcomes); reads
/// take a snapshot so analysis never sees a half-applied update.
#[derive(Default)]
pub struct PeerRecords {
    peers: BTreeMap<String, Peer>,
}

impl PeerRecords {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a status report. A changed claim (height or header) invalidates
    /// any stored verification result - stale results must never be trusted
    /// across a height change.
    pub fn apply_status(&mut self, msg: &PeerStatusMessage) {
        let entry = self.peers.entry(msg.address()).or_insert_with(|| Peer {
            ip: msg.ip.clone(),
            port: msg.port,
            state: msg.state.clone(),
            verification: None,
        });
        if entry.state.height != msg.state.height || entry.state.header != msg.state.header {
            entry.verification = None;
        }
        entry.state = msg.state.clone();
    }

    /// Attach a verification outcome. Only applies if the peer is still
    /// known and still claims the state the verification ran against;
    /// failures attach nothing (an unverifiable peer stays unclassified).
    pub fn apply_verified(&mut self, msg: &PeerVerifiedMessage) {
        let address = format!("{}:{}", msg.ip, msg.port);
        let Some(entry) = self.peers.get_mut(&address) else {
            debug!("Verification outcome for unknown peer {address}");
            return;
        };
        if entry.state.height != msg.state.height || entry.state.header != msg.state.header {
            debug!("Verification outcome for outdated claim from {address}");
            return;
        }
        if let VerificationOutcome::Verified(result) = &msg.outcome {
            entry.verification = Some(*result);
        }
    }

    pub fn apply_disconnected(&mut self, msg: &PeerDisconnectedMessage) {
        self.peers.remove(&format!("{}:{}", msg.ip, msg.port));
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// A consistent copy of all records for one analysis pass
    pub fn snapshot(&self) -> Vec<Peer> {
        self.peers.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_common::{BlockHeader, BlockId, PeerState, PeerVerificationResult};

    fn status(ip: &str, height: u64, id_byte: u8) -> PeerStatusMessage {
        PeerStatusMessage {
            ip: ip.into(),
            port: 4000,
            state: PeerState {
                header: Some(BlockHeader {
                    id: BlockId::new([id_byte; 32]),
                    height,
                }),
                height,
                forging_allowed: true,
                current_slot: height,
            },
        }
    }

    fn verified(ip: &str, status: &PeerStatusMessage, common: u64) -> PeerVerifiedMessage {
        PeerVerifiedMessage {
            ip: ip.into(),
            port: 4000,
            state: status.state.clone(),
            outcome: VerificationOutcome::Verified(PeerVerificationResult {
                our_height: 10,
                peer_height: status.state.height,
                highest_common_height: common,
            }),
        }
    }

    #[test]
    fn tracks_status_reports() {
        let mut records = PeerRecords::new();
        records.apply_status(&status("10.0.0.1", 8, 1));
        records.apply_status(&status("10.0.0.2", 9, 2));
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn attaches_matching_verification() {
        let mut records = PeerRecords::new();
        let st = status("10.0.0.1", 8, 1);
        records.apply_status(&st);
        records.apply_verified(&verified("10.0.0.1", &st, 5));

        let snapshot = records.snapshot();
        assert_eq!(snapshot[0].verification.unwrap().highest_common_height, 5);
    }

    #[test]
    fn new_claim_invalidates_verification() {
        let mut records = PeerRecords::new();
        let st = status("10.0.0.1", 8, 1);
        records.apply_status(&st);
        records.apply_verified(&verified("10.0.0.1", &st, 5));
        records.apply_status(&status("10.0.0.1", 9, 3));

        let snapshot = records.snapshot();
        assert_eq!(snapshot[0].state.height, 9);
        assert!(snapshot[0].verification.is_none());
    }

    #[test]
    fn outdated_verification_is_dropped() {
        let mut records = PeerRecords::new();
        let old = status("10.0.0.1", 8, 1);
        records.apply_status(&old);
        records.apply_status(&status("10.0.0.1", 9, 3));
        // Outcome computed against the old claim arrives late
        records.apply_verified(&verified("10.0.0.1", &old, 5));

        assert!(records.snapshot()[0].verification.is_none());
    }

    #[test]
    fn disconnects_remove_the_record() {
        let mut records = PeerRecords::new();
        records.apply_status(&status("10.0.0.1", 8, 1));
        records.apply_disconnected(&PeerDisconnectedMessage {
            ip: "10.0.0.1".into(),
            port: 4000,
        });
        assert!(records.is_empty());
    }
}
