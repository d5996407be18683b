//! Cache of verification results, keyed by the peer's claimed state.
//!
//! A result is only valid for the exact (height, header id) the peer claimed
//! when it was computed; any new claim misses and forces re-verification.
//! Stale results must never be trusted across a height change.

use std::collections::{HashMap, VecDeque};

use agora_common::{BlockId, PeerState, PeerVerificationResult};

struct CacheEntry {
    height: u64,
    header_id: BlockId,
    result: PeerVerificationResult,
}

pub struct VerificationCache {
    capacity: usize,
    order: VecDeque<String>,
    entries: HashMap<String, CacheEntry>,
}

impl VerificationCache {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be positive");
        Self {
            capacity,
            order: VecDeque::new(),
            entries: HashMap::new(),
        }
    }

    /// The cached result for this peer, if it was computed against the same
    /// claimed height and header id.
    pub fn lookup(&self, address: &str, state: &PeerState) -> Option<PeerVerificationResult> {
        let entry = self.entries.get(address)?;
        let header = state.header.as_ref()?;
        (entry.height == state.height && entry.header_id == header.id).then_some(entry.result)
    }

    pub fn store(&mut self, address: &str, state: &PeerState, result: PeerVerificationResult) {
        let Some(header) = state.header.as_ref() else {
            return;
        };
        if !self.entries.contains_key(address) {
            self.order.push_back(address.to_string());
            if self.order.len() > self.capacity {
                if let Some(oldest) = self.order.pop_front() {
                    self.entries.remove(&oldest);
                }
            }
        }
        self.entries.insert(
            address.to_string(),
            CacheEntry {
                height: state.height,
                header_id: header.id,
                result,
            },
        );
    }

    pub fn remove(&mut self, address: &str) {
        if self.entries.remove(address).is_some() {
            self.order.retain(|a| a != address);
        }
    }
}
