//! Cold start tracking: the bootstrap window during which the node has not
//! yet gathered enough peer data to judge the network at all.

use anyhow::Result;

pub trait ColdStartMonitor: Send {
    fn is_cold_start(&self) -> bool;

    /// One-time transition out of cold start. Failure here propagates to
    /// the caller - staying silently stuck in cold start is worse than
    /// failing loudly.
    fn complete_cold_start(&mut self) -> Result<()>;
}

/// Default monitor: a latch armed at startup (from config) and released by
/// the first network analysis.
pub struct ColdStartLatch {
    active: bool,
}

impl ColdStartLatch {
    pub fn new(active: bool) -> Self {
        Self { active }
    }
}

impl ColdStartMonitor for ColdStartLatch {
    fn is_cold_start(&self) -> bool {
        self.active
    }

    fn complete_cold_start(&mut self) -> Result<()> {
        self.active = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latch_releases_once() {
        let mut latch = ColdStartLatch::new(true);
        assert!(latch.is_cold_start());
        latch.complete_cold_start().unwrap();
        assert!(!latch.is_cold_start());
    }

    #[test]
    fn latch_can_start_released() {
        let latch = ColdStartLatch::new(false);
        assert!(!latch.is_cold_start());
    }
}
