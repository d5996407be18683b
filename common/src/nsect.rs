//! Batched n-ary boundary search.
//!
//! Finds the largest index in `[lo, hi]` satisfying a monotonic descending
//! predicate (true up to some cutoff, false after), evaluating the predicate
//! only through a batched asynchronous probe. Each probe models one network
//! round trip, so the optimisation target is the number of probes, not
//! comparisons: every round asks about up to `n_ary` indexes at once and
//! collapses the candidate range by a factor of about `n_ary + 1`.

use anyhow::{bail, Result};
use async_trait::async_trait;

/// One batched evaluation of the predicate against an external oracle.
///
/// Given an ascending list of candidate indexes, returns the largest one for
/// which the predicate holds, or `None` if it holds for none of them. Oracle
/// failures (disconnects, malformed replies, cancellation) are returned as
/// errors and propagated verbatim out of [`NSect::find`] - they are never
/// folded into `None`.
#[async_trait]
pub trait Probe: Send {
    async fn probe(&mut self, indexes: &[u64]) -> Result<Option<u64>>;
}

pub struct NSect {
    n_ary: u64,
}

impl NSect {
    /// `n_ary` is the maximum batch size per probe; at least 2.
    pub fn new(n_ary: usize) -> Self {
        assert!(n_ary >= 2, "n-ary search needs a batch size of at least 2");
        Self {
            n_ary: n_ary as u64,
        }
    }

    /// Find the largest index in `[lo, hi]` (inclusive) for which the
    /// predicate holds, or `None` if it holds nowhere in the range.
    ///
    /// The result is always exact and always an index some probe confirmed;
    /// a range no larger than the batch size resolves in a single probe.
    pub async fn find(
        &self,
        mut lo: u64,
        mut hi: u64,
        probe: &mut dyn Probe,
    ) -> Result<Option<u64>> {
        if lo > hi {
            bail!("empty search range [{lo}, {hi}]");
        }

        // Highest index confirmed true so far
        let mut best: Option<u64> = None;

        loop {
            let len = hi - lo + 1;

            if len <= self.n_ary {
                // The whole remaining range fits in one batch - probe every
                // candidate and the reply is the final answer.
                let indexes: Vec<u64> = (lo..=hi).collect();
                return match probe.probe(&indexes).await? {
                    Some(found) => {
                        if !indexes.contains(&found) {
                            bail!("probe returned index {found} which was not asked about");
                        }
                        Ok(Some(found))
                    }
                    None => Ok(best),
                };
            }

            // Evenly spaced interior points; spacing >= 1 because len > n_ary
            let indexes: Vec<u64> =
                (1..=self.n_ary).map(|i| lo + i * len / (self.n_ary + 1)).collect();

            match probe.probe(&indexes).await? {
                None => {
                    // Everything probed is false - the boundary, if any, is
                    // below the first probed point
                    hi = indexes[0] - 1;
                }
                Some(found) => {
                    let Some(pos) = indexes.iter().position(|&i| i == found) else {
                        bail!("probe returned index {found} which was not asked about");
                    };
                    best = Some(found);
                    // The next probed point (if any) is known false, so the
                    // boundary lies strictly between the two
                    if pos + 1 < indexes.len() {
                        hi = indexes[pos + 1] - 1;
                    }
                    lo = found + 1;
                    if lo > hi {
                        return Ok(best);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Probe over an in-memory cutoff: predicate is true for indexes <= cutoff.
    struct CutoffProbe {
        cutoff: Option<u64>,
        calls: usize,
        batch_limit: usize,
    }

    impl CutoffProbe {
        fn new(cutoff: Option<u64>, batch_limit: usize) -> Self {
            Self {
                cutoff,
                calls: 0,
                batch_limit,
            }
        }
    }

    #[async_trait]
    impl Probe for CutoffProbe {
        async fn probe(&mut self, indexes: &[u64]) -> Result<Option<u64>> {
            self.calls += 1;
            assert!(
                indexes.len() <= self.batch_limit,
                "batch of {} exceeds capacity {}",
                indexes.len(),
                self.batch_limit
            );
            assert!(indexes.windows(2).all(|w| w[0] < w[1]), "indexes not ascending");
            Ok(self
                .cutoff
                .and_then(|c| indexes.iter().rev().copied().find(|&i| i <= c)))
        }
    }

    async fn search(n_ary: usize, lo: u64, hi: u64, cutoff: Option<u64>) -> (Option<u64>, usize) {
        let mut probe = CutoffProbe::new(cutoff, n_ary);
        let found = NSect::new(n_ary).find(lo, hi, &mut probe).await.unwrap();
        (found, probe.calls)
    }

    #[tokio::test]
    async fn finds_exact_boundary_for_every_cutoff() {
        for n_ary in [2, 3, 8, 20] {
            for cutoff in 1..=60 {
                let (found, _) = search(n_ary, 1, 60, Some(cutoff)).await;
                assert_eq!(found, Some(cutoff), "n_ary={n_ary} cutoff={cutoff}");
            }
        }
    }

    #[tokio::test]
    async fn none_when_predicate_false_everywhere() {
        for n_ary in [2, 8] {
            let (found, _) = search(n_ary, 10, 500, None).await;
            assert_eq!(found, None);
            // Cutoff below the range is indistinguishable from false-everywhere
            let (found, _) = search(n_ary, 10, 500, Some(9)).await;
            assert_eq!(found, None);
        }
    }

    #[tokio::test]
    async fn top_of_range_when_predicate_true_everywhere() {
        let (found, _) = search(8, 1, 1_000_000, Some(u64::MAX)).await;
        assert_eq!(found, Some(1_000_000));
    }

    #[tokio::test]
    async fn single_probe_when_range_fits_in_one_batch() {
        let (found, calls) = search(8, 1, 8, Some(5)).await;
        assert_eq!(found, Some(5));
        assert_eq!(calls, 1);

        let (found, calls) = search(8, 42, 42, None).await;
        assert_eq!(found, None);
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn round_trips_shrink_with_wider_batches() {
        let (_, narrow) = search(2, 1, 100_000, Some(70_123)).await;
        let (_, wide) = search(20, 1, 100_000, Some(70_123)).await;
        assert!(
            wide < narrow,
            "20-ary used {wide} probes, binary-ish used {narrow}"
        );
    }

    #[tokio::test]
    async fn empty_range_is_an_error() {
        let mut probe = CutoffProbe::new(Some(5), 8);
        assert!(NSect::new(8).find(10, 9, &mut probe).await.is_err());
        assert_eq!(probe.calls, 0);
    }

    /// Probe that fails on the second call, as a disconnecting peer would.
    struct FailingProbe {
        calls: usize,
    }

    #[async_trait]
    impl Probe for FailingProbe {
        async fn probe(&mut self, indexes: &[u64]) -> Result<Option<u64>> {
            self.calls += 1;
            if self.calls > 1 {
                bail!("peer disconnected");
            }
            Ok(indexes.first().copied())
        }
    }

    #[tokio::test]
    async fn probe_failure_propagates_without_retries() {
        let mut probe = FailingProbe { calls: 0 };
        let err = NSect::new(4).find(1, 1000, &mut probe).await.unwrap_err();
        assert!(err.to_string().contains("peer disconnected"));
        assert_eq!(probe.calls, 2);
    }

    /// Probe that replies with an index it was never asked about.
    struct LyingProbe;

    #[async_trait]
    impl Probe for LyingProbe {
        async fn probe(&mut self, indexes: &[u64]) -> Result<Option<u64>> {
            Ok(Some(indexes[0] + 1_000_000))
        }
    }

    #[tokio::test]
    async fn unrequested_reply_is_rejected() {
        let mut probe = LyingProbe;
        assert!(NSect::new(4).find(1, 1000, &mut probe).await.is_err());
        // Also on the final, full-range batch
        assert!(NSect::new(4).find(1, 3, &mut probe).await.is_err());
    }
}
