use thiserror::Error;

/// Why a single peer block failed cryptographic verification
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BlockVerificationError {
    #[error("block id does not match its contents")]
    IdMismatch,

    #[error("block does not link to the previous block")]
    BrokenLinkage,

    #[error("generator signature does not verify")]
    BadSignature,

    #[error("malformed block: {0}")]
    Malformed(String),
}

/// Why a verification run produced no result. None of these mean
/// "not forked" - a peer that cannot be verified stays unclassified.
#[derive(Debug, Error)]
pub enum VerifyError {
    /// Chains disagree even at height 1. Either side of an irrecoverable
    /// network partition; reported upward, never treated as routine.
    #[error("no common blocks with peer - chains disagree from the start")]
    NoCommonBlocks,

    /// The peer answered with data we did not ask for, or claimed blocks it
    /// then failed to produce
    #[error("bogus reply from peer: {0}")]
    BogusReply(String),

    #[error("peer block at height {height} failed verification: {source}")]
    BlockVerification {
        height: u64,
        source: BlockVerificationError,
    },

    #[error("verification timed out")]
    Timeout,

    /// Transport-level failure talking to the peer or the chain store
    #[error(transparent)]
    Communication(#[from] anyhow::Error),
}

impl VerifyError {
    /// Recover a typed error that travelled through an `anyhow` boundary
    /// (the batched search propagates probe failures as `anyhow::Error`).
    pub fn from_search_failure(err: anyhow::Error) -> Self {
        match err.downcast::<VerifyError>() {
            Ok(typed) => typed,
            Err(err) => VerifyError::Communication(err),
        }
    }
}
