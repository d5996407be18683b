//! Production block verification: id, linkage, generator signature.

use agora_common::{crypto, Block, BlockId};

use crate::error::BlockVerificationError;
use crate::verifier::BlockVerifier;

pub struct Ed25519BlockVerifier;

impl BlockVerifier for Ed25519BlockVerifier {
    fn verify_block(
        &self,
        block: &Block,
        previous_id: &BlockId,
    ) -> Result<(), BlockVerificationError> {
        if block.previous_id != *previous_id {
            return Err(BlockVerificationError::BrokenLinkage);
        }

        let id = crypto::block_id(block.height, &block.previous_id, block.timestamp, &block.generator);
        if id != block.id {
            return Err(BlockVerificationError::IdMismatch);
        }

        match crypto::verify_signature(block.id.as_ref(), &block.signature, &block.generator) {
            Ok(true) => Ok(()),
            Ok(false) => Err(BlockVerificationError::BadSignature),
            Err(e) => Err(BlockVerificationError::Malformed(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEED: [u8; 32] = [5u8; 32];

    fn forged() -> (Block, BlockId) {
        let previous_id = BlockId::new([9; 32]);
        (crypto::forge_block(7, previous_id, 56, &SEED), previous_id)
    }

    #[test]
    fn accepts_a_well_formed_block() {
        let (block, previous_id) = forged();
        assert_eq!(Ed25519BlockVerifier.verify_block(&block, &previous_id), Ok(()));
    }

    #[test]
    fn rejects_broken_linkage() {
        let (block, _) = forged();
        let wrong = BlockId::new([8; 32]);
        assert_eq!(
            Ed25519BlockVerifier.verify_block(&block, &wrong),
            Err(BlockVerificationError::BrokenLinkage)
        );
    }

    #[test]
    fn rejects_tampered_contents() {
        let (mut block, previous_id) = forged();
        block.timestamp += 1;
        assert_eq!(
            Ed25519BlockVerifier.verify_block(&block, &previous_id),
            Err(BlockVerificationError::IdMismatch)
        );
    }

    #[test]
    fn rejects_a_bad_signature() {
        let (mut block, previous_id) = forged();
        block.signature[0] ^= 0xff;
        assert_eq!(
            Ed25519BlockVerifier.verify_block(&block, &previous_id),
            Err(BlockVerificationError::BadSignature)
        );
    }

    #[test]
    fn rejects_malformed_key_material() {
        let (mut block, previous_id) = forged();
        block.generator.truncate(5);
        // The id must commit to the truncated key or we fail on IdMismatch first
        block.id = crypto::block_id(block.height, &block.previous_id, block.timestamp, &block.generator);
        assert!(matches!(
            Ed25519BlockVerifier.verify_block(&block, &previous_id),
            Err(BlockVerificationError::Malformed(_))
        ));
    }
}
