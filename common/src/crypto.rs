//! Common cryptography helper functions for Agora

use crate::hash::BlockId;
use crate::types::{Block, PublicKey, Signature};
use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use sha2::{Digest, Sha256};

/// Structural problems with key or signature material. Distinct from a
/// signature that simply does not verify.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("malformed public key ({0} bytes)")]
    MalformedPublicKey(usize),

    #[error("malformed signature ({0} bytes)")]
    MalformedSignature(usize),
}

/// Digest of a block's signable fields; doubles as the block id.
pub fn block_id(height: u64, previous_id: &BlockId, timestamp: u64, generator: &[u8]) -> BlockId {
    let mut hasher = Sha256::new();
    hasher.update(height.to_be_bytes());
    hasher.update(previous_id.as_bytes());
    hasher.update(timestamp.to_be_bytes());
    hasher.update(generator);
    BlockId::new(hasher.finalize().into())
}

/// Verify an ed25519 signature. `Ok(false)` means the signature is well
/// formed but does not verify; `Err` means the material is malformed.
pub fn verify_signature(
    message: &[u8],
    signature: &[u8],
    public_key: &[u8],
) -> Result<bool, CryptoError> {
    let key_bytes: [u8; 32] = public_key
        .try_into()
        .map_err(|_| CryptoError::MalformedPublicKey(public_key.len()))?;
    let key = VerifyingKey::from_bytes(&key_bytes)
        .map_err(|_| CryptoError::MalformedPublicKey(public_key.len()))?;
    let sig_bytes: [u8; 64] = signature
        .try_into()
        .map_err(|_| CryptoError::MalformedSignature(signature.len()))?;
    let sig = ed25519_dalek::Signature::from_bytes(&sig_bytes);
    Ok(key.verify_strict(message, &sig).is_ok())
}

/// Sign a message with the key derived from `seed`, returning the signature
/// and the corresponding public key. Used by the forging side and by tests
/// that fabricate peer chains.
pub fn sign_message(message: &[u8], seed: &[u8; 32]) -> (Signature, PublicKey) {
    let key = SigningKey::from_bytes(seed);
    let signature = key.sign(message);
    (
        signature.to_bytes().to_vec(),
        key.verifying_key().to_bytes().to_vec(),
    )
}

/// Build a correctly-identified, correctly-signed block on top of
/// `previous_id`, forged by the delegate with the given key seed.
pub fn forge_block(height: u64, previous_id: BlockId, timestamp: u64, seed: &[u8; 32]) -> Block {
    let key = SigningKey::from_bytes(seed);
    let generator = key.verifying_key().to_bytes().to_vec();
    let id = block_id(height, &previous_id, timestamp, &generator);
    let signature = key.sign(id.as_ref()).to_bytes().to_vec();
    Block {
        id,
        height,
        previous_id,
        timestamp,
        generator,
        signature,
    }
}
