//! Validator and notary attestations.
//!
//! Both kinds are plain secp256k1 signatures recoverable to a remote-style
//! address, so the remote contract and the local verification path share
//! one scheme.

use std::collections::HashSet;

use alloy::primitives::{Address, Signature, B256};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::SignerSync;
use serde::{Deserialize, Serialize};

use super::commitment::attestation_digest;

#[derive(Debug, thiserror::Error)]
pub enum SignError {
    #[error("signing failed: {0}")]
    Signer(#[from] alloy::signers::Error),

    #[error("malformed signature bytes: {0}")]
    Malformed(String),
}

/// An oracle's signature over a block's canonical identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockAttestation {
    pub signer: Address,
    pub signature: Signature,
}

impl BlockAttestation {
    pub fn sign(
        key: &PrivateKeySigner,
        receipts_root: B256,
        block_number: u64,
    ) -> Result<Self, SignError> {
        let digest = attestation_digest(receipts_root, block_number);
        let signature = key.sign_hash_sync(&digest)?;
        Ok(Self {
            signer: key.address(),
            signature,
        })
    }

    /// True when the signature recovers to the claimed signer for this
    /// exact root and block number.
    pub fn verify(&self, receipts_root: B256, block_number: u64) -> bool {
        let digest = attestation_digest(receipts_root, block_number);
        self.signature
            .recover_address_from_prehash(&digest)
            .map(|recovered| recovered == self.signer)
            .unwrap_or(false)
    }
}

/// Count attestations that verify against the given root and recover to
/// distinct approved validators. Ordering is irrelevant and duplicates
/// count once.
pub fn count_distinct_valid(
    attestations: &[BlockAttestation],
    receipts_root: B256,
    block_number: u64,
    approved: &[Address],
) -> usize {
    let mut seen: HashSet<Address> = HashSet::new();
    for attestation in attestations {
        if approved.contains(&attestation.signer)
            && attestation.verify(receipts_root, block_number)
        {
            seen.insert(attestation.signer);
        }
    }
    seen.len()
}

/// A notary's signature over the draft transaction, in the fixed byte
/// layout the remote contract verifies: `swap_id || notary || signature`.
/// The draft hash equals the swap id, so the digest is the id itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotarySignature {
    pub swap_id: B256,
    pub notary: Address,
    pub signature: Signature,
}

/// 32-byte id + 20-byte address + 65-byte signature.
const NOTARY_SIGNATURE_LEN: usize = 117;

impl NotarySignature {
    pub fn sign(key: &PrivateKeySigner, swap_id: B256) -> Result<Self, SignError> {
        let signature = key.sign_hash_sync(&swap_id)?;
        Ok(Self {
            swap_id,
            notary: key.address(),
            signature,
        })
    }

    pub fn verify(&self) -> bool {
        self.signature
            .recover_address_from_prehash(&self.swap_id)
            .map(|recovered| recovered == self.notary)
            .unwrap_or(false)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(NOTARY_SIGNATURE_LEN);
        out.extend_from_slice(self.swap_id.as_slice());
        out.extend_from_slice(self.notary.as_slice());
        out.extend_from_slice(&self.signature.as_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SignError> {
        if bytes.len() != NOTARY_SIGNATURE_LEN {
            return Err(SignError::Malformed(format!(
                "expected {NOTARY_SIGNATURE_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        let swap_id = B256::from_slice(&bytes[..32]);
        let notary = Address::from_slice(&bytes[32..52]);
        let signature = Signature::from_raw(&bytes[52..])
            .map_err(|e| SignError::Malformed(e.to_string()))?;
        Ok(Self {
            swap_id,
            notary,
            signature,
        })
    }
}
