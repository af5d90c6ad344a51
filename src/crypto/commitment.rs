//! Commitment hashing shared bit-for-bit with the remote contract.

use alloy::primitives::{keccak256, B256, U256};
use alloy::sol_types::SolValue;

use crate::domain::intent::SwapIntent;

/// The swap id: keccak over the ABI-encoded commitment tuple
/// `(chain_id, owner, recipient, amount, token_id, token_address,
/// threshold, signers)`. Static fields head-packed as 32-byte words, the
/// signer array as offset + length + elements — the same bytes
/// `abi.encode` produces on the remote side.
pub fn swap_id(intent: &SwapIntent) -> B256 {
    let encoded = (
        U256::from(intent.chain_id),
        intent.owner,
        intent.recipient,
        intent.amount,
        intent.token_id,
        intent.token_address,
        U256::from(intent.signatures_threshold),
        intent.signers.clone(),
    )
        .abi_encode_params();
    keccak256(&encoded)
}

/// Canonical block identifier oracles sign:
/// `keccak256(receipts_root || be8(block_number))`.
pub fn attestation_digest(receipts_root: B256, block_number: u64) -> B256 {
    let mut buf = [0u8; 40];
    buf[..32].copy_from_slice(receipts_root.as_slice());
    buf[32..].copy_from_slice(&block_number.to_be_bytes());
    keccak256(buf)
}
