//! The immutable swap agreement.

use alloy::primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};

use crate::crypto::commitment::swap_id;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum IntentError {
    #[error("signer set must not be empty")]
    EmptySigners,

    #[error("threshold {threshold} must be positive and at most {signers} signer(s)")]
    BadThreshold { threshold: u64, signers: usize },
}

/// Terms agreed by both parties before anything is drafted or committed.
///
/// The swap id is a pure function of these fields; identical intents
/// produce identical ids, and the local draft transaction is derived so
/// that its hash equals the id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapIntent {
    /// Deterministic identifier: keccak over the ABI-encoded commitment
    /// tuple, shared verbatim with the remote contract.
    pub swap_id: B256,
    /// Remote ledger instance the commitment lives on.
    pub chain_id: u64,
    /// Remote contract that must emit the claim/revert event.
    pub protocol_address: Address,
    /// Remote account committing the asset.
    pub owner: Address,
    /// Remote account paid on claim.
    pub recipient: Address,
    pub amount: U256,
    /// Zero for fungible tokens.
    pub token_id: U256,
    pub token_address: Address,
    pub signatures_threshold: u64,
    /// Ordered signer set the remote contract accepts attestations from.
    pub signers: Vec<Address>,
}

impl SwapIntent {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        chain_id: u64,
        protocol_address: Address,
        owner: Address,
        recipient: Address,
        amount: U256,
        token_id: U256,
        token_address: Address,
        signatures_threshold: u64,
        signers: Vec<Address>,
    ) -> Result<Self, IntentError> {
        if signers.is_empty() {
            return Err(IntentError::EmptySigners);
        }
        if signatures_threshold == 0 || signatures_threshold as usize > signers.len() {
            return Err(IntentError::BadThreshold {
                threshold: signatures_threshold,
                signers: signers.len(),
            });
        }

        let mut intent = Self {
            swap_id: B256::ZERO,
            chain_id,
            protocol_address,
            owner,
            recipient,
            amount,
            token_id,
            token_address,
            signatures_threshold,
            signers,
        };
        intent.swap_id = swap_id(&intent);
        Ok(intent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_intent(amount: u64) -> SwapIntent {
        SwapIntent::new(
            1337,
            Address::repeat_byte(0x11),
            Address::repeat_byte(0xaa),
            Address::repeat_byte(0xbb),
            U256::from(amount),
            U256::ZERO,
            Address::repeat_byte(0x22),
            1,
            vec![Address::repeat_byte(0xcc)],
        )
        .unwrap()
    }

    #[test]
    fn swap_id_is_deterministic() {
        assert_eq!(test_intent(5).swap_id, test_intent(5).swap_id);
    }

    #[test]
    fn distinct_intents_distinct_ids() {
        assert_ne!(test_intent(5).swap_id, test_intent(6).swap_id);
    }

    #[test]
    fn rejects_empty_signers() {
        let result = SwapIntent::new(
            1,
            Address::ZERO,
            Address::ZERO,
            Address::ZERO,
            U256::ZERO,
            U256::ZERO,
            Address::ZERO,
            1,
            vec![],
        );
        assert_eq!(result.unwrap_err(), IntentError::EmptySigners);
    }

    #[test]
    fn rejects_threshold_out_of_range() {
        for threshold in [0u64, 2] {
            let result = SwapIntent::new(
                1,
                Address::ZERO,
                Address::ZERO,
                Address::ZERO,
                U256::ZERO,
                U256::ZERO,
                Address::ZERO,
                threshold,
                vec![Address::repeat_byte(0x01)],
            );
            assert!(matches!(result, Err(IntentError::BadThreshold { .. })));
        }
    }
}
