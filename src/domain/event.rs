//! Expected remote event construction.
//!
//! The swap id is not known at intent time, so the template captures the
//! intent first and is applied to an id later — once when the lock state
//! is drafted, and again during unlock to compare against the proven
//! receipt's logs.

use alloy::primitives::{keccak256, Address, Bytes, B256, U256};
use alloy::sol_types::SolValue;
use serde::{Deserialize, Serialize};

use super::intent::SwapIntent;
use super::receipt::Log;

/// Canonical signature of the event the remote contract emits on both
/// claim and revert; the payout target distinguishes the two.
pub const CLAIM_OR_REVERT_SIGNATURE: &str =
    "ClaimOrRevert(bytes32,address,address,uint256,uint256,address)";

pub fn claim_or_revert_topic() -> B256 {
    keccak256(CLAIM_OR_REVERT_SIGNATURE.as_bytes())
}

/// Fully-determined event expectation: emitting contract, topics and
/// ABI-encoded data, compared byte-for-byte against proven logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedEvent {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
}

impl ExpectedEvent {
    pub fn matches(&self, log: &Log) -> bool {
        log.address == self.address && log.topics == self.topics && log.data == self.data
    }
}

/// Event builder curried on the swap id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventTemplate {
    protocol_address: Address,
    owner: Address,
    recipient: Address,
    amount: U256,
    token_id: U256,
    token_address: Address,
}

impl EventTemplate {
    pub fn from_intent(intent: &SwapIntent) -> Self {
        Self {
            protocol_address: intent.protocol_address,
            owner: intent.owner,
            recipient: intent.recipient,
            amount: intent.amount,
            token_id: intent.token_id,
            token_address: intent.token_address,
        }
    }

    /// Event expected when the counterpart claims: payout to the recipient.
    pub fn claim(&self, swap_id: B256) -> ExpectedEvent {
        self.build(swap_id, self.recipient)
    }

    /// Event expected when the swap unwinds: payout back to the owner.
    pub fn revert(&self, swap_id: B256) -> ExpectedEvent {
        self.build(swap_id, self.owner)
    }

    fn build(&self, swap_id: B256, to: Address) -> ExpectedEvent {
        let data = (
            self.owner,
            to,
            self.amount,
            self.token_id,
            self.token_address,
        )
            .abi_encode_params();
        ExpectedEvent {
            address: self.protocol_address,
            topics: vec![claim_or_revert_topic(), swap_id],
            data: Bytes::from(data),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_intent() -> SwapIntent {
        SwapIntent::new(
            1337,
            Address::repeat_byte(0x11),
            Address::repeat_byte(0xaa),
            Address::repeat_byte(0xbb),
            U256::from(7u64),
            U256::ZERO,
            Address::repeat_byte(0x22),
            1,
            vec![Address::repeat_byte(0xcc)],
        )
        .unwrap()
    }

    #[test]
    fn claim_and_revert_differ_only_in_target() {
        let intent = test_intent();
        let template = EventTemplate::from_intent(&intent);
        let claim = template.claim(intent.swap_id);
        let revert = template.revert(intent.swap_id);

        assert_eq!(claim.topics, revert.topics);
        assert_ne!(claim.data, revert.data);
    }

    #[test]
    fn swap_id_lands_in_second_topic() {
        let intent = test_intent();
        let event = EventTemplate::from_intent(&intent).claim(intent.swap_id);
        assert_eq!(event.topics.len(), 2);
        assert_eq!(event.topics[0], claim_or_revert_topic());
        assert_eq!(event.topics[1], intent.swap_id);
    }

    #[test]
    fn matches_is_exact() {
        let intent = test_intent();
        let event = EventTemplate::from_intent(&intent).claim(intent.swap_id);

        let log = Log {
            address: event.address,
            topics: event.topics.clone(),
            data: event.data.clone(),
        };
        assert!(event.matches(&log));

        let mut wrong_address = log.clone();
        wrong_address.address = Address::repeat_byte(0xde);
        assert!(!event.matches(&wrong_address));

        let mut wrong_data = log.clone();
        wrong_data.data = Bytes::from(vec![0u8; 4]);
        assert!(!event.matches(&wrong_data));
    }

    #[test]
    fn data_is_five_words_for_static_tuple() {
        let intent = test_intent();
        let event = EventTemplate::from_intent(&intent).claim(intent.swap_id);
        assert_eq!(event.data.len(), 5 * 32);
    }
}
