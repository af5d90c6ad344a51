//! Unlock proof assembly and verification.
//!
//! A proof bundle is a self-contained witness: the local contract (and
//! any third party) can re-run the checks here from the bundle alone plus
//! the lock state's expectations. Assembly happens on the coordinator
//! side from the raw receipt feed; verification is pure.

use alloy::primitives::{Address, B256};
use serde::{Deserialize, Serialize};

use crate::crypto::signatures::{count_distinct_valid, BlockAttestation};
use crate::domain::event::ExpectedEvent;
use crate::domain::receipt::{receipts_trie, Receipt};
use crate::rlp::{self, CodecError};
use crate::trie::{self, ProofError, TrieProof};

/// How the remote event is proven.
///
/// Block signatures have oracles attest to the block carrying the event;
/// notarization signatures let the remote contract itself verify the
/// local notary set. Both answer to the same threshold invariant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProofStrategy {
    BlockSignatures,
    NotarizationSignatures,
}

#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error("receipts root mismatch: computed {computed}, header {header}")]
    RootMismatch { computed: B256, header: B256 },

    #[error("insufficient valid signatures: {valid} of {required}")]
    Threshold { valid: usize, required: u64 },

    #[error("no receipt at transaction index {0}")]
    NoSuchReceipt(u64),

    #[error("proven value does not match the bundle receipt")]
    ReceiptMismatch,

    #[error("receipt reports failed execution")]
    FailedReceipt,

    #[error("receipt does not contain the expected event")]
    EventMismatch,

    #[error(transparent)]
    Proof(#[from] ProofError),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Everything the local unlock transaction carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnlockData {
    /// Trie nodes on the path from the receipts root to the target leaf.
    pub merkle_proof: TrieProof,
    pub signatures: Vec<BlockAttestation>,
    pub receipts_root: B256,
    pub unlock_receipt: Receipt,
}

/// Rebuild the receipts trie from the full block feed, check it against
/// the header commitment and cut the witness for the target transaction.
pub fn assemble_unlock_data(
    receipts: &[Receipt],
    header_root: B256,
    tx_index: u64,
    signatures: Vec<BlockAttestation>,
) -> Result<UnlockData, VerifyError> {
    let trie = receipts_trie(receipts);
    let computed = trie.root_hash();
    if computed != header_root {
        return Err(VerifyError::RootMismatch {
            computed,
            header: header_root,
        });
    }

    let unlock_receipt = receipts
        .get(tx_index as usize)
        .ok_or(VerifyError::NoSuchReceipt(tx_index))?
        .clone();
    let merkle_proof = trie.prove(&rlp::encode_uint(tx_index))?;

    Ok(UnlockData {
        merkle_proof,
        signatures,
        receipts_root: computed,
        unlock_receipt,
    })
}

/// The resolution check the local contract re-runs independently:
/// threshold over distinct approved validators, trie inclusion of the
/// claimed receipt, and an exact match of the expected event among the
/// receipt's logs.
pub fn verify_unlock_data(
    data: &UnlockData,
    block_number: u64,
    tx_index: u64,
    expected: &ExpectedEvent,
    validators: &[Address],
    threshold: u64,
) -> Result<(), VerifyError> {
    let valid = count_distinct_valid(
        &data.signatures,
        data.receipts_root,
        block_number,
        validators,
    );
    if (valid as u64) < threshold {
        return Err(VerifyError::Threshold {
            valid,
            required: threshold,
        });
    }

    let key = rlp::encode_uint(tx_index);
    let proven = trie::verify_proof(data.receipts_root, &key, &data.merkle_proof)?;
    if proven != data.unlock_receipt.encode() {
        return Err(VerifyError::ReceiptMismatch);
    }
    if !data.unlock_receipt.status {
        return Err(VerifyError::FailedReceipt);
    }
    if !data.unlock_receipt.logs.iter().any(|log| expected.matches(log)) {
        return Err(VerifyError::EventMismatch);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::receipt::Log;
    use alloy::primitives::{Bytes, U256};
    use alloy::signers::local::PrivateKeySigner;

    struct Fixture {
        receipts: Vec<Receipt>,
        root: B256,
        expected: ExpectedEvent,
        keys: Vec<PrivateKeySigner>,
        validators: Vec<Address>,
    }

    /// Three-receipt block with the interesting event in the middle.
    fn fixture() -> Fixture {
        let expected = ExpectedEvent {
            address: Address::repeat_byte(0x11),
            topics: vec![B256::repeat_byte(0xe0), B256::repeat_byte(0xe1)],
            data: Bytes::from(U256::from(5u64).to_be_bytes::<32>().to_vec()),
        };
        let event_log = Log {
            address: expected.address,
            topics: expected.topics.clone(),
            data: expected.data.clone(),
        };
        let filler = |seed: u8| {
            Receipt::successful(
                0,
                21_000 * seed as u64,
                vec![Log {
                    address: Address::repeat_byte(seed),
                    topics: vec![B256::repeat_byte(seed)],
                    data: Bytes::from(vec![seed; 4]),
                }],
            )
        };
        let receipts = vec![
            filler(0x31),
            Receipt::successful(2, 63_000, vec![event_log]),
            filler(0x33),
        ];
        let root = crate::domain::receipt::receipts_root(&receipts);
        let keys: Vec<PrivateKeySigner> =
            (0..2).map(|_| PrivateKeySigner::random()).collect();
        let validators = keys.iter().map(|k| k.address()).collect();
        Fixture {
            receipts,
            root,
            expected,
            keys,
            validators,
        }
    }

    fn attest_all(f: &Fixture, block_number: u64) -> Vec<BlockAttestation> {
        f.keys
            .iter()
            .map(|k| BlockAttestation::sign(k, f.root, block_number).unwrap())
            .collect()
    }

    #[test]
    fn assemble_then_verify_round_trip() {
        let f = fixture();
        let sigs = attest_all(&f, 9);
        let data = assemble_unlock_data(&f.receipts, f.root, 1, sigs).unwrap();
        verify_unlock_data(&data, 9, 1, &f.expected, &f.validators, 2).unwrap();
    }

    #[test]
    fn assemble_rejects_root_mismatch() {
        let f = fixture();
        let result =
            assemble_unlock_data(&f.receipts, B256::repeat_byte(0xde), 1, vec![]);
        assert!(matches!(result, Err(VerifyError::RootMismatch { .. })));
    }

    #[test]
    fn assemble_rejects_out_of_range_index() {
        let f = fixture();
        let result = assemble_unlock_data(&f.receipts, f.root, 17, vec![]);
        assert!(matches!(result, Err(VerifyError::NoSuchReceipt(17))));
    }

    #[test]
    fn verify_rejects_below_threshold() {
        let f = fixture();
        let sigs = vec![BlockAttestation::sign(&f.keys[0], f.root, 9).unwrap()];
        let data = assemble_unlock_data(&f.receipts, f.root, 1, sigs).unwrap();
        let result = verify_unlock_data(&data, 9, 1, &f.expected, &f.validators, 2);
        assert!(matches!(
            result,
            Err(VerifyError::Threshold { valid: 1, required: 2 })
        ));
    }

    #[test]
    fn duplicate_attestations_do_not_reach_threshold() {
        let f = fixture();
        let one = BlockAttestation::sign(&f.keys[0], f.root, 9).unwrap();
        let data =
            assemble_unlock_data(&f.receipts, f.root, 1, vec![one.clone(), one])
                .unwrap();
        let result = verify_unlock_data(&data, 9, 1, &f.expected, &f.validators, 2);
        assert!(matches!(result, Err(VerifyError::Threshold { .. })));
    }

    #[test]
    fn verify_rejects_substituted_receipt() {
        let f = fixture();
        let sigs = attest_all(&f, 9);
        let mut data = assemble_unlock_data(&f.receipts, f.root, 1, sigs).unwrap();
        // Swap in the receipt from another index; the witness no longer
        // proves it.
        data.unlock_receipt = f.receipts[0].clone();
        let result = verify_unlock_data(&data, 9, 1, &f.expected, &f.validators, 2);
        assert!(matches!(result, Err(VerifyError::ReceiptMismatch)));
    }

    #[test]
    fn verify_rejects_wrong_event() {
        let f = fixture();
        let sigs = attest_all(&f, 9);
        // Index 0 holds a filler receipt without the expected event.
        let data = assemble_unlock_data(&f.receipts, f.root, 0, sigs).unwrap();
        let result = verify_unlock_data(&data, 9, 0, &f.expected, &f.validators, 2);
        assert!(matches!(result, Err(VerifyError::EventMismatch)));
    }

    #[test]
    fn verify_rejects_attestation_for_other_block() {
        let f = fixture();
        let sigs = attest_all(&f, 9);
        let data = assemble_unlock_data(&f.receipts, f.root, 1, sigs).unwrap();
        // Same signatures presented for a different block number.
        let result = verify_unlock_data(&data, 10, 1, &f.expected, &f.validators, 2);
        assert!(matches!(result, Err(VerifyError::Threshold { .. })));
    }

    #[test]
    fn verify_rejects_failed_receipt() {
        let f = fixture();
        let mut receipts = f.receipts.clone();
        receipts[1].status = false;
        let root = crate::domain::receipt::receipts_root(&receipts);
        let sigs: Vec<BlockAttestation> = f
            .keys
            .iter()
            .map(|k| BlockAttestation::sign(k, root, 9).unwrap())
            .collect();
        let data = assemble_unlock_data(&receipts, root, 1, sigs).unwrap();
        let result = verify_unlock_data(&data, 9, 1, &f.expected, &f.validators, 2);
        assert!(matches!(result, Err(VerifyError::FailedReceipt)));
    }
}
