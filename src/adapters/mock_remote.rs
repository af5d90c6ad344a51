//! Deterministic in-memory remote ledger.
//!
//! Dispatches the same calldata the real adapter produces, and mints
//! blocks whose headers commit to a genuine receipts root, so proof
//! construction and verification run end-to-end against it. One fault
//! hook corrupts the receipt feed of a chosen block while leaving its
//! header intact.

use std::collections::{HashMap, HashSet};

use alloy::primitives::{keccak256, Address, Bytes, B256, U256};
use alloy::sol_types::{SolCall, SolValue};
use tokio::sync::Mutex;

use super::abi::ISwapProtocol;
use crate::crypto::signatures::NotarySignature;
use crate::domain::receipt::{receipts_root, Log, Receipt};
use crate::ports::remote::{RemoteError, RemoteLedger};
use crate::ports::{BlockHeader, LocatedReceipt};

#[derive(Debug, Clone)]
struct Commitment {
    owner: Address,
    token: Address,
    amount: U256,
    token_id: U256,
    recipient: Address,
    threshold: U256,
    signers: Vec<Address>,
    resolved: bool,
}

struct RemoteState {
    commitments: HashMap<B256, Commitment>,
    blocks: Vec<(BlockHeader, Vec<Receipt>)>,
    tx_locations: HashMap<B256, (u64, u64)>,
    corrupt_block: Option<u64>,
}

pub struct MockRemoteLedger {
    /// Account the connected wallet acts as; `commit` records it as the
    /// remote owner.
    caller: Address,
    state: Mutex<RemoteState>,
}

impl MockRemoteLedger {
    pub fn new(caller: Address) -> Self {
        let genesis = BlockHeader {
            number: 0,
            hash: keccak256(b"genesis"),
            receipts_root: receipts_root(&[]),
            timestamp: 1_700_000_000,
        };
        Self {
            caller,
            state: Mutex::new(RemoteState {
                commitments: HashMap::new(),
                blocks: vec![(genesis, Vec::new())],
                tx_locations: HashMap::new(),
                corrupt_block: None,
            }),
        }
    }

    /// Number of the most recently minted block.
    pub async fn latest_block(&self) -> u64 {
        self.state.lock().await.blocks.len() as u64 - 1
    }

    /// Make `get_block_receipts` return a tampered list for this block
    /// while its header keeps the honest root.
    pub async fn corrupt_receipts(&self, block_number: u64) {
        self.state.lock().await.corrupt_block = Some(block_number);
    }

    fn handle_commit(
        state: &mut RemoteState,
        caller: Address,
        call: ISwapProtocol::commitCall,
    ) -> Result<B256, RemoteError> {
        if state.commitments.contains_key(&call.swapId) {
            return Err(RemoteError::TransactionFailed(
                "swap already committed".into(),
            ));
        }
        state.commitments.insert(
            call.swapId,
            Commitment {
                owner: caller,
                token: call.token,
                amount: call.amount,
                token_id: call.tokenId,
                recipient: call.recipient,
                threshold: call.threshold,
                signers: call.signers,
                resolved: false,
            },
        );
        Ok(keccak256(call.swapId))
    }

    /// Emit the `ClaimOrRevert` event for a resolved commitment inside a
    /// fresh block, with filler receipts around it.
    fn resolve_commitment(
        state: &mut RemoteState,
        protocol: Address,
        swap_id: B256,
        pay_owner: bool,
    ) -> Result<B256, RemoteError> {
        let commitment = state
            .commitments
            .get_mut(&swap_id)
            .ok_or_else(|| RemoteError::TransactionFailed("unknown swap".into()))?;
        if commitment.resolved {
            return Err(RemoteError::TransactionFailed(
                "swap already resolved".into(),
            ));
        }
        commitment.resolved = true;

        let to = if pay_owner {
            commitment.owner
        } else {
            commitment.recipient
        };
        let data = (
            commitment.owner,
            to,
            commitment.amount,
            commitment.token_id,
            commitment.token,
        )
            .abi_encode_params();
        let log = Log {
            address: protocol,
            topics: vec![
                crate::domain::event::claim_or_revert_topic(),
                swap_id,
            ],
            data: Bytes::from(data),
        };
        Ok(Self::mint_block(state, log))
    }

    /// Mint a block of three receipts with the event in the middle and
    /// return the event transaction's hash.
    fn mint_block(state: &mut RemoteState, event_log: Log) -> B256 {
        let number = state.blocks.len() as u64;
        let filler = |seed: u8| {
            Receipt::successful(
                0,
                21_000 * (seed as u64 + 1),
                vec![Log {
                    address: Address::repeat_byte(seed),
                    topics: vec![B256::repeat_byte(seed)],
                    data: Bytes::from(number.to_be_bytes().to_vec()),
                }],
            )
        };
        let receipts = vec![
            filler(number as u8 ^ 0x51),
            Receipt::successful(2, 90_000, vec![event_log]),
            filler(number as u8 ^ 0x52),
        ];

        let root = receipts_root(&receipts);
        let header = BlockHeader {
            number,
            hash: keccak256([root.as_slice(), &number.to_be_bytes()].concat()),
            receipts_root: root,
            timestamp: 1_700_000_000 + number * 12,
        };

        let mut event_tx_hash = B256::ZERO;
        for index in 0..receipts.len() as u64 {
            let tx_hash =
                keccak256([&number.to_be_bytes()[..], &index.to_be_bytes()[..]].concat());
            state.tx_locations.insert(tx_hash, (number, index));
            if index == 1 {
                event_tx_hash = tx_hash;
            }
        }
        state.blocks.push((header, receipts));
        event_tx_hash
    }

    fn handle_claim_with_signatures(
        state: &mut RemoteState,
        protocol: Address,
        call: ISwapProtocol::claimWithSignaturesCall,
    ) -> Result<B256, RemoteError> {
        let commitment = state
            .commitments
            .get(&call.swapId)
            .ok_or_else(|| RemoteError::TransactionFailed("unknown swap".into()))?
            .clone();

        let mut accepted: HashSet<Address> = HashSet::new();
        for raw in &call.notarySignatures {
            let signature = NotarySignature::from_bytes(raw)
                .map_err(|e| RemoteError::TransactionFailed(e.to_string()))?;
            if signature.swap_id == call.swapId
                && signature.verify()
                && commitment.signers.contains(&signature.notary)
            {
                accepted.insert(signature.notary);
            }
        }
        if U256::from(accepted.len()) < commitment.threshold {
            return Err(RemoteError::TransactionFailed(format!(
                "insufficient notary signatures: {} of {}",
                accepted.len(),
                commitment.threshold
            )));
        }

        Self::resolve_commitment(state, protocol, call.swapId, false)
    }
}

impl RemoteLedger for MockRemoteLedger {
    async fn get_transaction_receipt(
        &self,
        tx_hash: B256,
    ) -> Result<LocatedReceipt, RemoteError> {
        let state = self.state.lock().await;
        let (block_number, tx_index) = *state
            .tx_locations
            .get(&tx_hash)
            .ok_or(RemoteError::ReceiptNotFound(tx_hash))?;
        let receipt = state.blocks[block_number as usize].1[tx_index as usize].clone();
        Ok(LocatedReceipt {
            block_number,
            tx_index,
            receipt,
        })
    }

    async fn get_block(&self, number: u64) -> Result<BlockHeader, RemoteError> {
        let state = self.state.lock().await;
        state
            .blocks
            .get(number as usize)
            .map(|(header, _)| header.clone())
            .ok_or(RemoteError::BlockNotFound(number))
    }

    async fn get_block_receipts(&self, number: u64) -> Result<Vec<Receipt>, RemoteError> {
        let state = self.state.lock().await;
        let mut receipts = state
            .blocks
            .get(number as usize)
            .map(|(_, receipts)| receipts.clone())
            .ok_or(RemoteError::BlockNotFound(number))?;
        if state.corrupt_block == Some(number) {
            if let Some(first) = receipts.first_mut() {
                first.cumulative_gas_used += 1;
            }
        }
        Ok(receipts)
    }

    async fn send_transaction(
        &self,
        to: Address,
        data: Bytes,
        _value: U256,
    ) -> Result<B256, RemoteError> {
        if data.len() < 4 {
            return Err(RemoteError::TransactionFailed("calldata too short".into()));
        }
        let selector: [u8; 4] = data[..4].try_into().expect("checked length");
        let mut state = self.state.lock().await;

        if selector == ISwapProtocol::commitCall::SELECTOR {
            let call = ISwapProtocol::commitCall::abi_decode(&data)
                .map_err(|e| RemoteError::TransactionFailed(e.to_string()))?;
            Self::handle_commit(&mut state, self.caller, call)
        } else if selector == ISwapProtocol::claimCall::SELECTOR {
            let call = ISwapProtocol::claimCall::abi_decode(&data)
                .map_err(|e| RemoteError::TransactionFailed(e.to_string()))?;
            Self::resolve_commitment(&mut state, to, call.swapId, false)
        } else if selector == ISwapProtocol::revertSwapCall::SELECTOR {
            let call = ISwapProtocol::revertSwapCall::abi_decode(&data)
                .map_err(|e| RemoteError::TransactionFailed(e.to_string()))?;
            Self::resolve_commitment(&mut state, to, call.swapId, true)
        } else if selector == ISwapProtocol::claimWithSignaturesCall::SELECTOR {
            let call = ISwapProtocol::claimWithSignaturesCall::abi_decode(&data)
                .map_err(|e| RemoteError::TransactionFailed(e.to_string()))?;
            Self::handle_claim_with_signatures(&mut state, to, call)
        } else {
            Err(RemoteError::TransactionFailed(format!(
                "unknown selector: 0x{}",
                alloy::hex::encode(selector)
            )))
        }
    }

    async fn call(&self, _to: Address, data: Bytes) -> Result<Bytes, RemoteError> {
        if data.len() < 4 {
            return Err(RemoteError::Rpc("calldata too short".into()));
        }
        let selector: [u8; 4] = data[..4].try_into().expect("checked length");
        if selector == ISwapProtocol::commitExistsCall::SELECTOR {
            let call = ISwapProtocol::commitExistsCall::abi_decode(&data)
                .map_err(|e| RemoteError::Rpc(e.to_string()))?;
            let state = self.state.lock().await;
            let exists = state.commitments.contains_key(&call.swapId);
            Ok(Bytes::from(exists.abi_encode()))
        } else {
            Err(RemoteError::Rpc(format!(
                "unknown view selector: 0x{}",
                alloy::hex::encode(selector)
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::signers::local::PrivateKeySigner;

    fn commit_calldata(swap_id: B256, recipient: Address, signers: Vec<Address>) -> Bytes {
        Bytes::from(
            ISwapProtocol::commitCall {
                swapId: swap_id,
                token: Address::repeat_byte(0x22),
                amount: U256::from(100u64),
                tokenId: U256::ZERO,
                recipient,
                threshold: U256::from(signers.len() as u64),
                signers,
            }
            .abi_encode(),
        )
    }

    #[tokio::test]
    async fn commit_then_claim_produces_provable_block() {
        let protocol = Address::repeat_byte(0x11);
        let ledger = MockRemoteLedger::new(Address::repeat_byte(0xaa));
        let swap_id = B256::repeat_byte(0x01);

        ledger
            .send_transaction(
                protocol,
                commit_calldata(swap_id, Address::repeat_byte(0xbb), vec![Address::repeat_byte(0xcc)]),
                U256::ZERO,
            )
            .await
            .unwrap();

        let calldata = Bytes::from(ISwapProtocol::claimCall { swapId: swap_id }.abi_encode());
        let tx_hash = ledger
            .send_transaction(protocol, calldata, U256::ZERO)
            .await
            .unwrap();

        let located = ledger.get_transaction_receipt(tx_hash).await.unwrap();
        assert_eq!(located.tx_index, 1);

        let header = ledger.get_block(located.block_number).await.unwrap();
        let receipts = ledger.get_block_receipts(located.block_number).await.unwrap();
        assert_eq!(receipts_root(&receipts), header.receipts_root);
        assert_eq!(receipts[1], located.receipt);
    }

    #[tokio::test]
    async fn claim_without_commit_fails() {
        let ledger = MockRemoteLedger::new(Address::repeat_byte(0xaa));
        let calldata =
            Bytes::from(ISwapProtocol::claimCall { swapId: B256::repeat_byte(0x09) }.abi_encode());
        let result = ledger
            .send_transaction(Address::repeat_byte(0x11), calldata, U256::ZERO)
            .await;
        assert!(matches!(result, Err(RemoteError::TransactionFailed(_))));
    }

    #[tokio::test]
    async fn double_resolution_rejected() {
        let protocol = Address::repeat_byte(0x11);
        let ledger = MockRemoteLedger::new(Address::repeat_byte(0xaa));
        let swap_id = B256::repeat_byte(0x02);
        ledger
            .send_transaction(
                protocol,
                commit_calldata(swap_id, Address::repeat_byte(0xbb), vec![Address::repeat_byte(0xcc)]),
                U256::ZERO,
            )
            .await
            .unwrap();

        let claim = Bytes::from(ISwapProtocol::claimCall { swapId: swap_id }.abi_encode());
        ledger
            .send_transaction(protocol, claim.clone(), U256::ZERO)
            .await
            .unwrap();
        let second = ledger.send_transaction(protocol, claim, U256::ZERO).await;
        assert!(matches!(second, Err(RemoteError::TransactionFailed(_))));
    }

    #[tokio::test]
    async fn claim_with_signatures_enforces_notary_threshold() {
        let protocol = Address::repeat_byte(0x11);
        let ledger = MockRemoteLedger::new(Address::repeat_byte(0xaa));
        let swap_id = B256::repeat_byte(0x03);

        let notaries: Vec<PrivateKeySigner> =
            (0..2).map(|_| PrivateKeySigner::random()).collect();
        let signer_addresses: Vec<Address> = notaries.iter().map(|k| k.address()).collect();
        ledger
            .send_transaction(
                protocol,
                commit_calldata(swap_id, Address::repeat_byte(0xbb), signer_addresses),
                U256::ZERO,
            )
            .await
            .unwrap();

        // One of two signatures: below threshold.
        let one = NotarySignature::sign(&notaries[0], swap_id).unwrap();
        let short = Bytes::from(
            ISwapProtocol::claimWithSignaturesCall {
                swapId: swap_id,
                notarySignatures: vec![Bytes::from(one.to_bytes())],
            }
            .abi_encode(),
        );
        let result = ledger.send_transaction(protocol, short, U256::ZERO).await;
        assert!(matches!(result, Err(RemoteError::TransactionFailed(_))));

        // Full set succeeds.
        let all: Vec<Bytes> = notaries
            .iter()
            .map(|k| Bytes::from(NotarySignature::sign(k, swap_id).unwrap().to_bytes()))
            .collect();
        let full = Bytes::from(
            ISwapProtocol::claimWithSignaturesCall {
                swapId: swap_id,
                notarySignatures: all,
            }
            .abi_encode(),
        );
        ledger.send_transaction(protocol, full, U256::ZERO).await.unwrap();
    }

    #[tokio::test]
    async fn corrupted_feed_diverges_from_header() {
        let protocol = Address::repeat_byte(0x11);
        let ledger = MockRemoteLedger::new(Address::repeat_byte(0xaa));
        let swap_id = B256::repeat_byte(0x04);
        ledger
            .send_transaction(
                protocol,
                commit_calldata(swap_id, Address::repeat_byte(0xbb), vec![Address::repeat_byte(0xcc)]),
                U256::ZERO,
            )
            .await
            .unwrap();
        let claim = Bytes::from(ISwapProtocol::claimCall { swapId: swap_id }.abi_encode());
        ledger.send_transaction(protocol, claim, U256::ZERO).await.unwrap();

        let block = ledger.latest_block().await;
        ledger.corrupt_receipts(block).await;

        let header = ledger.get_block(block).await.unwrap();
        let receipts = ledger.get_block_receipts(block).await.unwrap();
        assert_ne!(receipts_root(&receipts), header.receipts_root);
    }

    #[tokio::test]
    async fn commit_exists_view() {
        let protocol = Address::repeat_byte(0x11);
        let ledger = MockRemoteLedger::new(Address::repeat_byte(0xaa));
        let swap_id = B256::repeat_byte(0x05);

        let query = Bytes::from(
            ISwapProtocol::commitExistsCall { swapId: swap_id }.abi_encode(),
        );
        let absent = ledger.call(protocol, query.clone()).await.unwrap();
        assert!(!bool::abi_decode(&absent).unwrap());

        ledger
            .send_transaction(
                protocol,
                commit_calldata(swap_id, Address::repeat_byte(0xbb), vec![Address::repeat_byte(0xcc)]),
                U256::ZERO,
            )
            .await
            .unwrap();
        let present = ledger.call(protocol, query).await.unwrap();
        assert!(bool::abi_decode(&present).unwrap());
    }
}
