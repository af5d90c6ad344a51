//! In-memory UTXO ledger with a built-in notary.
//!
//! Models the pieces of the local ledger the swap core depends on: a
//! vault of unspent asset states, one-shot consumption of outputs, and a
//! resolve path that re-verifies the proof bundle against the lock state
//! exactly as the deployed local contract does.

use std::collections::{HashMap, HashSet};

use alloy::primitives::{keccak256, Address, B256, U256};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::SignerSync;
use tokio::sync::Mutex;

use crate::domain::draft::{
    AssetState, DraftSwapTx, LockState, Output, Party, Resolution, ResolveTx, SignedDraft,
    StateRef,
};
use crate::domain::intent::SwapIntent;
use crate::ports::local::{LocalLedger, LocalLedgerError};
use crate::proofs::verify_unlock_data;

struct LocalState {
    party_keys: HashMap<Party, PrivateKeySigner>,
    vault: HashMap<StateRef, AssetState>,
    /// Live lock outputs, keyed by their state reference.
    locks: HashMap<StateRef, LockState>,
    /// Encumbered asset-output amounts awaiting resolution, by swap id.
    pending_assets: HashMap<B256, U256>,
    drafts: HashMap<B256, DraftSwapTx>,
    notarized: HashSet<B256>,
    issue_counter: u64,
}

pub struct MockLocalLedger {
    state: Mutex<LocalState>,
}

impl MockLocalLedger {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LocalState {
                party_keys: HashMap::new(),
                vault: HashMap::new(),
                locks: HashMap::new(),
                pending_assets: HashMap::new(),
                drafts: HashMap::new(),
                notarized: HashSet::new(),
                issue_counter: 0,
            }),
        }
    }

    /// Register a party with the ledger, creating its signing key.
    /// Idempotent; returns the party's key address.
    pub async fn register_party(&self, party: Party) -> Address {
        let mut state = self.state.lock().await;
        state
            .party_keys
            .entry(party)
            .or_insert_with(PrivateKeySigner::random)
            .address()
    }

    /// Whether the lock output of this swap is still unconsumed.
    pub async fn lock_is_live(&self, swap_id: B256) -> bool {
        let lock_ref = StateRef {
            tx_hash: swap_id,
            index: 0,
        };
        self.state.lock().await.locks.contains_key(&lock_ref)
    }
}

impl Default for MockLocalLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalLedger for MockLocalLedger {
    async fn issue_asset(
        &self,
        owner: &Party,
        amount: U256,
    ) -> Result<StateRef, LocalLedgerError> {
        let mut state = self.state.lock().await;
        state
            .party_keys
            .entry(owner.clone())
            .or_insert_with(PrivateKeySigner::random);

        state.issue_counter += 1;
        let seed = state.issue_counter;
        let asset_ref = StateRef {
            tx_hash: keccak256([b"issue".as_slice(), &seed.to_be_bytes()].concat()),
            index: 0,
        };
        state.vault.insert(
            asset_ref,
            AssetState {
                owner: owner.clone(),
                amount,
            },
        );
        Ok(asset_ref)
    }

    async fn vault_query(
        &self,
        party: &Party,
    ) -> Result<Vec<(StateRef, AssetState)>, LocalLedgerError> {
        let state = self.state.lock().await;
        Ok(state
            .vault
            .iter()
            .filter(|(_, asset)| &asset.owner == party)
            .map(|(state_ref, asset)| (*state_ref, asset.clone()))
            .collect())
    }

    async fn build_draft_swap_tx(
        &self,
        intent: &SwapIntent,
        asset_ref: StateRef,
        lock: LockState,
    ) -> Result<DraftSwapTx, LocalLedgerError> {
        let mut state = self.state.lock().await;
        let asset = state
            .vault
            .get(&asset_ref)
            .ok_or(LocalLedgerError::UnknownState(asset_ref))?;
        if asset.owner != lock.owner_party {
            return Err(LocalLedgerError::NotOwner(lock.owner_party));
        }

        let draft = DraftSwapTx {
            tx_id: intent.swap_id,
            inputs: vec![asset_ref],
            outputs: vec![
                Output::Lock(lock.clone()),
                Output::Asset(AssetState {
                    owner: lock.recipient_party.clone(),
                    amount: asset.amount,
                }),
            ],
            notary: lock.notary.clone(),
        };
        state.drafts.insert(draft.tx_id, draft.clone());
        Ok(draft)
    }

    async fn sign_tx(&self, tx_id: B256) -> Result<SignedDraft, LocalLedgerError> {
        let mut state = self.state.lock().await;
        let draft = state
            .drafts
            .get(&tx_id)
            .cloned()
            .ok_or(LocalLedgerError::UnknownTransaction(tx_id))?;
        let (lock, _) = draft
            .lock_and_asset_outputs()
            .ok_or(LocalLedgerError::Malformed(
                "draft must carry one lock and one asset output",
            ))?;

        let key = state
            .party_keys
            .get(&lock.owner_party)
            .ok_or_else(|| LocalLedgerError::UnknownParty(lock.owner_party.clone()))?;
        let owner_signature = key
            .sign_hash_sync(&tx_id)
            .map_err(|e| LocalLedgerError::Rejected(e.to_string()))?;

        // Notarization: consume the input and put the outputs on ledger.
        let input = draft.inputs[0];
        let asset = state
            .vault
            .remove(&input)
            .ok_or(LocalLedgerError::AlreadyConsumed(input))?;
        let lock_ref = StateRef {
            tx_hash: tx_id,
            index: 0,
        };
        state.locks.insert(lock_ref, lock.clone());
        state.pending_assets.insert(tx_id, asset.amount);
        state.notarized.insert(tx_id);

        Ok(SignedDraft {
            draft,
            owner_signature,
        })
    }

    async fn finalize_tx(&self, tx: ResolveTx) -> Result<(), LocalLedgerError> {
        let mut state = self.state.lock().await;
        if !state.notarized.contains(&tx.swap_id) {
            return Err(LocalLedgerError::UnknownTransaction(tx.swap_id));
        }

        let lock_ref = StateRef {
            tx_hash: tx.swap_id,
            index: 0,
        };
        let lock = state
            .locks
            .get(&lock_ref)
            .ok_or(LocalLedgerError::AlreadyConsumed(lock_ref))?
            .clone();

        let expected = match tx.resolution {
            Resolution::Unlock => &lock.claim_event,
            Resolution::Revert => &lock.revert_event,
        };
        verify_unlock_data(
            &tx.bundle,
            tx.block_number,
            tx.tx_index,
            expected,
            &lock.approved_validators,
            lock.signatures_threshold,
        )
        .map_err(|e| LocalLedgerError::Rejected(e.to_string()))?;

        let amount = state
            .pending_assets
            .remove(&tx.swap_id)
            .ok_or(LocalLedgerError::Malformed("no encumbered asset output"))?;
        state.locks.remove(&lock_ref);

        let new_owner = match tx.resolution {
            Resolution::Unlock => lock.recipient_party,
            Resolution::Revert => lock.owner_party,
        };
        state.vault.insert(
            StateRef {
                tx_hash: tx.swap_id,
                index: 1,
            },
            AssetState {
                owner: new_owner,
                amount,
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::event::EventTemplate;

    fn test_intent() -> SwapIntent {
        SwapIntent::new(
            1337,
            Address::repeat_byte(0x11),
            Address::repeat_byte(0xaa),
            Address::repeat_byte(0xbb),
            U256::from(100u64),
            U256::ZERO,
            Address::repeat_byte(0x22),
            1,
            vec![Address::repeat_byte(0xcc)],
        )
        .unwrap()
    }

    fn test_lock(intent: &SwapIntent, owner: &Party, recipient: &Party) -> LockState {
        let template = EventTemplate::from_intent(intent);
        LockState {
            swap_id: intent.swap_id,
            owner_party: owner.clone(),
            recipient_party: recipient.clone(),
            notary: Party::new("notary"),
            approved_validators: vec![Address::repeat_byte(0x0c)],
            signatures_threshold: 1,
            claim_event: template.claim(intent.swap_id),
            revert_event: template.revert(intent.swap_id),
        }
    }

    #[tokio::test]
    async fn issue_and_query() {
        let ledger = MockLocalLedger::new();
        let bob = Party::new("bob");
        let asset_ref = ledger.issue_asset(&bob, U256::from(100u64)).await.unwrap();

        let holdings = ledger.vault_query(&bob).await.unwrap();
        assert_eq!(holdings.len(), 1);
        assert_eq!(holdings[0].0, asset_ref);
        assert!(ledger
            .vault_query(&Party::new("alice"))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn draft_requires_ownership() {
        let ledger = MockLocalLedger::new();
        let bob = Party::new("bob");
        let alice = Party::new("alice");
        let asset_ref = ledger.issue_asset(&bob, U256::from(100u64)).await.unwrap();

        let intent = test_intent();
        // Alice is not the owner of Bob's asset.
        let lock = test_lock(&intent, &alice, &bob);
        let result = ledger.build_draft_swap_tx(&intent, asset_ref, lock).await;
        assert!(matches!(result, Err(LocalLedgerError::NotOwner(_))));
    }

    #[tokio::test]
    async fn signing_consumes_the_input() {
        let ledger = MockLocalLedger::new();
        let bob = Party::new("bob");
        let alice = Party::new("alice");
        let asset_ref = ledger.issue_asset(&bob, U256::from(100u64)).await.unwrap();

        let intent = test_intent();
        let lock = test_lock(&intent, &bob, &alice);
        let draft = ledger
            .build_draft_swap_tx(&intent, asset_ref, lock)
            .await
            .unwrap();
        ledger.sign_tx(draft.tx_id).await.unwrap();

        assert!(ledger.vault_query(&bob).await.unwrap().is_empty());
        assert!(ledger.lock_is_live(draft.tx_id).await);

        // The input cannot be consumed twice.
        let result = ledger.sign_tx(draft.tx_id).await;
        assert!(matches!(result, Err(LocalLedgerError::AlreadyConsumed(_))));
    }

    #[tokio::test]
    async fn finalize_requires_notarized_draft() {
        let ledger = MockLocalLedger::new();
        let result = ledger
            .finalize_tx(ResolveTx {
                swap_id: B256::repeat_byte(0x01),
                resolution: Resolution::Unlock,
                block_number: 1,
                tx_index: 0,
                bundle: crate::proofs::UnlockData {
                    merkle_proof: Default::default(),
                    signatures: Vec::new(),
                    receipts_root: B256::ZERO,
                    unlock_receipt: crate::domain::receipt::Receipt::successful(
                        0,
                        0,
                        Vec::new(),
                    ),
                },
            })
            .await;
        assert!(matches!(result, Err(LocalLedgerError::UnknownTransaction(_))));
    }
}
