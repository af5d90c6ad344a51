use std::collections::HashMap;

use alloy::primitives::B256;
use tokio::sync::Mutex;

use crate::crypto::signatures::{BlockAttestation, NotarySignature};
use crate::domain::draft::{DraftSwapTx, SignedDraft};
use crate::ports::drafts::{DraftStore, StoreError};

/// In-memory draft-transaction service for tests and the demo harness.
///
/// Signature appends are additive; nothing is ever removed. A production
/// deployment backs this with the node's database and the same port.
pub struct InMemoryDraftStore {
    drafts: Mutex<HashMap<B256, DraftSwapTx>>,
    signed: Mutex<HashMap<B256, SignedDraft>>,
    block_signatures: Mutex<HashMap<(B256, u64), Vec<BlockAttestation>>>,
    notary_signatures: Mutex<HashMap<B256, Vec<NotarySignature>>>,
}

impl InMemoryDraftStore {
    pub fn new() -> Self {
        Self {
            drafts: Mutex::new(HashMap::new()),
            signed: Mutex::new(HashMap::new()),
            block_signatures: Mutex::new(HashMap::new()),
            notary_signatures: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryDraftStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DraftStore for InMemoryDraftStore {
    async fn put_draft(&self, draft: DraftSwapTx) -> Result<(), StoreError> {
        self.drafts.lock().await.insert(draft.tx_id, draft);
        Ok(())
    }

    async fn draft(&self, swap_id: B256) -> Result<DraftSwapTx, StoreError> {
        self.drafts
            .lock()
            .await
            .get(&swap_id)
            .cloned()
            .ok_or(StoreError::DraftNotFound(swap_id))
    }

    async fn put_signed_draft(&self, signed: SignedDraft) -> Result<(), StoreError> {
        self.signed
            .lock()
            .await
            .insert(signed.draft.tx_id, signed);
        Ok(())
    }

    async fn signed_draft(&self, swap_id: B256) -> Result<SignedDraft, StoreError> {
        self.signed
            .lock()
            .await
            .get(&swap_id)
            .cloned()
            .ok_or(StoreError::NotSigned(swap_id))
    }

    async fn append_block_signature(
        &self,
        swap_id: B256,
        block_number: u64,
        attestation: BlockAttestation,
    ) -> Result<(), StoreError> {
        self.block_signatures
            .lock()
            .await
            .entry((swap_id, block_number))
            .or_default()
            .push(attestation);
        Ok(())
    }

    async fn block_signatures(
        &self,
        swap_id: B256,
        block_number: u64,
    ) -> Result<Vec<BlockAttestation>, StoreError> {
        Ok(self
            .block_signatures
            .lock()
            .await
            .get(&(swap_id, block_number))
            .cloned()
            .unwrap_or_default())
    }

    async fn append_notary_signature(
        &self,
        swap_id: B256,
        signature: NotarySignature,
    ) -> Result<(), StoreError> {
        self.notary_signatures
            .lock()
            .await
            .entry(swap_id)
            .or_default()
            .push(signature);
        Ok(())
    }

    async fn notary_signatures(
        &self,
        swap_id: B256,
    ) -> Result<Vec<NotarySignature>, StoreError> {
        Ok(self
            .notary_signatures
            .lock()
            .await
            .get(&swap_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::signers::local::PrivateKeySigner;

    #[tokio::test]
    async fn missing_draft_is_an_error() {
        let store = InMemoryDraftStore::new();
        let result = store.draft(B256::repeat_byte(0x01)).await;
        assert!(matches!(result, Err(StoreError::DraftNotFound(_))));
    }

    #[tokio::test]
    async fn block_signatures_accumulate() {
        let store = InMemoryDraftStore::new();
        let swap_id = B256::repeat_byte(0x01);
        let root = B256::repeat_byte(0x02);

        assert!(store.block_signatures(swap_id, 5).await.unwrap().is_empty());

        for _ in 0..3 {
            let key = PrivateKeySigner::random();
            let attestation = BlockAttestation::sign(&key, root, 5).unwrap();
            store
                .append_block_signature(swap_id, 5, attestation)
                .await
                .unwrap();
        }
        assert_eq!(store.block_signatures(swap_id, 5).await.unwrap().len(), 3);
        // A different block number reads an independent set.
        assert!(store.block_signatures(swap_id, 6).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn notary_signatures_accumulate() {
        let store = InMemoryDraftStore::new();
        let swap_id = B256::repeat_byte(0x07);
        let key = PrivateKeySigner::random();
        let sig = NotarySignature::sign(&key, swap_id).unwrap();

        store.append_notary_signature(swap_id, sig).await.unwrap();
        assert_eq!(store.notary_signatures(swap_id).await.unwrap().len(), 1);
    }
}
