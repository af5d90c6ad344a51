use std::future::Future;

use alloy::primitives::B256;

use crate::crypto::signatures::{BlockAttestation, NotarySignature};
use crate::domain::draft::{DraftSwapTx, SignedDraft};

/// Port for the draft-transaction service: the per-process store holding
/// drafts and the proof material collected for them.
///
/// Appends are additive and reads tolerate partial sets — the threshold
/// guard in the state machine gates progress, not the store. The store is
/// passed in as a capability by whoever owns its lifecycle.
pub trait DraftStore: Send + Sync {
    fn put_draft(
        &self,
        draft: DraftSwapTx,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn draft(
        &self,
        swap_id: B256,
    ) -> impl Future<Output = Result<DraftSwapTx, StoreError>> + Send;

    fn put_signed_draft(
        &self,
        signed: SignedDraft,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn signed_draft(
        &self,
        swap_id: B256,
    ) -> impl Future<Output = Result<SignedDraft, StoreError>> + Send;

    /// Record an oracle attestation for `(swap_id, block_number)`.
    fn append_block_signature(
        &self,
        swap_id: B256,
        block_number: u64,
        attestation: BlockAttestation,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Attestations collected so far; empty when none have arrived.
    fn block_signatures(
        &self,
        swap_id: B256,
        block_number: u64,
    ) -> impl Future<Output = Result<Vec<BlockAttestation>, StoreError>> + Send;

    fn append_notary_signature(
        &self,
        swap_id: B256,
        signature: NotarySignature,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn notary_signatures(
        &self,
        swap_id: B256,
    ) -> impl Future<Output = Result<Vec<NotarySignature>, StoreError>> + Send;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("no draft stored for swap: {0}")]
    DraftNotFound(B256),

    #[error("draft for swap {0} has not been signed")]
    NotSigned(B256),

    #[error("internal store error: {0}")]
    Internal(String),
}
