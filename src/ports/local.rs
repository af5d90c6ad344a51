use std::future::Future;

use alloy::primitives::{B256, U256};

use crate::domain::draft::{
    AssetState, DraftSwapTx, LockState, Party, ResolveTx, SignedDraft, StateRef,
};
use crate::domain::intent::SwapIntent;

/// Port for the local UTXO ledger and its notary.
///
/// The ledger validates, orders and notarizes transactions; the swap core
/// only drives it. Finalizing a resolve transaction re-verifies the proof
/// bundle against the lock state independently of the coordinator.
pub trait LocalLedger: Send + Sync {
    /// Issue a fresh asset state to `owner`.
    fn issue_asset(
        &self,
        owner: &Party,
        amount: U256,
    ) -> impl Future<Output = Result<StateRef, LocalLedgerError>> + Send;

    /// Unspent asset states owned by `party`.
    fn vault_query(
        &self,
        party: &Party,
    ) -> impl Future<Output = Result<Vec<(StateRef, AssetState)>, LocalLedgerError>> + Send;

    /// Build the draft transaction consuming `asset_ref` and producing
    /// the lock plus the transferred asset output.
    fn build_draft_swap_tx(
        &self,
        intent: &SwapIntent,
        asset_ref: StateRef,
        lock: LockState,
    ) -> impl Future<Output = Result<DraftSwapTx, LocalLedgerError>> + Send;

    /// Owner signature over the draft; the ledger notarizes the draft and
    /// its outputs become live.
    fn sign_tx(
        &self,
        tx_id: B256,
    ) -> impl Future<Output = Result<SignedDraft, LocalLedgerError>> + Send;

    /// Finalize a resolve transaction, consuming the lock state exactly
    /// once and releasing the asset output.
    fn finalize_tx(
        &self,
        tx: ResolveTx,
    ) -> impl Future<Output = Result<(), LocalLedgerError>> + Send;
}

#[derive(Debug, thiserror::Error)]
pub enum LocalLedgerError {
    #[error("state not found: {0}")]
    UnknownState(StateRef),

    #[error("transaction not found: {0}")]
    UnknownTransaction(B256),

    #[error("party not registered with the ledger: {0}")]
    UnknownParty(Party),

    #[error("asset is not owned by {0}")]
    NotOwner(Party),

    #[error("state already consumed: {0}")]
    AlreadyConsumed(StateRef),

    #[error("transaction is malformed: {0}")]
    Malformed(&'static str),

    #[error("resolution rejected: {0}")]
    Rejected(String),
}
