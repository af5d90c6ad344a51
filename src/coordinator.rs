//! The swap state machine.
//!
//! Orchestrates draft → sign → remote commit → proof collection →
//! unlock/revert over the three injected capabilities. Verification
//! failures abort the transition and leave the phase unchanged, so the
//! alternative path (more signatures, a fresh receipt feed, or revert)
//! stays open. Operations on one swap serialize through its record lock;
//! swaps are independent of each other.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use alloy::primitives::{Bytes, B256, U256};
use alloy::sol_types::{SolCall, SolValue};
use tokio::sync::Mutex;

use crate::adapters::abi::ISwapProtocol;
use crate::domain::draft::{DraftParams, LockState, Party, Resolution, ResolveTx, StateRef};
use crate::domain::event::EventTemplate;
use crate::domain::intent::SwapIntent;
use crate::ports::drafts::{DraftStore, StoreError};
use crate::ports::local::{LocalLedger, LocalLedgerError};
use crate::ports::remote::{RemoteError, RemoteLedger};
use crate::proofs::{assemble_unlock_data, verify_unlock_data, ProofStrategy, VerifyError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapPhase {
    Drafted,
    Signed,
    RemoteCommitted,
    ProofCollected,
    Expired,
    Unlocked,
    Reverted,
}

#[derive(Debug, thiserror::Error)]
pub enum SwapError {
    #[error("unknown swap: {0}")]
    UnknownSwap(B256),

    #[error("swap already exists: {0}")]
    DuplicateSwap(B256),

    #[error("operation not permitted in phase {phase:?}")]
    InvalidTransition { phase: SwapPhase },

    #[error("swap is past its deadline; only revert is permitted")]
    Expired,

    #[error("caller {0} is not the swap owner")]
    NotOwner(Party),

    #[error("threshold {threshold} must be positive and at most {validators} validator(s)")]
    BadValidatorSet { threshold: u64, validators: usize },

    #[error("asset is not in the caller's vault")]
    AssetNotOwned,

    #[error("draft transaction id does not equal the swap id")]
    DraftIdMismatch,

    #[error("local transaction must contain exactly one lock state and one asset output")]
    MalformedSwap,

    #[error("insufficient signatures collected: {collected} of {required}")]
    Threshold { collected: usize, required: u64 },

    #[error("remote commitment not observed for swap {0}")]
    CommitNotObserved(B256),

    #[error(transparent)]
    Verify(#[from] VerifyError),

    #[error("remote ledger: {0}")]
    Remote(#[from] RemoteError),

    #[error("local ledger: {0}")]
    Local(#[from] LocalLedgerError),

    #[error("draft store: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug)]
struct SwapRecord {
    intent: SwapIntent,
    lock: LockState,
    phase: SwapPhase,
    deadline: Instant,
    strategy: Option<ProofStrategy>,
}

impl SwapRecord {
    /// Deadline check for non-terminal progress. Past the deadline the
    /// record flips to Expired and only revert is accepted.
    fn check_deadline(&mut self) -> Result<(), SwapError> {
        if self.phase == SwapPhase::Expired {
            return Err(SwapError::Expired);
        }
        if Instant::now() >= self.deadline {
            self.phase = SwapPhase::Expired;
            return Err(SwapError::Expired);
        }
        Ok(())
    }
}

/// Swap coordinator, generic over the remote RPC, local ledger and
/// draft-tx service capabilities.
pub struct SwapCoordinator<R: RemoteLedger, L: LocalLedger, S: DraftStore> {
    remote: R,
    local: L,
    drafts: S,
    swap_deadline: Duration,
    records: Mutex<HashMap<B256, Arc<Mutex<SwapRecord>>>>,
}

impl<R: RemoteLedger, L: LocalLedger, S: DraftStore> SwapCoordinator<R, L, S> {
    pub fn new(remote: R, local: L, drafts: S, swap_deadline: Duration) -> Self {
        Self {
            remote,
            local,
            drafts,
            swap_deadline,
            records: Mutex::new(HashMap::new()),
        }
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    pub fn local(&self) -> &L {
        &self.local
    }

    pub fn draft_store(&self) -> &S {
        &self.drafts
    }

    pub async fn phase(&self, swap_id: B256) -> Result<SwapPhase, SwapError> {
        let record = self.record(swap_id).await?;
        let record = record.lock().await;
        Ok(record.phase)
    }

    async fn record(&self, swap_id: B256) -> Result<Arc<Mutex<SwapRecord>>, SwapError> {
        self.records
            .lock()
            .await
            .get(&swap_id)
            .cloned()
            .ok_or(SwapError::UnknownSwap(swap_id))
    }

    /// Draft the local transaction for an intent: the asset input is
    /// consumed into a lock state plus an asset output for the recipient.
    /// Returns the swap id, which is also the draft transaction id.
    pub async fn draft(
        &self,
        caller: &Party,
        intent: SwapIntent,
        asset_ref: StateRef,
        params: DraftParams,
    ) -> Result<B256, SwapError> {
        if params.threshold == 0 || params.threshold as usize > params.validators.len() {
            return Err(SwapError::BadValidatorSet {
                threshold: params.threshold,
                validators: params.validators.len(),
            });
        }
        if caller != &params.owner_party {
            return Err(SwapError::NotOwner(caller.clone()));
        }
        let holdings = self.local.vault_query(caller).await?;
        if !holdings.iter().any(|(state_ref, _)| *state_ref == asset_ref) {
            return Err(SwapError::AssetNotOwned);
        }

        let swap_id = intent.swap_id;
        {
            let records = self.records.lock().await;
            if records.contains_key(&swap_id) {
                return Err(SwapError::DuplicateSwap(swap_id));
            }
        }

        let template = EventTemplate::from_intent(&intent);
        let lock = LockState {
            swap_id,
            owner_party: params.owner_party.clone(),
            recipient_party: params.recipient_party.clone(),
            notary: params.notary.clone(),
            approved_validators: params.validators.clone(),
            signatures_threshold: params.threshold,
            claim_event: template.claim(swap_id),
            revert_event: template.revert(swap_id),
        };

        let draft = self
            .local
            .build_draft_swap_tx(&intent, asset_ref, lock.clone())
            .await?;
        if draft.tx_id != swap_id {
            return Err(SwapError::DraftIdMismatch);
        }
        self.drafts.put_draft(draft).await?;

        let record = SwapRecord {
            intent,
            lock,
            phase: SwapPhase::Drafted,
            deadline: Instant::now() + self.swap_deadline,
            strategy: None,
        };
        match self.records.lock().await.entry(swap_id) {
            std::collections::hash_map::Entry::Occupied(_) => {
                return Err(SwapError::DuplicateSwap(swap_id));
            }
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(Arc::new(Mutex::new(record)));
            }
        }

        tracing::info!(%swap_id, owner = %caller, "swap drafted");
        Ok(swap_id)
    }

    /// Owner signs the draft; the local ledger notarizes it and the lock
    /// goes live.
    pub async fn sign(&self, caller: &Party, swap_id: B256) -> Result<(), SwapError> {
        let record = self.record(swap_id).await?;
        let mut record = record.lock().await;
        if record.phase != SwapPhase::Drafted {
            return Err(SwapError::InvalidTransition {
                phase: record.phase,
            });
        }
        record.check_deadline()?;
        if caller != &record.lock.owner_party {
            return Err(SwapError::NotOwner(caller.clone()));
        }

        let signed = self.local.sign_tx(swap_id).await?;
        self.drafts.put_signed_draft(signed).await?;
        record.phase = SwapPhase::Signed;

        tracing::info!(%swap_id, "draft signed and notarized");
        Ok(())
    }

    /// Confirm the counterpart's commitment on the remote contract.
    pub async fn remote_commit_observed(&self, swap_id: B256) -> Result<(), SwapError> {
        let record = self.record(swap_id).await?;
        let mut record = record.lock().await;
        if record.phase != SwapPhase::Signed {
            return Err(SwapError::InvalidTransition {
                phase: record.phase,
            });
        }
        record.check_deadline()?;

        let query = ISwapProtocol::commitExistsCall { swapId: swap_id };
        let response = self
            .remote
            .call(
                record.intent.protocol_address,
                Bytes::from(query.abi_encode()),
            )
            .await?;
        let exists = bool::abi_decode(&response)
            .map_err(|e| RemoteError::Rpc(e.to_string()))?;
        if !exists {
            return Err(SwapError::CommitNotObserved(swap_id));
        }

        record.phase = SwapPhase::RemoteCommitted;
        tracing::info!(%swap_id, "remote commitment observed");
        Ok(())
    }

    /// Gather proof material for the block carrying the remote event.
    ///
    /// Block signatures accumulate in the draft store and partial sets
    /// are fine — the threshold gates unlock, not collection. The
    /// notarization strategy additionally submits the collected notary
    /// set to the remote contract's claim entry point.
    pub async fn collect_proofs(
        &self,
        swap_id: B256,
        block_number: u64,
        strategy: ProofStrategy,
    ) -> Result<(), SwapError> {
        let record = self.record(swap_id).await?;
        let mut record = record.lock().await;
        match record.phase {
            SwapPhase::Signed | SwapPhase::RemoteCommitted | SwapPhase::ProofCollected => {}
            phase => return Err(SwapError::InvalidTransition { phase }),
        }
        record.check_deadline()?;

        match strategy {
            ProofStrategy::BlockSignatures => {
                let collected = self
                    .drafts
                    .block_signatures(swap_id, block_number)
                    .await?
                    .len();
                tracing::info!(%swap_id, block_number, collected, "block signatures collected");
            }
            ProofStrategy::NotarizationSignatures => {
                let signatures = self.drafts.notary_signatures(swap_id).await?;
                if signatures.is_empty() {
                    return Err(SwapError::Threshold {
                        collected: 0,
                        required: record.lock.signatures_threshold,
                    });
                }
                let call = ISwapProtocol::claimWithSignaturesCall {
                    swapId: swap_id,
                    notarySignatures: signatures
                        .iter()
                        .map(|s| Bytes::from(s.to_bytes()))
                        .collect(),
                };
                let tx_hash = self
                    .remote
                    .send_transaction(
                        record.intent.protocol_address,
                        Bytes::from(call.abi_encode()),
                        U256::ZERO,
                    )
                    .await?;
                tracing::info!(%swap_id, %tx_hash, "notarized claim submitted to remote contract");
            }
        }

        record.strategy = Some(strategy);
        record.phase = SwapPhase::ProofCollected;
        Ok(())
    }

    /// Resolve the lock in the recipient's favor with a proof of the
    /// remote claim event.
    pub async fn unlock(
        &self,
        swap_id: B256,
        block_number: u64,
        tx_index: u64,
    ) -> Result<(), SwapError> {
        let record = self.record(swap_id).await?;
        let mut record = record.lock().await;
        if record.phase != SwapPhase::ProofCollected {
            return Err(SwapError::InvalidTransition {
                phase: record.phase,
            });
        }
        record.check_deadline()?;

        self.resolve(&record, Resolution::Unlock, block_number, tx_index)
            .await?;
        record.phase = SwapPhase::Unlocked;
        tracing::info!(
            %swap_id,
            block_number,
            tx_index,
            strategy = ?record.strategy,
            "swap unlocked"
        );
        Ok(())
    }

    /// Resolve the lock back to the owner with a proof of the remote
    /// revert event. Permitted after proof collection or once the swap
    /// has expired.
    pub async fn revert(
        &self,
        swap_id: B256,
        block_number: u64,
        tx_index: u64,
    ) -> Result<(), SwapError> {
        let record = self.record(swap_id).await?;
        let mut record = record.lock().await;
        match record.phase {
            SwapPhase::ProofCollected | SwapPhase::Expired => {}
            phase => return Err(SwapError::InvalidTransition { phase }),
        }

        self.resolve(&record, Resolution::Revert, block_number, tx_index)
            .await?;
        record.phase = SwapPhase::Reverted;
        tracing::info!(%swap_id, block_number, tx_index, "swap reverted");
        Ok(())
    }

    /// Expire a swap that never reached the remote-commitment round trip.
    pub async fn timeout(&self, swap_id: B256) -> Result<(), SwapError> {
        let record = self.record(swap_id).await?;
        let mut record = record.lock().await;
        match record.phase {
            SwapPhase::Drafted | SwapPhase::Signed => {}
            phase => return Err(SwapError::InvalidTransition { phase }),
        }
        record.phase = SwapPhase::Expired;
        tracing::info!(%swap_id, "swap expired");
        Ok(())
    }

    /// The resolution pipeline shared by unlock and revert:
    ///
    /// 1. load the signed draft and split out its lock and asset outputs,
    /// 2. require a raw signature count at threshold,
    /// 3. fetch the header and the full receipt feed for the block,
    /// 4.-6. rebuild the receipts trie, check the header root, cut the
    ///    witness for the target transaction,
    /// 7. verify the bundle and submit the resolve transaction; the local
    ///    ledger re-verifies independently before consuming the lock.
    async fn resolve(
        &self,
        record: &SwapRecord,
        resolution: Resolution,
        block_number: u64,
        tx_index: u64,
    ) -> Result<(), SwapError> {
        let swap_id = record.intent.swap_id;
        let signed = self.drafts.signed_draft(swap_id).await?;
        let (lock, _asset) = signed
            .draft
            .lock_and_asset_outputs()
            .ok_or(SwapError::MalformedSwap)?;

        let signatures = self.drafts.block_signatures(swap_id, block_number).await?;
        if (signatures.len() as u64) < lock.signatures_threshold {
            return Err(SwapError::Threshold {
                collected: signatures.len(),
                required: lock.signatures_threshold,
            });
        }

        let header = self.remote.get_block(block_number).await?;
        let receipts = self.remote.get_block_receipts(block_number).await?;

        let bundle =
            assemble_unlock_data(&receipts, header.receipts_root, tx_index, signatures)?;

        let expected = match resolution {
            Resolution::Unlock => &lock.claim_event,
            Resolution::Revert => &lock.revert_event,
        };
        verify_unlock_data(
            &bundle,
            block_number,
            tx_index,
            expected,
            &lock.approved_validators,
            lock.signatures_threshold,
        )?;

        self.local
            .finalize_tx(ResolveTx {
                swap_id,
                resolution,
                block_number,
                tx_index,
                bundle,
            })
            .await?;
        Ok(())
    }
}
