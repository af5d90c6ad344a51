//! Local-ledger transaction model: parties, states, drafts and the
//! resolve transaction that consumes a lock.

use alloy::primitives::{Address, Signature, B256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::event::ExpectedEvent;
use crate::proofs::UnlockData;

/// A named identity on the local ledger.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Party(pub String);

impl Party {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reference to an unspent output: producing transaction plus output index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateRef {
    pub tx_hash: B256,
    pub index: u32,
}

impl fmt::Display for StateRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.tx_hash, self.index)
    }
}

/// A fungible holding on the local ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetState {
    pub owner: Party,
    pub amount: U256,
}

/// The output that encapsulates the swap terms on the local ledger.
/// Consumed by exactly one of unlock or revert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockState {
    pub swap_id: B256,
    pub owner_party: Party,
    pub recipient_party: Party,
    pub notary: Party,
    /// Local parties whose attestations authorize resolution.
    pub approved_validators: Vec<Address>,
    pub signatures_threshold: u64,
    /// Remote event that releases the asset to the recipient.
    pub claim_event: ExpectedEvent,
    /// Remote event that returns the asset to the owner.
    pub revert_event: ExpectedEvent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Output {
    Lock(LockState),
    Asset(AssetState),
}

/// Parameters the owner fixes when drafting, beyond the intent itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftParams {
    pub owner_party: Party,
    pub recipient_party: Party,
    pub notary: Party,
    pub validators: Vec<Address>,
    pub threshold: u64,
}

/// Unsigned local transaction produced from an intent. Its id equals the
/// swap id by construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftSwapTx {
    pub tx_id: B256,
    pub inputs: Vec<StateRef>,
    pub outputs: Vec<Output>,
    pub notary: Party,
}

impl DraftSwapTx {
    /// The one lock state and one asset output a well-formed draft carries.
    /// `None` for anything else.
    pub fn lock_and_asset_outputs(&self) -> Option<(&LockState, &AssetState)> {
        let mut lock = None;
        let mut asset = None;
        for output in &self.outputs {
            match output {
                Output::Lock(state) => {
                    if lock.replace(state).is_some() {
                        return None;
                    }
                }
                Output::Asset(state) => {
                    if asset.replace(state).is_some() {
                        return None;
                    }
                }
            }
        }
        lock.zip(asset)
    }
}

/// Draft carrying the owner's signature; still unnotarized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedDraft {
    pub draft: DraftSwapTx,
    pub owner_signature: Signature,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    Unlock,
    Revert,
}

/// Local transaction consuming a lock state, carrying the proof bundle
/// the local contract re-verifies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveTx {
    pub swap_id: B256,
    pub resolution: Resolution,
    pub block_number: u64,
    pub tx_index: u64,
    pub bundle: UnlockData,
}
