pub mod drafts;
pub mod local;
pub mod remote;

use alloy::primitives::B256;
use serde::{Deserialize, Serialize};

use crate::domain::receipt::Receipt;

/// The header fields the swap core reads from a remote block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub number: u64,
    pub hash: B256,
    pub receipts_root: B256,
    pub timestamp: u64,
}

/// A receipt together with where it sits in its block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocatedReceipt {
    pub block_number: u64,
    pub tx_index: u64,
    pub receipt: Receipt,
}
