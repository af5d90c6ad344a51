use std::future::Future;

use alloy::primitives::{Address, Bytes, B256, U256};

use super::{BlockHeader, LocatedReceipt};
use crate::domain::receipt::Receipt;

/// Port for the remote-ledger RPC capability.
///
/// Implementations:
/// - `EvmRemoteLedger` (alloy provider)
/// - `MockRemoteLedger` for tests and the demo harness
pub trait RemoteLedger: Send + Sync {
    /// Receipt for a transaction, with its block number and index.
    fn get_transaction_receipt(
        &self,
        tx_hash: B256,
    ) -> impl Future<Output = Result<LocatedReceipt, RemoteError>> + Send;

    /// Header of a block, including the receipts-root commitment.
    fn get_block(
        &self,
        number: u64,
    ) -> impl Future<Output = Result<BlockHeader, RemoteError>> + Send;

    /// All receipts of a block, in transaction order.
    fn get_block_receipts(
        &self,
        number: u64,
    ) -> impl Future<Output = Result<Vec<Receipt>, RemoteError>> + Send;

    /// Submit a transaction; resolves to the transaction hash once
    /// accepted.
    fn send_transaction(
        &self,
        to: Address,
        data: Bytes,
        value: U256,
    ) -> impl Future<Output = Result<B256, RemoteError>> + Send;

    /// Execute a view call.
    fn call(
        &self,
        to: Address,
        data: Bytes,
    ) -> impl Future<Output = Result<Bytes, RemoteError>> + Send;
}

#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("block not found: {0}")]
    BlockNotFound(u64),

    #[error("receipt not found for transaction: {0}")]
    ReceiptNotFound(B256),

    #[error("transaction failed: {0}")]
    TransactionFailed(String),

    #[error("RPC error: {0}")]
    Rpc(String),
}
