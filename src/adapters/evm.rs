//! Remote-ledger adapter over an alloy provider.

use std::time::Duration;

use alloy::consensus::TxReceipt as _;
use alloy::network::EthereumWallet;
use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::{TransactionReceipt, TransactionRequest};
use alloy::signers::local::PrivateKeySigner;
use alloy::sol_types::SolCall;

use super::abi::ISwapProtocol;
use crate::crypto::signatures::NotarySignature;
use crate::domain::intent::SwapIntent;
use crate::domain::receipt::{Log, Receipt};
use crate::ports::remote::{RemoteError, RemoteLedger};
use crate::ports::{BlockHeader, LocatedReceipt};

pub struct EvmRemoteLedger {
    provider: DynProvider,
    protocol: Address,
    attempt_timeout: Duration,
    max_attempts: u32,
}

impl EvmRemoteLedger {
    pub async fn connect(
        rpc_url: &str,
        private_key: &str,
        protocol: Address,
        attempt_timeout: Duration,
        max_attempts: u32,
    ) -> Result<Self, RemoteError> {
        let signer: PrivateKeySigner = private_key
            .parse()
            .map_err(|e| RemoteError::Rpc(format!("invalid private key: {e}")))?;
        let wallet = EthereumWallet::from(signer);
        let provider = DynProvider::new(
            ProviderBuilder::new().wallet(wallet).connect_http(
                rpc_url
                    .parse()
                    .map_err(|e| RemoteError::Rpc(format!("invalid RPC URL: {e}")))?,
            ),
        );
        Ok(Self {
            provider,
            protocol,
            attempt_timeout,
            max_attempts,
        })
    }

    fn convert_receipt(receipt: &TransactionReceipt) -> Receipt {
        Receipt {
            tx_type: receipt.inner.tx_type() as u8,
            status: receipt.inner.status(),
            cumulative_gas_used: receipt.inner.cumulative_gas_used(),
            logs_bloom: receipt.inner.bloom(),
            logs: receipt
                .inner
                .logs()
                .iter()
                .map(|log| Log {
                    address: log.inner.address,
                    topics: log.inner.data.topics().to_vec(),
                    data: log.inner.data.data.clone(),
                })
                .collect(),
        }
    }

    /// Commit the remote side of an intent.
    pub async fn commit(&self, intent: &SwapIntent) -> Result<B256, RemoteError> {
        let call = ISwapProtocol::commitCall {
            swapId: intent.swap_id,
            token: intent.token_address,
            amount: intent.amount,
            tokenId: intent.token_id,
            recipient: intent.recipient,
            threshold: U256::from(intent.signatures_threshold),
            signers: intent.signers.clone(),
        };
        self.send_transaction(self.protocol, Bytes::from(call.abi_encode()), U256::ZERO)
            .await
    }

    pub async fn claim(&self, swap_id: B256) -> Result<B256, RemoteError> {
        let call = ISwapProtocol::claimCall { swapId: swap_id };
        self.send_transaction(self.protocol, Bytes::from(call.abi_encode()), U256::ZERO)
            .await
    }

    pub async fn revert_swap(&self, swap_id: B256) -> Result<B256, RemoteError> {
        let call = ISwapProtocol::revertSwapCall { swapId: swap_id };
        self.send_transaction(self.protocol, Bytes::from(call.abi_encode()), U256::ZERO)
            .await
    }

    pub async fn claim_with_signatures(
        &self,
        swap_id: B256,
        signatures: &[NotarySignature],
    ) -> Result<B256, RemoteError> {
        let call = ISwapProtocol::claimWithSignaturesCall {
            swapId: swap_id,
            notarySignatures: signatures
                .iter()
                .map(|s| Bytes::from(s.to_bytes()))
                .collect(),
        };
        self.send_transaction(self.protocol, Bytes::from(call.abi_encode()), U256::ZERO)
            .await
    }

    async fn submit_once(
        &self,
        request: TransactionRequest,
    ) -> Result<TransactionReceipt, RemoteError> {
        let pending = self
            .provider
            .send_transaction(request)
            .await
            .map_err(|e| RemoteError::TransactionFailed(format!("send failed: {e}")))?;
        pending
            .get_receipt()
            .await
            .map_err(|e| RemoteError::TransactionFailed(format!("receipt failed: {e}")))
    }
}

impl RemoteLedger for EvmRemoteLedger {
    async fn get_transaction_receipt(
        &self,
        tx_hash: B256,
    ) -> Result<LocatedReceipt, RemoteError> {
        let receipt = self
            .provider
            .get_transaction_receipt(tx_hash)
            .await
            .map_err(|e| RemoteError::Rpc(e.to_string()))?
            .ok_or(RemoteError::ReceiptNotFound(tx_hash))?;
        let block_number = receipt
            .block_number
            .ok_or_else(|| RemoteError::Rpc("receipt is pending".into()))?;
        let tx_index = receipt
            .transaction_index
            .ok_or_else(|| RemoteError::Rpc("receipt is pending".into()))?;
        Ok(LocatedReceipt {
            block_number,
            tx_index,
            receipt: Self::convert_receipt(&receipt),
        })
    }

    async fn get_block(&self, number: u64) -> Result<BlockHeader, RemoteError> {
        let block = self
            .provider
            .get_block_by_number(number.into())
            .await
            .map_err(|e| RemoteError::Rpc(e.to_string()))?
            .ok_or(RemoteError::BlockNotFound(number))?;
        Ok(BlockHeader {
            number,
            hash: block.header.hash,
            receipts_root: block.header.receipts_root,
            timestamp: block.header.timestamp,
        })
    }

    async fn get_block_receipts(&self, number: u64) -> Result<Vec<Receipt>, RemoteError> {
        let receipts = self
            .provider
            .get_block_receipts(number.into())
            .await
            .map_err(|e| RemoteError::Rpc(e.to_string()))?
            .ok_or(RemoteError::BlockNotFound(number))?;
        Ok(receipts.iter().map(Self::convert_receipt).collect())
    }

    async fn send_transaction(
        &self,
        to: Address,
        data: Bytes,
        value: U256,
    ) -> Result<B256, RemoteError> {
        let request = TransactionRequest::default()
            .to(to)
            .input(data.into())
            .value(value);

        for attempt in 1..=self.max_attempts {
            if attempt > 1 {
                tokio::time::sleep(Duration::from_secs(2 * attempt as u64)).await;
            }
            tracing::info!(attempt, %to, "sending remote transaction");

            match tokio::time::timeout(self.attempt_timeout, self.submit_once(request.clone()))
                .await
            {
                Ok(Ok(receipt)) if receipt.status() => {
                    return Ok(receipt.transaction_hash);
                }
                Ok(Ok(receipt)) => {
                    tracing::warn!(attempt, tx = ?receipt.transaction_hash, "transaction reverted");
                }
                Ok(Err(e)) => {
                    tracing::warn!(attempt, error = %e, "transaction failed");
                }
                Err(_) => {
                    tracing::warn!(attempt, "transaction timed out");
                }
            }
        }
        Err(RemoteError::TransactionFailed(format!(
            "gave up after {} attempt(s)",
            self.max_attempts
        )))
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, RemoteError> {
        let request = TransactionRequest::default().to(to).input(data.into());
        self.provider
            .call(request)
            .await
            .map_err(|e| RemoteError::Rpc(e.to_string()))
    }
}
