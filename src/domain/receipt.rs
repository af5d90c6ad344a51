//! Canonical encoding of remote transaction receipts and construction of
//! the per-block receipts trie.
//!
//! Byte-exact with the remote ledger: post-Byzantium receipts carry a
//! status flag rather than a state root, and typed transactions prepend
//! the transaction type byte before the RLP envelope.

use alloy::primitives::{Address, Bloom, BloomInput, Bytes, B256};
use serde::{Deserialize, Serialize};

use crate::rlp::{self, CodecError, Item};
use crate::trie::PatriciaTrie;

/// A single emitted log: originating contract, indexed topics, ABI data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Log {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
}

/// A remote transaction receipt in its consensus form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// EIP-2718 transaction type; zero for legacy.
    pub tx_type: u8,
    pub status: bool,
    pub cumulative_gas_used: u64,
    pub logs_bloom: Bloom,
    pub logs: Vec<Log>,
}

impl Receipt {
    /// Build a successful receipt, deriving the bloom from the logs.
    pub fn successful(tx_type: u8, cumulative_gas_used: u64, logs: Vec<Log>) -> Self {
        let logs_bloom = bloom_for_logs(&logs);
        Self {
            tx_type,
            status: true,
            cumulative_gas_used,
            logs_bloom,
            logs,
        }
    }

    /// Canonical encoding: `RLP([status, cumulative_gas, bloom, logs])`,
    /// prefixed with the type byte for typed transactions.
    pub fn encode(&self) -> Vec<u8> {
        let logs: Vec<Vec<u8>> = self.logs.iter().map(encode_log).collect();
        let envelope = rlp::encode_list(&[
            rlp::encode_uint(self.status as u64),
            rlp::encode_uint(self.cumulative_gas_used),
            rlp::encode_bytes(self.logs_bloom.as_slice()),
            rlp::encode_list(&logs),
        ]);
        if self.tx_type == 0 {
            envelope
        } else {
            let mut out = Vec::with_capacity(envelope.len() + 1);
            out.push(self.tx_type);
            out.extend_from_slice(&envelope);
            out
        }
    }

    /// Inverse of [`Receipt::encode`]; accepts both legacy and typed forms.
    pub fn decode(buf: &[u8]) -> Result<Self, CodecError> {
        let first = *buf.first().ok_or(CodecError::Truncated { needed: 1 })?;
        let (tx_type, envelope) = if first >= 0xc0 {
            (0u8, buf)
        } else {
            (first, &buf[1..])
        };

        let item = rlp::decode(envelope)?;
        let fields = item.as_list()?;
        if fields.len() != 4 {
            return Err(CodecError::ExpectedList);
        }

        let status = !fields[0].as_bytes()?.is_empty();
        let cumulative_gas_used = uint_from(&fields[1])?;
        let logs_bloom = Bloom::from_slice(checked_len(fields[2].as_bytes()?, 256)?);
        let logs = fields[3]
            .as_list()?
            .iter()
            .map(decode_log)
            .collect::<Result<_, _>>()?;

        Ok(Self {
            tx_type,
            status,
            cumulative_gas_used,
            logs_bloom,
            logs,
        })
    }
}

fn encode_log(log: &Log) -> Vec<u8> {
    let topics: Vec<Vec<u8>> = log
        .topics
        .iter()
        .map(|t| rlp::encode_bytes(t.as_slice()))
        .collect();
    rlp::encode_list(&[
        rlp::encode_bytes(log.address.as_slice()),
        rlp::encode_list(&topics),
        rlp::encode_bytes(&log.data),
    ])
}

fn decode_log(item: &Item) -> Result<Log, CodecError> {
    let fields = item.as_list()?;
    if fields.len() != 3 {
        return Err(CodecError::ExpectedList);
    }
    let address = Address::from_slice(checked_len(fields[0].as_bytes()?, 20)?);
    let topics = fields[1]
        .as_list()?
        .iter()
        .map(|t| Ok(B256::from_slice(checked_len(t.as_bytes()?, 32)?)))
        .collect::<Result<_, CodecError>>()?;
    let data = Bytes::copy_from_slice(fields[2].as_bytes()?);
    Ok(Log {
        address,
        topics,
        data,
    })
}

fn checked_len(bytes: &[u8], wanted: usize) -> Result<&[u8], CodecError> {
    if bytes.len() != wanted {
        return Err(CodecError::FieldLength {
            got: bytes.len(),
            wanted,
        });
    }
    Ok(bytes)
}

fn uint_from(item: &Item) -> Result<u64, CodecError> {
    let payload = item.as_bytes()?;
    if payload.len() > 8 {
        return Err(CodecError::IntegerOverflow);
    }
    let mut value = 0u64;
    for &b in payload {
        value = value << 8 | b as u64;
    }
    Ok(value)
}

/// Accrue address and topics of each log into a bloom filter.
pub fn bloom_for_logs(logs: &[Log]) -> Bloom {
    let mut bloom = Bloom::ZERO;
    for log in logs {
        bloom.accrue(BloomInput::Raw(log.address.as_slice()));
        for topic in &log.topics {
            bloom.accrue(BloomInput::Raw(topic.as_slice()));
        }
    }
    bloom
}

/// Build the receipts trie for a block: each receipt keyed by the RLP of
/// its integer transaction index.
pub fn receipts_trie(receipts: &[Receipt]) -> PatriciaTrie {
    let mut trie = PatriciaTrie::new();
    for (index, receipt) in receipts.iter().enumerate() {
        trie.insert(&rlp::encode_uint(index as u64), receipt.encode());
    }
    trie
}

/// Root committed in the block header.
pub fn receipts_root(receipts: &[Receipt]) -> B256 {
    receipts_trie(receipts).root_hash()
}
