//! Atomic swap coordination between a UTXO-style private ledger and an
//! account-based public ledger with trie-committed receipts.
//!
//! Two parties exchange assets held on opposite ledgers without a trusted
//! intermediary. The local side locks the asset behind a time-limited
//! lock state whose resolution requires a cryptographic proof of the
//! matching remote event: a Merkle-Patricia inclusion proof of the event
//! receipt against the block's receipts root, plus a threshold of
//! validator attestations over that root.
//!
//! The crate is organized ports-and-adapters style: the state machine in
//! [`coordinator`] drives three injected capabilities ([`ports`]), with
//! production adapters and deterministic in-memory mocks in [`adapters`].
//! The proof machinery ([`rlp`], [`trie`], [`proofs`]) is pure and
//! usable on its own.

pub mod adapters;
pub mod config;
pub mod coordinator;
pub mod crypto;
pub mod domain;
pub mod ports;
pub mod proofs;
pub mod rlp;
pub mod trie;
