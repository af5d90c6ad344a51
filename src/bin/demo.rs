//! Demo harness: a full swap over the in-memory adapters.
//!
//! Bob holds an asset on the local ledger; Alice commits the matching
//! tokens on the (mock) remote ledger and claims to Bob's remote
//! address. Bob collects validator attestations over the claim block and
//! unlocks, transferring the local asset to Alice.
//!
//! Run with: `cargo run --bin demo`

use std::time::Duration;

use alloy::primitives::{Address, Bytes, U256};
use alloy::signers::local::PrivateKeySigner;
use alloy::sol_types::SolCall;
use anyhow::Context;

use ledger_swap::adapters::abi::ISwapProtocol;
use ledger_swap::adapters::memory_drafts::InMemoryDraftStore;
use ledger_swap::adapters::mock_local::MockLocalLedger;
use ledger_swap::adapters::mock_remote::MockRemoteLedger;
use ledger_swap::coordinator::SwapCoordinator;
use ledger_swap::crypto::signatures::BlockAttestation;
use ledger_swap::domain::draft::{DraftParams, Party};
use ledger_swap::domain::intent::SwapIntent;
use ledger_swap::ports::drafts::DraftStore;
use ledger_swap::ports::local::LocalLedger;
use ledger_swap::ports::remote::RemoteLedger;
use ledger_swap::proofs::ProofStrategy;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let bob = Party::new("bob");
    let alice = Party::new("alice");
    let protocol = Address::repeat_byte(0x11);
    let alice_remote = Address::repeat_byte(0xaa);
    let bob_remote = Address::repeat_byte(0xbb);

    // Charlie and Bob run the validator oracles.
    let validator_keys: Vec<PrivateKeySigner> =
        (0..2).map(|_| PrivateKeySigner::random()).collect();
    let validators: Vec<Address> = validator_keys.iter().map(|k| k.address()).collect();

    let intent = SwapIntent::new(
        1337,
        protocol,
        alice_remote,
        bob_remote,
        U256::from(100u64),
        U256::ZERO,
        Address::repeat_byte(0x22),
        2,
        validators.clone(),
    )?;
    tracing::info!(swap_id = %intent.swap_id, "intent agreed");

    let local = MockLocalLedger::new();
    local.register_party(bob.clone()).await;
    local.register_party(alice.clone()).await;
    let asset_ref = local.issue_asset(&bob, U256::from(100u64)).await?;

    let remote = MockRemoteLedger::new(alice_remote);
    let coordinator = SwapCoordinator::new(
        remote,
        local,
        InMemoryDraftStore::new(),
        Duration::from_secs(3600),
    );

    // Bob drafts and signs the local lock.
    let swap_id = coordinator
        .draft(
            &bob,
            intent.clone(),
            asset_ref,
            DraftParams {
                owner_party: bob.clone(),
                recipient_party: alice.clone(),
                notary: Party::new("notary"),
                validators,
                threshold: 2,
            },
        )
        .await?;
    coordinator.sign(&bob, swap_id).await?;

    // Alice commits and claims on the remote ledger.
    let commit = ISwapProtocol::commitCall {
        swapId: swap_id,
        token: intent.token_address,
        amount: intent.amount,
        tokenId: intent.token_id,
        recipient: intent.recipient,
        threshold: U256::from(intent.signatures_threshold),
        signers: intent.signers.clone(),
    };
    coordinator
        .remote()
        .send_transaction(protocol, Bytes::from(commit.abi_encode()), U256::ZERO)
        .await?;
    coordinator.remote_commit_observed(swap_id).await?;

    let claim = ISwapProtocol::claimCall { swapId: swap_id };
    let claim_tx = coordinator
        .remote()
        .send_transaction(protocol, Bytes::from(claim.abi_encode()), U256::ZERO)
        .await?;
    let located = coordinator.remote().get_transaction_receipt(claim_tx).await?;
    tracing::info!(
        block = located.block_number,
        tx_index = located.tx_index,
        "claim landed on the remote ledger"
    );

    // Validators attest to the claim block's receipts root.
    let header = coordinator.remote().get_block(located.block_number).await?;
    for key in &validator_keys {
        let attestation =
            BlockAttestation::sign(key, header.receipts_root, located.block_number)?;
        coordinator
            .draft_store()
            .append_block_signature(swap_id, located.block_number, attestation)
            .await?;
    }

    coordinator
        .collect_proofs(swap_id, located.block_number, ProofStrategy::BlockSignatures)
        .await?;
    coordinator
        .unlock(swap_id, located.block_number, located.tx_index)
        .await?;

    let holdings = coordinator.local().vault_query(&alice).await?;
    let (state_ref, asset) = holdings.first().context("alice should hold the asset")?;
    tracing::info!(%state_ref, amount = %asset.amount, "asset released to alice");
    Ok(())
}
