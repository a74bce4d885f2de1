//! Integration tests for the settlement funding and claim flow
//!
//! Exercises the full mock-mode lifecycle:
//! 1. Operator commits a merkle root and creates a settlement
//! 2. Bond-owned stake accounts fund it (consume and split paths)
//! 3. Funding conservation: lamports_funded never exceeds max_total_claim
//! 4. Claimants redeem leaves with proofs; duplicates are benign no-ops
//! 5. The expired settlement closes

use solana_sdk::pubkey::Pubkey;
use stakebond_client::{
    BondsClient, BondsClientError, ClaimFilter, ClaimSettlementArgs, ClaimSettlementResult,
    ClientConfig, FundSettlementOptions, FundSettlementResult,
};
use stakebond_core::{claim_leaf, ConfigState, MerkleTree};

const SOL: u64 = 1_000_000_000;

// =============================================================================
// HELPERS
// =============================================================================

fn mock_client() -> BondsClient {
    let mut config = ClientConfig::mock();
    config.program_id = Pubkey::new_unique();
    config.config_address = Pubkey::new_unique();
    let client = BondsClient::new(config, Pubkey::new_unique());
    client.add_mock_config(ConfigState {
        admin_authority: [1u8; 32],
        operator_authority: [2u8; 32],
        epochs_to_claim_settlement: 4,
        withdraw_lockup_epochs: 3,
        minimum_stake_lamports: SOL,
        pause_authority: [3u8; 32],
        paused: false,
        min_bond_max_stake_wanted: 0,
    });
    client
}

struct Claimant {
    stake_authority: Pubkey,
    withdraw_authority: Pubkey,
    amount: u64,
}

/// Build a merkle tree over `amounts` and a settlement committed to it.
fn committed_settlement(
    client: &BondsClient,
    vote_account: &Pubkey,
    amounts: &[u64],
    max_total_claim: u64,
) -> (Pubkey, MerkleTree, Vec<Claimant>) {
    let claimants: Vec<Claimant> = amounts
        .iter()
        .map(|amount| Claimant {
            stake_authority: Pubkey::new_unique(),
            withdraw_authority: Pubkey::new_unique(),
            amount: *amount,
        })
        .collect();
    let leaves: Vec<[u8; 32]> = claimants
        .iter()
        .enumerate()
        .map(|(i, c)| {
            claim_leaf(
                &c.stake_authority.to_bytes(),
                &c.withdraw_authority.to_bytes(),
                c.amount,
                i as u64,
            )
        })
        .collect();
    let tree = MerkleTree::from_leaves(&leaves);
    let settlement = client
        .add_mock_settlement(
            vote_account,
            tree.root().unwrap(),
            max_total_claim,
            leaves.len() as u64,
            0,
        )
        .unwrap();
    (settlement, tree, claimants)
}

fn args_for(
    settlement: Pubkey,
    tree: &MerkleTree,
    claimants: &[Claimant],
    index: usize,
) -> ClaimSettlementArgs {
    let claimant = &claimants[index];
    ClaimSettlementArgs {
        settlement,
        claim_amount: claimant.amount,
        leaf_index: index as u64,
        merkle_proof: tree.proof(index).unwrap().siblings,
        stake_authority: claimant.stake_authority,
        withdraw_authority: claimant.withdraw_authority,
        source_stake_account: Pubkey::new_unique(),
        destination_stake_account: Pubkey::new_unique(),
    }
}

// =============================================================================
// 1. Funding conservation across consume, split, and saturated attempts
// =============================================================================

#[tokio::test]
async fn test_funding_conservation_scenario() {
    let client = mock_client();
    let vote_account = Pubkey::new_unique();
    client
        .add_mock_bond(&vote_account, &client.signer_pubkey())
        .unwrap();
    let (settlement, _, _) = committed_settlement(&client, &vote_account, &[10 * SOL], 10 * SOL);
    let m = client.minimal_stake_lamports().await.unwrap();
    let options = FundSettlementOptions::default();

    // First account smaller than the target: consumed whole
    let stake_a = client.add_mock_stake_account(5 * SOL).unwrap();
    let result = client
        .fund_settlement(&settlement, &stake_a, &options)
        .await
        .unwrap();
    assert!(matches!(
        result,
        FundSettlementResult::Funded { applied, split_stake_account: None, .. } if applied == 5 * SOL
    ));
    assert_eq!(
        client
            .get_settlement(&settlement)
            .await
            .unwrap()
            .lamports_funded,
        5 * SOL
    );

    // Second account overshoots by 2 minimal-viable units: split
    let stake_b = client.add_mock_stake_account(5 * SOL + 2 * m).unwrap();
    let result = client
        .fund_settlement(&settlement, &stake_b, &options)
        .await
        .unwrap();
    let FundSettlementResult::Funded {
        applied,
        split_stake_account,
        ..
    } = result
    else {
        panic!("expected funded result");
    };
    assert_eq!(applied, 5 * SOL);
    let split = split_stake_account.expect("split account created");
    assert_eq!(client.get_stake_account_lamports(&split).await.unwrap(), m);

    let state = client.get_settlement(&settlement).await.unwrap();
    assert_eq!(state.lamports_funded, 10 * SOL);
    assert!(state.is_fully_funded());
    assert!(state.split_rent_collector.is_some());

    // Saturated: any further attempt is a benign no-op
    for lamports in [SOL, 100 * SOL] {
        let stake = client.add_mock_stake_account(lamports).unwrap();
        let result = client
            .fund_settlement(&settlement, &stake, &options)
            .await
            .unwrap();
        assert!(matches!(result, FundSettlementResult::AlreadyFunded));
    }
    assert_eq!(
        client
            .get_settlement(&settlement)
            .await
            .unwrap()
            .lamports_funded,
        10 * SOL
    );
}

// =============================================================================
// 2. Accounts at the minimal viable floor never fund or split
// =============================================================================

#[tokio::test]
async fn test_floor_accounts_contribute_nothing() {
    let client = mock_client();
    let vote_account = Pubkey::new_unique();
    client
        .add_mock_bond(&vote_account, &client.signer_pubkey())
        .unwrap();
    let (settlement, _, _) = committed_settlement(&client, &vote_account, &[SOL], 10 * SOL);
    let m = client.minimal_stake_lamports().await.unwrap();

    for lamports in [m, m - 1, 1] {
        let stake = client.add_mock_stake_account(lamports).unwrap();
        let result = client
            .fund_settlement(&settlement, &stake, &FundSettlementOptions::default())
            .await
            .unwrap();
        assert!(matches!(result, FundSettlementResult::BelowMinimum));
        // The account is untouched
        assert_eq!(
            client.get_stake_account_lamports(&stake).await.unwrap(),
            lamports
        );
    }
    assert_eq!(
        client
            .get_settlement(&settlement)
            .await
            .unwrap()
            .lamports_funded,
        0
    );
}

// =============================================================================
// 3. Claim redemption, idempotence, and enumeration
// =============================================================================

#[tokio::test]
async fn test_claim_all_leaves_and_duplicates() {
    let client = mock_client();
    let vote_account = Pubkey::new_unique();
    client
        .add_mock_bond(&vote_account, &client.signer_pubkey())
        .unwrap();
    let (settlement, tree, claimants) =
        committed_settlement(&client, &vote_account, &[SOL, 2 * SOL, 3 * SOL], 6 * SOL);

    let stake = client.add_mock_stake_account(6 * SOL).unwrap();
    client
        .fund_settlement(&settlement, &stake, &FundSettlementOptions::default())
        .await
        .unwrap();

    // Redeem every leaf
    for index in 0..claimants.len() {
        assert!(!client.is_claimed(&settlement, index as u64).await.unwrap());
        let result = client
            .claim_settlement(&args_for(settlement, &tree, &claimants, index))
            .await
            .unwrap();
        assert!(matches!(result, ClaimSettlementResult::Claimed { .. }));
        assert!(client.is_claimed(&settlement, index as u64).await.unwrap());
    }

    let state = client.get_settlement(&settlement).await.unwrap();
    assert_eq!(state.lamports_claimed, 6 * SOL);
    assert_eq!(state.merkle_nodes_claimed, 3);

    // Every duplicate is a benign no-op leaving the totals unchanged
    for index in 0..claimants.len() {
        let result = client
            .claim_settlement(&args_for(settlement, &tree, &claimants, index))
            .await
            .unwrap();
        assert!(matches!(result, ClaimSettlementResult::AlreadyClaimed));
    }
    let state = client.get_settlement(&settlement).await.unwrap();
    assert_eq!(state.lamports_claimed, 6 * SOL);
    assert_eq!(state.merkle_nodes_claimed, 3);

    // Enumeration sees all three, and filters by vote account
    let records = client
        .find_claims(&ClaimFilter {
            settlement: Some(settlement),
            vote_account: Some(vote_account),
        })
        .await
        .unwrap();
    assert_eq!(records.len(), 3);
    let records = client
        .find_claims(&ClaimFilter {
            settlement: None,
            vote_account: Some(Pubkey::new_unique()),
        })
        .await
        .unwrap();
    assert!(records.is_empty());
}

// =============================================================================
// 4. Claims cannot exceed what was funded
// =============================================================================

#[tokio::test]
async fn test_claim_exceeding_funded_rejected() {
    let client = mock_client();
    let vote_account = Pubkey::new_unique();
    client
        .add_mock_bond(&vote_account, &client.signer_pubkey())
        .unwrap();
    let (settlement, tree, claimants) =
        committed_settlement(&client, &vote_account, &[4 * SOL], 4 * SOL);

    // Fund only 3 SOL of the 4 SOL target
    let stake = client.add_mock_stake_account(3 * SOL).unwrap();
    client
        .fund_settlement(&settlement, &stake, &FundSettlementOptions::default())
        .await
        .unwrap();

    let result = client
        .claim_settlement(&args_for(settlement, &tree, &claimants, 0))
        .await;
    assert!(matches!(result, Err(BondsClientError::Precondition(_))));
    assert!(!client.is_claimed(&settlement, 0).await.unwrap());
}

// =============================================================================
// 5. Expiry gates funding and closing in opposite directions
// =============================================================================

#[tokio::test]
async fn test_expiry_window() {
    let client = mock_client();
    let vote_account = Pubkey::new_unique();
    client
        .add_mock_bond(&vote_account, &client.signer_pubkey())
        .unwrap();
    let (settlement, _, _) = committed_settlement(&client, &vote_account, &[SOL], 10 * SOL);

    // Open window: funding allowed, close rejected
    assert!(matches!(
        client.close_settlement(&settlement).await,
        Err(BondsClientError::Precondition(_))
    ));

    // epochs_to_claim_settlement = 4, created at epoch 0: last epoch is 4
    client.set_mock_epoch(4);
    let stake = client.add_mock_stake_account(2 * SOL).unwrap();
    client
        .fund_settlement(&settlement, &stake, &FundSettlementOptions::default())
        .await
        .unwrap();

    // Past the window: funding rejected, close allowed
    client.set_mock_epoch(5);
    let stake = client.add_mock_stake_account(2 * SOL).unwrap();
    assert!(matches!(
        client
            .fund_settlement(&settlement, &stake, &FundSettlementOptions::default())
            .await,
        Err(BondsClientError::Precondition(_))
    ));
    client.close_settlement(&settlement).await.unwrap();
    assert!(matches!(
        client.get_settlement(&settlement).await,
        Err(BondsClientError::NotFound(_))
    ));
}
