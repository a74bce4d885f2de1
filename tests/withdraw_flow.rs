//! Integration tests for the withdraw-ticket lifecycle
//!
//! Exercises the time-locked ticket in mock mode:
//! 1. Open a ticket; a second one for the same bond is rejected
//! 2. Lockup: claims rejected strictly before request_epoch + lockup,
//!    accepted at the boundary epoch itself
//! 3. Partial claims leave the ticket live with the remainder
//! 4. A full claim deletes the ticket; a new one may then open
//! 5. Cancel works in any non-claimed state without waiting

use solana_sdk::pubkey::Pubkey;
use stakebond_client::{
    BondsClient, BondsClientError, ClaimWithdrawOptions, ClaimWithdrawResult, ClientConfig,
    WithdrawRequestStatus,
};
use stakebond_core::{ConfigState, FundingPlan};

const SOL: u64 = 1_000_000_000;
const LOCKUP_EPOCHS: u64 = 3;

// =============================================================================
// HELPERS
// =============================================================================

fn client_with_bond() -> (BondsClient, Pubkey) {
    let mut config = ClientConfig::mock();
    config.program_id = Pubkey::new_unique();
    config.config_address = Pubkey::new_unique();
    let client = BondsClient::new(config, Pubkey::new_unique());
    client.add_mock_config(ConfigState {
        admin_authority: [1u8; 32],
        operator_authority: [2u8; 32],
        epochs_to_claim_settlement: 4,
        withdraw_lockup_epochs: LOCKUP_EPOCHS,
        minimum_stake_lamports: SOL,
        pause_authority: [3u8; 32],
        paused: false,
        min_bond_max_stake_wanted: 0,
    });
    let vote_account = Pubkey::new_unique();
    client
        .add_mock_bond(&vote_account, &client.signer_pubkey())
        .unwrap();
    (client, vote_account)
}

// =============================================================================
// 1. One live ticket per bond
// =============================================================================

#[tokio::test]
async fn test_single_live_ticket_per_bond() {
    let (client, vote_account) = client_with_bond();

    client
        .init_withdraw_request(&vote_account, 5 * SOL)
        .await
        .unwrap();
    let result = client.init_withdraw_request(&vote_account, SOL).await;
    assert!(matches!(result, Err(BondsClientError::Precondition(_))));

    // The first ticket is untouched by the rejected attempt
    let request = client
        .get_withdraw_request(&vote_account)
        .await
        .unwrap()
        .expect("ticket live");
    assert_eq!(request.requested_amount, 5 * SOL);
}

// =============================================================================
// 2. Lockup boundary is inclusive
// =============================================================================

#[tokio::test]
async fn test_lockup_boundary() {
    let (client, vote_account) = client_with_bond();
    client.set_mock_epoch(10);
    client
        .init_withdraw_request(&vote_account, 5 * SOL)
        .await
        .unwrap();
    let stake = client.add_mock_stake_account(5 * SOL).unwrap();

    // Strictly before request_epoch + lockup: locked
    for epoch in [10, 11, 12] {
        client.set_mock_epoch(epoch);
        assert_eq!(
            client
                .get_withdraw_request_status(&vote_account)
                .await
                .unwrap(),
            WithdrawRequestStatus::Locked {
                unlock_epoch: 10 + LOCKUP_EPOCHS
            }
        );
        let result = client
            .claim_withdraw_request(&vote_account, &stake, &ClaimWithdrawOptions::default())
            .await;
        assert!(matches!(result, Err(BondsClientError::Precondition(_))));
    }

    // At exactly request_epoch + lockup: claimable
    client.set_mock_epoch(10 + LOCKUP_EPOCHS);
    assert_eq!(
        client
            .get_withdraw_request_status(&vote_account)
            .await
            .unwrap(),
        WithdrawRequestStatus::Claimable {
            remaining_amount: 5 * SOL
        }
    );
    let result = client
        .claim_withdraw_request(&vote_account, &stake, &ClaimWithdrawOptions::default())
        .await
        .unwrap();
    assert!(matches!(
        result,
        ClaimWithdrawResult::Claimed {
            withdrawn,
            closed: true,
            ..
        } if withdrawn == 5 * SOL
    ));
}

// =============================================================================
// 3. Partial claims accumulate; a full claim deletes the ticket
// =============================================================================

#[tokio::test]
async fn test_partial_then_full_claim() {
    let (client, vote_account) = client_with_bond();
    client
        .init_withdraw_request(&vote_account, 10 * SOL)
        .await
        .unwrap();
    client.set_mock_epoch(LOCKUP_EPOCHS);

    // 4 SOL account: consumed whole, ticket stays live
    let stake_a = client.add_mock_stake_account(4 * SOL).unwrap();
    let result = client
        .claim_withdraw_request(&vote_account, &stake_a, &ClaimWithdrawOptions::default())
        .await
        .unwrap();
    assert!(matches!(
        result,
        ClaimWithdrawResult::Claimed {
            withdrawn,
            closed: false,
            ..
        } if withdrawn == 4 * SOL
    ));
    let request = client
        .get_withdraw_request(&vote_account)
        .await
        .unwrap()
        .expect("ticket live");
    assert_eq!(request.remaining_amount(), 6 * SOL);

    // Oversized account: split, exactly the remainder counts, ticket closes
    let m = client.minimal_stake_lamports().await.unwrap();
    let stake_b = client.add_mock_stake_account(6 * SOL + 2 * m).unwrap();
    let result = client
        .claim_withdraw_request(&vote_account, &stake_b, &ClaimWithdrawOptions::default())
        .await
        .unwrap();
    let ClaimWithdrawResult::Claimed {
        withdrawn, closed, ..
    } = result
    else {
        panic!("expected claimed result");
    };
    assert_eq!(withdrawn, 6 * SOL);
    assert!(closed);
    assert_eq!(
        client.get_withdraw_request(&vote_account).await.unwrap(),
        None
    );
    assert_eq!(
        client
            .get_withdraw_request_status(&vote_account)
            .await
            .unwrap(),
        WithdrawRequestStatus::NotRequested
    );

    // The bond may open a fresh ticket now
    client
        .init_withdraw_request(&vote_account, SOL)
        .await
        .unwrap();
}

// =============================================================================
// 4. Below-minimum accounts make no progress on a ticket
// =============================================================================

#[tokio::test]
async fn test_floor_account_makes_no_progress() {
    let (client, vote_account) = client_with_bond();
    client
        .init_withdraw_request(&vote_account, 5 * SOL)
        .await
        .unwrap();
    client.set_mock_epoch(LOCKUP_EPOCHS);

    let m = client.minimal_stake_lamports().await.unwrap();
    let stake = client.add_mock_stake_account(m).unwrap();
    let result = client
        .claim_withdraw_request(&vote_account, &stake, &ClaimWithdrawOptions::default())
        .await
        .unwrap();
    assert!(matches!(result, ClaimWithdrawResult::BelowMinimum));
    let request = client
        .get_withdraw_request(&vote_account)
        .await
        .unwrap()
        .expect("ticket live");
    assert_eq!(request.withdrawn_amount, 0);
}

// =============================================================================
// 5. Cancel needs no lockup wait and frees the bond
// =============================================================================

#[tokio::test]
async fn test_cancel_before_lockup() {
    let (client, vote_account) = client_with_bond();

    // Nothing to cancel yet
    let result = client.cancel_withdraw_request(&vote_account).await;
    assert!(matches!(result, Err(BondsClientError::NotFound(_))));

    client
        .init_withdraw_request(&vote_account, 5 * SOL)
        .await
        .unwrap();
    // Cancel immediately, well inside the lockup
    client.cancel_withdraw_request(&vote_account).await.unwrap();
    assert_eq!(
        client.get_withdraw_request(&vote_account).await.unwrap(),
        None
    );

    // And a new ticket may open
    client
        .init_withdraw_request(&vote_account, 2 * SOL)
        .await
        .unwrap();
}

// =============================================================================
// 6. Sizing arithmetic agrees between core plan and client outcome
// =============================================================================

#[tokio::test]
async fn test_claim_plan_matches_core_sizing() {
    let (client, vote_account) = client_with_bond();
    client
        .init_withdraw_request(&vote_account, 4 * SOL)
        .await
        .unwrap();
    client.set_mock_epoch(LOCKUP_EPOCHS);
    let m = client.minimal_stake_lamports().await.unwrap();

    // 10 SOL against a 4 SOL target splits per the core decision table
    let expected = stakebond_core::plan_funding(10 * SOL, 4 * SOL, m);
    assert_eq!(
        expected,
        FundingPlan::Split {
            applied: 4 * SOL,
            residual: 6 * SOL
        }
    );

    let stake = client.add_mock_stake_account(10 * SOL).unwrap();
    let result = client
        .claim_withdraw_request(&vote_account, &stake, &ClaimWithdrawOptions::default())
        .await
        .unwrap();
    assert!(matches!(
        result,
        ClaimWithdrawResult::Claimed {
            withdrawn,
            closed: true,
            ..
        } if withdrawn == 4 * SOL
    ));
    // The transferred account was reduced to exactly the target
    assert_eq!(
        client.get_stake_account_lamports(&stake).await.unwrap(),
        4 * SOL
    );
}
