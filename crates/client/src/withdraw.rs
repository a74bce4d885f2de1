//! Withdraw-request lifecycle.
//!
//! A bond has at most one live withdrawal ticket: request, then claim once
//! the lockup has elapsed, or cancel at any time before the claim
//! completes. Claiming applies the same sizing arithmetic as settlement
//! funding, against the stake account being handed to the withdrawer; any
//! excess over the requested total is split back into the bond's ownership.

use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signer};
use solana_sdk_ids::system_program;
use tracing::debug;

use stakebond_core::{plan_funding, FundingPlan, WithdrawRequestState};

use crate::instructions::{
    clock_sysvar, discriminator, stake_history_sysvar, stake_program_id,
};
use crate::{
    bond_address, bonds_withdrawer_authority, withdraw_request_address, BondsClientError,
    BondsContext, Result,
};

/// Where a bond's ticket stands right now. Terminal states (claimed,
/// cancelled) delete the account and read back as `NotRequested`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WithdrawRequestStatus {
    /// No live ticket for the bond
    NotRequested,
    /// Ticket exists but the lockup has not elapsed
    Locked { unlock_epoch: u64 },
    /// Ticket is claimable
    Claimable { remaining_amount: u64 },
}

pub fn withdraw_request_status(
    request: Option<&WithdrawRequestState>,
    current_epoch: u64,
    withdraw_lockup_epochs: u64,
) -> WithdrawRequestStatus {
    match request {
        None => WithdrawRequestStatus::NotRequested,
        Some(request) if request.is_unlocked(current_epoch, withdraw_lockup_epochs) => {
            WithdrawRequestStatus::Claimable {
                remaining_amount: request.remaining_amount(),
            }
        }
        Some(request) => WithdrawRequestStatus::Locked {
            unlock_epoch: request.unlock_epoch(withdraw_lockup_epochs),
        },
    }
}

pub struct WithdrawRequestBuilt {
    pub instruction: Instruction,
    pub withdraw_request: Pubkey,
}

/// Build the request-creation instruction. The program rejects it when a
/// live ticket already exists; the epoch stamp comes from the clock sysvar.
pub fn build_init_withdraw_request(
    ctx: &BondsContext,
    vote_account: &Pubkey,
    amount: u64,
    caller: &Pubkey,
    authority: Option<Pubkey>,
    rent_payer: Option<Pubkey>,
) -> Result<WithdrawRequestBuilt> {
    if amount == 0 {
        return Err(BondsClientError::Validation(
            "withdraw request amount must be > 0".to_string(),
        ));
    }
    let authority = authority.unwrap_or(*caller);
    let rent_payer = rent_payer.unwrap_or(*caller);
    let (bond, _) = bond_address(&ctx.program_id, &ctx.config_address, vote_account)?;
    let (withdraw_request, _) = withdraw_request_address(&ctx.program_id, &bond)?;
    debug!(
        "Init withdraw request {} for bond {} ({} lamports)",
        withdraw_request, bond, amount,
    );

    let mut data = discriminator::INIT_WITHDRAW_REQUEST.to_vec();
    data.extend_from_slice(&amount.to_le_bytes());

    let instruction = Instruction {
        program_id: ctx.program_id,
        accounts: vec![
            AccountMeta::new_readonly(ctx.config_address, false), // config
            AccountMeta::new_readonly(*vote_account, false),      // vote account
            AccountMeta::new_readonly(bond, false),               // bond
            AccountMeta::new(withdraw_request, false),            // withdraw request (init)
            AccountMeta::new_readonly(authority, true),           // bond authority (signer)
            AccountMeta::new(rent_payer, true),                   // rent payer (signer)
            AccountMeta::new_readonly(system_program::id(), false),
            AccountMeta::new_readonly(clock_sysvar(), false),
        ],
        data,
    };

    Ok(WithdrawRequestBuilt {
        instruction,
        withdraw_request,
    })
}

/// Build the cancel instruction. Permitted in any non-claimed state
/// regardless of elapsed epochs; rent goes to `rent_collector`.
pub fn build_cancel_withdraw_request(
    ctx: &BondsContext,
    vote_account: &Pubkey,
    caller: &Pubkey,
    authority: Option<Pubkey>,
    rent_collector: Option<Pubkey>,
) -> Result<WithdrawRequestBuilt> {
    let authority = authority.unwrap_or(*caller);
    let rent_collector = rent_collector.unwrap_or(*caller);
    let (bond, _) = bond_address(&ctx.program_id, &ctx.config_address, vote_account)?;
    let (withdraw_request, _) = withdraw_request_address(&ctx.program_id, &bond)?;
    debug!("Cancel withdraw request {} for bond {}", withdraw_request, bond);

    let instruction = Instruction {
        program_id: ctx.program_id,
        accounts: vec![
            AccountMeta::new_readonly(ctx.config_address, false), // config
            AccountMeta::new_readonly(bond, false),               // bond
            AccountMeta::new(withdraw_request, false),            // withdraw request (close)
            AccountMeta::new_readonly(authority, true),           // bond authority (signer)
            AccountMeta::new(rent_collector, false),              // rent destination
        ],
        data: discriminator::CANCEL_WITHDRAW_REQUEST.to_vec(),
    };

    Ok(WithdrawRequestBuilt {
        instruction,
        withdraw_request,
    })
}

/// Optional parameters for claiming a ticket.
#[derive(Debug, Clone, Default)]
pub struct ClaimWithdrawOptions {
    /// Bond authority signing the claim; defaults to the caller
    pub authority: Option<Pubkey>,
    /// New withdrawer/staker authority of the transferred stake account;
    /// defaults to the caller
    pub withdrawer: Option<Pubkey>,
    /// Payer of a split account's rent; defaults to the caller
    pub split_rent_payer: Option<Pubkey>,
}

pub struct ClaimWithdrawBuilt {
    pub instruction: Instruction,
    /// Keypair of the split account keeping the excess under bond
    /// ownership, when the plan splits
    pub split_stake_account: Option<Keypair>,
    pub plan: FundingPlan,
}

pub enum ClaimWithdrawOutcome {
    /// The ticket's remaining amount is zero
    AlreadySatisfied,
    /// The offered stake account sits at the minimal viable floor
    BelowMinimum,
    Built(ClaimWithdrawBuilt),
}

/// Build the claim instruction for one bond-owned stake account.
///
/// The lockup is checked eagerly to avoid a pointless submission, but the
/// program's own check remains authoritative.
#[allow(clippy::too_many_arguments)]
pub fn build_claim_withdraw_request(
    ctx: &BondsContext,
    request: &WithdrawRequestState,
    current_epoch: u64,
    withdraw_lockup_epochs: u64,
    stake_account: &Pubkey,
    stake_lamports: u64,
    minimal_stake_lamports: u64,
    caller: &Pubkey,
    options: &ClaimWithdrawOptions,
) -> Result<ClaimWithdrawOutcome> {
    if !request.is_unlocked(current_epoch, withdraw_lockup_epochs) {
        return Err(BondsClientError::Precondition(format!(
            "withdraw lockup not elapsed: unlocks at epoch {}, current epoch {}",
            request.unlock_epoch(withdraw_lockup_epochs),
            current_epoch,
        )));
    }

    let target = request.remaining_amount();
    let plan = plan_funding(stake_lamports, target, minimal_stake_lamports);
    debug!(
        "Withdraw claim plan for bond {}: target={}, stake={}, plan={:?}",
        Pubkey::new_from_array(request.bond),
        target,
        stake_lamports,
        plan,
    );
    match plan {
        FundingPlan::AlreadySatisfied => return Ok(ClaimWithdrawOutcome::AlreadySatisfied),
        FundingPlan::BelowMinimum => return Ok(ClaimWithdrawOutcome::BelowMinimum),
        FundingPlan::ConsumeAll { .. } | FundingPlan::Split { .. } => {}
    }

    let authority = options.authority.unwrap_or(*caller);
    let withdrawer = options.withdrawer.unwrap_or(*caller);
    let split_rent_payer = options.split_rent_payer.unwrap_or(*caller);

    let bond = Pubkey::new_from_array(request.bond);
    let (withdraw_request, _) = withdraw_request_address(&ctx.program_id, &bond)?;
    let (withdrawer_authority, _) =
        bonds_withdrawer_authority(&ctx.program_id, &ctx.config_address)?;

    let split_stake_account = plan.is_split().then(Keypair::new);

    let mut accounts = vec![
        AccountMeta::new_readonly(ctx.config_address, false), // config
        AccountMeta::new_readonly(bond, false),               // bond
        AccountMeta::new(withdraw_request, false),            // withdraw request (mut)
        AccountMeta::new_readonly(withdrawer_authority, false), // bonds withdrawer authority
        AccountMeta::new_readonly(authority, true),           // bond authority (signer)
        AccountMeta::new_readonly(withdrawer, false),         // new stake authorities
        AccountMeta::new(*stake_account, false),              // transferred stake (mut)
    ];
    if let Some(split) = &split_stake_account {
        accounts.push(AccountMeta::new(split.pubkey(), true)); // bond-side split (init, signer)
        accounts.push(AccountMeta::new(split_rent_payer, true)); // rent payer (signer)
        accounts.push(AccountMeta::new_readonly(system_program::id(), false));
    }
    accounts.push(AccountMeta::new_readonly(stake_program_id(), false));
    accounts.push(AccountMeta::new_readonly(clock_sysvar(), false));
    accounts.push(AccountMeta::new_readonly(stake_history_sysvar(), false));

    let instruction = Instruction {
        program_id: ctx.program_id,
        accounts,
        data: discriminator::CLAIM_WITHDRAW_REQUEST.to_vec(),
    };

    Ok(ClaimWithdrawOutcome::Built(ClaimWithdrawBuilt {
        instruction,
        split_stake_account,
        plan,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(epoch: u64, requested: u64, withdrawn: u64) -> WithdrawRequestState {
        WithdrawRequestState {
            vote_account: Pubkey::new_unique().to_bytes(),
            bond: Pubkey::new_unique().to_bytes(),
            epoch,
            requested_amount: requested,
            withdrawn_amount: withdrawn,
            bump: 255,
        }
    }

    fn ctx() -> BondsContext {
        BondsContext {
            program_id: Pubkey::new_unique(),
            config_address: Pubkey::new_unique(),
        }
    }

    #[test]
    fn test_status_transitions() {
        let request = request(100, 5_000, 0);
        assert_eq!(
            withdraw_request_status(None, 104, 3),
            WithdrawRequestStatus::NotRequested
        );
        assert_eq!(
            withdraw_request_status(Some(&request), 102, 3),
            WithdrawRequestStatus::Locked { unlock_epoch: 103 }
        );
        // The boundary epoch itself is claimable
        assert_eq!(
            withdraw_request_status(Some(&request), 103, 3),
            WithdrawRequestStatus::Claimable {
                remaining_amount: 5_000
            }
        );
    }

    #[test]
    fn test_claim_before_lockup_rejected_eagerly() {
        let ctx = ctx();
        let caller = Pubkey::new_unique();
        let result = build_claim_withdraw_request(
            &ctx,
            &request(100, 5_000, 0),
            102,
            3,
            &Pubkey::new_unique(),
            6_000,
            100,
            &caller,
            &ClaimWithdrawOptions::default(),
        );
        assert!(matches!(result, Err(BondsClientError::Precondition(_))));
    }

    #[test]
    fn test_claim_at_boundary_splits_excess_back_to_bond() {
        let ctx = ctx();
        let caller = Pubkey::new_unique();
        let outcome = build_claim_withdraw_request(
            &ctx,
            &request(100, 5_000, 1_000),
            103,
            3,
            &Pubkey::new_unique(),
            10_000,
            100,
            &caller,
            &ClaimWithdrawOptions::default(),
        )
        .unwrap();
        let ClaimWithdrawOutcome::Built(built) = outcome else {
            panic!("expected built instruction");
        };
        // remaining = 4000, stake = 10000: 6000 split back to the bond
        assert_eq!(
            built.plan,
            FundingPlan::Split {
                applied: 4_000,
                residual: 6_000
            }
        );
        assert!(built.split_stake_account.is_some());
    }

    #[test]
    fn test_zero_amount_request_rejected() {
        let ctx = ctx();
        let caller = Pubkey::new_unique();
        let result =
            build_init_withdraw_request(&ctx, &Pubkey::new_unique(), 0, &caller, None, None);
        assert!(matches!(result, Err(BondsClientError::Validation(_))));
    }

    #[test]
    fn test_init_and_cancel_share_ticket_address() {
        let ctx = ctx();
        let caller = Pubkey::new_unique();
        let vote_account = Pubkey::new_unique();
        let init =
            build_init_withdraw_request(&ctx, &vote_account, 1_000, &caller, None, None).unwrap();
        let cancel =
            build_cancel_withdraw_request(&ctx, &vote_account, &caller, None, None).unwrap();
        assert_eq!(init.withdraw_request, cancel.withdraw_request);
    }
}
